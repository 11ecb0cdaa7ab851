//! MongoDB audit log sink

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, Collection, Database};

use super::AuditLogRepository;
use crate::domain::{AuditLog, AuditLogFilter};
use crate::error::Result;

pub struct MongoAuditLogRepository {
    collection: Collection<AuditLog>,
}

impl MongoAuditLogRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection("audit_logs"),
        }
    }
}

#[async_trait]
impl AuditLogRepository for MongoAuditLogRepository {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        self.collection.insert_one(log).await?;
        Ok(())
    }

    async fn find(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>> {
        // The driver reads a zero limit as unlimited
        if filter.limit == 0 {
            return Ok(Vec::new());
        }

        let mut query = doc! {};
        if let Some(action) = filter.action {
            query.insert("action", action.as_str());
        }
        if let Some(admin_id) = &filter.admin_id {
            query.insert("adminId", admin_id.as_str());
        }

        let options = FindOptions::builder()
            .sort(doc! { "timestamp": -1 })
            .limit(filter.limit as i64)
            .build();

        let cursor = self.collection.find(query).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    fn sink_name(&self) -> &'static str {
        "mongo"
    }
}
