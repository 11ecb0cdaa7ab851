//! Audit Log Repository
//!
//! Append-only sinks for admin audit records. The sink is chosen by
//! configuration; handlers only see the trait.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::backend::{functions, BackendClient};
use crate::domain::{AuditLog, AuditLogFilter};
use crate::error::Result;

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert(&self, log: &AuditLog) -> Result<()>;

    /// Matching records, newest first, at most `filter.limit`
    async fn find(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>>;

    /// Short name used in logs and metrics labels
    fn sink_name(&self) -> &'static str;
}

/// Process-local store for development and tests
pub struct InMemoryAuditLogRepository {
    logs: RwLock<VecDeque<AuditLog>>,
    capacity: Option<usize>,
}

impl Default for InMemoryAuditLogRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditLogRepository {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(VecDeque::new()),
            capacity: None,
        }
    }

    /// Keeps only the most recent `capacity` records
    pub fn bounded(capacity: usize) -> Self {
        Self {
            logs: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    pub fn push(&self, log: AuditLog) {
        let mut logs = self.logs.write();
        if let Some(capacity) = self.capacity {
            while logs.len() >= capacity {
                logs.pop_front();
            }
        }
        logs.push_back(log);
    }

    /// All records in insertion order
    pub fn snapshot(&self) -> Vec<AuditLog> {
        self.logs.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.logs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.read().is_empty()
    }

    fn select(&self, filter: &AuditLogFilter) -> Vec<AuditLog> {
        self.logs
            .read()
            .iter()
            .rev()
            .filter(|log| filter.matches(log))
            .take(filter.limit)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditLogRepository {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        self.push(log.clone());
        Ok(())
    }

    async fn find(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>> {
        Ok(self.select(filter))
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}

/// Records written to the backend's `adminLogs` table.
///
/// The backend exposes no listing for that table, so reads are served from
/// the records this instance has written since start-up.
pub struct BackendAuditLogRepository {
    backend: Arc<dyn BackendClient>,
    recent: InMemoryAuditLogRepository,
}

impl BackendAuditLogRepository {
    const RECENT_CAPACITY: usize = 1000;

    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            recent: InMemoryAuditLogRepository::bounded(Self::RECENT_CAPACITY),
        }
    }
}

#[async_trait]
impl AuditLogRepository for BackendAuditLogRepository {
    async fn insert(&self, log: &AuditLog) -> Result<()> {
        self.backend
            .mutation(functions::INSERT_ADMIN_LOG, log.to_backend_args())
            .await?;
        self.recent.push(log.clone());
        Ok(())
    }

    async fn find(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>> {
        Ok(self.recent.select(filter))
    }

    fn sink_name(&self) -> &'static str {
        "backend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AdminAction;
    use serde_json::json;

    fn log(action: AdminAction, admin: &str, ts: i64) -> AuditLog {
        AuditLog::new(action, admin, json!({})).with_timestamp(ts)
    }

    #[tokio::test]
    async fn test_find_newest_first_with_filters() {
        let repo = InMemoryAuditLogRepository::new();
        repo.insert(&log(AdminAction::TriggerWebhook, "a1", 1)).await.unwrap();
        repo.insert(&log(AdminAction::ReviewDish, "a2", 2)).await.unwrap();
        repo.insert(&log(AdminAction::TriggerWebhook, "a2", 3)).await.unwrap();

        let all = repo.find(&AuditLogFilter { limit: 10, ..Default::default() }).await.unwrap();
        assert_eq!(all.iter().map(|l| l.timestamp).collect::<Vec<_>>(), vec![3, 2, 1]);

        let webhooks = repo
            .find(&AuditLogFilter {
                action: Some(AdminAction::TriggerWebhook),
                admin_id: Some("a2".to_string()),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].timestamp, 3);

        let limited = repo.find(&AuditLogFilter { limit: 2, ..Default::default() }).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_bounded_store_drops_oldest() {
        let repo = InMemoryAuditLogRepository::bounded(2);
        repo.push(log(AdminAction::ReviewDish, "a", 1));
        repo.push(log(AdminAction::ReviewDish, "a", 2));
        repo.push(log(AdminAction::ReviewDish, "a", 3));

        let kept: Vec<i64> = repo.snapshot().iter().map(|l| l.timestamp).collect();
        assert_eq!(kept, vec![2, 3]);
    }
}
