//! Audit Service
//!
//! Records one entry per privileged admin mutation. Writes happen after the
//! mutation has committed and are best-effort: a failed write is logged and
//! counted, never returned to the caller.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use cn_common::DeliveryOutcome;

use crate::domain::{AdminAction, AuditLog, AuditLogFilter, DishReviewStatus, Principal};
use crate::error::Result;
use crate::repository::AuditLogRepository;

pub const AUDIT_WRITES_METRIC: &str = "cribnosh_audit_writes_total";

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditLogRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditLogRepository>) -> Self {
        Self { repo }
    }

    /// Log a webhook fan-out
    pub async fn log_webhook_triggered(
        &self,
        principal: &Principal,
        event: &str,
        results: &[DeliveryOutcome],
    ) {
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        let delivered = results.iter().filter(|r| r.ok).count();
        let details = json!({
            "event": event,
            "urls": urls,
            "delivered": delivered,
            "failed": results.len() - delivered,
        });
        self.insert(AuditLog::by(principal, AdminAction::TriggerWebhook, details)).await;
    }

    /// Log a dish review decision
    pub async fn log_dish_reviewed(
        &self,
        principal: &Principal,
        dish_id: &str,
        status: DishReviewStatus,
        notes: Option<&str>,
    ) {
        let details = json!({
            "dish_id": dish_id,
            "status": status.as_str(),
            "notes": notes,
        });
        self.insert(AuditLog::by(principal, AdminAction::ReviewDish, details)).await;
    }

    /// Log a bulk refund eligibility override
    pub async fn log_refund_override(
        &self,
        principal: &Principal,
        order_ids: &[String],
        summary: Value,
    ) {
        let details = json!({
            "orderIds": order_ids,
            "summary": summary,
        });
        self.insert(AuditLog::by(principal, AdminAction::RefundEligibilityOverride, details))
            .await;
    }

    pub async fn find(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLog>> {
        self.repo.find(filter).await
    }

    async fn insert(&self, log: AuditLog) {
        let sink = self.repo.sink_name();
        info!(
            action = log.action.as_str(),
            admin_id = %log.admin_id,
            sink,
            "Audit log recorded"
        );

        let outcome = match self.repo.insert(&log).await {
            Ok(()) => "success",
            Err(e) => {
                error!(error = %e, action = log.action.as_str(), sink, "Failed to insert audit log");
                "failure"
            }
        };
        metrics::counter!(AUDIT_WRITES_METRIC, "outcome" => outcome, "sink" => sink).increment(1);
    }
}
