//! Admin Audit Log Entity
//!
//! One record per privileged admin mutation. Records are append-only and
//! written after the mutation they describe has committed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::Principal;

/// Privileged action being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    /// Webhook fan-out triggered by an admin
    TriggerWebhook,
    /// Dish review status changed
    ReviewDish,
    /// Bulk refund eligibility override
    RefundEligibilityOverride,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TriggerWebhook => "trigger_webhook",
            Self::ReviewDish => "review_dish",
            Self::RefundEligibilityOverride => "refund_eligibility_override",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trigger_webhook" => Some(Self::TriggerWebhook),
            "review_dish" => Some(Self::ReviewDish),
            "refund_eligibility_override" => Some(Self::RefundEligibilityOverride),
            _ => None,
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    #[serde(rename = "_id")]
    pub id: String,

    pub action: AdminAction,

    /// Action-specific payload (event name and destinations, dish id and status, ...)
    #[schema(value_type = Object)]
    pub details: Value,

    /// Principal who performed the action
    pub admin_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,

    /// Epoch milliseconds
    pub timestamp: i64,
}

impl AuditLog {
    pub fn new(action: AdminAction, admin_id: impl Into<String>, details: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            details,
            admin_id: admin_id.into(),
            admin_email: None,
            timestamp: cn_common::now_millis(),
        }
    }

    /// Record attributed to an authenticated principal
    pub fn by(principal: &Principal, action: AdminAction, details: Value) -> Self {
        let mut log = Self::new(action, &principal.user_id, details);
        log.admin_email = principal.email.clone();
        log
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Arguments for the backend's `insertAdminLog` mutation
    pub fn to_backend_args(&self) -> Value {
        json!({
            "action": self.action.as_str(),
            "details": self.details,
            "adminId": self.admin_id,
            "timestamp": self.timestamp,
        })
    }
}

/// Read-side filter, newest first
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub action: Option<AdminAction>,
    pub admin_id: Option<String>,
    pub limit: usize,
}

impl AuditLogFilter {
    pub fn matches(&self, log: &AuditLog) -> bool {
        self.action.map_or(true, |a| a == log.action)
            && self.admin_id.as_deref().map_or(true, |id| id == log.admin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_str() {
        for action in [
            AdminAction::TriggerWebhook,
            AdminAction::ReviewDish,
            AdminAction::RefundEligibilityOverride,
        ] {
            assert_eq!(AdminAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AdminAction::parse("delete_everything"), None);
    }

    #[test]
    fn test_log_by_principal_carries_identity() {
        let principal = Principal::new("admin_1").with_email("ops@cribnosh.test");
        let log = AuditLog::by(&principal, AdminAction::ReviewDish, json!({"dish_id": "m1"}));

        assert_eq!(log.admin_id, "admin_1");
        assert_eq!(log.admin_email.as_deref(), Some("ops@cribnosh.test"));
        assert!(log.timestamp > 0);
    }

    #[test]
    fn test_backend_args_shape() {
        let log = AuditLog::new(AdminAction::TriggerWebhook, "admin_1", json!({"event": "order.created"}))
            .with_timestamp(1_700_000_000_000);

        assert_eq!(
            log.to_backend_args(),
            json!({
                "action": "trigger_webhook",
                "details": {"event": "order.created"},
                "adminId": "admin_1",
                "timestamp": 1_700_000_000_000i64,
            })
        );
    }

    #[test]
    fn test_stored_document_fields() {
        let principal = Principal::new("admin_1").with_email("ops@cribnosh.test");
        let log = AuditLog::by(&principal, AdminAction::ReviewDish, json!({"dish_id": "m1"}));
        let doc = serde_json::to_value(&log).unwrap();

        let mut keys: Vec<&str> = doc.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["_id", "action", "adminEmail", "adminId", "details", "timestamp"]);
    }

    #[test]
    fn test_filter_matches() {
        let log = AuditLog::new(AdminAction::ReviewDish, "admin_1", Value::Null);
        let filter = AuditLogFilter {
            action: Some(AdminAction::ReviewDish),
            admin_id: Some("admin_2".to_string()),
            limit: 10,
        };
        assert!(!filter.matches(&log));
        assert!(AuditLogFilter::default().matches(&log));
    }
}
