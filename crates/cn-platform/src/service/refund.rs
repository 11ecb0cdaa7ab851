//! Refund Eligibility Service
//!
//! Read-side eligibility listing and the bulk admin override. Each order in
//! a bulk request is processed on its own: a failed lookup, a rejected plan
//! or a backend error is reported for that order and the batch continues.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::backend::{functions, BackendClient};
use crate::domain::{
    evaluate_eligibility, plan_override, OrderSnapshot, OverridePlan, Principal, RefundAction,
    RefundEligibility, RefundStatusFilter,
};
use crate::error::{PlatformError, Result};
use crate::service::AuditService;

pub const MAX_STATUS_LIMIT: u32 = 100;
pub const DEFAULT_STATUS_LIMIT: u32 = 50;
pub const MAX_BULK_ORDERS: usize = 50;

/// Filters for the eligibility listing
#[derive(Debug, Clone, Default)]
pub struct EligibilityQuery {
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<RefundStatusFilter>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct OrderEligibility {
    pub order: OrderSnapshot,
    pub eligibility: RefundEligibility,
}

#[derive(Debug, Clone)]
pub struct EligibilityReport {
    pub orders: Vec<OrderEligibility>,
    /// Backend summary, passed through as-is
    pub summary: Value,
}

/// One order in a bulk override request.
///
/// Entries arrive as raw JSON and are decoded one at a time, so a malformed
/// entry fails on its own instead of rejecting the batch.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderOverride {
    pub order_id: Option<String>,
    /// `mark_non_refundable`, `mark_refundable` or `extend_window`
    pub action: Option<String>,
    pub reason: Option<String>,
    pub description: Option<String>,
    /// Hours granted by `extend_window`, default 24. Numeric strings are accepted.
    #[schema(value_type = Option<f64>)]
    pub new_window_hours: Option<Value>,
    /// Allow `mark_non_refundable` inside an open window
    #[serde(default)]
    pub effective_immediately: bool,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OverrideResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct BulkOverrideReport {
    pub successful: Vec<OverrideResult>,
    pub failed: Vec<OverrideResult>,
    pub summary: BulkSummary,
}

pub struct RefundService {
    backend: Arc<dyn BackendClient>,
    audit: AuditService,
}

impl RefundService {
    pub fn new(backend: Arc<dyn BackendClient>, audit: AuditService) -> Self {
        Self { backend, audit }
    }

    pub async fn eligibility_status(&self, query: &EligibilityQuery, now: i64) -> Result<EligibilityReport> {
        if query.limit > MAX_STATUS_LIMIT {
            return Err(PlatformError::validation("Limit cannot exceed 100 orders."));
        }

        let orders: Vec<OrderSnapshot> = match &query.order_id {
            Some(order_id) => self.find_order(order_id).await?.into_iter().collect(),
            None => {
                let mut args = json!({ "limit": query.limit, "offset": query.offset });
                if let Some(customer_id) = &query.customer_id {
                    args["customerId"] = json!(customer_id);
                }
                if let Some(status) = query.status {
                    args["status"] = json!(status.as_str());
                }
                let value = self
                    .backend
                    .query(functions::GET_ORDERS_WITH_REFUND_ELIGIBILITY, args)
                    .await?;
                if value.is_null() {
                    Vec::new()
                } else {
                    serde_json::from_value(value)?
                }
            }
        };

        let mut summary_args = json!({});
        if let Some(customer_id) = &query.customer_id {
            summary_args["customerId"] = json!(customer_id);
        }
        let summary = self
            .backend
            .query(functions::GET_REFUND_ELIGIBILITY_SUMMARY, summary_args)
            .await?;

        let orders = orders
            .into_iter()
            .map(|order| OrderEligibility {
                eligibility: evaluate_eligibility(&order, now),
                order,
            })
            .collect();

        Ok(EligibilityReport { orders, summary })
    }

    /// Apply a batch of overrides in request order
    pub async fn bulk_override(
        &self,
        principal: &Principal,
        orders: &[Value],
        global_reason: Option<&str>,
        global_description: Option<&str>,
        now: i64,
    ) -> Result<BulkOverrideReport> {
        if orders.is_empty() {
            return Err(PlatformError::validation(
                "Missing or invalid orders array. Must contain at least one order.",
            ));
        }
        if orders.len() > MAX_BULK_ORDERS {
            return Err(PlatformError::validation("Too many orders. Maximum 50 orders per request."));
        }

        let mut report = BulkOverrideReport {
            summary: BulkSummary {
                total: orders.len(),
                ..Default::default()
            },
            ..Default::default()
        };

        for entry in orders {
            let order_id = entry_field(entry, "orderId");
            let action = entry_field(entry, "action");
            let outcome = self
                .apply_override(principal, entry, global_reason, global_description, now)
                .await;

            match outcome {
                Ok(()) => report.successful.push(OverrideResult {
                    order_id,
                    action,
                    success: true,
                    error: None,
                }),
                Err(error) => {
                    warn!(order_id = ?order_id, action = ?action, %error, "Refund override rejected");
                    report.failed.push(OverrideResult {
                        order_id,
                        action,
                        success: false,
                        error: Some(error),
                    });
                }
            }
        }

        report.summary.successful = report.successful.len();
        report.summary.failed = report.failed.len();

        info!(
            admin_id = %principal.user_id,
            successful = report.summary.successful,
            failed = report.summary.failed,
            "Bulk refund eligibility operation completed"
        );

        if !report.successful.is_empty() {
            let order_ids: Vec<String> = report
                .successful
                .iter()
                .filter_map(|r| r.order_id.clone())
                .collect();
            self.audit
                .log_refund_override(principal, &order_ids, json!(report.summary))
                .await;
        }

        Ok(report)
    }

    /// Process one order. The error is the message reported for that order.
    async fn apply_override(
        &self,
        principal: &Principal,
        entry: &Value,
        global_reason: Option<&str>,
        global_description: Option<&str>,
        now: i64,
    ) -> std::result::Result<(), String> {
        let request: OrderOverride = serde_json::from_value(entry.clone())
            .map_err(|e| format!("Invalid order request: {}", e))?;
        let order_id = non_blank(request.order_id.as_deref()).ok_or_else(|| "Missing orderId".to_string())?;

        let order = self
            .find_order(order_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "Order not found".to_string())?;

        let action = request
            .action
            .as_deref()
            .and_then(RefundAction::parse)
            .ok_or_else(|| format!("Invalid action: {}", request.action.as_deref().unwrap_or("undefined")))?;

        let plan = plan_override(
            &order,
            action,
            window_hours(request.new_window_hours.as_ref())?,
            request.effective_immediately,
            now,
        )?;

        let reason = non_blank(request.reason.as_deref())
            .or(non_blank(global_reason))
            .unwrap_or("admin_override");
        let description = non_blank(request.description.as_deref())
            .or(non_blank(global_description))
            .unwrap_or("Bulk admin operation");

        let mut metadata = json!({
            "adminReason": reason,
            "adminDescription": description,
            "adminUserId": principal.user_id,
            "adminOverride": true,
            "bulkOperation": true,
            "originalRefundEligibleUntil": order.refund_eligible_until,
        });

        let (path, args) = match plan {
            OverridePlan::SetRefundable(_) => {
                if action == RefundAction::MarkNonRefundable {
                    metadata["effectiveImmediately"] = json!(request.effective_immediately);
                }
                metadata["originalIsRefundable"] = json!(order.is_refundable);
                merge_metadata(&mut metadata, request.metadata.as_ref());
                (
                    functions::UPDATE_REFUND_ELIGIBILITY,
                    json!({
                        "orderId": order.id,
                        "updatedBy": principal.user_id,
                        "reason": format!("Bulk admin override: {}", description),
                        "metadata": metadata,
                    }),
                )
            }
            OverridePlan::ExtendWindow { until, hours } => {
                metadata["newWindowHours"] = json!(hours);
                merge_metadata(&mut metadata, request.metadata.as_ref());
                (
                    functions::UPDATE_REFUND_WINDOW,
                    json!({
                        "orderId": order.id,
                        "updatedBy": principal.user_id,
                        "newRefundEligibleUntil": until,
                        "reason": format!("Bulk admin window extension: {}", description),
                        "metadata": metadata,
                    }),
                )
            }
        };

        self.backend
            .mutation(path, args)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<OrderSnapshot>> {
        let value = self
            .backend
            .query(functions::GET_ORDER_BY_ID, json!({ "orderId": order_id }))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// String field of a raw bulk entry, for reporting
fn entry_field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(String::from)
}

/// `newWindowHours` as a number; `null` or absent means the default window
fn window_hours(value: Option<&Value>) -> std::result::Result<Option<f64>, String> {
    let hours = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    hours
        .filter(|h| h.is_finite())
        .map(Some)
        .ok_or_else(|| "Invalid newWindowHours".to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Caller metadata is applied last and may override the defaults
fn merge_metadata(target: &mut Value, extra: Option<&Map<String, Value>>) {
    if let (Some(target), Some(extra)) = (target.as_object_mut(), extra) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendResult, FunctionKind};
    use crate::domain::AdminAction;
    use crate::repository::InMemoryAuditLogRepository;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const NOW: i64 = 1_700_000_000_000;
    const HOUR: i64 = 3_600_000;

    /// Orders keyed by `order_id`; records every mutation
    #[derive(Default)]
    struct FakeOrders {
        orders: HashMap<String, Value>,
        failing_mutations: Vec<String>,
        mutations: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl BackendClient for FakeOrders {
        async fn call(&self, kind: FunctionKind, path: &str, args: Value) -> BackendResult<Value> {
            match kind {
                FunctionKind::Query if path == functions::GET_ORDER_BY_ID => {
                    let id = args["orderId"].as_str().unwrap_or_default();
                    Ok(self.orders.get(id).cloned().unwrap_or(Value::Null))
                }
                FunctionKind::Query if path == functions::GET_ORDERS_WITH_REFUND_ELIGIBILITY => {
                    Ok(Value::Array(self.orders.values().cloned().collect()))
                }
                FunctionKind::Query => Ok(json!({"total": self.orders.len()})),
                _ => {
                    let id = args["orderId"].as_str().unwrap_or_default().to_string();
                    if self.failing_mutations.contains(&id) {
                        return Err(BackendError::Function("Order is locked".to_string()));
                    }
                    self.mutations.lock().push((path.to_string(), args));
                    Ok(Value::Null)
                }
            }
        }
    }

    fn order(id: &str, status: &str, refundable: bool, delivered_at: Option<i64>, until: Option<i64>) -> (String, Value) {
        (
            id.to_string(),
            json!({
                "_id": format!("doc_{}", id),
                "order_id": id,
                "order_status": status,
                "is_refundable": refundable,
                "delivered_at": delivered_at,
                "refund_eligible_until": until,
            }),
        )
    }

    fn service(backend: FakeOrders) -> (RefundService, Arc<FakeOrders>, Arc<InMemoryAuditLogRepository>) {
        let backend = Arc::new(backend);
        let audit_repo = Arc::new(InMemoryAuditLogRepository::new());
        let svc = RefundService::new(backend.clone(), AuditService::new(audit_repo.clone()));
        (svc, backend, audit_repo)
    }

    fn admin() -> Principal {
        Principal::new("admin_1").with_roles(["admin"])
    }

    fn request(order_id: &str, action: &str) -> Value {
        json!({ "orderId": order_id, "action": action })
    }

    #[tokio::test]
    async fn test_status_limit_above_100_rejected() {
        let (svc, _, _) = service(FakeOrders::default());
        let query = EligibilityQuery { limit: 101, ..Default::default() };
        let err = svc.eligibility_status(&query, NOW).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_status_single_order() {
        let (svc, _, _) = service(FakeOrders {
            orders: HashMap::from([order("A", "delivered", true, Some(NOW - HOUR), Some(NOW + HOUR))]),
            ..Default::default()
        });

        let query = EligibilityQuery {
            order_id: Some("A".to_string()),
            limit: DEFAULT_STATUS_LIMIT,
            ..Default::default()
        };
        let report = svc.eligibility_status(&query, NOW).await.unwrap();
        assert_eq!(report.orders.len(), 1);
        assert!(report.orders[0].eligibility.is_eligible);
        assert_eq!(report.orders[0].eligibility.time_remaining, Some(HOUR));
        assert_eq!(report.summary, json!({"total": 1}));
    }

    #[tokio::test]
    async fn test_status_unknown_order_is_empty() {
        let (svc, _, _) = service(FakeOrders::default());
        let query = EligibilityQuery {
            order_id: Some("missing".to_string()),
            limit: DEFAULT_STATUS_LIMIT,
            ..Default::default()
        };
        assert!(svc.eligibility_status(&query, NOW).await.unwrap().orders.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_rejects_empty_and_oversized() {
        let (svc, _, _) = service(FakeOrders::default());
        assert!(svc.bulk_override(&admin(), &[], None, None, NOW).await.is_err());

        let too_many: Vec<Value> = (0..51).map(|i| request(&i.to_string(), "mark_refundable")).collect();
        let err = svc.bulk_override(&admin(), &too_many, None, None, NOW).await.unwrap_err();
        assert!(matches!(err, PlatformError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_bulk_isolates_per_order_failures() {
        let (svc, backend, audit) = service(FakeOrders {
            orders: HashMap::from([
                order("A", "delivered", false, Some(NOW - 48 * HOUR), Some(NOW - 24 * HOUR)),
                order("B", "completed", false, Some(NOW - HOUR), None),
                order("C", "delivered", true, Some(NOW - HOUR), Some(NOW + HOUR)),
                order("D", "delivered", true, Some(NOW - 30 * HOUR), Some(NOW - 6 * HOUR)),
            ]),
            failing_mutations: vec!["doc_D".to_string()],
            ..Default::default()
        });

        let requests = vec![
            request("A", "mark_refundable"),
            request("B", "mark_refundable"),
            request("C", "mark_non_refundable"),
            request("missing", "extend_window"),
            request("A", "teleport"),
            request("D", "extend_window"),
        ];
        let report = svc
            .bulk_override(&admin(), &requests, Some("goodwill"), None, NOW)
            .await
            .unwrap();

        assert_eq!(report.summary, BulkSummary { total: 6, successful: 1, failed: 5 });
        assert_eq!(report.successful[0].order_id.as_deref(), Some("A"));

        let errors: Vec<&str> = report.failed.iter().filter_map(|r| r.error.as_deref()).collect();
        assert_eq!(
            errors,
            vec![
                "Order cannot be made refundable due to status: completed",
                "Order is still within the 24-hour refund window. Use effectiveImmediately=true to override.",
                "Order not found",
                "Invalid action: teleport",
                "Order is locked",
            ]
        );

        let mutations = backend.mutations.lock();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].0, functions::UPDATE_REFUND_ELIGIBILITY);
        assert_eq!(mutations[0].1["orderId"], "doc_A");
        assert_eq!(mutations[0].1["metadata"]["adminReason"], "goodwill");
        assert_eq!(mutations[0].1["reason"], "Bulk admin override: Bulk admin operation");

        let logs = audit.snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AdminAction::RefundEligibilityOverride);
        assert_eq!(logs[0].details["orderIds"], json!(["A"]));
    }

    #[tokio::test]
    async fn test_extend_window_sends_new_deadline() {
        let (svc, backend, _) = service(FakeOrders {
            orders: HashMap::from([order("A", "delivered", false, Some(NOW - 48 * HOUR), Some(NOW - 24 * HOUR))]),
            ..Default::default()
        });

        let req = json!({
            "orderId": "A",
            "action": "extend_window",
            "newWindowHours": "12",
            "metadata": {"ticket": "SUP-1"},
        });
        svc.bulk_override(&admin(), &[req], None, None, NOW).await.unwrap();

        let mutations = backend.mutations.lock();
        assert_eq!(mutations[0].0, functions::UPDATE_REFUND_WINDOW);
        assert_eq!(mutations[0].1["newRefundEligibleUntil"], json!(NOW + 12 * HOUR));
        assert_eq!(mutations[0].1["metadata"]["ticket"], "SUP-1");
    }

    #[tokio::test]
    async fn test_no_audit_when_nothing_succeeded() {
        let (svc, _, audit) = service(FakeOrders::default());
        let report = svc
            .bulk_override(&admin(), &[request("missing", "mark_refundable")], None, None, NOW)
            .await
            .unwrap();
        assert_eq!(report.summary.failed, 1);
        assert!(audit.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_entries_fail_individually() {
        let (svc, backend, _) = service(FakeOrders {
            orders: HashMap::from([
                order("A", "delivered", false, Some(NOW - 48 * HOUR), Some(NOW - 24 * HOUR)),
                order("B", "delivered", false, Some(NOW - 48 * HOUR), Some(NOW - 24 * HOUR)),
            ]),
            ..Default::default()
        });

        let requests = vec![
            request("A", "mark_refundable"),
            json!({ "orderId": "B" }),
            json!({ "orderId": "B", "action": "extend_window", "newWindowHours": "soon" }),
            json!({ "orderId": "B", "action": "extend_window", "newWindowHours": 1e300 }),
            json!({ "action": "mark_refundable" }),
            json!({ "orderId": 7, "action": "mark_refundable" }),
            json!("B"),
        ];
        let report = svc.bulk_override(&admin(), &requests, None, None, NOW).await.unwrap();

        assert_eq!(report.summary, BulkSummary { total: 7, successful: 1, failed: 6 });
        let errors: Vec<&str> = report.failed.iter().filter_map(|r| r.error.as_deref()).collect();
        assert_eq!(errors[0], "Invalid action: undefined");
        assert_eq!(errors[1], "Invalid newWindowHours");
        assert_eq!(errors[2], "Invalid newWindowHours");
        assert_eq!(errors[3], "Missing orderId");
        assert!(errors[4].starts_with("Invalid order request"));
        assert!(errors[5].starts_with("Invalid order request"));
        assert_eq!(report.failed[0].order_id.as_deref(), Some("B"));
        assert_eq!(report.failed[0].action, None);
        assert_eq!(backend.mutations.lock().len(), 1);
    }
}
