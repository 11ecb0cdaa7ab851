//! Webhooks Admin API
//!
//! Admin-triggered fan-out of one event to a list of destinations.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use cn_common::{DeliveryOutcome, WebhookEnvelope};

use crate::api::common::{json_body, ApiError};
use crate::api::middleware::AdminPrincipal;
use crate::error::PlatformError;
use crate::service::{AuditService, WebhookDispatcher};

/// Trigger request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerWebhookRequest {
    /// Event name, e.g. `order.created`
    pub event: Option<String>,

    /// Payload forwarded as the envelope's `data`
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,

    /// Destination URLs, one POST each
    pub urls: Option<Vec<String>>,

    /// Accepted for compatibility; the configured client timeout applies
    #[schema(value_type = Option<u64>)]
    pub timeout: Option<serde_json::Value>,

    /// Accepted for compatibility; deliveries are not retried
    #[schema(value_type = Option<u32>)]
    pub retry_count: Option<serde_json::Value>,
}

/// Trigger response, one result per URL in request order
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerWebhookResponse {
    pub success: bool,
    pub results: Vec<DeliveryOutcome>,
}

#[derive(Clone)]
pub struct WebhooksState {
    pub dispatcher: Arc<WebhookDispatcher>,
    pub audit_service: AuditService,
}

fn validate(req: TriggerWebhookRequest) -> Result<(WebhookEnvelope, Vec<String>), PlatformError> {
    let event = req
        .event
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| PlatformError::validation("Missing required field: event"))?;

    let urls = req
        .urls
        .filter(|urls| !urls.is_empty())
        .ok_or_else(|| PlatformError::validation("urls must be a non-empty array"))?;

    Ok((WebhookEnvelope::new(event, req.data), urls))
}

/// Trigger a webhook to every URL
#[utoipa::path(
    post,
    path = "/api/admin/webhooks/trigger",
    tag = "webhooks",
    request_body = TriggerWebhookRequest,
    responses(
        (status = 200, description = "Dispatch attempted", body = TriggerWebhookResponse),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 422, description = "Missing event or urls", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn trigger_webhook(
    State(state): State<WebhooksState>,
    AdminPrincipal(principal): AdminPrincipal,
    body: Result<Json<TriggerWebhookRequest>, JsonRejection>,
) -> Result<Json<TriggerWebhookResponse>, PlatformError> {
    let (envelope, urls) = validate(json_body(body)?)?;

    let results = state.dispatcher.dispatch(&envelope, &urls).await?;
    state
        .audit_service
        .log_webhook_triggered(&principal, &envelope.event, &results)
        .await;

    Ok(Json(TriggerWebhookResponse {
        success: true,
        results,
    }))
}

pub fn webhooks_router(state: WebhooksState) -> Router {
    Router::new()
        .route("/trigger", post(trigger_webhook))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> TriggerWebhookRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_data_becomes_null() {
        let (envelope, urls) = validate(request(json!({
            "event": "order.created",
            "urls": ["https://a.test"],
            "timeout": 5000,
            "retryCount": 3
        })))
        .unwrap();
        assert_eq!(envelope, WebhookEnvelope::new("order.created", serde_json::Value::Null));
        assert_eq!(urls, vec!["https://a.test".to_string()]);
    }

    #[test]
    fn test_rejects_missing_event_or_urls() {
        assert!(validate(request(json!({"urls": ["https://a.test"]}))).is_err());
        assert!(validate(request(json!({"event": "  ", "urls": ["https://a.test"]}))).is_err());
        assert!(validate(request(json!({"event": "order.created"}))).is_err());
        assert!(validate(request(json!({"event": "order.created", "urls": []}))).is_err());
    }

    #[test]
    fn test_ignored_fields_accept_any_json() {
        let (envelope, urls) = validate(request(json!({
            "event": "order.created",
            "urls": ["https://a.test"],
            "timeout": 2.5,
            "retryCount": "three"
        })))
        .unwrap();
        assert_eq!(envelope.event, "order.created");
        assert_eq!(urls.len(), 1);
    }
}
