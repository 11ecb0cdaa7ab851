//! Audit Logs Admin API
//!
//! Read-only views over admin audit records.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::common::{millis_to_rfc3339, query_params, ApiError, ApiResponse};
use crate::api::middleware::AdminPrincipal;
use crate::domain::{AdminAction, AuditLog, AuditLogFilter};
use crate::error::PlatformError;
use crate::service::AuditService;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;
const RECENT_LIMIT: usize = 20;

/// Audit log response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: String,
    pub action: AdminAction,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub admin_id: String,
    pub admin_email: Option<String>,
    pub timestamp: i64,
    pub created_at: Option<String>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(log: AuditLog) -> Self {
        Self {
            created_at: millis_to_rfc3339(log.timestamp),
            id: log.id,
            action: log.action,
            details: log.details,
            admin_id: log.admin_id,
            admin_email: log.admin_email,
            timestamp: log.timestamp,
        }
    }
}

/// Query parameters for audit logs
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogsQuery {
    /// Filter by action, e.g. `trigger_webhook`
    pub action: Option<String>,

    /// Filter by admin user ID
    pub admin_id: Option<String>,

    /// Default 50, capped at 200
    pub limit: Option<usize>,
}

#[derive(Clone)]
pub struct AuditLogsState {
    pub audit_service: AuditService,
}

/// List audit logs, newest first
#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    tag = "audit-logs",
    params(AuditLogsQuery),
    responses(
        (status = 200, description = "Audit logs", body = ApiResponse<Vec<AuditLogResponse>>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 422, description = "Unknown action", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_audit_logs(
    State(state): State<AuditLogsState>,
    _auth: AdminPrincipal,
    query: Result<Query<AuditLogsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<AuditLogResponse>>>, PlatformError> {
    let query = query_params(query)?;

    let action = match query.action.as_deref().filter(|a| !a.is_empty()) {
        Some(raw) => Some(
            AdminAction::parse(raw)
                .ok_or_else(|| PlatformError::validation(format!("Unknown action: {}", raw)))?,
        ),
        None => None,
    };

    let filter = AuditLogFilter {
        action,
        admin_id: query.admin_id.filter(|id| !id.is_empty()),
        limit: page_limit(query.limit),
    };

    let logs = state.audit_service.find(&filter).await?;
    Ok(Json(ApiResponse::ok(logs.into_iter().map(Into::into).collect())))
}

/// Most recent audit logs
#[utoipa::path(
    get,
    path = "/api/admin/audit-logs/recent",
    tag = "audit-logs",
    responses(
        (status = 200, description = "Recent audit logs", body = ApiResponse<Vec<AuditLogResponse>>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_recent_audit_logs(
    State(state): State<AuditLogsState>,
    _auth: AdminPrincipal,
) -> Result<Json<ApiResponse<Vec<AuditLogResponse>>>, PlatformError> {
    let filter = AuditLogFilter {
        limit: RECENT_LIMIT,
        ..Default::default()
    };

    let logs = state.audit_service.find(&filter).await?;
    Ok(Json(ApiResponse::ok(logs.into_iter().map(Into::into).collect())))
}

/// Requested page size, kept within `1..=MAX_LIMIT`
fn page_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub fn audit_logs_router(state: AuditLogsState) -> Router {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/recent", get(get_recent_audit_logs))
        .with_state(state)
}
