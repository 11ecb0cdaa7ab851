//! Refund Eligibility Admin API
//!
//! Eligibility lookup and bulk override for orders.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::common::{json_body, millis_to_rfc3339, query_params, ApiError, ApiResponse};
use crate::api::middleware::AdminPrincipal;
use crate::domain::{RefundEligibility, RefundStatusFilter};
use crate::error::PlatformError;
use crate::service::refund::DEFAULT_STATUS_LIMIT;
use crate::service::{BulkOverrideReport, EligibilityQuery, OrderEligibility, OrderOverride, RefundService};

/// Query parameters for the eligibility lookup
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RefundStatusQuery {
    /// Look up a single order
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    /// `refundable`, `non-refundable` or `expired`; other values are ignored
    pub status: Option<String>,
    /// Default 50, at most 100
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Order with its eligibility verdict
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderEligibilityResponse {
    pub id: String,
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
    pub chef_id: Option<String>,
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub total_amount: Option<f64>,
    pub delivered_at: Option<String>,
    pub completed_at: Option<String>,
    pub reviewed_at: Option<String>,
    pub refund_eligible_until: Option<String>,
    pub is_refundable: bool,
    pub eligibility: RefundEligibility,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<OrderEligibility> for OrderEligibilityResponse {
    fn from(item: OrderEligibility) -> Self {
        let order = item.order;
        let iso = |millis: Option<i64>| millis.and_then(millis_to_rfc3339);
        Self {
            id: order.id,
            order_id: order.order_id,
            customer_id: order.customer_id,
            chef_id: order.chef_id,
            order_status: order.order_status,
            payment_status: order.payment_status,
            total_amount: order.total_amount,
            delivered_at: iso(order.delivered_at),
            completed_at: iso(order.completed_at),
            reviewed_at: iso(order.reviewed_at),
            refund_eligible_until: iso(order.refund_eligible_until),
            is_refundable: order.is_refundable.unwrap_or(false),
            eligibility: item.eligibility,
            created_at: iso(order.created_at),
            updated_at: iso(order.updated_at),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundStatusResponse {
    pub orders: Vec<OrderEligibilityResponse>,
    /// Backend summary counts
    #[schema(value_type = Object)]
    pub summary: serde_json::Value,
}

/// Bulk override request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRefundEligibilityRequest {
    /// 1 to 50 orders. Each entry is validated on its own.
    #[schema(value_type = Option<Vec<OrderOverride>>)]
    pub orders: Option<Vec<serde_json::Value>>,
    /// Used for orders without their own reason
    pub global_reason: Option<String>,
    /// Used for orders without their own description
    pub global_description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkRefundEligibilityResponse {
    pub success: bool,
    pub results: BulkOverrideReport,
    pub message: String,
}

#[derive(Clone)]
pub struct RefundsState {
    pub refund_service: Arc<RefundService>,
}

/// Refund eligibility for one order or a filtered page of orders
#[utoipa::path(
    get,
    path = "/api/admin/orders/refund-eligibility-status",
    tag = "refunds",
    params(RefundStatusQuery),
    responses(
        (status = 200, description = "Eligibility computed", body = ApiResponse<RefundStatusResponse>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 422, description = "Limit above 100", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_refund_eligibility_status(
    State(state): State<RefundsState>,
    _auth: AdminPrincipal,
    query: Result<Query<RefundStatusQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<RefundStatusResponse>>, PlatformError> {
    let params = query_params(query)?;

    let query = EligibilityQuery {
        order_id: params.order_id.filter(|id| !id.is_empty()),
        customer_id: params.customer_id.filter(|id| !id.is_empty()),
        status: params.status.as_deref().and_then(RefundStatusFilter::parse),
        limit: params.limit.unwrap_or(DEFAULT_STATUS_LIMIT),
        offset: params.offset.unwrap_or(0),
    };

    let report = state
        .refund_service
        .eligibility_status(&query, cn_common::now_millis())
        .await?;

    let response = RefundStatusResponse {
        orders: report.orders.into_iter().map(Into::into).collect(),
        summary: report.summary,
    };

    Ok(Json(ApiResponse::with_message(
        response,
        "Refund eligibility status retrieved successfully",
    )))
}

/// Apply refund eligibility overrides to up to 50 orders
#[utoipa::path(
    post,
    path = "/api/admin/orders/bulk-refund-eligibility",
    tag = "refunds",
    request_body = BulkRefundEligibilityRequest,
    responses(
        (status = 200, description = "Batch processed; per-order results", body = ApiResponse<BulkRefundEligibilityResponse>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 422, description = "Empty or oversized batch", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn bulk_refund_eligibility(
    State(state): State<RefundsState>,
    AdminPrincipal(principal): AdminPrincipal,
    body: Result<Json<BulkRefundEligibilityRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BulkRefundEligibilityResponse>>, PlatformError> {
    let req = json_body(body)?;
    let orders = req.orders.unwrap_or_default();

    let report = state
        .refund_service
        .bulk_override(
            &principal,
            &orders,
            req.global_reason.as_deref(),
            req.global_description.as_deref(),
            cn_common::now_millis(),
        )
        .await?;

    let message = format!(
        "Bulk operation completed: {} successful, {} failed",
        report.summary.successful, report.summary.failed
    );

    Ok(Json(ApiResponse::ok(BulkRefundEligibilityResponse {
        success: true,
        results: report,
        message,
    })))
}

pub fn refunds_router(state: RefundsState) -> Router {
    Router::new()
        .route("/refund-eligibility-status", get(get_refund_eligibility_status))
        .route("/bulk-refund-eligibility", post(bulk_refund_eligibility))
        .with_state(state)
}
