//! Dish Review Admin API

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{json_body, millis_to_rfc3339, ApiError, ApiResponse};
use crate::api::middleware::AdminPrincipal;
use crate::domain::{DishReviewStatus, QUALITY_SCORE_RANGE};
use crate::error::PlatformError;
use crate::service::{DishReviewOutcome, DishReviewService};

/// Review decision
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DishReviewRequest {
    /// `approved`, `rejected`, `pending` or `needs_revision`
    pub status: Option<String>,
    pub notes: Option<String>,
    /// 1 to 10
    pub quality_score: Option<i64>,
    pub issues: Option<Vec<String>>,
    pub recommendations: Option<Vec<String>>,
    pub reviewer_comments: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DishReviewResponse {
    pub success: bool,
    pub dish_id: String,
    pub status: DishReviewStatus,
    pub reviewed_at: Option<String>,
    pub reviewer_id: String,
}

impl From<DishReviewOutcome> for DishReviewResponse {
    fn from(outcome: DishReviewOutcome) -> Self {
        Self {
            success: true,
            dish_id: outcome.dish_id,
            status: outcome.status,
            reviewed_at: millis_to_rfc3339(outcome.reviewed_at),
            reviewer_id: outcome.reviewer_id,
        }
    }
}

#[derive(Clone)]
pub struct DishesState {
    pub review_service: Arc<DishReviewService>,
}

fn parse_status(req: &DishReviewRequest) -> Result<DishReviewStatus, PlatformError> {
    let raw = req
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlatformError::validation("Missing status"))?;

    let status = DishReviewStatus::parse(raw).ok_or_else(|| {
        PlatformError::validation(format!(
            "Invalid status: {}. Must be one of approved, rejected, pending, needs_revision",
            raw
        ))
    })?;

    if let Some(score) = req.quality_score {
        let in_range = u8::try_from(score).map_or(false, |s| QUALITY_SCORE_RANGE.contains(&s));
        if !in_range {
            return Err(PlatformError::validation("qualityScore must be between 1 and 10"));
        }
    }

    Ok(status)
}

/// Review a dish (POST and PUT behave the same)
#[utoipa::path(
    post,
    path = "/api/admin/dishes/{dish_id}/review",
    tag = "dishes",
    params(
        ("dish_id" = String, Path, description = "Meal ID")
    ),
    request_body = DishReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = ApiResponse<DishReviewResponse>),
        (status = 401, description = "Not authenticated", body = ApiError),
        (status = 403, description = "Admin role required", body = ApiError),
        (status = 422, description = "Missing or invalid status", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn review_dish(
    State(state): State<DishesState>,
    AdminPrincipal(principal): AdminPrincipal,
    Path(dish_id): Path<String>,
    body: Result<Json<DishReviewRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DishReviewResponse>>, PlatformError> {
    if dish_id.trim().is_empty() {
        return Err(PlatformError::validation("Missing dish_id"));
    }

    let req = json_body(body)?;
    let status = parse_status(&req)?;

    let outcome = state
        .review_service
        .review(&principal, &dish_id, status, req.notes.as_deref())
        .await?;

    Ok(Json(ApiResponse::with_message(
        outcome.into(),
        "Dish review updated successfully",
    )))
}

pub fn dishes_router(state: DishesState) -> Router {
    Router::new()
        .route("/:dish_id/review", post(review_dish).put(review_dish))
        .with_state(state)
}
