//! Dish Review Service

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::backend::{functions, BackendClient};
use crate::domain::{DishReviewStatus, Principal};
use crate::error::Result;
use crate::service::AuditService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DishReviewOutcome {
    pub dish_id: String,
    pub status: DishReviewStatus,
    /// Epoch milliseconds
    pub reviewed_at: i64,
    pub reviewer_id: String,
}

pub struct DishReviewService {
    backend: Arc<dyn BackendClient>,
    audit: AuditService,
}

impl DishReviewService {
    pub fn new(backend: Arc<dyn BackendClient>, audit: AuditService) -> Self {
        Self { backend, audit }
    }

    /// Set the meal's review status, then record the decision
    pub async fn review(
        &self,
        principal: &Principal,
        dish_id: &str,
        status: DishReviewStatus,
        notes: Option<&str>,
    ) -> Result<DishReviewOutcome> {
        self.backend
            .mutation(
                functions::UPDATE_MEAL,
                json!({
                    "mealId": dish_id,
                    "updates": { "status": status.as_str() },
                }),
            )
            .await?;

        info!(dish_id, status = status.as_str(), reviewer_id = %principal.user_id, "Dish reviewed");
        self.audit.log_dish_reviewed(principal, dish_id, status, notes).await;

        Ok(DishReviewOutcome {
            dish_id: dish_id.to_string(),
            status,
            reviewed_at: cn_common::now_millis(),
            reviewer_id: principal.user_id.clone(),
        })
    }
}
