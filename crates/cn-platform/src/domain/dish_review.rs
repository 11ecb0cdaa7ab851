//! Dish review status

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DishReviewStatus {
    Approved,
    Rejected,
    Pending,
    NeedsRevision,
}

impl DishReviewStatus {
    pub const ALL: [DishReviewStatus; 4] = [
        Self::Approved,
        Self::Rejected,
        Self::Pending,
        Self::NeedsRevision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Pending => "pending",
            Self::NeedsRevision => "needs_revision",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// Accepted range for a reviewer's quality score
pub const QUALITY_SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;
