//! Platform Services
//!
//! Business logic behind the admin API.

pub mod audit;
pub mod auth;
pub mod dish_review;
pub mod refund;
pub mod webhook;

pub use audit::AuditService;
pub use auth::{extract_bearer_token, AccessTokenClaims, AuthService, AuthSettings};
pub use dish_review::{DishReviewOutcome, DishReviewService};
pub use refund::{
    BulkOverrideReport, BulkSummary, EligibilityQuery, EligibilityReport, OrderEligibility,
    OrderOverride, OverrideResult, RefundService,
};
pub use webhook::{sign_payload, WebhookDispatcher, WebhookSettings};
