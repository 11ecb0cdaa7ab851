//! Domain Models
//!
//! Typed views over the entities the admin paths work with. Durable
//! records (users, orders, meals) are owned by the managed backend.

pub mod audit_log;
pub mod dish_review;
pub mod order;
pub mod principal;

pub use audit_log::{AdminAction, AuditLog, AuditLogFilter};
pub use dish_review::{DishReviewStatus, QUALITY_SCORE_RANGE};
pub use order::{
    evaluate_eligibility, plan_override, OrderSnapshot, OverridePlan, RefundAction,
    RefundEligibility, RefundStatusFilter,
};
pub use principal::Principal;
