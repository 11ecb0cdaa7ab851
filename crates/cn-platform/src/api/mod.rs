//! API Layer
//!
//! Admin REST endpoints plus public monitoring routes.

use std::sync::Arc;

use axum::{Extension, Router};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod audit_logs;
pub mod common;
pub mod dishes;
pub mod middleware;
pub mod monitoring;
pub mod openapi;
pub mod refunds;
pub mod webhooks;

pub use common::*;
pub use middleware::AdminPrincipal;

pub use audit_logs::{audit_logs_router, AuditLogsState};
pub use dishes::{dishes_router, DishesState};
pub use monitoring::{monitoring_router, MonitoringState};
pub use openapi::PlatformApiDoc;
pub use refunds::{refunds_router, RefundsState};
pub use webhooks::{webhooks_router, WebhooksState};

use crate::service::{AuditService, AuthService, DishReviewService, RefundService, WebhookDispatcher};

/// Everything the platform router needs
#[derive(Clone)]
pub struct PlatformServices {
    pub auth_service: Arc<AuthService>,
    pub audit_service: AuditService,
    pub webhook_dispatcher: Arc<WebhookDispatcher>,
    pub dish_review_service: Arc<DishReviewService>,
    pub refund_service: Arc<RefundService>,
    pub monitoring: MonitoringState,
}

/// Full platform router: admin APIs, monitoring and API docs
pub fn platform_router(services: PlatformServices) -> Router {
    let webhooks_state = WebhooksState {
        dispatcher: services.webhook_dispatcher,
        audit_service: services.audit_service.clone(),
    };
    let audit_logs_state = AuditLogsState {
        audit_service: services.audit_service,
    };
    let dishes_state = DishesState {
        review_service: services.dish_review_service,
    };
    let refunds_state = RefundsState {
        refund_service: services.refund_service,
    };

    Router::new()
        .nest("/api/admin/webhooks", webhooks_router(webhooks_state))
        .nest("/api/admin/audit-logs", audit_logs_router(audit_logs_state))
        .nest("/api/admin/dishes", dishes_router(dishes_state))
        .nest("/api/admin/orders", refunds_router(refunds_state))
        .merge(monitoring_router(services.monitoring))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", PlatformApiDoc::openapi()))
        .layer(Extension(services.auth_service))
}
