//! OpenAPI Documentation

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Platform API OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CribNosh Admin Platform API",
        version = "1.0.0",
        description = "Admin webhooks, audit logs, dish review and refund eligibility"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "webhooks", description = "Webhook dispatch"),
        (name = "audit-logs", description = "Admin audit logs"),
        (name = "dishes", description = "Dish review"),
        (name = "refunds", description = "Refund eligibility"),
        (name = "monitoring", description = "Health and metrics")
    ),
    paths(
        super::webhooks::trigger_webhook,
        super::audit_logs::list_audit_logs,
        super::audit_logs::get_recent_audit_logs,
        super::dishes::review_dish,
        super::refunds::get_refund_eligibility_status,
        super::refunds::bulk_refund_eligibility,
        super::monitoring::health,
        super::monitoring::liveness,
        super::monitoring::readiness,
        super::monitoring::metrics,
    ),
    components(schemas(
        super::common::ApiError,
        cn_common::WebhookEnvelope,
        cn_common::DeliveryOutcome,
    )),
    modifiers(&SecurityAddon)
)]
pub struct PlatformApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
