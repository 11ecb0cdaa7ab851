//! CribNosh Admin Platform Server
//!
//! Serves the admin APIs in front of the managed backend:
//! - Webhook fan-out: `/api/admin/webhooks/trigger`
//! - Audit logs: `/api/admin/audit-logs`
//! - Dish review: `/api/admin/dishes/:dish_id/review`
//! - Refund eligibility: `/api/admin/orders/...`
//! - Monitoring: `/health`, `/metrics`, `/swagger-ui`
//!
//! ## Configuration
//!
//! Settings come from an optional TOML file (`--config` / `CN_CONFIG`),
//! then `CN_*` environment variables. Common ones:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CN_API_PORT` | `8080` | HTTP API port |
//! | `CN_BACKEND_URL` | `http://127.0.0.1:3210` | Backend deployment URL |
//! | `CN_BACKEND_DEPLOY_KEY` | - | Backend deploy key |
//! | `CN_JWT_SECRET` | - | HS256 secret for admin bearer tokens |
//! | `CN_AUDIT_SINK` | `backend` | `backend`, `mongo` or `memory` |
//! | `CN_MONGO_URL` | `mongodb://localhost:27017` | MongoDB URL for the mongo sink |
//! | `CN_AUDIT_MEMORY_CAPACITY` | `10000` | Records kept by the memory sink |
//! | `RUST_LOG` | `info` | Log filter |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cn_config::{AppConfig, AuditSinkKind};
use cn_platform::api::{platform_router, MonitoringState, PlatformServices};
use cn_platform::backend::{BackendClient, ConvexHttpClient, RetryPolicy, Retrying};
use cn_platform::repository::{
    AuditLogRepository, BackendAuditLogRepository, InMemoryAuditLogRepository, MongoAuditLogRepository,
};
use cn_platform::service::{
    AuditService, AuthService, AuthSettings, DishReviewService, RefundService, WebhookDispatcher,
    WebhookSettings,
};

#[derive(Parser, Debug)]
#[command(name = "cn-platform-server", version, about = "CribNosh admin platform server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "CN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    cn_common::logging::init(&config.logging.level, config.logging.json)?;
    info!("Starting CribNosh Admin Platform Server");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let convex = ConvexHttpClient::from_config(&config.backend)?;
    let backend: Arc<dyn BackendClient> =
        Arc::new(Retrying::new(convex, RetryPolicy::from_config(&config.backend)));
    info!(url = %config.backend.url, max_attempts = config.backend.max_attempts, "Backend client ready");

    let audit_repo = build_audit_sink(&config, backend.clone()).await?;
    info!(sink = audit_repo.sink_name(), "Audit sink ready");
    let audit_service = AuditService::new(audit_repo);

    if config.auth.jwt_secret.is_none() {
        warn!("No JWT secret configured; only session tokens will be accepted");
    }

    let services = PlatformServices {
        auth_service: Arc::new(AuthService::new(backend.clone(), AuthSettings::from(&config.auth))),
        audit_service: audit_service.clone(),
        webhook_dispatcher: Arc::new(WebhookDispatcher::new(WebhookSettings::from(&config.webhooks))?),
        dish_review_service: Arc::new(DishReviewService::new(backend.clone(), audit_service.clone())),
        refund_service: Arc::new(RefundService::new(backend, audit_service)),
        monitoring: MonitoringState::new(Some(metrics_handle)),
    };

    let app = platform_router(services)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API server listening on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    Ok(())
}

async fn build_audit_sink(
    config: &AppConfig,
    backend: Arc<dyn BackendClient>,
) -> Result<Arc<dyn AuditLogRepository>> {
    let repo: Arc<dyn AuditLogRepository> = match config.audit.sink {
        AuditSinkKind::Backend => Arc::new(BackendAuditLogRepository::new(backend)),
        AuditSinkKind::Mongo => {
            info!("Connecting to MongoDB: {}/{}", config.audit.mongo_url, config.audit.mongo_db);
            let client = mongodb::Client::with_uri_str(&config.audit.mongo_url)
                .await
                .context("Failed to connect to MongoDB")?;
            Arc::new(MongoAuditLogRepository::new(&client.database(&config.audit.mongo_db)))
        }
        AuditSinkKind::Memory => {
            warn!(
                capacity = config.audit.memory_capacity,
                "In-memory audit sink: records are lost on restart"
            );
            Arc::new(InMemoryAuditLogRepository::bounded(config.audit.memory_capacity))
        }
    };
    Ok(repo)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
