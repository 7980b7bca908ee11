//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use axum::{
    Router, http,
    http::{Method, header},
    middleware,
};
use billing::application::config::ProcessorConfig;
use billing::{BillingAppState, BillingConfig, PgPaymentLedger, StripeGateway};
use sessions::domain::repository::SessionRecordRepository;
use sessions::{
    PgSessionRecordRepository, SessionAppState, SessionConfig, SessionMiddlewareState,
    resolve_actor, session_router,
};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_PORT: u16 = 7002;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,billing=info,sessions=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database connection
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let session_repo = PgSessionRecordRepository::new(pool.clone());

    // Startup cleanup: remove expired sessions
    // Errors here should not prevent server startup
    match session_repo.cleanup_expired(chrono::Utc::now()).await {
        Ok(deleted) => {
            tracing::info!(sessions_deleted = deleted, "Session cleanup completed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session cleanup failed, continuing anyway");
        }
    }

    // Billing configuration
    let billing_config = billing_config_from_env()?;

    let gateway = match &billing_config.processor {
        Some(processor) => Some(StripeGateway::new(processor, billing_config.request_timeout)?),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set, checkout and cancellation disabled");
            None
        }
    };

    let ledger = PgPaymentLedger::new(pool.clone()).with_retry_budget(billing_config.cas_retry_budget);
    let billing_state = BillingAppState::new(ledger, gateway, billing_config);

    // Session configuration
    let mut session_config = SessionConfig::default();
    if let Ok(ttl) = env::var("SESSION_TTL_SECS") {
        session_config.default_ttl = Duration::from_secs(ttl.parse()?);
    }
    let session_config = Arc::new(session_config);
    let session_repo = Arc::new(session_repo);

    let session_state = SessionAppState::new(session_repo.clone(), session_config.clone());
    let middleware_state = SessionMiddlewareState::new(session_repo, session_config);

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_BASEURL")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/payment", billing::payment_router(billing_state.clone()))
        .nest(
            "/api/user",
            billing::account_router(billing_state).merge(session_router(session_state)),
        )
        .layer(middleware::from_fn_with_state(
            middleware_state,
            resolve_actor::<PgSessionRecordRepository>,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let port = match env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Billing settings from the environment
///
/// The webhook secret is mandatory; the processor key is not.
fn billing_config_from_env() -> anyhow::Result<BillingConfig> {
    let webhook_secret = env::var("STRIPE_WEB_HOOK_SECRET")
        .map_err(|_| anyhow::anyhow!("STRIPE_WEB_HOOK_SECRET must be set in environment"))?;

    let price = |name: &str| env::var(name).unwrap_or_default();

    let mut config = BillingConfig {
        webhook_secret,
        processor: env::var("STRIPE_SECRET_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(ProcessorConfig::new),
        ..BillingConfig::default()
    }
    .with_standard_plans(
        price("STRIPE_BASIC_PLAN_PRICE_ID"),
        price("STRIPE_ANNUAL_PLAN_PRICE_ID"),
        price("STRIPE_NEWSLETTER_PRICE_ID"),
    );

    if let Ok(base_url) = env::var("FRONTEND_BASEURL") {
        config.frontend_base_url = base_url;
    }
    // Plans without a price id cannot be sold
    config.plans.retain(|plan| !plan.price_id.is_empty());

    Ok(config)
}
