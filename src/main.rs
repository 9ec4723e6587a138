//! statusdesk server entry point.
//!
//! Loads configuration, selects the store, and starts the Axum HTTP server.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use statusdesk::api;
use statusdesk::app_state::AppState;
use statusdesk::config::{AppConfig, LogFormat};
use statusdesk::persistence::{MemoryStore, PostgresStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    tracing::info!(addr = %config.listen_addr, "starting statusdesk");
    if config.auth.uses_dev_secret() {
        tracing::warn!("JWT_SECRET is not set; using the development signing secret");
    }

    // Select store
    let store: Arc<dyn Store> = match &config.database {
        Some(db) => {
            let store = PostgresStore::connect(db)
                .await
                .context("failed to connect to PostgreSQL")?;
            tracing::info!(max_connections = db.max_connections, "using PostgreSQL store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("persistence disabled; data lives in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let listen_addr = config.listen_addr;
    let request_timeout = config.request_timeout;
    let app_state = AppState::new(store, config);

    // Build router
    let app = Router::new().merge(api::build_router());
    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(
            "/api-docs/openapi.json",
            <api::openapi::ApiDoc as utoipa::OpenApi>::openapi(),
        ),
    );
    let app = app
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
