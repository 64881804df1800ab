//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing, request timeout and body size limit middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode};
use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::auth::{PasswordError, Passwords};
use crate::config::PmsConfig;
use crate::services::storage::AttachmentStore;

/// Room for multipart boundaries and form fields around an upload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const LOCAL_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:3030",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3030",
];

/// Shared application state
pub struct AppState {
    pub pool: SqlitePool,
    pub config: PmsConfig,
    pub storage: AttachmentStore,
    pub passwords: Passwords,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: PmsConfig,
        storage: AttachmentStore,
    ) -> Result<Self, PasswordError> {
        let passwords = Passwords::from_config(&config.auth)?;
        Ok(Self {
            pool,
            config,
            storage,
            passwords,
        })
    }
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = LOCAL_ORIGINS
        .into_iter()
        .map(HeaderValue::from_static)
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Full application router with middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.storage.max_bytes() + MULTIPART_OVERHEAD;
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(state.config.server.cors_permissive);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::organizations::router())
        .merge(routes::projects::router())
        .merge(routes::phases::router())
        .merge(routes::tasks::router())
        .merge(routes::comments::router())
        .merge(routes::attachments::router())
        .merge(routes::decisions::router())
        .merge(routes::reports::router())
        .merge(routes::spreadsheets::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&config.database_url()?).await?;
/// let storage = AttachmentStore::new(config.attachments_dir()?, config.storage.max_upload_bytes);
/// run_server(AppState::new(pool, config, storage)?).await?;
/// ```
pub async fn run_server(state: AppState) -> Result<(), ServerError> {
    let bind_addr = state.config.server.bind;
    tracing::info!(
        attachments = %state.storage.root().display(),
        "attachment store ready"
    );

    let app = build_router(Arc::new(state));

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_origins_are_valid_header_values() {
        for origin in LOCAL_ORIGINS {
            assert!(HeaderValue::from_str(origin).is_ok());
        }
    }
}
