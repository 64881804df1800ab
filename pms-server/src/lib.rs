//! pms-server: project management HTTP server
//!
//! Organizations, clients, projects with members and phases, kanban tasks
//! with dependencies, comments, attachments, a decision log, reports and
//! spreadsheet import/export, served as a JSON API over SQLite.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod services;

pub use config::PmsConfig;
pub use error::{Error, Result};
pub use http::{build_router, run_server, AppState};

use services::storage::AttachmentStore;

/// Open the database, apply migrations and serve until shutdown.
pub async fn serve(config: PmsConfig) -> Result<()> {
    config.validate()?;
    let database_url = config.database_url()?;
    let pool = db::create_pool_with_options(&database_url, config.database.max_connections).await?;
    db::migrations::run(&pool).await?;
    tracing::info!("Database ready at {}", database_url);

    let attachments_dir = config.attachments_dir()?;
    tokio::fs::create_dir_all(&attachments_dir).await?;
    let storage = AttachmentStore::new(attachments_dir, config.storage.max_upload_bytes);

    let state = AppState::new(pool, config, storage)?;
    run_server(state).await?;
    Ok(())
}
