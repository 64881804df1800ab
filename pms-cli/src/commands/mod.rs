//! Command implementations for the pms CLI

pub mod migrate;
pub mod serve;
pub mod user;

use anyhow::{Context, Result};
use pms_server::{db, PmsConfig};
use sqlx::SqlitePool;

pub use migrate::run_migrate;
pub use serve::run_serve;
pub use user::run_user;

/// Pool for one-off commands
async fn open_pool(config: &PmsConfig) -> Result<SqlitePool> {
    let url = config.database_url()?;
    tracing::debug!("Opening database {}", url);
    db::create_pool(&url)
        .await
        .with_context(|| format!("Failed to open database {url}"))
}
