//! Apply the database schema without starting the server

use anyhow::{Context, Result};
use clap::Parser;
use pms_server::{db, PmsConfig};

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config/environment)
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let mut config = PmsConfig::load();
    if let Some(url) = args.database_url {
        config.database.url = Some(url);
    }

    let pool = super::open_pool(&config).await?;
    db::migrations::run(&pool)
        .await
        .context("Failed to apply migrations")?;
    pool.close().await;

    println!("Database schema is up to date");
    Ok(())
}
