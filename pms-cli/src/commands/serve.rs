//! HTTP server command
//!
//! Flags override values from config files and the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pms_server::PmsConfig;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (default from config: 127.0.0.1:3030)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL, e.g. sqlite://pms.db
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for uploaded attachment files
    #[arg(long, value_name = "DIR")]
    pub attachments_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn apply(self, config: &mut PmsConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if self.cors_permissive {
            config.server.cors_permissive = true;
        }
        if let Some(url) = self.database_url {
            config.database.url = Some(url);
        }
        if let Some(dir) = self.attachments_dir {
            config.storage.attachments_dir = Some(dir);
        }
    }
}

/// Run the HTTP server until shutdown
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = PmsConfig::load();
    args.apply(&mut config);

    tracing::info!("Starting pms server on {}", config.server.bind);

    pms_server::serve(config).await.context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = PmsConfig::default();
        ServeArgs {
            bind: Some("0.0.0.0:8080".parse().unwrap()),
            cors_permissive: false,
            database_url: Some("sqlite://elsewhere.db".into()),
            attachments_dir: None,
        }
        .apply(&mut config);

        assert_eq!(config.server.bind.port(), 8080);
        assert!(!config.server.cors_permissive);
        assert_eq!(config.database.url.as_deref(), Some("sqlite://elsewhere.db"));
        assert_eq!(config.storage.attachments_dir, None);
    }
}
