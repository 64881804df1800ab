//! Configuration loading
//!
//! Precedence (lowest to highest):
//! 1. Built-in defaults
//! 2. ~/.pms/config.toml
//! 3. ./pms.toml
//! 4. Environment variables (`PMS_*`, `DATABASE_URL`)
//!
//! CLI flags are applied on top by the caller.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Config loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Upper bound for `auth.session_ttl_hours` (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Get the pms config directory path (~/.pms)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pms"))
}

/// Path of the user-level config file (~/.pms/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "pms.toml";

/// Load environment variables from .env files.
///
/// `./.env` is read first, then `~/.pms/.env`. dotenvy never overwrites
/// variables that are already set, so the first source wins.
pub fn load_dotenv() {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path.display().to_string());
    }

    if let Some(env_file) = config_dir().map(|d| d.join(".env")) {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => loaded_from.push(env_file.display().to_string()),
                Err(e) => warn!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.pms)");
    } else {
        info!("Loaded environment from: {}", loaded_from.join(", "));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PmsConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Allow any CORS origin instead of localhost only
    #[serde(default)]
    pub cors_permissive: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_permissive: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseSection {
    /// sqlx connection string; defaults to ~/.pms/pms.db
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Mark the session cookie `Secure` (enable behind TLS)
    #[serde(default)]
    pub cookie_secure: bool,
}

impl AuthSection {
    /// Session lifetime, or `None` when `session_ttl_hours` is outside
    /// `1..=MAX_SESSION_TTL_HOURS`.
    pub fn session_ttl(&self) -> Option<TimeDelta> {
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return None;
        }
        TimeDelta::try_hours(self.session_ttl_hours)
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    /// Directory for attachment bytes; defaults to ~/.pms/attachments
    #[serde(default)]
    pub attachments_dir: Option<PathBuf>,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            attachments_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// Default value functions for serde
fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3030))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    5
}

fn default_session_ttl_hours() -> i64 {
    72
}

fn default_argon2_memory_kib() -> u32 {
    19_456
}

fn default_argon2_iterations() -> u32 {
    2
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl PmsConfig {
    /// Load config from the global and local TOML files, then apply
    /// environment overrides. Unreadable files are logged and skipped.
    pub fn load() -> Self {
        let mut config = PmsConfig::default();

        if let Some(global) = global_config_path() {
            config = Self::overlay_file(config, &global);
        }
        config = Self::overlay_file(config, Path::new(LOCAL_CONFIG_FILE));

        config.apply_env();
        config
    }

    fn overlay_file(base: Self, path: &Path) -> Self {
        if !path.exists() {
            return base;
        }
        match Self::from_file(path) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}", e);
                base
            }
        }
    }

    /// Parse a single config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `PMS_*` / `DATABASE_URL` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = get("PMS_BIND") {
            match bind.parse() {
                Ok(addr) => self.server.bind = addr,
                Err(_) => warn!("Ignoring invalid PMS_BIND '{}'", bind),
            }
        }

        if let Some(url) = get("PMS_DATABASE_URL").or_else(|| get("DATABASE_URL")) {
            self.database.url = Some(url);
        }

        if let Some(dir) = get("PMS_ATTACHMENTS_DIR") {
            self.storage.attachments_dir = Some(PathBuf::from(dir));
        }

        if let Some(ttl) = get("PMS_SESSION_TTL_HOURS") {
            match ttl.parse() {
                Ok(hours) => self.auth.session_ttl_hours = hours,
                Err(_) => warn!("Ignoring invalid PMS_SESSION_TTL_HOURS '{}'", ttl),
            }
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.session_ttl().is_none() {
            return Err(ConfigError::Invalid {
                field: "auth.session_ttl_hours",
                reason: format!(
                    "{} is not between 1 and {}",
                    self.auth.session_ttl_hours, MAX_SESSION_TTL_HOURS
                ),
            });
        }
        Ok(())
    }

    /// Resolved database URL.
    pub fn database_url(&self) -> Result<String, ConfigError> {
        match &self.database.url {
            Some(url) => Ok(url.clone()),
            None => {
                let dir = config_dir().ok_or(ConfigError::NoHomeDir)?;
                Ok(format!("sqlite://{}", dir.join("pms.db").display()))
            }
        }
    }

    /// Resolved attachment directory.
    pub fn attachments_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.attachments_dir {
            Some(dir) => Ok(dir.clone()),
            None => config_dir()
                .map(|d| d.join("attachments"))
                .ok_or(ConfigError::NoHomeDir),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let config = PmsConfig::default();
        assert_eq!(config.server.bind.port(), 3030);
        assert!(!config.server.cors_permissive);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.auth.session_ttl_hours, 72);
        assert_eq!(config.storage.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PmsConfig::from_toml(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [auth]
            session_ttl_hours = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.auth.session_ttl_hours, 8);
        assert_eq!(config.auth.argon2_iterations, 2);
        assert_eq!(config.database, DatabaseSection::default());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PMS_BIND", "127.0.0.1:9999"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("PMS_SESSION_TTL_HOURS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = PmsConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.bind.port(), 9999);
        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
        assert_eq!(config.auth.session_ttl_hours, 72);
    }

    #[test]
    fn session_ttl_must_be_positive_and_bounded() {
        let mut config = PmsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth.session_ttl(), TimeDelta::try_hours(72));

        for hours in [0, -1, MAX_SESSION_TTL_HOURS + 1, i64::MAX] {
            config.auth.session_ttl_hours = hours;
            assert_eq!(config.auth.session_ttl(), None);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("auth.session_ttl_hours"), "{err}");
        }

        config.apply_env_from(|k| (k == "PMS_SESSION_TTL_HOURS").then(|| "99999999999999".into()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn pms_database_url_wins_over_database_url() {
        let mut config = PmsConfig::default();
        config.apply_env_from(|k| match k {
            "PMS_DATABASE_URL" => Some("sqlite://a.db".into()),
            "DATABASE_URL" => Some("sqlite://b.db".into()),
            _ => None,
        });
        assert_eq!(config.database.url.as_deref(), Some("sqlite://a.db"));
    }

    #[test]
    fn toml_round_trip() {
        let mut config = PmsConfig::default();
        config.storage.attachments_dir = Some(PathBuf::from("/var/lib/pms/files"));
        let text = config.to_toml_string().unwrap();
        assert_eq!(PmsConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pms.toml");
        std::fs::write(&path, "[server]\nbind = 12").unwrap();
        let err = PmsConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("pms.toml"));
    }
}
