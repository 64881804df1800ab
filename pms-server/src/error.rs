//! Startup errors for pms-server
//!
//! Request-level failures are `http::ApiError`; this type covers everything
//! that can stop the server from coming up.

use thiserror::Error;

use crate::auth::PasswordError;
use crate::config::ConfigError;
use crate::http::ServerError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid password hashing parameters: {0}")]
    Passwords(#[from] PasswordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Server(#[from] ServerError),
}
