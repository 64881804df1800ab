//! Database layer - connection pool, migrations and repositories
//!
//! - Pool of SQLite connections, never a shared `Arc<Mutex<Connection>>`
//! - List operations are single queries with `COUNT(*) OVER()` totals
//! - Uniqueness and references are enforced by constraints; violations map to `DbError::Conflict`
//! - Multi-step writes run in transactions

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repos;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::DbError;
pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;
