//! HTTP server layer
//!
//! Axum server with:
//! - Session authentication (cookie or bearer token)
//! - Role-based authorization per project
//! - CORS (localhost only by default)
//! - Request tracing, timeout and body limit
//! - Graceful shutdown
//! - JSON error responses

pub mod access;
pub mod error;
pub mod extractors;
pub mod patch;
pub mod routes;
pub mod server;


pub use error::ApiError;
pub use extractors::CurrentUser;
pub use server::{build_router, run_server, AppState, ServerError};
