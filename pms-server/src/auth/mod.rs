//! Authentication and authorization
//!
//! - password: argon2id hashes with configurable cost
//! - session: random bearer tokens, stored hashed
//! - permissions: global and per-project role checks

pub mod password;
pub mod permissions;
pub mod session;

pub use password::{validate_password, PasswordError, Passwords};
pub use permissions::{can, can_on_project, Action, ProjectAction};
pub use session::{generate_token, hash_token, SESSION_COOKIE};
