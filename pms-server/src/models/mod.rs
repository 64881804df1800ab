//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod code;
pub mod dates;
pub mod email;
pub mod pagination;
pub mod status;
pub mod text;
pub mod validation;

pub use code::Code;
pub use dates::{check_range, parse_date};
pub use email::Email;
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use status::{
    parse_loose, DecisionStatus, PhaseStatus, Priority, ProjectStatus, Role, TaskStatus,
};
pub use text::{description, optional_text, CommentBody, Name, Title};
pub use validation::ValidationError;
