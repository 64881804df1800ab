//! Domain services that sit between the repositories and the HTTP layer
//!
//! Everything here is synchronous and database-free except `storage`.

pub mod graph;
pub mod kanban;
pub mod reports;
pub mod spreadsheet;
pub mod storage;
pub mod timeline;
