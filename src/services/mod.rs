//! # Services Module
//!
//! Domain services sitting between the HTTP handlers and the database.

/// Owner-scoped book operations
pub mod books;

pub use books::BookRepository;
