//! # Database Module
//!
//! Persistence for users and books: storage traits, a PostgreSQL
//! implementation over tokio-postgres with deadpool pooling and refinery
//! migrations, and an in-memory implementation.

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod store;

pub use connection::{DatabaseConfig, DatabaseConnection};
pub use memory::MemoryStore;
pub use models::*;
pub use store::{BookStore, CreateUserError, UserStore};
