//! Storage traits
//!
//! The persistence boundary. Every book query takes the owning user id, so
//! implementations filter by owner as well as by book id.

use anyhow::Result;
use async_trait::async_trait;

use crate::database::models::{Book, User};

/// Failure to create a user
#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("username already taken")]
    UsernameTaken,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with `UsernameTaken` when the name exists.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> std::result::Result<User, CreateUserError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn insert_book(&self, owner: i64, title: &str, author: &str) -> Result<Book>;

    /// All books owned by `owner`, ordered by id
    async fn list_books(&self, owner: i64) -> Result<Vec<Book>>;

    async fn get_book(&self, owner: i64, id: i64) -> Result<Option<Book>>;

    /// Returns the post-update row, or `None` when no owned row matched
    async fn update_book(&self, owner: i64, id: i64, title: &str, author: &str)
        -> Result<Option<Book>>;

    /// Returns the post-update row, or `None` when no owned row matched
    async fn set_book_read(&self, owner: i64, id: i64, read: bool) -> Result<Option<Book>>;

    /// Returns whether an owned row was deleted
    async fn delete_book(&self, owner: i64, id: i64) -> Result<bool>;
}
