//! Book Repository
//!
//! Input validation and owner-scoped CRUD over the book store. Every call takes
//! the owner's id; a book that exists but belongs to someone else is reported
//! exactly like one that does not exist.

use std::sync::Arc;

use crate::database::{Book, BookStore};
use crate::errors::{AppError, Result};

const FIELDS_REQUIRED: &str = "Title and author are required";
const BOOK_NOT_FOUND: &str = "Book not found";

pub struct BookRepository {
    store: Arc<dyn BookStore>,
}

impl BookRepository {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, owner: i64, title: Option<&str>, author: Option<&str>) -> Result<Book> {
        let (title, author) = required_fields(title, author)?;
        let book = self.store.insert_book(owner, title, author).await?;
        tracing::info!("Book {} added for user {}", book.id, owner);
        Ok(book)
    }

    /// All books of `owner`. An empty list is reported as not found.
    pub async fn list(&self, owner: i64) -> Result<Vec<Book>> {
        let books = self.store.list_books(owner).await?;
        if books.is_empty() {
            return Err(AppError::NotFound("No books found".to_string()));
        }
        Ok(books)
    }

    pub async fn get(&self, owner: i64, id: i64) -> Result<Book> {
        self.store.get_book(owner, id).await?.ok_or_else(not_found)
    }

    pub async fn update(
        &self,
        owner: i64,
        id: i64,
        title: Option<&str>,
        author: Option<&str>,
    ) -> Result<Book> {
        let (title, author) = required_fields(title, author)?;
        self.store
            .update_book(owner, id, title, author)
            .await?
            .ok_or_else(not_found)
    }

    /// Set the read flag from its form value, which must be `"true"` or `"false"`.
    pub async fn toggle_read(&self, owner: i64, id: i64, read: Option<&str>) -> Result<Book> {
        let read = parse_read_flag(read)?;
        self.store
            .set_book_read(owner, id, read)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn delete(&self, owner: i64, id: i64) -> Result<()> {
        if self.store.delete_book(owner, id).await? {
            tracing::info!("Book {} deleted for user {}", id, owner);
            Ok(())
        } else {
            Err(not_found())
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound(BOOK_NOT_FOUND.to_string())
}

fn required_fields<'a>(title: Option<&'a str>, author: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    match (title.map(str::trim), author.map(str::trim)) {
        (Some(title), Some(author)) if !title.is_empty() && !author.is_empty() => Ok((title, author)),
        _ => Err(AppError::Validation(FIELDS_REQUIRED.to_string())),
    }
}

fn parse_read_flag(raw: Option<&str>) -> Result<bool> {
    match raw {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => Err(AppError::Validation("Invalid read status".to_string())),
    }
}
