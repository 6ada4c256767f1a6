//! Book routes. All of them require an authenticated user.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::models::AuthUser;
use crate::database::Book;
use crate::errors::{AppError, Result};
use crate::routes::FormOrDefault;
use crate::server::AppState;

/// Book id from the path. Anything that is not an integer id cannot name a
/// book, so it is reported as not found.
pub struct BookId(pub i64);

impl<S> FromRequestParts<S> for BookId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        Path::<i64>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| BookId(id))
            .map_err(|_| AppError::NotFound("Book not found".to_string()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookForm {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadForm {
    pub read: Option<String>,
}

pub async fn add_book(
    State(state): State<AppState>,
    user: AuthUser,
    FormOrDefault(form): FormOrDefault<BookForm>,
) -> Result<(StatusCode, Json<Value>)> {
    let book = state
        .books
        .add(user.id, form.title.as_deref(), form.author.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "message": "Book added", "book": book }))))
}

pub async fn list_books(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Book>>> {
    Ok(Json(state.books.list(user.id).await?))
}

pub async fn get_book(
    State(state): State<AppState>,
    user: AuthUser,
    BookId(book_id): BookId,
) -> Result<Json<Book>> {
    Ok(Json(state.books.get(user.id, book_id).await?))
}

pub async fn update_book(
    State(state): State<AppState>,
    user: AuthUser,
    BookId(book_id): BookId,
    FormOrDefault(form): FormOrDefault<BookForm>,
) -> Result<Json<Value>> {
    let book = state
        .books
        .update(user.id, book_id, form.title.as_deref(), form.author.as_deref())
        .await?;

    Ok(Json(json!({ "message": format!("Book {} updated", book_id), "book": book })))
}

pub async fn toggle_book_read(
    State(state): State<AppState>,
    user: AuthUser,
    BookId(book_id): BookId,
    FormOrDefault(form): FormOrDefault<ReadForm>,
) -> Result<Json<Value>> {
    let book = state
        .books
        .toggle_read(user.id, book_id, form.read.as_deref())
        .await?;

    Ok(Json(json!({
        "message": format!("Book {} status updated", book_id),
        "read": book.read,
    })))
}

pub async fn delete_book(
    State(state): State<AppState>,
    user: AuthUser,
    BookId(book_id): BookId,
) -> Result<Json<Value>> {
    state.books.delete(user.id, book_id).await?;

    Ok(Json(json!({ "message": format!("Book {} deleted", book_id) })))
}

pub fn create_book_routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list_books).post(add_book))
        .route(
            "/books/{book_id}",
            get(get_book)
                .put(update_book)
                .patch(toggle_book_read)
                .delete(delete_book),
        )
}
