// # Routes Module
//
// - This module contains all HTTP route handlers for the Bookshelf Server.
// - Routes are organized by functionality into separate submodules and
//   registered in `server.rs`.

use axum::{
    Form,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;

/// Health check and monitoring endpoints
pub mod health;

/// Registration, login and logout
pub mod auth;

/// Owner-scoped book endpoints
pub mod books;

/// Form-encoded body that falls back to `T::default()` when the body is
/// missing or unreadable, so handlers report absent fields themselves.
pub struct FormOrDefault<T>(pub T);

impl<S, T> FromRequest<S> for FormOrDefault<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Form::<T>::from_request(req, state).await {
            Ok(Form(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!("Unreadable form body: {}", rejection);
                Ok(Self(T::default()))
            }
        }
    }
}
