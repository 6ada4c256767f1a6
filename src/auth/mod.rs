//! # Authentication Module
//!
//! Credential storage, token issuance/validation/revocation, and the
//! middleware that guards the book endpoints.

pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;
