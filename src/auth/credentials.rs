//! Credential Store
//!
//! Registers users and verifies their passwords. Passwords are hashed with
//! Argon2id using a random salt; plaintext never leaves this module.

use anyhow::{anyhow, Context};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;

use crate::database::{CreateUserError, User, UserStore};
use crate::errors::{AppError, Result};

pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    /// Verified against when the username is unknown, so both failure paths
    /// do the same amount of work.
    dummy_hash: String,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let dummy_hash = hash_password("not-a-real-password")?;
        Ok(Self { users, dummy_hash })
    }

    /// Create a new user. Fails with [`AppError::DuplicateUser`] if the name is taken.
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        if self.users.find_user_by_username(username).await?.is_some() {
            return Err(AppError::DuplicateUser);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task failed")??;

        match self.users.create_user(username, &password_hash).await {
            Ok(user) => {
                tracing::info!("Registered user id={} username={}", user.id, user.username);
                Ok(user)
            }
            // Lost a race with a concurrent registration of the same name
            Err(CreateUserError::UsernameTaken) => Err(AppError::DuplicateUser),
            Err(CreateUserError::Backend(e)) => Err(AppError::Internal(e)),
        }
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords both yield
    /// [`AppError::InvalidCredentials`].
    pub async fn verify(&self, username: &str, password: &str) -> Result<User> {
        let user = self.users.find_user_by_username(username).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.clone(),
        };
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .context("Password verification task failed")??;

        match user {
            Some(user) if matches => Ok(user),
            _ => {
                tracing::warn!("Failed login attempt for username={}", username);
                Err(AppError::InvalidCredentials)
            }
        }
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid stored password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let users = Arc::new(MemoryStore::new());
        let credentials = CredentialStore::new(users.clone()).unwrap();
        (users, credentials)
    }

    #[test]
    fn hashes_are_salted_phc_strings() {
        let first = hash_password("secret").unwrap();
        let second = hash_password("secret").unwrap();

        assert!(first.starts_with("$argon2"));
        assert_ne!(first, second);
        assert!(verify_password("secret", &first).unwrap());
        assert!(!verify_password("wrong", &first).unwrap());
    }

    #[tokio::test]
    async fn plaintext_is_never_stored() {
        let (users, credentials) = store();
        credentials.register("alice", "pw").await.unwrap();

        let stored = users.find_user_by_username("alice").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "pw");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn duplicate_registration_fails_regardless_of_password() {
        let (_, credentials) = store();
        credentials.register("alice", "pw").await.unwrap();

        let again = credentials.register("alice", "pw").await;
        assert!(matches!(again, Err(AppError::DuplicateUser)));

        let other_password = credentials.register("alice", "different").await;
        assert!(matches!(other_password, Err(AppError::DuplicateUser)));
    }

    #[tokio::test]
    async fn verify_accepts_correct_password() {
        let (_, credentials) = store();
        let registered = credentials.register("alice", "pw").await.unwrap();

        let user = credentials.verify("alice", "pw").await.unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let (_, credentials) = store();
        credentials.register("alice", "pw").await.unwrap();

        let wrong_password = credentials.verify("alice", "wrong").await.unwrap_err();
        let unknown_user = credentials.verify("bob", "pw").await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_user, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.status(), unknown_user.status());
    }
}
