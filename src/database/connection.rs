// Database Connection Management
//
// Handles PostgreSQL connection pooling using tokio-postgres and deadpool, and
// implements the storage traits on top of the pool.
use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::error::SqlState;

use crate::database::migrations;
use crate::database::models::{Book, FromRow, User};
use crate::database::store::{BookStore, CreateUserError, UserStore};

const BOOK_COLUMNS: &str = "id, title, author, read, user_id";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_size: usize,
    pub timeouts: deadpool_postgres::Timeouts,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>, max_size: usize) -> Self {
        Self {
            url: url.into(),
            max_size,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(Duration::from_secs(30)),
                recycle: Some(Duration::from_secs(30)),
            },
        }
    }
}

/// Database connection wrapper
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: Pool,
}

impl DatabaseConnection {
    /// Create a new database connection with the provided configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let pg_config = tokio_postgres::Config::from_str(&config.url)
            .context("Failed to parse DATABASE_URL")?;

        let masked_host = format!(
            "{}:{}/{}",
            pg_config.get_hosts().first().map(|h| match h {
                tokio_postgres::config::Host::Tcp(s) => s.clone(),
                tokio_postgres::config::Host::Unix(s) => s.to_string_lossy().to_string(),
            }).unwrap_or_default(),
            pg_config.get_ports().first().copied().unwrap_or(5432),
            pg_config.get_dbname().unwrap_or_default(),
        );
        tracing::info!("🔌 Connecting to database: {}", masked_host);

        // TLS is negotiated according to the sslmode in the URL
        let tls_connector = TlsConnector::builder().build().context("Failed to build TLS connector")?;
        let tls = MakeTlsConnector::new(tls_connector);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tls, mgr_config);

        let pool = Pool::builder(mgr)
            .max_size(config.max_size)
            .wait_timeout(config.timeouts.wait)
            .create_timeout(config.timeouts.create)
            .recycle_timeout(config.timeouts.recycle)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .build()
            .context("Failed to create database pool")?;

        let connection = Self { pool };
        connection.health_check().await?;

        tracing::info!("✅ Database connection established successfully");

        Ok(connection)
    }

    /// Apply pending schema migrations. Any failure aborts startup.
    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        let client = self.pool
            .get()
            .await
            .context("Failed to get connection for health check")?;

        client
            .query("SELECT 1", &[])
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.context("Failed to get DB connection")
    }
}

#[async_trait]
impl UserStore for DatabaseConnection {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> std::result::Result<User, CreateUserError> {
        let client = self.client().await?;
        let row = client
            .query_one(
                "INSERT INTO users (username, password_hash) VALUES ($1, $2) \
                 RETURNING id, username, password_hash",
                &[&username, &password_hash],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    CreateUserError::UsernameTaken
                } else {
                    CreateUserError::Backend(anyhow::Error::new(e).context("Failed to insert user"))
                }
            })?;

        Ok(User::from_row(&row).context("Failed to decode user row")?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, username, password_hash FROM users WHERE username = $1",
                &[&username],
            )
            .await
            .context("Failed to query user by username")?;

        row.map(|r| User::from_row(&r))
            .transpose()
            .context("Failed to decode user row")
    }
}

#[async_trait]
impl BookStore for DatabaseConnection {
    async fn insert_book(&self, owner: i64, title: &str, author: &str) -> Result<Book> {
        let client = self.client().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO books (title, author, user_id) VALUES ($1, $2, $3) RETURNING {}",
                    BOOK_COLUMNS
                ),
                &[&title, &author, &owner],
            )
            .await
            .context("Failed to insert book")?;

        Book::from_row(&row).context("Failed to decode book row")
    }

    async fn list_books(&self, owner: i64) -> Result<Vec<Book>> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM books WHERE user_id = $1 ORDER BY id", BOOK_COLUMNS),
                &[&owner],
            )
            .await
            .context("Failed to list books")?;

        rows.iter()
            .map(Book::from_row)
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to decode book row")
    }

    async fn get_book(&self, owner: i64, id: i64) -> Result<Option<Book>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM books WHERE id = $1 AND user_id = $2", BOOK_COLUMNS),
                &[&id, &owner],
            )
            .await
            .context("Failed to query book")?;

        row.map(|r| Book::from_row(&r))
            .transpose()
            .context("Failed to decode book row")
    }

    async fn update_book(
        &self,
        owner: i64,
        id: i64,
        title: &str,
        author: &str,
    ) -> Result<Option<Book>> {
        let client = self.client().await?;
        // RETURNING gives the post-state from the same statement, so no reread can
        // race a concurrent delete.
        let row = client
            .query_opt(
                &format!(
                    "UPDATE books SET title = $1, author = $2 WHERE id = $3 AND user_id = $4 RETURNING {}",
                    BOOK_COLUMNS
                ),
                &[&title, &author, &id, &owner],
            )
            .await
            .context("Failed to update book")?;

        row.map(|r| Book::from_row(&r))
            .transpose()
            .context("Failed to decode book row")
    }

    async fn set_book_read(&self, owner: i64, id: i64, read: bool) -> Result<Option<Book>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE books SET read = $1 WHERE id = $2 AND user_id = $3 RETURNING {}",
                    BOOK_COLUMNS
                ),
                &[&read, &id, &owner],
            )
            .await
            .context("Failed to update read status")?;

        row.map(|r| Book::from_row(&r))
            .transpose()
            .context("Failed to decode book row")
    }

    async fn delete_book(&self, owner: i64, id: i64) -> Result<bool> {
        let client = self.client().await?;
        let n = client
            .execute("DELETE FROM books WHERE id = $1 AND user_id = $2", &[&id, &owner])
            .await
            .context("Failed to delete book")?;
        Ok(n > 0)
    }
}
