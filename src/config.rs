//! Configuration module for environment variables and application settings

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Duration;

/// Minimum accepted length of the token signing secret, in bytes
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Token signing configuration
    pub auth: AuthConfig,
}

/// Where users and books are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { url: String },
    /// Process-local storage, selected with `DATABASE_URL=memory://`
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub max_connections: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

// Keep the secret out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| anyhow!("JWT_SECRET environment variable is required"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {} bytes long", MIN_SECRET_LEN);
        }

        let ttl_minutes: i64 = parse_or(&lookup, "TOKEN_TTL_MINUTES", 15)?;
        if ttl_minutes <= 0 {
            bail!("TOKEN_TTL_MINUTES must be positive");
        }

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow!("DATABASE_URL environment variable is required"))?;

        let port = match lookup("SERVER_PORT") {
            Some(_) => parse_or(&lookup, "SERVER_PORT", 3000)?,
            None => parse_or(&lookup, "PORT", 3000)?,
        };

        Ok(Self {
            database: DatabaseConfig {
                backend: StorageBackend::from_url(&database_url)?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 16)?,
            },

            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
                cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                    .map(|origins| {
                        origins
                            .split(',')
                            .map(str::trim)
                            .filter(|origin| !origin.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },

            auth: AuthConfig {
                jwt_secret,
                token_ttl: Duration::minutes(ttl_minutes),
            },
        })
    }
}

impl StorageBackend {
    pub fn from_url(raw: &str) -> Result<Self> {
        let parsed = url::Url::parse(raw).context("Failed to parse DATABASE_URL")?;
        match parsed.scheme() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres { url: raw.to_string() }),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unsupported DATABASE_URL scheme: {}", other),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
