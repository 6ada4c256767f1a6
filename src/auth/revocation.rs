//! Token Revocation
//!
//! Tracks the `jti` of every token revoked through logout. A revoked `jti`
//! stays revoked for the lifetime of the store; entries are never evicted.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashSet;

/// Storage for revoked token identifiers
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `jti` as revoked. Revoking an already revoked `jti` is a no-op.
    async fn revoke(&self, jti: &str) -> Result<()>;

    async fn is_revoked(&self, jti: &str) -> Result<bool>;
}

/// Process-local revocation set. Cleared on restart.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    revoked: DashSet<String>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str) -> Result<()> {
        self.revoked.insert(jti.to_string());
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.revoked.contains(jti))
    }
}
