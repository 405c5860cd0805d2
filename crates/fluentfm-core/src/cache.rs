//! Session token caching.
//!
//! The Data API keeps a session alive for 15 minutes after its last use. A
//! [`TokenCache`] lets several repositories, or several processes, share one
//! session per host and database instead of logging in on every run.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

use crate::credentials::Credentials;
use crate::server_url::ServerUrl;
use crate::tokens::AccessToken;

// =============================================================================
// Constants
// =============================================================================

/// Idle lifetime of a Data API session token on the server.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// TTL for cached tokens: one minute short of the server lifetime.
pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(14 * 60);

const CACHE_KEY_PREFIX: &str = "fluentfm:token";

/// Derive the cache key for a host and database pair.
///
/// With `salt` set, a short hash of the credentials is appended so that two
/// accounts against the same database never share a token.
pub fn cache_key(server: &ServerUrl, database: &str, salt: Option<&Credentials>) -> String {
    let base = format!("{}:{}:{}", CACHE_KEY_PREFIX, server.authority(), database);
    match salt {
        Some(creds) => {
            let mut hasher = Sha256::new();
            hasher.update(creds.username().as_bytes());
            hasher.update(b":");
            hasher.update(creds.password().as_bytes());
            let digest = hex::encode(hasher.finalize());
            format!("{}:{}", base, &digest[..16])
        }
        None => base,
    }
}

// =============================================================================
// Cache trait
// =============================================================================

/// Key/value store for session tokens with per-entry TTL.
///
/// Implementations serialize their own access. An entry that has expired or
/// vanished between `has` and `get` must simply read as a miss.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Whether the cache participates at all. A disabled cache is never
    /// consulted and makes `logout` revoke the session remotely.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn has(&self, key: &str) -> bool;

    async fn get(&self, key: &str) -> Option<AccessToken>;

    /// Store `token` under `key`, replacing any previous TTL.
    async fn put(&self, key: &str, token: &AccessToken, ttl: Duration) -> bool;

    async fn delete(&self, key: &str) -> bool;
}

/// Cache that stores nothing. The default for a repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl TokenCache for NoopCache {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn has(&self, _key: &str) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> Option<AccessToken> {
        None
    }

    async fn put(&self, _key: &str, _token: &AccessToken, _ttl: Duration) -> bool {
        false
    }

    async fn delete(&self, _key: &str) -> bool {
        false
    }
}

struct CachedToken {
    token: AccessToken,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Process-local cache with expiring entries.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedToken>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenCache for MemoryCache {
    async fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        entries.get(key).is_some_and(CachedToken::is_valid)
    }

    async fn get(&self, key: &str) -> Option<AccessToken> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(cached) if cached.is_valid() => return Some(cached.token.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict under the write lock.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|c| !c.is_valid()) {
            trace!(key, "evicting expired token");
            entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, token: &AccessToken, ttl: Duration) -> bool {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CachedToken {
                token: token.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
