//! Session token lifecycle.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};

use fluentfm_core::cache::{TOKEN_CACHE_TTL, TokenCache, cache_key};
use fluentfm_core::{AccessToken, ConnectionConfig, Credentials, Result};

use crate::client::FmClient;

/// The token currently held in memory.
#[derive(Debug, Clone)]
struct SessionToken {
    token: AccessToken,
    issued_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

impl SessionToken {
    fn new(token: AccessToken) -> Self {
        let now = Utc::now();
        Self {
            token,
            issued_at: now,
            last_used: now,
        }
    }

    /// The server extends a session on every use, so expiry slides from
    /// the last use.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.last_used < cache_ttl()
    }
}

fn cache_ttl() -> TimeDelta {
    TimeDelta::seconds(TOKEN_CACHE_TTL.as_secs() as i64)
}

/// Obtains, caches and renews the Data API session token.
pub struct SessionManager {
    client: FmClient,
    credentials: Credentials,
    cache: Arc<dyn TokenCache>,
    cache_key: String,
    current: Option<SessionToken>,
}

impl SessionManager {
    pub fn new(client: FmClient, config: &ConnectionConfig, cache: Arc<dyn TokenCache>) -> Self {
        let salt = config.salt_cache_key.then_some(&config.credentials);
        let cache_key = cache_key(&config.server, &config.database, salt);

        Self {
            client,
            credentials: config.credentials.clone(),
            cache,
            cache_key,
            current: None,
        }
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// When the in-memory token was obtained, if there is one.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|s| s.issued_at)
    }

    /// Return a usable token, logging in when needed.
    ///
    /// Without `force_new` a cached token (cache enabled) or a fresh in-memory
    /// token is reused. A cache hit re-puts the token to extend its TTL.
    #[instrument(skip(self), fields(key = %self.cache_key))]
    pub async fn acquire(&mut self, force_new: bool) -> Result<AccessToken> {
        if !force_new {
            if let Some(token) = self.reuse().await {
                return Ok(token);
            }
        }

        let token = self.client.create_session(&self.credentials).await?;
        info!(
            user = self.credentials.username(),
            forced = force_new,
            "Data API session created"
        );

        if self.cache.is_enabled() {
            self.cache.put(&self.cache_key, &token, TOKEN_CACHE_TTL).await;
        }
        self.current = Some(SessionToken::new(token.clone()));

        Ok(token)
    }

    async fn reuse(&mut self) -> Option<AccessToken> {
        let now = Utc::now();

        if self.cache.is_enabled() {
            let token = self.cache.get(&self.cache_key).await?;
            debug!("token cache hit");
            self.cache.put(&self.cache_key, &token, TOKEN_CACHE_TTL).await;
            match self.current.as_mut() {
                Some(current) if current.token == token => current.last_used = now,
                _ => self.current = Some(SessionToken::new(token.clone())),
            }
            return Some(token);
        }

        let current = self.current.as_mut()?;
        if !current.is_fresh(now) {
            debug!("in-memory token idle past its lifetime");
            return None;
        }
        current.last_used = now;
        Some(current.token.clone())
    }

    /// Drop the local token and its cache entry after the server rejected it.
    pub async fn invalidate(&mut self) {
        self.current = None;
        if self.cache.is_enabled() {
            self.cache.delete(&self.cache_key).await;
        }
        debug!("session token invalidated");
    }

    /// Give up the session.
    ///
    /// With a cache the token may be shared with other processes, so it is
    /// left to expire. Otherwise the session is closed on the server; a failure
    /// there is logged and ignored.
    #[instrument(skip(self))]
    pub async fn release(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };

        if self.cache.is_enabled() {
            debug!("token cache enabled, leaving session open");
            return;
        }

        match self.client.delete_session(&current.token).await {
            Ok(()) => info!("Data API session closed"),
            Err(e) => warn!(error = %e, "failed to close Data API session"),
        }
    }

    /// Whether a token is held in memory.
    pub fn has_token(&self) -> bool {
        self.current.is_some()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("client", &self.client)
            .field("cache_key", &self.cache_key)
            .field("cache_enabled", &self.cache.is_enabled())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_freshness_slides_from_last_use() {
        let mut session = SessionToken::new(AccessToken::new("t"));
        let now = Utc::now();
        assert!(session.is_fresh(now));
        assert!(!session.is_fresh(now + TimeDelta::minutes(15)));

        session.last_used = now + TimeDelta::minutes(10);
        assert!(session.is_fresh(now + TimeDelta::minutes(20)));
    }

    #[test]
    fn salted_key_from_config() {
        let config = ConnectionConfig::new("fms.example.com", "Contacts", "admin", "pw")
            .unwrap()
            .with_salted_cache_key(true);
        let client = FmClient::new(&config).unwrap();
        let manager = SessionManager::new(
            client,
            &config,
            Arc::new(fluentfm_core::NoopCache),
        );
        assert!(manager.cache_key().starts_with("fluentfm:token:fms.example.com:Contacts:"));
        assert!(!manager.has_token());
    }
}
