//! Connection configuration.

use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{Error, InvalidInputError};
use crate::server_url::ServerUrl;

/// Default HTTP request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to open a Data API session against one database.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// FileMaker Server base URL.
    pub server: ServerUrl,
    /// Hosted database (file) name.
    pub database: String,
    /// Account used for the session handshake.
    pub credentials: Credentials,
    /// Per-request timeout
    pub timeout: Duration,
    /// Insert a UUID `id` into created records that lack one.
    pub auto_id: bool,
    /// Suffix the token cache key with a hash of the credentials.
    pub salt_cache_key: bool,
}

impl ConnectionConfig {
    /// Create a config with default timeout, auto-id on and an unsalted cache key.
    pub fn new(
        host: impl AsRef<str>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        let database = database.into();
        if database.trim().is_empty() {
            return Err(InvalidInputError::Config {
                key: "database".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        Ok(Self {
            server: ServerUrl::new(host)?,
            database,
            credentials: Credentials::new(username, password),
            timeout: DEFAULT_TIMEOUT,
            auto_id: true,
            salt_cache_key: false,
        })
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Toggle client-side id generation on create.
    pub fn with_auto_id(mut self, auto_id: bool) -> Self {
        self.auto_id = auto_id;
        self
    }

    /// Toggle the credential-hash suffix on the token cache key.
    pub fn with_salted_cache_key(mut self, salt: bool) -> Self {
        self.salt_cache_key = salt;
        self
    }

    /// Create config from environment variables.
    ///
    /// Required: `FM_HOST`, `FM_FILE`, `FM_USER`, `FM_PASS`.
    /// Optional: `FM_TIMEOUT_SECS`, `FM_AUTO_ID`, `FM_SALT_CACHE_KEY`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, Error> {
            match lookup(key) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(InvalidInputError::Config {
                    key: key.to_string(),
                    reason: "must be set".to_string(),
                }
                .into()),
            }
        };

        let mut config = Self::new(
            required("FM_HOST")?,
            required("FM_FILE")?,
            required("FM_USER")?,
            required("FM_PASS")?,
        )?;

        if let Some(raw) = lookup("FM_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| InvalidInputError::Config {
                key: "FM_TIMEOUT_SECS".to_string(),
                reason: format!("'{}' is not a number of seconds", raw),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("FM_AUTO_ID") {
            config.auto_id = parse_flag("FM_AUTO_ID", &raw)?;
        }
        if let Some(raw) = lookup("FM_SALT_CACHE_KEY") {
            config.salt_cache_key = parse_flag("FM_SALT_CACHE_KEY", &raw)?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(InvalidInputError::Config {
            key: key.to_string(),
            reason: format!("'{}' is not a boolean", raw),
        }
        .into()),
    }
}
