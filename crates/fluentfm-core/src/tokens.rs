//! Session token type.

use std::fmt;

/// A Data API session token, sent as `Authorization: Bearer <token>`.
///
/// # Security
///
/// - Never logged or displayed in Debug output
/// - Treat as opaque; do not parse or inspect
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token string received from the server or a cache.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token value for use in authorization headers.
    ///
    /// # Security
    ///
    /// Use only when constructing HTTP authorization headers, session paths
    /// or cache entries.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Hide token value in Debug output
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_hides_value_in_debug() {
        let token = AccessToken::new("7f1a0b5c2d9e4b6f8a3c");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("7f1a"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(token.as_str(), "7f1a0b5c2d9e4b6f8a3c");
    }
}
