//! Server URL type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// Path prefix of every Data API v1 route.
const DATA_API_PREFIX: [&str; 4] = ["fmi", "data", "v1", "databases"];

/// A validated FileMaker Server base URL.
///
/// Accepts either a bare host (`fms.example.com`, HTTPS assumed) or a full
/// URL. Only HTTPS is accepted, except plain HTTP against localhost.
///
/// # Example
///
/// ```
/// use fluentfm_core::ServerUrl;
///
/// let server = ServerUrl::new("fms.example.com").unwrap();
/// assert_eq!(
///     server.data_url("Contacts", ["layouts", "people", "records"]).as_str(),
///     "https://fms.example.com/fmi/data/v1/databases/Contacts/layouts/people/records"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServerUrl(Url);

impl ServerUrl {
    /// Create a new server URL from a host or URL string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid or uses a disallowed scheme.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let original = s.as_ref().trim();
        if original.is_empty() {
            return Err(InvalidInputError::ServerUrl {
                value: original.to_string(),
                reason: "host must not be empty".to_string(),
            }
            .into());
        }

        let candidate = if original.contains("://") {
            original.to_string()
        } else {
            format!("https://{}", original)
        };

        let url = Url::parse(&candidate).map_err(|e| InvalidInputError::ServerUrl {
            value: original.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, original)?;

        Ok(Self(url))
    }

    /// Returns the absolute URL of a Data API route for `database`.
    ///
    /// `segments` are relative to `/fmi/data/v1/databases/{database}/`. Each
    /// one is percent-encoded individually, `/` included.
    pub fn data_url<I>(&self, database: &str, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.0.clone();
        url.set_query(None);
        url.set_fragment(None);
        // cannot-be-a-base URLs are rejected in `validate`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(DATA_API_PREFIX)
                .push(database)
                .extend(segments);
        }
        url
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the inner URL.
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    /// Returns `host` or `host:port`, used to key cached tokens.
    pub fn authority(&self) -> String {
        let host = self.0.host_str().unwrap_or_default();
        match self.0.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        let fail = |reason: &str| -> Error {
            InvalidInputError::ServerUrl {
                value: original.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if url.cannot_be_a_base() {
            return Err(fail("must be an absolute URL"));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(fail("must have a host"));
        }

        let is_localhost = url
            .host_str()
            .is_some_and(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]");

        let scheme = url.scheme();
        if scheme != "https" && !(scheme == "http" && is_localhost) {
            return Err(fail("must use HTTPS (HTTP allowed only for localhost)"));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(fail("credentials belong in the connection config, not the URL"));
        }

        Ok(())
    }
}

impl fmt::Display for ServerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for ServerUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for ServerUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ServerUrl::new(&s).map_err(serde::de::Error::custom)
    }
}
