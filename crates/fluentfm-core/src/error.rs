//! Error types for the fluentfm library.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, remote-operation and input validation
//! errors.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// The unified error type for fluentfm operations.
///
/// Only the authentication class is ever retried (once, by the repository);
/// see [`Error::is_auth_failure`].
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (invalid credentials, rejected or expired token).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server answered with something that is not a Data API response.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The Data API reported a non-zero status code in its envelope.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// Input validation errors (bad URL, bad field data, missing config).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Local file errors while uploading or downloading container data.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for failures that a fresh session token may fix.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::Auth(AuthError::Rejected) | Error::Auth(AuthError::SessionExpired)
        )
    }

    /// The Data API status code, if this error carries one.
    pub fn remote_code(&self) -> Option<u32> {
        match self {
            Error::Remote(err) => Some(err.code),
            Error::Auth(AuthError::SessionExpired) => Some(crate::response::CODE_INVALID_TOKEN),
            _ => None,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server refused the username/password pair.
    #[error("access unauthorized, please check your credentials")]
    InvalidCredentials,

    /// The server refused the bearer token on a data request (HTTP 401).
    #[error("bearer token rejected")]
    Rejected,

    /// The server reported the session token as invalid or expired (code 952).
    #[error("session expired")]
    SessionExpired,
}

/// Protocol-level errors: responses that do not look like the Data API.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Description of what was wrong with the response.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }

    /// The server accepted the login but sent no token header.
    pub fn missing_token(status: u16) -> Self {
        Self::new(
            status,
            Some(format!(
                "server did not return the {} header, is the server online?",
                crate::endpoint::TOKEN_HEADER
            )),
        )
    }
}

/// Classification of Data API error codes with a dedicated diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// 102: a field named in the request does not exist on the layout.
    FieldMissing,
    /// 105: the layout does not exist.
    LayoutMissing,
    /// 509: a field value failed validation.
    FieldInvalid,
    /// Any other non-zero code.
    Generic,
}

impl RemoteErrorKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            102 => RemoteErrorKind::FieldMissing,
            105 => RemoteErrorKind::LayoutMissing,
            509 => RemoteErrorKind::FieldInvalid,
            _ => RemoteErrorKind::Generic,
        }
    }

    fn hint(self) -> Option<&'static str> {
        match self {
            RemoteErrorKind::FieldMissing => Some(
                "the server does not say which field; soft deletes need `deleted_at`, \
                 latest/oldest need `created_at`, last_update needs `updated_at`",
            ),
            RemoteErrorKind::FieldInvalid => Some(
                "often a record created without its `id` field, a missing required \
                 field, or a duplicate value in a unique field",
            ),
            RemoteErrorKind::LayoutMissing => Some("check the layout name"),
            RemoteErrorKind::Generic => None,
        }
    }
}

/// A non-zero status code reported inside the Data API envelope.
///
/// Carries the outbound payload so callers can tell which part of the request
/// the server objected to.
#[derive(Debug, Clone)]
pub struct RemoteError {
    /// Data API status code.
    pub code: u32,
    /// Message text from the server.
    pub message: String,
    /// Diagnostic classification of `code`.
    pub kind: RemoteErrorKind,
    payload: Value,
}

impl RemoteError {
    pub fn new(code: u32, message: impl Into<String>, payload: Value) -> Self {
        Self {
            code,
            message: message.into(),
            kind: RemoteErrorKind::from_code(code),
            payload,
        }
    }

    /// The request payload that was sent when the server reported the error.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMaker returned error {} - {}", self.code, self.message)?;
        if let Some(hint) = self.kind.hint() {
            write!(f, " ({})", hint)?;
        }
        write!(f, "; payload sent: {}", self.payload)
    }
}

impl std::error::Error for RemoteError {}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid server URL or host.
    #[error("invalid server URL '{value}': {reason}")]
    ServerUrl { value: String, reason: String },

    /// Field data that is not a JSON object.
    #[error("invalid field data: {reason}")]
    FieldData { reason: String },

    /// A configuration variable is missing or malformed.
    #[error("invalid configuration '{key}': {reason}")]
    Config { key: String, reason: String },

    /// `exec` was called without binding an operation first.
    #[error("no pending operation to execute")]
    NoPendingOperation,

    /// The executed operation does not produce the requested output.
    #[error("operation produced {actual}, expected {expected}")]
    UnexpectedOutcome {
        expected: &'static str,
        actual: &'static str,
    },

    /// A layout does not contain the named field or value list.
    #[error("layout '{layout}' has no {what} named '{name}'")]
    NotOnLayout {
        layout: String,
        what: &'static str,
        name: String,
    },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn remote_error_keeps_code_and_payload() {
        let payload = json!({"query": [{"missing": "=x"}]});
        let err = RemoteError::new(102, "Field is missing", payload.clone());
        assert_eq!(err.kind, RemoteErrorKind::FieldMissing);
        assert_eq!(err.payload(), &payload);

        let text = err.to_string();
        assert!(text.contains("102"));
        assert!(text.contains("deleted_at"));
        assert!(text.contains("missing"));
    }

    #[test]
    fn auth_failures_are_retryable_only_for_tokens() {
        assert!(Error::Auth(AuthError::Rejected).is_auth_failure());
        assert!(Error::Auth(AuthError::SessionExpired).is_auth_failure());
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_auth_failure());
        assert!(!Error::Remote(RemoteError::new(401, "No records", Value::Null)).is_auth_failure());
    }

    #[test]
    fn remote_code_accessor() {
        let err = Error::Remote(RemoteError::new(509, "bad value", Value::Null));
        assert_eq!(err.remote_code(), Some(509));
        assert_eq!(Error::Auth(AuthError::SessionExpired).remote_code(), Some(952));
        assert_eq!(Error::Auth(AuthError::Rejected).remote_code(), None);
    }
}
