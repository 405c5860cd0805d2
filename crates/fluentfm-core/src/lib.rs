//! fluentfm-core - Core types for the fluentfm FileMaker Data API client.
//!
//! This crate holds everything that does not touch the network: the error
//! taxonomy, connection configuration, the token cache abstraction, the query
//! builder state, route construction and response normalization.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod layout;
pub mod query;
pub mod record;
pub mod response;
pub mod server_url;
pub mod tokens;

pub use cache::{MemoryCache, NoopCache, TOKEN_CACHE_TTL, TOKEN_LIFETIME, TokenCache, cache_key};
pub use config::ConnectionConfig;
pub use credentials::Credentials;
pub use error::{
    AuthError, Error, InvalidInputError, ProtocolError, RemoteError, RemoteErrorKind,
    TransportError,
};
pub use layout::{FieldMeta, LayoutMetadata, ValueList, ValueListItem};
pub use query::{
    Condition, DeletedVisibility, Predicate, Query, ScriptHook, SortOrder, SortSpec,
};
pub use record::{FieldData, Record, RecordId, RecordSet};
pub use server_url::ServerUrl;
pub use tokens::AccessToken;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
