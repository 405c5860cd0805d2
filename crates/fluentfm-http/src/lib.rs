//! fluentfm-http - Fluent FileMaker Data API client over reqwest.
//!
//! [`Repository`] is the entry point: it owns the HTTP client, the session
//! token and the query being built.

mod client;
mod operation;
mod repository;
mod session;

pub use client::{Downloader, FmClient};
pub use operation::{Outcome, PendingOperation};
pub use repository::Repository;
pub use session::SessionManager;

pub use fluentfm_core::{
    ConnectionConfig, Error, FieldData, MemoryCache, NoopCache, Predicate, Record, RecordId,
    RecordSet, Result, TokenCache,
};
