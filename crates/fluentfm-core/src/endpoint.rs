//! Data API routes and request bodies.
//!
//! Paths are relative to `/fmi/data/v1/databases/{database}/`; see
//! [`ServerUrl::data_url`](crate::ServerUrl::data_url).

use std::fmt;

use serde_json::{Map, Value, json};

use crate::record::{FieldData, RecordId};

// ============================================================================
// Headers
// ============================================================================

/// Response header carrying the new session token.
pub const TOKEN_HEADER: &str = "X-FM-Data-Access-Token";

/// Multipart part name for container uploads.
pub const UPLOAD_PART: &str = "upload";

// ============================================================================
// Routes
// ============================================================================

/// A Data API route as a list of path segments.
///
/// Layout and field names are kept as single segments, so a `/` inside a
/// name is percent-encoded instead of starting a new segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route(Vec<String>);

impl Route {
    fn new<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// `sessions`: open a session.
pub fn sessions() -> Route {
    Route::new(["sessions"])
}

/// `sessions/{token}`: close a session.
pub fn session(token: &str) -> Route {
    Route::new(["sessions", token])
}

/// `layouts/{layout}`: layout metadata.
pub fn layout(layout: &str) -> Route {
    Route::new(["layouts", layout])
}

/// `layouts/{layout}/records[/{id}]`.
pub fn records(layout: &str, id: Option<RecordId>) -> Route {
    let mut route = Route::new(["layouts", layout, "records"]);
    if let Some(id) = id {
        route.0.push(id.to_string());
    }
    route
}

/// `layouts/{layout}/_find`.
pub fn find(layout: &str) -> Route {
    Route::new(["layouts", layout, "_find"])
}

/// `globals`.
pub fn globals() -> Route {
    Route::new(["globals"])
}

/// Container field of one record. Only the first repetition is addressed.
pub fn container(layout: &str, id: RecordId, field: &str) -> Route {
    let id = id.to_string();
    Route::new(["layouts", layout, "records", id.as_str(), "containers", field, "1"])
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body of create and edit requests: `{"fieldData": {...}}`.
///
/// `null` entries are dropped; `extra` entries (script keys) are merged at the
/// top level.
pub fn field_data_body(fields: &FieldData, extra: &[(String, String)]) -> Value {
    let mut body = Map::new();
    body.insert("fieldData".to_string(), fields.without_nulls().into_value());
    for (key, value) in extra {
        body.insert(key.clone(), Value::String(value.clone()));
    }
    Value::Object(body)
}

/// Body of `PATCH globals`. Field names are qualified as `layout::field`.
pub fn globals_body(layout: &str, fields: &FieldData) -> Value {
    let global_fields: Map<String, Value> = fields
        .without_nulls()
        .iter()
        .map(|(name, value)| (format!("{}::{}", layout, name), value.clone()))
        .collect();
    json!({ "globalFields": global_fields })
}
