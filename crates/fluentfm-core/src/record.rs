//! Record, record set and field data types.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, InvalidInputError};

// ============================================================================
// RecordId
// ============================================================================

/// Server-assigned record identifier.
///
/// The Data API sends it as a string (`"recordId": "12"`); numbers are
/// accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Read an id from a JSON string or number.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.trim().parse().ok().map(Self),
            Value::Number(n) => n.as_u64().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self).map_err(|_| {
            InvalidInputError::Other {
                message: format!("'{}' is not a record id", s),
            }
            .into()
        })
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Serialize for RecordId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RecordId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid record id: {}", value)))
    }
}

// ============================================================================
// FieldData
// ============================================================================

/// A validated field-name to value object used as a write payload.
///
/// # Example
///
/// ```
/// use fluentfm_core::FieldData;
/// use serde_json::json;
///
/// let fields = FieldData::new(json!({"name": "Ann", "age": 31})).unwrap();
/// assert!(fields.contains("name"));
/// assert!(FieldData::new(json!(["not", "an", "object"])).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldData(Map<String, Value>);

impl FieldData {
    /// Create field data from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn new(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(InvalidInputError::FieldData {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }
            .into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copy without `null` entries. Empty strings are kept so a field can be
    /// cleared.
    pub fn without_nulls(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for FieldData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl Serialize for FieldData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        FieldData::new(value).map_err(serde::de::Error::custom)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Record / RecordSet
// ============================================================================

/// One record as returned by a read.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub mod_id: Option<String>,
    pub fields: Map<String, Value>,
    /// Related rows, present only when portals were requested.
    pub portal_data: Option<Map<String, Value>>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// A field rendered as text: strings as is, numbers and booleans via JSON.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Field names in the order the server sent them.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        match self.portal_data {
            None => self.fields.serialize(serializer),
            Some(ref portals) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("recordId", &self.id.to_string())?;
                map.serialize_entry("modId", &self.mod_id)?;
                map.serialize_entry("fieldData", &self.fields)?;
                map.serialize_entry("portalData", portals)?;
                map.end()
            }
        }
    }
}

/// Records keyed by id, in the order the server returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: IndexMap<RecordId, Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; an id seen before is replaced in its original slot.
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn keys(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first().map(|(_, record)| record)
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last().map(|(_, record)| record)
    }

    pub fn iter(&self) -> indexmap::map::Values<'_, RecordId, Record> {
        self.records.values()
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = indexmap::map::IntoValues<RecordId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = indexmap::map::Values<'a, RecordId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl Serialize for RecordSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (id, record) in &self.records {
            map.serialize_entry(&id.to_string(), record)?;
        }
        map.end()
    }
}
