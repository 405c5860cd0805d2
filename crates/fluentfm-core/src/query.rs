//! Query builder state.
//!
//! A [`Query`] accumulates pagination, sort, find conditions, script hooks and
//! visibility flags. It serializes to two wire shapes: flat query-string
//! parameters for record listing and a nested JSON body for `_find`.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Field every record is expected to carry; the default find guard.
pub const ID_FIELD: &str = "id";
/// Soft-delete timestamp field.
pub const DELETED_AT: &str = "deleted_at";
/// Creation timestamp used by `latest` / `oldest`.
pub const CREATED_AT: &str = "created_at";
/// Modification timestamp used by `last_update`.
pub const UPDATED_AT: &str = "updated_at";

// =============================================================================
// Predicates and conditions
// =============================================================================

/// A find predicate on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Field is not empty: `*`.
    Any,
    /// Exact match: `=value`. An empty value matches empty fields.
    Equals(String),
    /// Operator and value concatenated as is, e.g. `>5` or `10...20`.
    Compare { op: String, value: String },
}

impl Predicate {
    pub fn equals(value: impl Into<String>) -> Self {
        Predicate::Equals(value.into())
    }

    pub fn empty() -> Self {
        Predicate::Equals(String::new())
    }

    pub fn compare(op: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Compare {
            op: op.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Any => f.write_str("*"),
            Predicate::Equals(value) => write!(f, "={}", value),
            Predicate::Compare { op, value } => write!(f, "{}{}", op, value),
        }
    }
}

/// One AND'd set of field predicates. Conditions in a query are OR'd.
///
/// Fields keep insertion order; setting a field again replaces its predicate
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Condition {
    entries: Vec<(String, Predicate)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, predicate: Predicate) -> &mut Self {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = predicate,
            None => self.entries.push((field, predicate)),
        }
        self
    }

    fn set_if_absent(&mut self, field: &str, predicate: Predicate) {
        if self.get(field).is_none() {
            self.entries.push((field.to_string(), predicate));
        }
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, predicate)| predicate)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }
}

impl Serialize for Condition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, predicate) in &self.entries {
            map.serialize_entry(field, &predicate.to_string())?;
        }
        map.end()
    }
}

// =============================================================================
// Sort and scripts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascend,
    Descend,
}

/// The single sort criterion of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    #[serde(rename = "fieldName")]
    pub field: String,
    #[serde(rename = "sortOrder")]
    pub order: SortOrder,
}

/// When a server-side script runs relative to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptHook {
    /// Before the request is processed.
    PreRequest,
    /// After the request, before sorting.
    PreSort,
    /// After the request and sort.
    After,
}

impl ScriptHook {
    const ALL: [ScriptHook; 3] = [ScriptHook::PreRequest, ScriptHook::PreSort, ScriptHook::After];

    /// Wire key of the script name; the parameter key appends `.param`.
    pub fn key(self) -> &'static str {
        match self {
            ScriptHook::PreRequest => "script.prerequest",
            ScriptHook::PreSort => "script.presort",
            ScriptHook::After => "script",
        }
    }

    fn slot(self) -> usize {
        match self {
            ScriptHook::PreRequest => 0,
            ScriptHook::PreSort => 1,
            ScriptHook::After => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub param: Option<String>,
}

/// Soft-deleted record visibility for the next operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletedVisibility {
    /// Never toggled; soft-deleted records are hidden.
    #[default]
    Default,
    /// `with_deleted()`: no deletion filter.
    Included,
    /// `without_deleted()`: soft-deleted records are hidden.
    Excluded,
}

impl DeletedVisibility {
    pub fn hides_deleted(self) -> bool {
        !matches!(self, DeletedVisibility::Included)
    }
}

// =============================================================================
// Query
// =============================================================================

/// Accumulated builder state for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    limit: Option<u32>,
    offset: Option<u32>,
    sort: Option<SortSpec>,
    conditions: Vec<Condition>,
    scripts: [Option<Script>; 3],
    portals: bool,
    deleted: DeletedVisibility,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u32) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    /// Replace the sort criterion.
    pub fn sort(&mut self, field: impl Into<String>, ascending: bool) -> &mut Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            order: if ascending {
                SortOrder::Ascend
            } else {
                SortOrder::Descend
            },
        });
        self
    }

    /// Add a predicate to the current condition.
    pub fn filter(&mut self, field: impl Into<String>, predicate: Predicate) -> &mut Self {
        if self.conditions.is_empty() {
            self.conditions.push(Condition::new());
        }
        if let Some(current) = self.conditions.last_mut() {
            current.set(field, predicate);
        }
        self
    }

    /// Start a new OR'd condition. Predicates added next go into it.
    pub fn or(&mut self) -> &mut Self {
        if self.conditions.last().is_some_and(|c| !c.is_empty()) {
            self.conditions.push(Condition::new());
        }
        self
    }

    pub fn portals(&mut self, include: bool) -> &mut Self {
        self.portals = include;
        self
    }

    pub fn deleted(&mut self, visibility: DeletedVisibility) -> &mut Self {
        self.deleted = visibility;
        self
    }

    pub fn script(
        &mut self,
        hook: ScriptHook,
        name: impl Into<String>,
        param: Option<String>,
    ) -> &mut Self {
        self.scripts[hook.slot()] = Some(Script {
            name: name.into(),
            param,
        });
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    pub fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u32> {
        self.offset
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn includes_portals(&self) -> bool {
        self.portals
    }

    pub fn deleted_visibility(&self) -> DeletedVisibility {
        self.deleted
    }

    pub fn script_for(&self, hook: ScriptHook) -> Option<&Script> {
        self.scripts[hook.slot()].as_ref()
    }

    /// Apply the execute-time guards.
    ///
    /// Empty conditions are dropped. With no condition left, `id: "*"` is
    /// added. Unless deleted records are included, every condition that does
    /// not already constrain `deleted_at` gets `deleted_at: "="`.
    pub fn apply_guards(&mut self) {
        self.conditions.retain(|c| !c.is_empty());

        if self.conditions.is_empty() {
            let mut guard = Condition::new();
            guard.set(ID_FIELD, Predicate::Any);
            self.conditions.push(guard);
        }

        if self.deleted.hides_deleted() {
            for condition in &mut self.conditions {
                condition.set_if_absent(DELETED_AT, Predicate::empty());
            }
        }
    }

    /// Flat query-string form used by record listing.
    ///
    /// Non-script keys are prefixed with `_`. Conditions are not part of this
    /// form.
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("_limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("_offset".to_string(), offset.to_string()));
        }
        if let Some(ref sort) = self.sort {
            params.push(("_sort".to_string(), json!([sort]).to_string()));
        }
        for (key, value) in self.script_params() {
            params.push((key, value));
        }
        params
    }

    /// Nested JSON body used by `_find`.
    pub fn to_find_body(&self) -> Value {
        let mut body = Map::new();
        let conditions: Vec<&Condition> =
            self.conditions.iter().filter(|c| !c.is_empty()).collect();
        if !conditions.is_empty() {
            body.insert("query".to_string(), json!(conditions));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), json!(limit));
        }
        if let Some(offset) = self.offset {
            body.insert("offset".to_string(), json!(offset));
        }
        if let Some(ref sort) = self.sort {
            body.insert("sort".to_string(), json!([sort]));
        }
        for (key, value) in self.script_params() {
            body.insert(key, Value::String(value));
        }
        Value::Object(body)
    }

    /// Script keys and parameters, in pre-request, pre-sort, after order.
    pub fn script_params(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        for hook in ScriptHook::ALL {
            if let Some(script) = self.script_for(hook) {
                entries.push((hook.key().to_string(), script.name.clone()));
                if let Some(ref param) = script.param {
                    entries.push((format!("{}.param", hook.key()), param.clone()));
                }
            }
        }
        entries
    }
}
