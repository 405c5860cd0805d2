//! Fluent repository over the Data API.
//!
//! Every call follows two steps. Binder methods (`records`, `find`, `update`,
//! ...) store a [`PendingOperation`] without I/O; executors (`exec`, `get`,
//! `first`, `last`) take that operation and the query built so far, run it,
//! and leave the repository with an empty query whether the call succeeded or
//! not.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use fluentfm_core::endpoint;
use fluentfm_core::error::{Error, InvalidInputError};
use fluentfm_core::query::{CREATED_AT, DELETED_AT, ID_FIELD, UPDATED_AT};
use fluentfm_core::response;
use fluentfm_core::{
    AccessToken, ConnectionConfig, DeletedVisibility, FieldData, FieldMeta, LayoutMetadata,
    NoopCache, Predicate, Query, Record, RecordId, RecordSet, Result, ScriptHook, TokenCache,
    ValueList,
};

use crate::client::FmClient;
use crate::operation::{Outcome, PendingOperation};
use crate::session::SessionManager;

/// Timestamp format written to `deleted_at` by soft deletes.
const DELETED_AT_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Chainable client for one FileMaker database.
///
/// # Example
///
/// ```no_run
/// use fluentfm_core::ConnectionConfig;
/// use fluentfm_http::Repository;
///
/// # async fn example() -> fluentfm_core::Result<()> {
/// let config = ConnectionConfig::new("fms.example.com", "Contacts", "admin", "secret")?;
/// let mut fm = Repository::connect(config).await?;
///
/// let people = fm.find("people").where_is("city", "Oslo").limit(10).get().await?;
/// for person in &people {
///     println!("{} {:?}", person.id, person.get("name"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Repository {
    client: FmClient,
    session: SessionManager,
    auto_id: bool,
    query: Query,
    pending: Option<PendingOperation>,
    field_cache: HashMap<String, Vec<String>>,
    layout_cache: HashMap<String, LayoutMetadata>,
}

impl Repository {
    /// Connect without a token cache and open a session.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        Self::connect_with_cache(config, Arc::new(NoopCache)).await
    }

    /// Connect with a shared token cache and obtain a session token.
    ///
    /// A cached token is reused; otherwise a new session is opened.
    pub async fn connect_with_cache(
        config: ConnectionConfig,
        cache: Arc<dyn TokenCache>,
    ) -> Result<Self> {
        let client = FmClient::new(&config)?;
        let session = SessionManager::new(client.clone(), &config, cache);

        let mut repository = Self {
            client,
            session,
            auto_id: config.auto_id,
            query: Query::default(),
            pending: None,
            field_cache: HashMap::new(),
            layout_cache: HashMap::new(),
        };
        repository.session.acquire(false).await?;

        Ok(repository)
    }

    /// The query state that the next executor will consume.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The operation bound for the next executor, if any.
    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    // ========================================================================
    // Query builder
    // ========================================================================

    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.query.limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u32) -> &mut Self {
        self.query.offset(offset);
        self
    }

    /// Replace the sort criterion.
    pub fn sort(&mut self, field: &str, ascending: bool) -> &mut Self {
        self.query.sort(field, ascending);
        self
    }

    pub fn sort_asc(&mut self, field: &str) -> &mut Self {
        self.sort(field, true)
    }

    pub fn sort_desc(&mut self, field: &str) -> &mut Self {
        self.sort(field, false)
    }

    /// Add any predicate to the current condition.
    pub fn filter(&mut self, field: &str, predicate: Predicate) -> &mut Self {
        self.query.filter(field, predicate);
        self
    }

    /// `field` is not empty (`*`).
    pub fn has(&mut self, field: &str) -> &mut Self {
        self.filter(field, Predicate::Any)
    }

    pub fn where_not_empty(&mut self, field: &str) -> &mut Self {
        self.has(field)
    }

    /// `field` equals `value` (`=value`).
    pub fn where_is(&mut self, field: &str, value: impl Into<String>) -> &mut Self {
        self.filter(field, Predicate::equals(value))
    }

    /// `field` matches `op` followed by `value`, e.g. `where_op("age", ">", "30")`.
    pub fn where_op(
        &mut self,
        field: &str,
        op: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.filter(field, Predicate::compare(op, value))
    }

    /// `field` is empty (`=`).
    pub fn where_empty(&mut self, field: &str) -> &mut Self {
        self.filter(field, Predicate::empty())
    }

    /// Start an alternative condition set.
    pub fn or(&mut self) -> &mut Self {
        self.query.or();
        self
    }

    pub fn with_portals(&mut self) -> &mut Self {
        self.query.portals(true);
        self
    }

    pub fn without_portals(&mut self) -> &mut Self {
        self.query.portals(false);
        self
    }

    /// Include soft-deleted records.
    pub fn with_deleted(&mut self) -> &mut Self {
        self.query.deleted(DeletedVisibility::Included);
        self
    }

    /// Exclude soft-deleted records.
    pub fn without_deleted(&mut self) -> &mut Self {
        self.query.deleted(DeletedVisibility::Excluded);
        self
    }

    /// Run a script after the request and sort.
    pub fn script(&mut self, name: &str, param: Option<&str>) -> &mut Self {
        self.script_hook(ScriptHook::After, name, param)
    }

    /// Run a script before the request.
    pub fn prerequest(&mut self, name: &str, param: Option<&str>) -> &mut Self {
        self.script_hook(ScriptHook::PreRequest, name, param)
    }

    /// Run a script after the request, before sorting.
    pub fn presort(&mut self, name: &str, param: Option<&str>) -> &mut Self {
        self.script_hook(ScriptHook::PreSort, name, param)
    }

    pub fn script_hook(&mut self, hook: ScriptHook, name: &str, param: Option<&str>) -> &mut Self {
        self.query.script(hook, name, param.map(str::to_string));
        self
    }

    /// Clear the query state.
    pub fn reset(&mut self) -> &mut Self {
        self.query.reset();
        self
    }

    // ========================================================================
    // Binders
    // ========================================================================

    fn bind(&mut self, operation: PendingOperation) -> &mut Self {
        if let Some(previous) = self.pending.replace(operation) {
            debug!(replaced = previous.name(), "pending operation replaced");
        }
        self
    }

    /// Read one record by id.
    pub fn record(&mut self, layout: &str, id: RecordId) -> &mut Self {
        self.bind(PendingOperation::Records {
            layout: layout.to_string(),
            id: Some(id),
        })
    }

    /// List records of a layout, paged and sorted by the query.
    pub fn records(&mut self, layout: &str) -> &mut Self {
        self.bind(PendingOperation::Records {
            layout: layout.to_string(),
            id: None,
        })
    }

    /// Find records matching the query conditions.
    pub fn find(&mut self, layout: &str) -> &mut Self {
        self.bind(PendingOperation::Find {
            layout: layout.to_string(),
        })
    }

    pub fn metadata(&mut self, layout: &str) -> &mut Self {
        self.bind(PendingOperation::Metadata {
            layout: layout.to_string(),
        })
    }

    /// Edit record `id`, or every record the query finds.
    pub fn update(&mut self, layout: &str, fields: FieldData, id: Option<RecordId>) -> &mut Self {
        self.bind(PendingOperation::Update {
            layout: layout.to_string(),
            fields,
            id,
        })
    }

    /// Delete record `id`, or every record the query finds.
    pub fn delete(&mut self, layout: &str, id: Option<RecordId>) -> &mut Self {
        self.bind(PendingOperation::Delete {
            layout: layout.to_string(),
            id,
        })
    }

    /// Stamp `deleted_at` with the current local time on records not yet
    /// soft-deleted.
    pub fn soft_delete(&mut self, layout: &str, id: Option<RecordId>) -> &mut Self {
        let now = chrono::Local::now().format(DELETED_AT_FORMAT).to_string();
        let mut fields = FieldData::empty();
        fields.insert(DELETED_AT, now);
        self.update(layout, fields, id).where_empty(DELETED_AT)
    }

    /// Clear `deleted_at`, looking through soft-deleted records.
    pub fn undelete(&mut self, layout: &str, id: Option<RecordId>) -> &mut Self {
        let mut fields = FieldData::empty();
        fields.insert(DELETED_AT, "");
        self.update(layout, fields, id).with_deleted()
    }

    /// Upload a local file into a container field.
    pub fn upload(
        &mut self,
        layout: &str,
        field: &str,
        path: impl Into<PathBuf>,
        id: Option<RecordId>,
    ) -> &mut Self {
        self.bind(PendingOperation::Upload {
            layout: layout.to_string(),
            field: field.to_string(),
            path: path.into(),
            id,
        })
    }

    /// Save container contents as `{output_dir}/{id}.{ext}`.
    pub fn download(
        &mut self,
        layout: &str,
        field: &str,
        output_dir: impl Into<PathBuf>,
        id: Option<RecordId>,
    ) -> &mut Self {
        self.bind(PendingOperation::Download {
            layout: layout.to_string(),
            field: field.to_string(),
            output_dir: output_dir.into(),
            id,
        })
    }

    // ========================================================================
    // Immediate operations
    // ========================================================================

    /// Create a record and return its id.
    ///
    /// With auto-id enabled, a UUID is added as `id` when the fields lack one.
    pub async fn create(&mut self, layout: &str, mut fields: FieldData) -> Result<RecordId> {
        if self.auto_id && !fields.contains(ID_FIELD) {
            fields.insert(ID_FIELD, Uuid::new_v4().to_string());
        }
        self.bind(PendingOperation::Create {
            layout: layout.to_string(),
            fields,
        });
        self.exec().await?.into_created()
    }

    /// Set global field values for the session.
    pub async fn globals(&mut self, layout: &str, fields: FieldData) -> Result<()> {
        self.bind(PendingOperation::Globals {
            layout: layout.to_string(),
            fields,
        });
        self.exec().await.map(|_| ())
    }

    /// Field names of a layout.
    ///
    /// Creates a throwaway record, reads it back and deletes it. The result is
    /// cached for the lifetime of the repository. The query and operation
    /// being built are set aside and restored afterwards.
    #[instrument(skip(self))]
    pub async fn fields(&mut self, layout: &str) -> Result<Vec<String>> {
        if let Some(names) = self.field_cache.get(layout) {
            return Ok(names.clone());
        }

        let saved = self.set_aside();
        let result = self.read_field_names(layout).await;
        self.restore(saved);

        let names = result?;
        self.field_cache.insert(layout.to_string(), names.clone());
        Ok(names)
    }

    async fn read_field_names(&mut self, layout: &str) -> Result<Vec<String>> {
        let id = self.create(layout, FieldData::empty()).await?;
        let record = self.record(layout, id).first().await?;
        self.delete(layout, Some(id)).exec().await?;
        Ok(record.map(|r| r.field_names()).unwrap_or_default())
    }

    /// Layout metadata, cached per layout.
    ///
    /// Like [`fields`](Self::fields), this leaves the query and operation
    /// being built in place.
    pub async fn layout_metadata(&mut self, layout: &str) -> Result<LayoutMetadata> {
        if let Some(metadata) = self.layout_cache.get(layout) {
            return Ok(metadata.clone());
        }

        let saved = self.set_aside();
        let result = self.metadata(layout).exec().await;
        self.restore(saved);

        result?.into_layout()
    }

    fn set_aside(&mut self) -> (Query, Option<PendingOperation>) {
        (std::mem::take(&mut self.query), self.pending.take())
    }

    fn restore(&mut self, (query, pending): (Query, Option<PendingOperation>)) {
        self.query = query;
        self.pending = pending;
    }

    /// A value list defined on a layout.
    pub async fn value_list(&mut self, layout: &str, name: &str) -> Result<ValueList> {
        let metadata = self.layout_metadata(layout).await?;
        metadata.value_list(name).cloned().ok_or_else(|| {
            InvalidInputError::NotOnLayout {
                layout: layout.to_string(),
                what: "value list",
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Metadata of one field on a layout.
    pub async fn field_meta(&mut self, layout: &str, field: &str) -> Result<FieldMeta> {
        let metadata = self.layout_metadata(layout).await?;
        metadata.field(field).cloned().ok_or_else(|| {
            InvalidInputError::NotOnLayout {
                layout: layout.to_string(),
                what: "field",
                name: field.to_string(),
            }
            .into()
        })
    }

    /// Give up the session; see [`SessionManager::release`].
    pub async fn logout(&mut self) {
        self.session.release().await;
    }

    /// Open a new session regardless of any cached token.
    pub async fn refresh_token(&mut self) -> Result<()> {
        self.session.acquire(true).await.map(|_| ())
    }

    /// Newest record by `field` (default `created_at`).
    pub async fn latest(&mut self, layout: &str, field: Option<&str>) -> Result<Option<Record>> {
        self.records(layout)
            .sort_desc(field.unwrap_or(CREATED_AT))
            .limit(1)
            .first()
            .await
    }

    /// Oldest record by `field` (default `created_at`).
    pub async fn oldest(&mut self, layout: &str, field: Option<&str>) -> Result<Option<Record>> {
        self.records(layout)
            .sort_asc(field.unwrap_or(CREATED_AT))
            .limit(1)
            .first()
            .await
    }

    /// Most recently modified record by `updated_at`.
    pub async fn last_update(&mut self, layout: &str) -> Result<Option<Record>> {
        self.records(layout)
            .sort_desc(UPDATED_AT)
            .limit(1)
            .first()
            .await
    }

    // ========================================================================
    // Executors
    // ========================================================================

    /// Run the pending operation.
    ///
    /// A rejected or expired token is replaced and the operation retried once
    /// with the same query.
    pub async fn exec(&mut self) -> Result<Outcome> {
        let mut query = std::mem::take(&mut self.query);
        let operation = self
            .pending
            .take()
            .ok_or(InvalidInputError::NoPendingOperation)?;
        query.apply_guards();

        match self.run(&operation, &query).await {
            Err(e) if e.is_auth_failure() => {
                warn!(
                    error = %e,
                    operation = operation.name(),
                    "session token rejected, retrying with a new session"
                );
                self.session.invalidate().await;
                self.session.acquire(true).await?;
                self.run(&operation, &query).await
            }
            result => result,
        }
    }

    /// Run the pending operation and return its records.
    pub async fn get(&mut self) -> Result<RecordSet> {
        self.exec().await?.into_records()
    }

    pub async fn first(&mut self) -> Result<Option<Record>> {
        self.exec().await?.first()
    }

    pub async fn last(&mut self) -> Result<Option<Record>> {
        Ok(self.get().await?.into_iter().last())
    }

    // ========================================================================
    // Operation runners
    // ========================================================================

    #[instrument(skip(self, operation, query), fields(op = operation.name(), layout = operation.layout()))]
    async fn run(&mut self, operation: &PendingOperation, query: &Query) -> Result<Outcome> {
        let token = self.session.acquire(false).await?;
        debug!("running operation");

        match operation {
            PendingOperation::Records { layout, id } => {
                let params = query.to_query_params();
                let payload = params_payload(&params);
                let body = self
                    .client
                    .send(
                        Method::GET,
                        &endpoint::records(layout, *id),
                        &token,
                        &params,
                        None,
                    )
                    .await?;
                let records =
                    response::read_record_set(&body, &payload, query.includes_portals())?;
                Ok(Outcome::Records(records))
            }

            PendingOperation::Find { layout } => {
                let records = self.find_records(layout, query, &token).await?;
                Ok(Outcome::Records(records))
            }

            PendingOperation::Metadata { layout } => {
                let body = self
                    .client
                    .send(Method::GET, &endpoint::layout(layout), &token, &[], None)
                    .await?;
                response::check_status(&body, &Value::Null)?;
                let metadata = LayoutMetadata::from_body(&body)?;
                self.layout_cache.insert(layout.clone(), metadata.clone());
                Ok(Outcome::Layout(metadata))
            }

            PendingOperation::Create { layout, fields } => {
                let payload = endpoint::field_data_body(fields, &query.script_params());
                let body = self
                    .client
                    .send(
                        Method::POST,
                        &endpoint::records(layout, None),
                        &token,
                        &[],
                        Some(&payload),
                    )
                    .await?;
                response::check_status(&body, &payload)?;
                Ok(Outcome::Created(response::created_record_id(&body)?))
            }

            PendingOperation::Globals { layout, fields } => {
                let payload = endpoint::globals_body(layout, fields);
                let body = self
                    .client
                    .send(Method::PATCH, &endpoint::globals(), &token, &[], Some(&payload))
                    .await?;
                response::check_status(&body, &payload)?;
                Ok(Outcome::Done)
            }

            PendingOperation::Update { layout, fields, id } => {
                let ids = self.target_ids(layout, *id, query, &token).await?;
                let payload = endpoint::field_data_body(fields, &query.script_params());
                for id in &ids {
                    let body = self
                        .client
                        .send(
                            Method::PATCH,
                            &endpoint::records(layout, Some(*id)),
                            &token,
                            &[],
                            Some(&payload),
                        )
                        .await?;
                    response::check_status(&body, &payload)?;
                }
                Ok(Outcome::Affected(ids.len()))
            }

            PendingOperation::Delete { layout, id } => {
                let ids = self.target_ids(layout, *id, query, &token).await?;
                let params = query.script_params();
                let payload = params_payload(&params);
                for id in &ids {
                    let body = self
                        .client
                        .send(
                            Method::DELETE,
                            &endpoint::records(layout, Some(*id)),
                            &token,
                            &params,
                            None,
                        )
                        .await?;
                    response::check_status(&body, &payload)?;
                }
                Ok(Outcome::Affected(ids.len()))
            }

            PendingOperation::Upload {
                layout,
                field,
                path,
                id,
            } => {
                let ids = self.target_ids(layout, *id, query, &token).await?;
                let payload = json!({ "field": field, "file": path.display().to_string() });
                for id in &ids {
                    let body = self
                        .client
                        .upload(&endpoint::container(layout, *id, field), &token, path)
                        .await?;
                    response::check_status(&body, &payload)?;
                }
                Ok(Outcome::Affected(ids.len()))
            }

            PendingOperation::Download {
                layout,
                field,
                output_dir,
                id,
            } => {
                let records = match id {
                    Some(id) => {
                        let body = self
                            .client
                            .send(
                                Method::GET,
                                &endpoint::records(layout, Some(*id)),
                                &token,
                                &[],
                                None,
                            )
                            .await?;
                        response::read_record_set(&body, &Value::Null, false)?
                    }
                    None => self.find_records(layout, query, &token).await?,
                };
                let written = self
                    .save_containers(&records, field, output_dir, &token)
                    .await?;
                Ok(Outcome::Downloaded(written))
            }
        }
    }

    async fn find_records(
        &self,
        layout: &str,
        query: &Query,
        token: &AccessToken,
    ) -> Result<RecordSet> {
        let payload = query.to_find_body();
        let body = self
            .client
            .send(
                Method::POST,
                &endpoint::find(layout),
                token,
                &[],
                Some(&payload),
            )
            .await?;
        response::read_record_set(&body, &payload, query.includes_portals())
    }

    /// The explicit id, or the ids of every record the query finds.
    async fn target_ids(
        &self,
        layout: &str,
        id: Option<RecordId>,
        query: &Query,
        token: &AccessToken,
    ) -> Result<Vec<RecordId>> {
        match id {
            Some(id) => Ok(vec![id]),
            None => Ok(self.find_records(layout, query, token).await?.keys()),
        }
    }

    async fn save_containers(
        &self,
        records: &RecordSet,
        field: &str,
        output_dir: &Path,
        token: &AccessToken,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Error::io(output_dir, e))?;

        let downloader = self.client.downloader()?;
        let mut written = Vec::new();

        for record in records {
            let Some(url) = record.text(field).filter(|u| !u.is_empty()) else {
                debug!(record = %record.id, field, "container empty, skipping");
                continue;
            };

            let target = output_dir.join(container_file_name(record, &url));

            let bytes = downloader.fetch(&url, token).await?;
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|e| Error::io(&target, e))?;
            debug!(path = %target.display(), "container saved");
            written.push(target);
        }

        Ok(written)
    }
}

/// Query-string parameters as a JSON object, for error diagnostics.
fn params_payload(params: &[(String, String)]) -> Value {
    let map: Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

/// File name for a downloaded container: the record's `id` field, or the
/// record id when that is empty or not a plain file name.
fn container_file_name(record: &Record, url: &str) -> String {
    let stem = record
        .text(ID_FIELD)
        .filter(|s| is_plain_file_name(s))
        .unwrap_or_else(|| record.id.to_string());
    match container_extension(url) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// A single normal path component with no separators of either platform.
fn is_plain_file_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// File extension of a container URL's path.
fn container_extension(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Path::new(parsed.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
}
