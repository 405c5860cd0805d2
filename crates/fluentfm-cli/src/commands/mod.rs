//! Subcommand implementations.

mod container;
mod read;
mod session;
mod write;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use tracing::debug;

use fluentfm_core::{FieldData, NoopCache, Predicate, RecordId, TokenCache};
use fluentfm_http::Repository;

use crate::cli::ConnectionArgs;
use crate::token_store::FileTokenCache;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List records of a layout, or read one by id
    Records(read::RecordsArgs),

    /// Find records matching conditions
    Find(read::FindArgs),

    /// Newest, oldest or most recently updated record
    Latest(read::LatestArgs),

    /// Field names of a layout
    Fields(read::LayoutArgs),

    /// Layout metadata, or one field's metadata
    Metadata(read::MetadataArgs),

    /// Entries of a value list defined on a layout
    ValueList(read::ValueListArgs),

    /// Create a record
    Create(write::CreateArgs),

    /// Edit a record, or every record matching conditions
    Update(write::UpdateArgs),

    /// Delete a record, or every record matching conditions
    Delete(write::TargetArgs),

    /// Stamp deleted_at on records
    SoftDelete(write::TargetArgs),

    /// Clear deleted_at on records
    Undelete(write::TargetArgs),

    /// Set global fields for the session
    Globals(write::GlobalsArgs),

    /// Upload a file into a container field
    Upload(container::UploadArgs),

    /// Save container field contents to a directory
    Download(container::DownloadArgs),

    /// Open a new session and cache its token
    RefreshToken,

    /// Give up the session
    Logout,
}

pub async fn handle(connection: ConnectionArgs, command: Commands) -> Result<()> {
    let (mut repo, file_cache) = connect(&connection).await?;

    match command {
        Commands::Records(args) => read::records(&mut repo, args).await,
        Commands::Find(args) => read::find(&mut repo, args).await,
        Commands::Latest(args) => read::latest(&mut repo, args).await,
        Commands::Fields(args) => read::fields(&mut repo, args).await,
        Commands::Metadata(args) => read::metadata(&mut repo, args).await,
        Commands::ValueList(args) => read::value_list(&mut repo, args).await,
        Commands::Create(args) => write::create(&mut repo, args).await,
        Commands::Update(args) => write::update(&mut repo, args).await,
        Commands::Delete(args) => write::delete(&mut repo, args).await,
        Commands::SoftDelete(args) => write::soft_delete(&mut repo, args).await,
        Commands::Undelete(args) => write::undelete(&mut repo, args).await,
        Commands::Globals(args) => write::globals(&mut repo, args).await,
        Commands::Upload(args) => container::upload(&mut repo, args).await,
        Commands::Download(args) => container::download(&mut repo, args).await,
        Commands::RefreshToken => session::refresh_token(&mut repo).await,
        Commands::Logout => session::logout(&mut repo, file_cache.as_deref()).await,
    }
}

async fn connect(connection: &ConnectionArgs) -> Result<(Repository, Option<Arc<FileTokenCache>>)> {
    let config = connection.to_config()?;

    let file_cache = if connection.no_token_cache {
        None
    } else {
        let path = match &connection.token_cache {
            Some(path) => path.clone(),
            None => FileTokenCache::default_path()?,
        };
        let cache = FileTokenCache::new(path);
        debug!(path = %cache.path().display(), "using token cache file");
        Some(Arc::new(cache))
    };
    let cache: Arc<dyn TokenCache> = match &file_cache {
        Some(cache) => cache.clone(),
        None => Arc::new(NoopCache),
    };

    let repo = Repository::connect_with_cache(config, cache)
        .await
        .context("Failed to open a Data API session")?;
    Ok((repo, file_cache))
}

// ============================================================================
// Shared arguments
// ============================================================================

/// Conditions, paging, sorting and script hooks.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Match FIELD exactly (FIELD=VALUE, repeatable)
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub where_is: Vec<String>,

    /// Match FIELD with a FileMaker criterion such as >30 or 1...9 (FIELD=CRITERION)
    #[arg(long = "match", value_name = "FIELD=CRITERION")]
    pub matches: Vec<String>,

    /// FIELD is not empty
    #[arg(long, value_name = "FIELD")]
    pub has: Vec<String>,

    /// FIELD is empty
    #[arg(long, value_name = "FIELD")]
    pub empty: Vec<String>,

    /// Maximum number of records
    #[arg(long)]
    pub limit: Option<u32>,

    /// Number of records to skip
    #[arg(long)]
    pub offset: Option<u32>,

    /// Sort field
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Include soft-deleted records
    #[arg(long)]
    pub with_deleted: bool,

    /// Include portal data
    #[arg(long)]
    pub portals: bool,

    /// Script to run after the request
    #[arg(long)]
    pub script: Option<String>,

    /// Parameter for --script
    #[arg(long, requires = "script")]
    pub script_param: Option<String>,

    /// Script to run before the request
    #[arg(long)]
    pub prerequest: Option<String>,

    /// Script to run before sorting
    #[arg(long)]
    pub presort: Option<String>,
}

impl QueryArgs {
    pub fn apply(&self, repo: &mut Repository) -> Result<()> {
        for pair in &self.where_is {
            let (field, value) = split_pair(pair)?;
            repo.where_is(field, value);
        }
        for pair in &self.matches {
            let (field, criterion) = split_pair(pair)?;
            let (op, value) = split_operator(criterion);
            repo.filter(field, Predicate::compare(op, value));
        }
        for field in &self.has {
            repo.has(field);
        }
        for field in &self.empty {
            repo.where_empty(field);
        }

        if let Some(limit) = self.limit {
            repo.limit(limit);
        }
        if let Some(offset) = self.offset {
            repo.offset(offset);
        }
        if let Some(field) = &self.sort {
            repo.sort(field, !self.desc);
        }
        if self.with_deleted {
            repo.with_deleted();
        }
        if self.portals {
            repo.with_portals();
        }

        if let Some(name) = &self.script {
            repo.script(name, self.script_param.as_deref());
        }
        if let Some(name) = &self.prerequest {
            repo.prerequest(name, None);
        }
        if let Some(name) = &self.presort {
            repo.presort(name, None);
        }

        Ok(())
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field, value)),
        _ => bail!("Expected FIELD=VALUE, got '{}'", pair),
    }
}

/// Split a leading comparison operator off a criterion.
fn split_operator(criterion: &str) -> (&str, &str) {
    let end = criterion
        .char_indices()
        .find(|(_, c)| !matches!(c, '<' | '>' | '=' | '≤' | '≥' | '≠' | '!' | '~'))
        .map(|(i, _)| i)
        .unwrap_or(criterion.len());
    criterion.split_at(end)
}

/// Parse a JSON object given on the command line.
pub fn parse_field_data(raw: &str) -> Result<FieldData> {
    let value: serde_json::Value = serde_json::from_str(raw).context("Field data is not valid JSON")?;
    FieldData::new(value).context("Invalid field data")
}

pub fn parse_id(raw: Option<u64>) -> Option<RecordId> {
    raw.map(RecordId::new)
}
