//! Read-only commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fluentfm_http::Repository;

use super::{QueryArgs, parse_id};
use crate::output;

#[derive(Args, Debug)]
pub struct LayoutArgs {
    /// Layout name
    pub layout: String,
}

#[derive(Args, Debug)]
pub struct RecordsArgs {
    /// Layout name
    pub layout: String,

    /// Read a single record
    #[arg(long)]
    pub id: Option<u64>,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn records(repo: &mut Repository, args: RecordsArgs) -> Result<()> {
    args.query.apply(repo)?;
    match parse_id(args.id) {
        Some(id) => repo.record(&args.layout, id),
        None => repo.records(&args.layout),
    };

    let records = repo.get().await.context("Failed to read records")?;
    output::records(&records, args.pretty)
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Layout name
    pub layout: String,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn find(repo: &mut Repository, args: FindArgs) -> Result<()> {
    args.query.apply(repo)?;
    let records = repo
        .find(&args.layout)
        .get()
        .await
        .context("Failed to find records")?;
    output::records(&records, args.pretty)
}

#[derive(Args, Debug)]
pub struct LatestArgs {
    /// Layout name
    pub layout: String,

    /// Timestamp field (defaults to created_at)
    #[arg(long)]
    pub by: Option<String>,

    /// Oldest instead of newest
    #[arg(long, conflicts_with = "updated")]
    pub oldest: bool,

    /// Most recently updated, by updated_at
    #[arg(long, conflicts_with = "by")]
    pub updated: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn latest(repo: &mut Repository, args: LatestArgs) -> Result<()> {
    let result = if args.updated {
        repo.last_update(&args.layout).await
    } else if args.oldest {
        repo.oldest(&args.layout, args.by.as_deref()).await
    } else {
        repo.latest(&args.layout, args.by.as_deref()).await
    };
    let record = result.context("Failed to read records")?;

    match record {
        Some(record) => output::record(&record, args.pretty),
        None => {
            eprintln!("{}", "No records found.".dimmed());
            Ok(())
        }
    }
}

pub async fn fields(repo: &mut Repository, args: LayoutArgs) -> Result<()> {
    let names = repo
        .fields(&args.layout)
        .await
        .context("Failed to read layout fields")?;
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct MetadataArgs {
    /// Layout name
    pub layout: String,

    /// Show a single field
    #[arg(long)]
    pub field: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

pub async fn metadata(repo: &mut Repository, args: MetadataArgs) -> Result<()> {
    match &args.field {
        Some(field) => {
            let meta = repo
                .field_meta(&args.layout, field)
                .await
                .context("Failed to read field metadata")?;
            output::json(&meta, args.pretty)
        }
        None => {
            let layout = repo
                .layout_metadata(&args.layout)
                .await
                .context("Failed to read layout metadata")?;
            output::json(&layout, args.pretty)
        }
    }
}

#[derive(Args, Debug)]
pub struct ValueListArgs {
    /// Layout name
    pub layout: String,

    /// Value list name
    pub name: String,
}

pub async fn value_list(repo: &mut Repository, args: ValueListArgs) -> Result<()> {
    let list = repo
        .value_list(&args.layout, &args.name)
        .await
        .context("Failed to read value list")?;
    for (display, value) in list.entries() {
        output::field(&display, &value);
    }
    Ok(())
}
