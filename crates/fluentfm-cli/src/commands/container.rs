//! Container field transfer commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use fluentfm_http::Repository;

use super::{QueryArgs, parse_id};
use crate::output;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Layout name
    pub layout: String,

    /// Container field name
    pub field: String,

    /// Local file to upload
    pub path: PathBuf,

    /// Record id; without it every record matching the conditions receives the file
    #[arg(long)]
    pub id: Option<u64>,

    #[command(flatten)]
    pub query: QueryArgs,
}

pub async fn upload(repo: &mut Repository, args: UploadArgs) -> Result<()> {
    args.query.apply(repo)?;
    let affected = repo
        .upload(&args.layout, &args.field, &args.path, parse_id(args.id))
        .exec()
        .await
        .and_then(|o| o.into_affected())
        .with_context(|| format!("Failed to upload {}", args.path.display()))?;

    output::success(&format!(
        "Uploaded {} to {} record(s)",
        args.path.display(),
        affected
    ));
    Ok(())
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Layout name
    pub layout: String,

    /// Container field name
    pub field: String,

    /// Directory to save files in
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Record id; without it every record matching the conditions is downloaded
    #[arg(long)]
    pub id: Option<u64>,

    #[command(flatten)]
    pub query: QueryArgs,
}

pub async fn download(repo: &mut Repository, args: DownloadArgs) -> Result<()> {
    args.query.apply(repo)?;
    let written = repo
        .download(&args.layout, &args.field, &args.output, parse_id(args.id))
        .exec()
        .await
        .and_then(|o| o.into_downloaded())
        .context("Failed to download container data")?;

    for path in &written {
        println!("{}", path.display());
    }
    output::success(&format!("Downloaded {} file(s)", written.len()));
    Ok(())
}
