//! Commands that change records.

use anyhow::{Context, Result};
use clap::Args;

use fluentfm_http::Repository;

use super::{QueryArgs, parse_field_data, parse_id};
use crate::output;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Layout name
    pub layout: String,

    /// Field data as a JSON object
    #[arg(long)]
    pub data: String,

    /// Script to run after the record is created
    #[arg(long)]
    pub script: Option<String>,

    /// Parameter for --script
    #[arg(long, requires = "script")]
    pub script_param: Option<String>,
}

pub async fn create(repo: &mut Repository, args: CreateArgs) -> Result<()> {
    let fields = parse_field_data(&args.data)?;
    if let Some(name) = &args.script {
        repo.script(name, args.script_param.as_deref());
    }

    let id = repo
        .create(&args.layout, fields)
        .await
        .context("Failed to create record")?;

    output::field("recordId", &id.to_string());
    Ok(())
}

/// Target record by id or by find conditions.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Layout name
    pub layout: String,

    /// Record id; without it every record matching the conditions is targeted
    #[arg(long)]
    pub id: Option<u64>,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Field data as a JSON object
    #[arg(long)]
    pub data: String,
}

pub async fn update(repo: &mut Repository, args: UpdateArgs) -> Result<()> {
    let fields = parse_field_data(&args.data)?;
    let target = args.target;

    target.query.apply(repo)?;
    let affected = repo
        .update(&target.layout, fields, parse_id(target.id))
        .exec()
        .await
        .and_then(|o| o.into_affected())
        .context("Failed to update records")?;

    report(affected, "updated");
    Ok(())
}

pub async fn delete(repo: &mut Repository, args: TargetArgs) -> Result<()> {
    args.query.apply(repo)?;
    let affected = repo
        .delete(&args.layout, parse_id(args.id))
        .exec()
        .await
        .and_then(|o| o.into_affected())
        .context("Failed to delete records")?;

    report(affected, "deleted");
    Ok(())
}

pub async fn soft_delete(repo: &mut Repository, args: TargetArgs) -> Result<()> {
    args.query.apply(repo)?;
    let affected = repo
        .soft_delete(&args.layout, parse_id(args.id))
        .exec()
        .await
        .and_then(|o| o.into_affected())
        .context("Failed to soft-delete records")?;

    report(affected, "soft-deleted");
    Ok(())
}

pub async fn undelete(repo: &mut Repository, args: TargetArgs) -> Result<()> {
    args.query.apply(repo)?;
    let affected = repo
        .undelete(&args.layout, parse_id(args.id))
        .exec()
        .await
        .and_then(|o| o.into_affected())
        .context("Failed to restore records")?;

    report(affected, "restored");
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalsArgs {
    /// Layout the global fields belong to
    pub layout: String,

    /// Global field values as a JSON object
    #[arg(long)]
    pub data: String,
}

pub async fn globals(repo: &mut Repository, args: GlobalsArgs) -> Result<()> {
    let fields = parse_field_data(&args.data)?;
    repo.globals(&args.layout, fields)
        .await
        .context("Failed to set global fields")?;

    output::success("Global fields set");
    Ok(())
}

fn report(affected: usize, verb: &str) {
    output::success(&format!(
        "{} record{} {}",
        affected,
        if affected == 1 { "" } else { "s" },
        verb
    ));
}
