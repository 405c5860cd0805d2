//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use fluentfm_core::{Record, RecordSet};

/// Print a success message to stderr.
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as compact or pretty JSON.
pub fn json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

/// Print one record as `{"recordId": .., "data": ..}`.
pub fn record(record: &Record, pretty: bool) -> Result<()> {
    json(&json!({ "recordId": record.id, "data": record }), pretty)
}

/// Print a record set, one record per line.
pub fn records(records: &RecordSet, pretty: bool) -> Result<()> {
    if records.is_empty() {
        eprintln!("{}", "No records found.".dimmed());
        return Ok(());
    }
    for r in records {
        record(r, pretty)?;
    }
    Ok(())
}
