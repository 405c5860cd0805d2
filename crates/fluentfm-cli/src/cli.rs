//! CLI argument definitions.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser};

use fluentfm_core::ConnectionConfig;

use crate::commands::Commands;

/// Query and edit FileMaker databases over the Data API.
#[derive(Parser, Debug)]
#[command(name = "fluentfm")]
#[command(author, version = env!("FLUENTFM_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Server, database and account selection.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// FileMaker Server host or base URL
    #[arg(long, env = "FM_HOST", global = true)]
    pub host: Option<String>,

    /// Database (file) name
    #[arg(long, env = "FM_FILE", global = true)]
    pub file: Option<String>,

    /// Account name
    #[arg(long, env = "FM_USER", global = true)]
    pub user: Option<String>,

    /// Account password
    #[arg(long, env = "FM_PASS", global = true, hide_env_values = true)]
    pub pass: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "FM_TIMEOUT_SECS", global = true)]
    pub timeout: Option<u64>,

    /// Do not add a generated `id` to created records
    #[arg(long, global = true)]
    pub no_auto_id: bool,

    /// Suffix the token cache key with a hash of the credentials
    #[arg(long, global = true)]
    pub salt_cache_key: bool,

    /// Do not keep session tokens between runs
    #[arg(long, global = true)]
    pub no_token_cache: bool,

    /// Token cache file (defaults to the user data directory)
    #[arg(long, env = "FLUENTFM_TOKEN_CACHE", global = true)]
    pub token_cache: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn to_config(&self) -> Result<ConnectionConfig> {
        let host = required(&self.host, "--host", "FM_HOST")?;
        let file = required(&self.file, "--file", "FM_FILE")?;
        let user = required(&self.user, "--user", "FM_USER")?;
        let pass = required(&self.pass, "--pass", "FM_PASS")?;

        let mut config = ConnectionConfig::new(host, file, user, pass)
            .context("Invalid connection settings")?
            .with_auto_id(!self.no_auto_id)
            .with_salted_cache_key(self.salt_cache_key);
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn required<'a>(value: &'a Option<String>, flag: &str, var: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("Missing {} (or {})", flag, var))
}
