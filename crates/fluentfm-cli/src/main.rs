//! fluentfm - CLI tool for FileMaker databases.
//!
//! A thin wrapper over the `fluentfm-http` repository for querying and
//! editing records from the shell.

mod cli;
mod commands;
mod output;
mod token_store;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    if let Err(e) = commands::handle(cli.connection, cli.command).await {
        output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries record output
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
