//! fedistash - incremental Mastodon account archiver.
//!
//! This is a thin wrapper over the fedistash library crates: argument
//! parsing, logging setup, and exit-code mapping live here; everything else
//! is in `fedistash-core`, `fedistash-store`, and `fedistash-api`.

mod cancel;
mod cli;
mod commands;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fedistash_core::{ArchiveError, Error};

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.json_logs);

    match commands::handle(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            output::error(&format!("{:#}", err));
            exit_code_for(&err)
        }
    }
}

/// Map failures to the documented exit codes: 2 for a missing archive,
/// 1 for everything else. (3, nothing to do, is a success path and returned
/// by the commands themselves.)
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(Error::Archive(ArchiveError::Missing { .. })) = cause.downcast_ref::<Error>() {
            return ExitCode::from(2);
        }
    }
    ExitCode::FAILURE
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}
