//! deploysync: push a freshly built image into a GitOps manifest repository.
//!
//! # Usage
//!
//! ```text
//! deploysync deploy [--dry-run] [--json] [settings...]
//! deploysync diff [settings...]
//! deploysync resolve [--registry-host ..] [--project-path ..] [--commit-id ..]
//! ```
//!
//! Every setting has an environment fallback (`REGISTRY_HOST`, `COMMIT_ID`,
//! ...). The write credential is read from `CREDENTIAL` only.
//!
//! Exit codes: 0 success or no-op, 1 configuration/authentication/network,
//! 2 conflict retries exhausted, 3 timeout, 4 validation.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{deploy::DeployArgs, diff::DiffArgs, resolve::ResolveArgs};
use deploysync_core::{ConfigError, ErrorKind};
use deploysync_git::SyncError;
use deploysync_manifest::PatchError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "deploysync",
    version,
    about = "Synchronize a built container image into a GitOps manifest repository",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Patch the manifest, commit, and push (retrying on concurrent updates).
    Deploy(DeployArgs),

    /// Show the unified diff a deploy would commit, without pushing.
    Diff(DiffArgs),

    /// Print the image reference for the current build.
    Resolve(ResolveArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ErrorKind::Configuration.exit_code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.log_json);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = error_kind(&err);
            tracing::debug!(kind = %kind, exit_code = kind.exit_code(), "run failed");
            eprintln!("error [{kind}]: {err:#}");
            ExitCode::from(kind.exit_code())
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Deploy(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Resolve(args) => args.run(),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Find the first typed error in the chain; anything untyped is a configuration failure.
fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| {
            if let Some(e) = cause.downcast_ref::<SyncError>() {
                Some(e.kind())
            } else if let Some(e) = cause.downcast_ref::<PatchError>() {
                Some(e.kind())
            } else {
                cause.downcast_ref::<ConfigError>().map(ConfigError::kind)
            }
        })
        .unwrap_or(ErrorKind::Configuration)
}
