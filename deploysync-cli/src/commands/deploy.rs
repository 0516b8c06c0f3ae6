//! `deploysync deploy`: patch, commit, and push one image update.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use deploysync_git::{RunMode, RunOutcome, RunReport, Synchronizer};

use super::{block_on, TargetArgs};

/// Arguments for `deploysync deploy`.
#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Compute the patch and print the diff; never commit or push.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl DeployArgs {
    pub fn run(self) -> Result<()> {
        let synchronizer = Synchronizer::new(self.target.sync_config()?);
        let repository = synchronizer.config().repository.to_string();
        let mode = if self.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        };

        let report = block_on(synchronizer.run(mode))?
            .with_context(|| format!("deploy to {repository} failed"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
            return Ok(());
        }

        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let place = format!(
        "{} ({}) on {}@{}",
        report.manifest, report.selector, report.repository, report.branch
    );
    match report.outcome {
        RunOutcome::Deployed => {
            println!("{} deployed {} to {place}", "✓".green(), report.image);
            println!("  commit   {}", report.revision);
            println!("  previous {}", report.previous_image);
            if report.attempts.len() > 1 {
                println!("  attempts {}", report.attempts.len());
            }
        }
        RunOutcome::NoOp => {
            println!(
                "{} {} already deployed to {place}; nothing to commit",
                "✓".green(),
                report.image
            );
        }
        RunOutcome::DryRun => {
            let diff = report.diff.as_deref().unwrap_or_default();
            if diff.is_empty() {
                println!("[dry-run] {} already deployed to {place}", report.image);
                return;
            }
            println!(
                "[dry-run] would deploy {} to {place} (replacing {})",
                report.image, report.previous_image
            );
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
        }
    }
}
