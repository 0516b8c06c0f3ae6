//! `deploysync diff`: show what a deploy would commit.

use anyhow::{Context, Result};
use clap::Args;

use deploysync_git::{RunMode, Synchronizer};

use super::{block_on, TargetArgs};

/// Arguments for `deploysync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = self.target.sync_config()?;
        let manifest = config.target.manifest_path.display().to_string();

        let report = block_on(Synchronizer::new(config).run(RunMode::DryRun))?
            .with_context(|| format!("diff failed for {manifest}"))?;

        let diff = report.diff.unwrap_or_default();
        if diff.is_empty() {
            println!("No differences for {manifest}.");
            return Ok(());
        }
        print!("{diff}");
        if !diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
