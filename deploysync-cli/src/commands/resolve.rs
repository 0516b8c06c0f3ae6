//! `deploysync resolve`: print the image reference for this build.

use anyhow::{Context, Result};
use clap::Args;

use deploysync_core::config::resolve_image;

use super::ImageArgs;

/// Arguments for `deploysync resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub image: ImageArgs,
}

impl ResolveArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.image.settings()?;
        let image = resolve_image(&settings).context("cannot resolve image reference")?;
        println!("{image}");
        Ok(())
    }
}
