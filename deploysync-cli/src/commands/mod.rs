//! Subcommand implementations and the settings they share.

pub mod deploy;
pub mod diff;
pub mod resolve;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use deploysync_core::{config::Settings, SyncConfig};

/// Environment variable carrying the write credential. Never a flag, never a file.
const CREDENTIAL_ENV: &str = "CREDENTIAL";

/// Image coordinates, shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub struct ImageArgs {
    /// Registry host, optionally with a port.
    #[arg(long, env = "REGISTRY_HOST")]
    pub registry_host: Option<String>,

    /// Repository path inside the registry.
    #[arg(long, env = "PROJECT_PATH")]
    pub project_path: Option<String>,

    /// Build commit identifier (7-40 lowercase hex characters).
    #[arg(long, env = "COMMIT_ID")]
    pub commit_id: Option<String>,

    /// YAML file with defaults for any non-secret setting.
    #[arg(long = "config", env = "DEPLOYSYNC_CONFIG", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

/// Manifest repository and run tuning, for `deploy` and `diff`.
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Manifest repository URL. Must not embed credentials.
    #[arg(long, env = "MANIFEST_REPO_URL")]
    pub manifest_repo_url: Option<String>,

    /// Branch to update [default: main].
    #[arg(long, env = "MANIFEST_BRANCH")]
    pub manifest_branch: Option<String>,

    /// Manifest path relative to the repository root.
    #[arg(long, env = "MANIFEST_FILE_PATH")]
    pub manifest_file_path: Option<String>,

    /// Container to update, as `[<workload>/]<container>`.
    #[arg(long, env = "CONTAINER_SELECTOR")]
    pub container_selector: Option<String>,

    /// Username paired with CREDENTIAL [default: x-access-token].
    #[arg(long, env = "CREDENTIAL_USERNAME")]
    pub credential_username: Option<String>,

    #[arg(long, env = "COMMIT_AUTHOR_NAME")]
    pub commit_author_name: Option<String>,

    #[arg(long, env = "COMMIT_AUTHOR_EMAIL")]
    pub commit_author_email: Option<String>,

    /// Per-attempt deadline for git operations, in seconds [default: 120].
    #[arg(long, env = "GIT_TIMEOUT_SECS")]
    pub git_timeout_secs: Option<u64>,

    /// Total commit attempts when the branch moves underneath us [default: 3].
    #[arg(long, env = "MAX_CONFLICT_RETRIES")]
    pub max_conflict_retries: Option<u32>,

    /// Total clone/push attempts on transient network failures [default: 3].
    #[arg(long, env = "MAX_NETWORK_RETRIES")]
    pub max_network_retries: Option<u32>,
}

impl ImageArgs {
    fn explicit(&self) -> Settings {
        Settings {
            registry_host: self.registry_host.clone(),
            project_path: self.project_path.clone(),
            commit_id: self.commit_id.clone(),
            ..Settings::default()
        }
    }

    /// Layer flags and environment over the config file, if any.
    pub fn layered(&self, explicit: Settings) -> Result<Settings> {
        match &self.config_file {
            Some(path) => {
                let file = Settings::load_file(path)
                    .with_context(|| format!("failed to load config file {}", path.display()))?;
                Ok(explicit.or(file))
            }
            None => Ok(explicit),
        }
    }

    pub fn settings(&self) -> Result<Settings> {
        self.layered(self.explicit())
    }
}

impl TargetArgs {
    fn explicit(&self) -> Settings {
        Settings {
            manifest_repo_url: self.manifest_repo_url.clone(),
            manifest_branch: self.manifest_branch.clone(),
            manifest_file_path: self.manifest_file_path.clone(),
            container_selector: self.container_selector.clone(),
            credential_username: self.credential_username.clone(),
            commit_author_name: self.commit_author_name.clone(),
            commit_author_email: self.commit_author_email.clone(),
            git_timeout_secs: self.git_timeout_secs,
            max_conflict_retries: self.max_conflict_retries,
            max_network_retries: self.max_network_retries,
            ..self.image.explicit()
        }
    }

    /// Merge every layer and validate, picking up CREDENTIAL from the environment.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let settings = self.image.layered(self.explicit())?;
        let credential = std::env::var(CREDENTIAL_ENV).ok();
        SyncConfig::from_settings(settings, credential).context("invalid configuration")
    }
}

/// Drive `future` to completion on a single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
