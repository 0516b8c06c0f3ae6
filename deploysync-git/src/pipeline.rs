//! Run pipeline shared by `deploysync deploy` and `deploysync diff`.
//!
//! States: `Resolving → SessionAcquired → Patched{NoOp|Changed} →
//! [Committed → Pushed] → Done`, or `Failed(reason)`. Each transition is
//! logged at `info` with a `state` field.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use deploysync_core::{CommitAttempt, SyncConfig};
use deploysync_manifest::unified_diff;

use crate::coordinator::{CommitCoordinator, Delivery};
use crate::error::SyncError;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;

/// Whether a run may touch the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Apply,
    /// Compute the patch and diff; never commit or push.
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    NoOp,
    Deployed,
    DryRun,
}

/// Summary of one synchronizer run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub image: String,
    pub previous_image: String,
    pub repository: String,
    pub branch: String,
    pub manifest: String,
    pub selector: String,
    /// Pushed commit, or the untouched tip for no-op and dry runs.
    pub revision: String,
    pub attempts: Vec<CommitAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Number of commits this run added to the remote branch.
    pub fn commits_created(&self) -> usize {
        usize::from(self.outcome == RunOutcome::Deployed)
    }
}

/// Drives one run against a validated [`SyncConfig`].
pub struct Synchronizer {
    config: SyncConfig,
    sessions: SessionManager,
}

impl Synchronizer {
    pub fn new(config: SyncConfig) -> Self {
        let sessions = SessionManager::from_config(&config);
        Self { config, sessions }
    }

    /// Replace the network retry policy used for clone and push.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.sessions = self.sessions.with_retry_policy(retry);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunReport, SyncError> {
        let result = self.run_inner(mode).await;
        if let Err(e) = &result {
            error!(state = "Failed", kind = %e.kind(), error = %e, "synchronizer run failed");
        }
        result
    }

    async fn run_inner(&self, mode: RunMode) -> Result<RunReport, SyncError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let target = &self.config.target;
        let repository = &self.config.repository;

        info!(
            state = "Resolving",
            image = %target.image,
            repo = %repository.remote_url,
            branch = %repository.branch,
            manifest = %target.manifest_path.display(),
            selector = %target.selector,
            dry_run = mode == RunMode::DryRun,
            "starting run"
        );

        let coordinator =
            CommitCoordinator::new(&self.sessions, target, self.config.max_conflict_attempts);
        let session = self.sessions.acquire().await?;
        let patched = coordinator.patch_session(&session)?;
        info!(
            state = "Patched",
            changed = patched.changed,
            previous = %patched.previous_image,
            "manifest patched"
        );

        let report = |outcome: RunOutcome,
                      revision: String,
                      previous_image: String,
                      attempts: Vec<CommitAttempt>,
                      diff: Option<String>| RunReport {
            outcome,
            image: target.image.to_string(),
            previous_image,
            repository: repository.remote_url.clone(),
            branch: repository.branch.clone(),
            manifest: target.manifest_path.display().to_string(),
            selector: target.selector.to_string(),
            revision,
            attempts,
            diff,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        };

        if mode == RunMode::DryRun {
            let diff = unified_diff(
                &target.manifest_path,
                &session.read_manifest(&target.manifest_path)?,
                &patched.new_content,
            );
            let revision = session.base_revision().to_owned();
            session.discard()?;
            info!(state = "Done", changed = patched.changed, "dry run complete, remote untouched");
            return Ok(report(
                RunOutcome::DryRun,
                revision,
                patched.previous_image,
                Vec::new(),
                Some(diff),
            ));
        }

        let delivered = coordinator.deliver(session, patched).await?;
        let (outcome, revision) = match delivered.delivery {
            Delivery::NoOp { revision } => (RunOutcome::NoOp, revision),
            Delivery::Committed { revision } => (RunOutcome::Deployed, revision),
        };
        info!(state = "Done", outcome = ?outcome, revision = %revision, "run complete");
        Ok(report(
            outcome,
            revision,
            delivered.previous_image,
            delivered.attempts,
            None,
        ))
    }
}
