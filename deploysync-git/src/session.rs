//! Repository sessions: one fresh, authenticated working copy per acquisition.
//!
//! Nothing is reused. Every [`SessionManager::acquire`] clones into a new
//! temporary directory, and [`SessionManager::refresh`] discards the old
//! copy before cloning again. The directory is removed when the session is
//! discarded or dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use deploysync_core::{RepositoryTarget, SyncConfig};

use crate::error::{io_err, SyncError};
use crate::git::GitClient;
use crate::retry::{run_with_retry, RetryPolicy};

/// Result of a non-forced push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Accepted,
    /// The remote branch advanced past the session's base revision.
    Rejected { detail: String },
}

/// Acquires [`RepositorySession`]s for one repository and branch.
#[derive(Debug, Clone)]
pub struct SessionManager {
    repository: RepositoryTarget,
    git: GitClient,
    retry: RetryPolicy,
}

impl SessionManager {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            repository: config.repository.clone(),
            git: GitClient::new(
                config.git_timeout,
                config.credential.clone(),
                config.identity.clone(),
            ),
            retry: RetryPolicy::with_attempts(config.max_network_attempts),
        }
    }

    /// Replace the network retry policy (tests use millisecond backoff).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn repository(&self) -> &RepositoryTarget {
        &self.repository
    }

    /// Clone the branch into a fresh temporary directory.
    ///
    /// Transient network failures are retried with backoff; authentication,
    /// missing branch, and missing repository fail immediately.
    pub async fn acquire(&self) -> Result<RepositorySession, SyncError> {
        let session = run_with_retry("clone", &self.retry, || self.clone_once())
            .await
            .map_err(|e| self.exhausted(e))?;
        info!(
            state = "SessionAcquired",
            repo = %self.repository.remote_url,
            branch = %self.repository.branch,
            revision = %session.base_revision,
            "working copy ready"
        );
        Ok(session)
    }

    /// Discard `session` and acquire a fresh one at the current remote tip.
    pub async fn refresh(
        &self,
        session: RepositorySession,
    ) -> Result<RepositorySession, SyncError> {
        debug!(stale = %session.base_revision, "refreshing session");
        session.discard()?;
        self.acquire().await
    }

    async fn clone_once(&self) -> Result<RepositorySession, SyncError> {
        let workdir = tempfile::Builder::new()
            .prefix("deploysync-")
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        let target = workdir.path().to_string_lossy().into_owned();

        self.git
            .run(
                workdir.path(),
                [
                    "clone",
                    "--quiet",
                    "--single-branch",
                    "--no-tags",
                    "--branch",
                    self.repository.branch.as_str(),
                    "--",
                    self.repository.remote_url.as_str(),
                    target.as_str(),
                ],
            )
            .await
            .map_err(|f| f.into_sync_error("clone", &self.repository))?;

        let base_revision = self
            .git
            .run(workdir.path(), ["rev-parse", "HEAD"])
            .await
            .map_err(|f| f.into_sync_error("rev-parse", &self.repository))?
            .trim()
            .to_owned();

        Ok(RepositorySession {
            workdir,
            base_revision,
            repository: self.repository.clone(),
            git: self.git.clone(),
            retry: self.retry.clone(),
        })
    }

    fn exhausted(&self, err: SyncError) -> SyncError {
        exhausted(err, &self.repository, &self.retry)
    }
}

/// A network failure that left [`run_with_retry`] has used up the budget.
fn exhausted(err: SyncError, repository: &RepositoryTarget, retry: &RetryPolicy) -> SyncError {
    match err {
        SyncError::NetworkFailure { detail, .. } => SyncError::RepositoryUnavailable {
            repository: repository.to_string(),
            attempts: retry.attempts(),
            detail,
        },
        other => other,
    }
}

/// A working copy owned by exactly one run.
///
/// Holds the credential in memory only, through its git client.
#[derive(Debug)]
pub struct RepositorySession {
    workdir: TempDir,
    base_revision: String,
    repository: RepositoryTarget,
    git: GitClient,
    retry: RetryPolicy,
}

impl RepositorySession {
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Remote branch tip at acquisition time.
    pub fn base_revision(&self) -> &str {
        &self.base_revision
    }

    pub fn repository(&self) -> &RepositoryTarget {
        &self.repository
    }

    pub(crate) fn manifest_path(&self, relative: &Path) -> PathBuf {
        self.workdir.path().join(relative)
    }

    /// Read a manifest, relative to the repository root.
    pub fn read_manifest(&self, relative: &Path) -> Result<String, SyncError> {
        let path = self.manifest_path(relative);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SyncError::ManifestNotFound {
                    path: relative.to_path_buf(),
                    repository: self.repository.to_string(),
                })
            }
            Err(e) => Err(io_err(path, e)),
        }
    }

    /// Stage `relative` and commit it; returns the new revision.
    pub(crate) async fn commit(
        &self,
        relative: &Path,
        title: &str,
        body: &str,
    ) -> Result<String, SyncError> {
        let file = relative.to_string_lossy().into_owned();
        self.local(["add", "--", file.as_str()], "add").await?;
        self.local(
            ["commit", "--quiet", "--no-verify", "-m", title, "-m", body],
            "commit",
        )
        .await?;
        Ok(self.local(["rev-parse", "HEAD"], "rev-parse").await?.trim().to_owned())
    }

    /// Push `HEAD` to the branch without force.
    ///
    /// Network failures are retried; pushing the same commit again is
    /// harmless.
    pub(crate) async fn push(&self) -> Result<PushResult, SyncError> {
        let refspec = format!("HEAD:refs/heads/{}", self.repository.branch);
        run_with_retry("push", &self.retry, || self.push_once(&refspec))
            .await
            .map_err(|e| exhausted(e, &self.repository, &self.retry))
    }

    async fn push_once(&self, refspec: &str) -> Result<PushResult, SyncError> {
        match self.git.run(self.workdir.path(), ["push", "origin", refspec]).await {
            Ok(_) => Ok(PushResult::Accepted),
            Err(f) if f.is_push_rejection() => Ok(PushResult::Rejected {
                detail: f.stderr().trim().to_owned(),
            }),
            Err(f) => Err(f.into_sync_error("push", &self.repository)),
        }
    }

    async fn local<const N: usize>(
        &self,
        args: [&str; N],
        operation: &'static str,
    ) -> Result<String, SyncError> {
        self.git
            .run(self.workdir.path(), args)
            .await
            .map_err(|f| f.into_sync_error(operation, &self.repository))
    }

    /// Remove the working copy now, surfacing any I/O error.
    pub fn discard(self) -> Result<(), SyncError> {
        let path = self.workdir.path().to_path_buf();
        self.workdir.close().map_err(|e| io_err(path, e))
    }
}
