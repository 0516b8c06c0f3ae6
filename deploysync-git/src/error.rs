//! Error types for deploysync-git.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use deploysync_core::{ConfigError, ErrorKind};
use deploysync_manifest::PatchError;

use crate::retry::RetryableError;

/// All errors that can arise from a synchronizer run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    /// The remote refused the credential. Never retried.
    #[error("authentication failed for {repository}: {detail}")]
    AuthenticationFailed { repository: String, detail: String },

    #[error("branch '{branch}' not found in {repository}")]
    BranchNotFound { repository: String, branch: String },

    #[error("repository {repository} not found: {detail}")]
    RepositoryNotFound { repository: String, detail: String },

    /// A transient transport failure. Retried by [`crate::retry`].
    #[error("network failure during {operation}: {detail}")]
    NetworkFailure {
        operation: &'static str,
        detail: String,
    },

    /// Network failures outlasted the retry budget.
    #[error("repository {repository} unavailable after {attempts} attempt(s): {detail}")]
    RepositoryUnavailable {
        repository: String,
        attempts: u32,
        detail: String,
    },

    /// The remote branch kept moving; every rebased attempt was superseded.
    #[error("concurrent update conflict on {repository}: push superseded {attempts} time(s)")]
    ConcurrentUpdateConflict { repository: String, attempts: u32 },

    #[error("git {operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Any other git failure. `detail` is scrubbed of credentials.
    #[error("git {operation} failed: {detail}")]
    Git {
        operation: &'static str,
        detail: String,
    },

    #[error("manifest {path} not found on {repository}")]
    ManifestNotFound { path: PathBuf, repository: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Position of this error in the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Config(e) => e.kind(),
            SyncError::Patch(e) => e.kind(),
            SyncError::AuthenticationFailed { .. } => ErrorKind::Authentication,
            SyncError::NetworkFailure { .. } | SyncError::RepositoryUnavailable { .. } => {
                ErrorKind::Network
            }
            SyncError::ConcurrentUpdateConflict { .. } => ErrorKind::Conflict,
            SyncError::Timeout { .. } => ErrorKind::Timeout,
            SyncError::BranchNotFound { .. }
            | SyncError::RepositoryNotFound { .. }
            | SyncError::ManifestNotFound { .. }
            | SyncError::Git { .. }
            | SyncError::Io { .. } => ErrorKind::Configuration,
        }
    }
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        matches!(self, SyncError::NetworkFailure { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
