//! Commit coordinator: one commit per deploy, optimistic retry on conflict.
//!
//! ## Loop
//!
//! 1. Unchanged patch: done, zero commits.
//! 2. Write the manifest atomically, commit, push without force.
//! 3. Push rejected because the remote moved: refresh the session, re-read
//!    and re-patch the manifest, go to 1.
//! 4. Stop after `max_attempts` pushes with [`SyncError::ConcurrentUpdateConflict`].
//!
//! The remote branch either advances by exactly one commit or stays put.

use tracing::{info, warn};

use deploysync_core::{CommitAttempt, CommitOutcome, DeployTarget, ManifestDocument, PatchResult};
use deploysync_manifest::patch;

use crate::error::SyncError;
use crate::session::{PushResult, RepositorySession, SessionManager};
use crate::writer::atomic_write;

/// How a run ended on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The manifest already carried the image.
    NoOp { revision: String },
    Committed { revision: String },
}

/// Outcome of [`CommitCoordinator::deliver`].
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub delivery: Delivery,
    /// Image found at the selector in the revision the final attempt built on.
    pub previous_image: String,
    pub attempts: Vec<CommitAttempt>,
}

pub struct CommitCoordinator<'a> {
    sessions: &'a SessionManager,
    target: &'a DeployTarget,
    max_attempts: u32,
}

impl<'a> CommitCoordinator<'a> {
    pub fn new(sessions: &'a SessionManager, target: &'a DeployTarget, max_attempts: u32) -> Self {
        Self {
            sessions,
            target,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Read the manifest from `session` and patch it for the target image.
    pub fn patch_session(&self, session: &RepositorySession) -> Result<PatchResult, SyncError> {
        let document = ManifestDocument {
            file_path: self.target.manifest_path.clone(),
            raw_content: session.read_manifest(&self.target.manifest_path)?,
            selector: self.target.selector.clone(),
        };
        Ok(patch(&document, &self.target.image)?)
    }

    /// Turn `first` (computed against `session`) into at most one remote commit.
    ///
    /// Consumes the session; every working copy is discarded before returning.
    pub async fn deliver(
        &self,
        session: RepositorySession,
        first: PatchResult,
    ) -> Result<DeliveryReport, SyncError> {
        let mut session = session;
        let mut current = first;
        let mut attempts = Vec::new();

        for attempt in 1..=self.max_attempts {
            if !current.changed {
                info!(
                    state = "Done",
                    revision = %session.base_revision(),
                    image = %self.target.image,
                    "manifest already up to date, nothing to commit"
                );
                let revision = session.base_revision().to_owned();
                session.discard()?;
                return Ok(DeliveryReport {
                    delivery: Delivery::NoOp { revision },
                    previous_image: current.previous_image,
                    attempts,
                });
            }

            let message = commit_title(self.target);
            let base_revision = session.base_revision().to_owned();
            let record = |outcome: CommitOutcome| CommitAttempt {
                attempt,
                message: message.clone(),
                base_revision: base_revision.clone(),
                outcome,
            };

            let pushed = match self.commit_and_push(&session, &current, &message).await {
                Ok(pushed) => pushed,
                Err(e) => {
                    attempts.push(record(CommitOutcome::Failed {
                        reason: e.to_string(),
                    }));
                    warn!(attempt, error = %e, "commit attempt failed");
                    return Err(e);
                }
            };

            match pushed {
                (revision, PushResult::Accepted) => {
                    info!(
                        state = "Pushed",
                        attempt,
                        revision = %revision,
                        branch = %session.repository().branch,
                        "deploy commit pushed"
                    );
                    attempts.push(record(CommitOutcome::Success {
                        revision: revision.clone(),
                    }));
                    session.discard()?;
                    return Ok(DeliveryReport {
                        delivery: Delivery::Committed { revision },
                        previous_image: current.previous_image,
                        attempts,
                    });
                }
                (_, PushResult::Rejected { detail }) => {
                    attempts.push(record(CommitOutcome::Superseded));
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        base = %base_revision,
                        detail = %detail,
                        "push superseded by a concurrent update"
                    );
                    if attempt == self.max_attempts {
                        break;
                    }
                    session = self.sessions.refresh(session).await?;
                    current = self.patch_session(&session)?;
                    info!(
                        state = "Patched",
                        changed = current.changed,
                        base = %session.base_revision(),
                        "re-patched against refreshed tip"
                    );
                }
            }
        }

        session.discard()?;
        Err(SyncError::ConcurrentUpdateConflict {
            repository: self.sessions.repository().to_string(),
            attempts: self.max_attempts,
        })
    }

    async fn commit_and_push(
        &self,
        session: &RepositorySession,
        patched: &PatchResult,
        title: &str,
    ) -> Result<(String, PushResult), SyncError> {
        let relative = &self.target.manifest_path;
        atomic_write(&session.manifest_path(relative), &patched.new_content)?;
        let revision = session
            .commit(relative, title, &commit_body(self.target, &patched.previous_image))
            .await?;
        info!(state = "Committed", revision = %revision, "deploy commit created");
        let pushed = session.push().await?;
        Ok((revision, pushed))
    }
}

/// Commit title: `Deploy <commit-id>`.
pub fn commit_title(target: &DeployTarget) -> String {
    format!("Deploy {}", target.image.tag)
}

fn commit_body(target: &DeployTarget, previous_image: &str) -> String {
    format!(
        "Image: {}\nPrevious: {}\nManifest: {}\nSelector: {}",
        target.image,
        previous_image,
        target.manifest_path.display(),
        target.selector
    )
}
