//! # deploysync-git
//!
//! Repository sessions, the commit coordinator, and the run pipeline.
//!
//! Call [`Synchronizer::run`] with a validated
//! [`SyncConfig`](deploysync_core::SyncConfig) to deploy one image into one
//! manifest field, or drive [`SessionManager`] and [`CommitCoordinator`]
//! directly for finer control.

pub mod coordinator;
pub mod error;
mod git;
pub mod pipeline;
pub mod retry;
pub mod session;
mod writer;

pub use coordinator::{commit_title, CommitCoordinator, Delivery, DeliveryReport};
pub use error::SyncError;
pub use pipeline::{RunMode, RunOutcome, RunReport, Synchronizer};
pub use retry::RetryPolicy;
pub use session::{PushResult, RepositorySession, SessionManager};
