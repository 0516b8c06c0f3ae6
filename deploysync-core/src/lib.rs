//! deploysync core library: domain types, build context resolution, config.
//!
//! Public API surface:
//! - [`types`]: newtypes and per-run domain structs
//! - [`error`]: [`ConfigError`] and the [`ErrorKind`] taxonomy
//! - [`resolver`]: commit identifier → [`ImageReference`]
//! - [`config`]: layered settings → validated [`SyncConfig`]

pub mod config;
pub mod error;
pub mod resolver;
pub mod types;

pub use config::{Settings, SyncConfig};
pub use error::{ConfigError, ErrorKind};
pub use types::{
    CommitAttempt, CommitId, CommitIdentity, CommitOutcome, ContainerSelector, Credential,
    DeployTarget, ImageReference, ManifestDocument, PatchResult, ProjectPath, RegistryHost,
    RepositoryTarget,
};
