//! Domain types for a single synchronizer run.
//!
//! Nothing here outlives the run that created it; the remote branch is the
//! only durable state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Commit identifier of the build being deployed; doubles as the image tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Registry hostname, optionally with a port (`registry.example.com:8443`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryHost(pub String);

impl fmt::Display for RegistryHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RegistryHost {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Repository path inside the registry (`team/service`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectPath(pub String);

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProjectPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Image reference
// ---------------------------------------------------------------------------

/// Immutable reference to the image a build pushed.
///
/// Serializes as `registryHost/projectPath:tag`. Construct through
/// [`crate::resolver::resolve`] so every component is validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry_host: RegistryHost,
    pub project_path: ProjectPath,
    pub tag: CommitId,
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry_host, self.project_path, self.tag)
    }
}

// ---------------------------------------------------------------------------
// Container selector
// ---------------------------------------------------------------------------

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").expect("valid regex"));

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9.]{0,251}[a-z0-9])?$").expect("valid regex")
});

/// Structural address of one `image` field: `[<workload>/]<container>`.
///
/// `<container>` matches the `name` of an entry in any `containers` or
/// `initContainers` list. `<workload>` narrows the search to the resource
/// whose `metadata.name` equals it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerSelector {
    pub workload: Option<String>,
    pub container: String,
}

impl ContainerSelector {
    /// Selector for a container name with no workload restriction.
    pub fn container(name: &str) -> Self {
        Self {
            workload: None,
            container: name.to_owned(),
        }
    }
}

impl FromStr for ContainerSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = |reason| ConfigError::InvalidSelector {
            value: s.to_owned(),
            reason,
        };
        if raw.is_empty() {
            return Err(invalid("selector is empty"));
        }

        let (workload, container) = match raw.split_once('/') {
            Some((workload, container)) => (Some(workload), container),
            None => (None, raw),
        };

        if !DNS_LABEL.is_match(container) {
            return Err(invalid("container name must be a lowercase DNS label"));
        }
        if let Some(workload) = workload {
            if !DNS_SUBDOMAIN.is_match(workload) {
                return Err(invalid("workload name must be a lowercase DNS subdomain"));
            }
        }

        Ok(Self {
            workload: workload.map(str::to_owned),
            ..Self::container(container)
        })
    }
}

impl fmt::Display for ContainerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.workload {
            Some(workload) => write!(f, "{workload}/{}", self.container),
            None => self.container.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest and patch
// ---------------------------------------------------------------------------

/// A manifest file as read from the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Path relative to the repository root.
    pub file_path: PathBuf,
    pub raw_content: String,
    pub selector: ContainerSelector,
}

/// Outcome of patching a [`ManifestDocument`].
///
/// `changed == false` implies `new_content` is byte-identical to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub changed: bool,
    pub new_content: String,
    /// Image value found at the selector before patching.
    pub previous_image: String,
}

// ---------------------------------------------------------------------------
// Repository + credentials
// ---------------------------------------------------------------------------

/// Remote repository and branch a run synchronizes against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryTarget {
    pub remote_url: String,
    pub branch: String,
}

impl fmt::Display for RepositoryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.remote_url, self.branch)
    }
}

/// Write-capable token handed over by the external credential provider.
///
/// Held in memory only. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    token: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Author and committer identity stamped on deploy commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "deploysync".to_owned(),
            email: "deploysync@localhost".to_owned(),
        }
    }
}

/// What a run deploys: which image goes into which field of which file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub image: ImageReference,
    /// Manifest path relative to the repository root.
    pub manifest_path: PathBuf,
    pub selector: ContainerSelector,
}

// ---------------------------------------------------------------------------
// Commit attempts
// ---------------------------------------------------------------------------

/// Result of one commit-and-push attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommitOutcome {
    Success { revision: String },
    /// The remote advanced past `base_revision` before the push landed.
    Superseded,
    Failed { reason: String },
}

/// One pass through the commit coordinator loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub message: String,
    pub base_revision: String,
    #[serde(flatten)]
    pub outcome: CommitOutcome,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
