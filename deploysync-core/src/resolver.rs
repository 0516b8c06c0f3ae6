//! Build context resolver: registry host + project path + commit id → image reference.
//!
//! Pure validation, no I/O.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;
use crate::types::{CommitId, ImageReference, ProjectPath, RegistryHost};

static COMMIT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{7,40}$").expect("valid regex"));

static REGISTRY_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]{1,5})?$").expect("valid regex")
});

static PROJECT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    let component = r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*";
    Regex::new(&format!(r"^{component}(?:/{component})*$")).expect("valid regex")
});

/// Derive the image reference for a build.
///
/// Inputs are trimmed. Empty inputs fail with
/// [`ConfigError::MissingRegistryConfig`]; malformed ones with the matching
/// `Invalid*` variant.
pub fn resolve(
    registry_host: &str,
    project_path: &str,
    commit_id: &str,
) -> Result<ImageReference, ConfigError> {
    let registry_host = validate_registry_host(registry_host)?;
    let project_path = validate_project_path(project_path)?;
    let tag = validate_commit_id(commit_id)?;
    Ok(ImageReference {
        registry_host,
        project_path,
        tag,
    })
}

pub fn validate_commit_id(raw: &str) -> Result<CommitId, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingRegistryConfig { field: "COMMIT_ID" });
    }
    if !COMMIT_ID.is_match(value) {
        return Err(ConfigError::InvalidCommitIdentifier {
            value: value.to_owned(),
        });
    }
    Ok(CommitId::from(value))
}

fn validate_registry_host(raw: &str) -> Result<RegistryHost, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingRegistryConfig {
            field: "REGISTRY_HOST",
        });
    }
    let invalid = |reason| ConfigError::InvalidRegistryHost {
        value: value.to_owned(),
        reason,
    };
    if value.contains("://") {
        return Err(invalid("drop the URL scheme"));
    }
    if value.contains('/') {
        return Err(invalid("registry host must not contain a path"));
    }
    if !REGISTRY_HOST.is_match(value) {
        return Err(invalid("expected host[:port]"));
    }
    Ok(RegistryHost::from(value))
}

fn validate_project_path(raw: &str) -> Result<ProjectPath, ConfigError> {
    let value = raw.trim().trim_matches('/');
    if value.is_empty() {
        return Err(ConfigError::MissingRegistryConfig {
            field: "PROJECT_PATH",
        });
    }
    if !PROJECT_PATH.is_match(value) {
        return Err(ConfigError::InvalidProjectPath {
            value: value.to_owned(),
        });
    }
    Ok(ProjectPath::from(value))
}
