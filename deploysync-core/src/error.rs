//! Error types for deploysync-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by every crate in the workspace.
///
/// Each kind maps onto exactly one process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad inputs. Fatal, never retried.
    Configuration,
    /// Credential rejected by the remote. Fatal, never retried.
    Authentication,
    /// Transient transport failure that survived the backoff budget.
    Network,
    /// Remote branch kept advancing past every rebased attempt.
    Conflict,
    /// Manifest shape does not match the selector.
    Validation,
    /// A git operation exceeded its per-attempt deadline.
    Timeout,
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    ///
    /// Network failures share the configuration code: once retries are spent
    /// the operator has to check the repository URL or the remote itself.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration | ErrorKind::Authentication | ErrorKind::Network => 1,
            ErrorKind::Conflict => 2,
            ErrorKind::Timeout => 3,
            ErrorKind::Validation => 4,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "ConfigurationError"),
            ErrorKind::Authentication => write!(f, "AuthenticationError"),
            ErrorKind::Network => write!(f, "NetworkError"),
            ErrorKind::Conflict => write!(f, "ConflictError"),
            ErrorKind::Validation => write!(f, "ValidationError"),
            ErrorKind::Timeout => write!(f, "TimeoutError"),
        }
    }
}

/// All errors that can arise while resolving inputs and loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required registry input (host, project path, commit id) is empty.
    #[error("missing registry configuration: {field} is empty")]
    MissingRegistryConfig { field: &'static str },

    #[error("invalid commit identifier '{value}': expected 7 to 40 lowercase hex characters")]
    InvalidCommitIdentifier { value: String },

    #[error("invalid registry host '{value}': {reason}")]
    InvalidRegistryHost { value: String, reason: &'static str },

    #[error("invalid project path '{value}': expected lowercase path components separated by '/'")]
    InvalidProjectPath { value: String },

    #[error("invalid container selector '{value}': {reason}")]
    InvalidSelector { value: String, reason: &'static str },

    /// A required setting was supplied by neither flag, environment, nor file.
    #[error("missing required setting {name}")]
    MissingSetting { name: &'static str },

    #[error("invalid value for {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// Config files are committed and shared; secrets must arrive via the environment.
    #[error("config file {path} must not contain a credential; set CREDENTIAL in the env")]
    CredentialInConfigFile { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
