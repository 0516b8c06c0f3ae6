//! Error types for deploysync-manifest.

use std::path::PathBuf;

use thiserror::Error;

use deploysync_core::ErrorKind;

/// All errors that can arise while patching a manifest.
///
/// Every variant is a validation failure: the document does not have the
/// shape the selector expects.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The manifest is not valid YAML.
    #[error("manifest {path} is not valid YAML: {source}")]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("selector '{selector}' matched no container in {path}")]
    SelectorNotFound { selector: String, path: PathBuf },

    #[error("selector '{selector}' matched {count} containers in {path}; narrow it with <workload>/<container>")]
    SelectorAmbiguous {
        selector: String,
        path: PathBuf,
        count: usize,
    },

    #[error("container matched by '{selector}' in {path} has no image field")]
    MissingImageField { selector: String, path: PathBuf },

    /// The structural view and the line view disagree, or the image value
    /// uses a YAML form that cannot be rewritten in place.
    #[error("cannot patch '{selector}' in {path} in place: {reason}")]
    UnsupportedLayout {
        selector: String,
        path: PathBuf,
        reason: String,
    },
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
