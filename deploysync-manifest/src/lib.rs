//! # deploysync-manifest
//!
//! Structural, byte-preserving patching of container image fields in YAML
//! manifests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use deploysync_core::{resolver, ManifestDocument};
//! use deploysync_manifest::patch;
//!
//! fn bump(raw: String) {
//!     let document = ManifestDocument {
//!         file_path: PathBuf::from("apps/api/deployment.yaml"),
//!         raw_content: raw,
//!         selector: "api".parse().expect("selector"),
//!     };
//!     let image = resolver::resolve("ghcr.io", "org/api", "abc1234").expect("image");
//!     if let Ok(result) = patch(&document, &image) {
//!         println!("changed: {}", result.changed);
//!     }
//! }
//! ```

pub mod diff;
pub mod error;
mod locate;
pub mod patcher;
mod structure;

pub use diff::unified_diff;
pub use error::PatchError;
pub use patcher::patch;
