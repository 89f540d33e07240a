//! # gemprice Storage
//!
//! Persistence for fitted pipelines and regressors. An artifact directory
//! holds one JSON document per [`ArtifactKind`], optionally gzip-compressed,
//! and an optional `manifest.json` with SHA-256 checksums that is verified
//! on every read.

pub mod artifact;
pub mod error;
pub mod manifest;
pub mod store;

pub use artifact::ArtifactKind;
pub use error::StorageError;
pub use manifest::{sha256_hex, ArtifactManifest, ManifestEntry, MANIFEST_FILE};
pub use store::ArtifactStore;
