//! Error types for artifact storage

use std::path::PathBuf;
use thiserror::Error;

use crate::artifact::ArtifactKind;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Artifact directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Artifact '{kind}' not found in {dir} (looked for {kind}.json and {kind}.json.gz)")]
    NotFound { kind: ArtifactKind, dir: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Checksum mismatch for {file}: manifest records {expected}, file hashes to {actual}")]
    Checksum {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StorageError::Json {
            path: path.into(),
            source,
        }
    }
}
