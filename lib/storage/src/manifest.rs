//! Artifact manifest: file names, SHA-256 checksums and creation time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::ArtifactKind;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Hex-encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub kind: ArtifactKind,
    /// File name relative to the artifact directory
    pub file: String,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactManifest {
    pub created_at: DateTime<Utc>,
    pub artifacts: Vec<ManifestEntry>,
}

impl Default for ArtifactManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactManifest {
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            artifacts: Vec::new(),
        }
    }

    pub fn entry(&self, kind: ArtifactKind) -> Option<&ManifestEntry> {
        self.artifacts.iter().find(|e| e.kind == kind)
    }

    /// Record `file` for `kind`, replacing any previous entry
    pub fn record(&mut self, kind: ArtifactKind, file: String, bytes: &[u8]) {
        let entry = ManifestEntry {
            kind,
            file,
            sha256: sha256_hex(bytes),
            size: bytes.len() as u64,
        };
        match self.artifacts.iter_mut().find(|e| e.kind == kind) {
            Some(existing) => *existing = entry,
            None => self.artifacts.push(entry),
        }
        self.artifacts.sort_by_key(|e| e.kind);
        self.created_at = Utc::now();
    }
}
