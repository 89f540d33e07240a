//! Artifact directory access
//!
//! Every artifact is a JSON document stored either as `<stem>.json` or
//! gzip-compressed as `<stem>.json.gz`. When the directory holds a
//! `manifest.json`, each artifact read is checked against the recorded
//! SHA-256 of the file as stored on disk.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactKind;
use crate::error::StorageError;
use crate::manifest::{sha256_hex, ArtifactManifest, MANIFEST_FILE};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    manifest: Option<ArtifactManifest>,
}

impl ArtifactStore {
    /// Open an existing artifact directory
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(StorageError::DirectoryNotFound(root));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.is_file() {
            let bytes = fs::read(&manifest_path).map_err(|e| StorageError::io(&manifest_path, e))?;
            let manifest: ArtifactManifest =
                serde_json::from_slice(&bytes).map_err(|e| StorageError::json(&manifest_path, e))?;
            tracing::info!(
                dir = %root.display(),
                artifacts = manifest.artifacts.len(),
                created_at = %manifest.created_at,
                "loaded artifact manifest"
            );
            Some(manifest)
        } else {
            tracing::debug!(dir = %root.display(), "no artifact manifest, checksums will not be verified");
            None
        };

        Ok(Self { root, manifest })
    }

    /// Open `root`, creating it first if needed
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| StorageError::io(root, e))?;
        Self::open(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> Option<&ArtifactManifest> {
        self.manifest.as_ref()
    }

    /// On-disk location of `kind`, plain JSON first
    pub fn locate(&self, kind: ArtifactKind) -> Option<PathBuf> {
        [kind.file_name(), kind.gz_file_name()]
            .into_iter()
            .map(|name| self.root.join(name))
            .find(|p| p.is_file())
    }

    /// Read, verify and decompress an artifact
    pub fn read_bytes(&self, kind: ArtifactKind) -> Result<Vec<u8>, StorageError> {
        let path = self.locate(kind).ok_or_else(|| StorageError::NotFound {
            kind,
            dir: self.root.clone(),
        })?;
        let raw = fs::read(&path).map_err(|e| StorageError::io(&path, e))?;

        if let Some(manifest) = &self.manifest {
            verify(manifest, kind, &path, &raw)?;
        }

        let bytes = if is_gzip(&path) {
            let mut out = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| StorageError::io(&path, e))?;
            out
        } else {
            raw
        };

        tracing::debug!(artifact = %kind, path = %path.display(), bytes = bytes.len(), "read artifact");
        Ok(bytes)
    }

    /// Read and deserialize a JSON artifact
    pub fn load_json<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<T, StorageError> {
        let bytes = self.read_bytes(kind)?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::json(self.root.join(kind.file_name()), e))
    }

    /// Atomically write an artifact and record it in the manifest
    ///
    /// Any copy of the artifact in the other encoding is removed so that
    /// [`locate`](Self::locate) never sees a stale file.
    pub fn save(&mut self, kind: ArtifactKind, json: &[u8], compress: bool) -> Result<PathBuf, StorageError> {
        let (name, stale) = if compress {
            (kind.gz_file_name(), kind.file_name())
        } else {
            (kind.file_name(), kind.gz_file_name())
        };

        let stored = if compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(json).map_err(|e| StorageError::io(&name, e))?;
            encoder.finish().map_err(|e| StorageError::io(&name, e))?
        } else {
            json.to_vec()
        };

        let path = self.root.join(&name);
        write_atomic(&path, &stored)?;

        let stale = self.root.join(stale);
        if stale.is_file() {
            fs::remove_file(&stale).map_err(|e| StorageError::io(&stale, e))?;
        }

        let manifest = self.manifest.get_or_insert_with(ArtifactManifest::new);
        manifest.record(kind, name, &stored);
        let manifest_json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| StorageError::json(self.root.join(MANIFEST_FILE), e))?;
        write_atomic(&self.root.join(MANIFEST_FILE), &manifest_json)?;

        tracing::info!(artifact = %kind, path = %path.display(), bytes = stored.len(), "saved artifact");
        Ok(path)
    }

    /// Serialize `value` as pretty JSON and [`save`](Self::save) it
    pub fn save_json<T: Serialize>(&mut self, kind: ArtifactKind, value: &T, compress: bool) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::json(self.root.join(kind.file_name()), e))?;
        self.save(kind, &json, compress)
    }

    /// Check every artifact listed in the manifest
    pub fn verify_all(&self) -> Result<(), StorageError> {
        let Some(manifest) = &self.manifest else {
            return Ok(());
        };
        for entry in &manifest.artifacts {
            let path = self.root.join(&entry.file);
            let raw = fs::read(&path).map_err(|e| StorageError::io(&path, e))?;
            verify(manifest, entry.kind, &path, &raw)?;
        }
        Ok(())
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

fn verify(manifest: &ArtifactManifest, kind: ArtifactKind, path: &Path, raw: &[u8]) -> Result<(), StorageError> {
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let entry = manifest
        .entry(kind)
        .ok_or_else(|| StorageError::Manifest(format!("artifact '{}' is not recorded in the manifest", kind)))?;
    if entry.file != file {
        return Err(StorageError::Manifest(format!(
            "manifest records '{}' for artifact '{}' but found '{}'",
            entry.file, kind, file
        )));
    }

    let actual = sha256_hex(raw);
    if actual != entry.sha256 {
        return Err(StorageError::Checksum {
            file,
            expected: entry.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(bytes))
        .map_err(|e| {
            let source = match e {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
            };
            StorageError::io(path, source)
        })
}
