use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::DomainError;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 2;
pub const HASH_ALGORITHM: &str = "sha256-16";

/// Files above this size get the truncated `L`-marked hash.
const LARGE_FILE_BYTES: u64 = 1024 * 1024;

/// Source-control position recorded at index time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsState {
    pub branch: String,
    pub commit: String,
}

/// Last-indexed state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub last_modified: u64,
    pub chunk_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
}

/// Sidecar map of files to their last-indexed state, persisted next to the
/// vector store. Keys are canonical relative paths; `BTreeMap` keeps
/// re-saves byte-stable for unchanged files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub hash_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs_state: Option<VcsState>,
    pub files: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            hash_algorithm: HASH_ALGORITHM.to_string(),
            vcs_state: None,
            files: BTreeMap::new(),
        }
    }

    pub fn manifest_path(db_path: &Path) -> PathBuf {
        db_path.join(MANIFEST_FILE_NAME)
    }

    /// Load the manifest from `<db_path>/manifest.json`.
    /// Returns `Ok(None)` when no manifest has been written yet.
    pub async fn load(db_path: &Path) -> Result<Option<Self>, DomainError> {
        let path = Self::manifest_path(db_path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let manifest: Manifest = serde_json::from_slice(&bytes)
                    .map_err(|e| DomainError::store(format!("Corrupt manifest: {}", e)))?;
                Ok(Some(manifest))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist atomically: write to a temp sibling, then rename over the
    /// target so a crash leaves either the old or the new manifest.
    pub async fn save(&self, db_path: &Path) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(db_path).await?;
        let path = Self::manifest_path(db_path);
        let tmp = db_path.join(format!("{}.tmp", MANIFEST_FILE_NAME));

        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| DomainError::store(format!("Manifest serialization: {}", e)))?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub fn entry(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.files.get(relative_path)
    }

    pub fn upsert(&mut self, relative_path: String, entry: ManifestEntry) {
        self.files.insert(relative_path, entry);
    }

    pub fn remove(&mut self, relative_path: &str) -> Option<ManifestEntry> {
        self.files.remove(relative_path)
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files.contains_key(relative_path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn set_vcs_state(&mut self, state: Option<VcsState>) {
        self.vcs_state = state;
    }
}

/// Compact 16-character content hash.
///
/// Files at or under 1 MiB use the first 16 hex characters of SHA-256;
/// larger files are marked with a leading `L` plus 15 hex characters so
/// the truncation is explicit in stored hashes.
pub fn compute_content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let hex = format!("{:x}", digest);
    if content.len() as u64 > LARGE_FILE_BYTES {
        format!("L{}", &hex[..15])
    } else {
        hex[..16].to_string()
    }
}

/// Hash a file on disk. Unreadable files hash to the empty string.
pub fn hash_file(path: &Path) -> String {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Cannot hash {}: {}", path.display(), e);
            return String::new();
        }
    };
    let mut buf = Vec::new();
    if let Err(e) = file.read_to_end(&mut buf) {
        warn!("Cannot hash {}: {}", path.display(), e);
        return String::new();
    }
    compute_content_hash(&buf)
}

/// Millisecond mtime for a path, or 0 when the stat fails.
pub fn mtime_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
