//! Content-hash cache for intermediate artifacts
//!
//! Every cached artifact has an explicit key: SHA-256 over the contents of
//! its input files, the configuration sections it depends on and the key of
//! its upstream artifact. The index lives in `intermediates/cache.json` and
//! stores, per artifact, the key and the artifact's own content hash.

use crate::fsutil::{sha256_hex, write_json_atomic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use vbet_core::{Error, Result};

pub const CACHE_FILE: &str = "cache.json";

/// Incremental cache key
pub struct KeyBuilder {
    hasher: Sha256,
}

impl KeyBuilder {
    pub fn new(artifact: &str) -> Self {
        let mut hasher = Sha256::new();
        Self::field(&mut hasher, b"artifact", artifact.as_bytes());
        Self { hasher }
    }

    // length-prefixed so adjacent fields cannot run together
    fn field(hasher: &mut Sha256, name: &[u8], value: &[u8]) {
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name);
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }

    /// Content hash of an input file
    pub fn input(mut self, name: &str, content_hash: &str) -> Self {
        Self::field(&mut self.hasher, name.as_bytes(), content_hash.as_bytes());
        self
    }

    /// Configuration section, hashed in its JSON form
    pub fn config<T: Serialize>(mut self, name: &str, value: &T) -> Result<Self> {
        let json = serde_json::to_vec(value).map_err(|e| Error::Other(format!("cannot hash {name}: {e}")))?;
        Self::field(&mut self.hasher, name.as_bytes(), &json);
        Ok(self)
    }

    pub fn upstream(mut self, key: &str) -> Self {
        Self::field(&mut self.hasher, b"upstream", key.as_bytes());
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// One cached artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Path relative to the intermediates directory
    pub file: String,
    pub content_hash: String,
}

/// `intermediates/cache.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    #[serde(skip)]
    dir: PathBuf,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl CacheIndex {
    /// Load the index of `dir`; a missing or unreadable index is empty.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CACHE_FILE);
        let mut index = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<CacheIndex>(&bytes).ok())
            .unwrap_or_default();
        index.dir = dir.to_path_buf();
        index
    }

    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.dir.join(CACHE_FILE), self)
    }

    /// Bytes of a cached artifact when its key matches and its content is
    /// unchanged since it was recorded.
    pub fn lookup(&self, name: &str, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(name)?;
        if entry.key != key {
            debug!(artifact = name, "cache key changed");
            return None;
        }
        let bytes = std::fs::read(self.dir.join(&entry.file)).ok()?;
        if sha256_hex(&bytes) != entry.content_hash {
            debug!(artifact = name, "cached file modified");
            return None;
        }
        Some(bytes)
    }

    /// Record an artifact already written to `dir/file`
    pub fn record(&mut self, name: &str, key: &str, file: &str, bytes: &[u8]) {
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                key: key.to_string(),
                file: file.to_string(),
                content_hash: sha256_hex(bytes),
            },
        );
    }
}
