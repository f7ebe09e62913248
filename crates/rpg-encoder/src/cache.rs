//! Content-addressed semantic feature cache.
//!
//! Keys are `(file path, qualified name, content hash)` so a feature is
//! reused only while its source fragment is byte-identical. Persisted as a
//! single keyed record file under the repository workspace; all writers
//! serialize on one lock.

use rpg_core::error::{Result, RpgError};
use rpg_core::model::SemanticFeature;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const CACHE_FILE: &str = "features.json";

/// SHA-256 content hash, truncated to 16 hex chars.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

struct CacheState {
    entries: BTreeMap<String, SemanticFeature>,
    dirty: bool,
}

/// The persistent feature cache. A disabled cache ignores reads and writes.
pub struct SemanticCache {
    path: Option<PathBuf>,
    state: Mutex<CacheState>,
}

impl SemanticCache {
    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            state: Mutex::new(CacheState {
                entries: BTreeMap::new(),
                dirty: false,
            }),
        }
    }

    /// An in-memory cache with no backing file (useful for tests and
    /// single-shot encodes).
    pub fn ephemeral() -> Self {
        Self::disabled()
    }

    /// Open (or create) the cache under the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(CACHE_FILE);
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)
                .map_err(|e| RpgError::Store(format!("corrupt feature cache: {e}")))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            state: Mutex::new(CacheState {
                entries,
                dirty: false,
            }),
        })
    }

    fn key(file_path: &str, qualified_name: &str, hash: &str) -> String {
        format!("{file_path}::{qualified_name}::{hash}")
    }

    pub fn get(&self, file_path: &str, qualified_name: &str, hash: &str) -> Option<SemanticFeature> {
        let state = self.state.lock().ok()?;
        state
            .entries
            .get(&Self::key(file_path, qualified_name, hash))
            .cloned()
    }

    pub fn set(&self, file_path: &str, qualified_name: &str, hash: &str, feature: SemanticFeature) {
        if let Ok(mut state) = self.state.lock() {
            state
                .entries
                .insert(Self::key(file_path, qualified_name, hash), feature);
            state.dirty = true;
        }
    }

    /// Drop every entry for a file. Called when a commit touches it.
    pub fn invalidate_file(&self, file_path: &str) {
        if let Ok(mut state) = self.state.lock() {
            let prefix = format!("{file_path}::");
            let before = state.entries.len();
            state.entries.retain(|key, _| !key.starts_with(&prefix));
            if state.entries.len() != before {
                state.dirty = true;
            }
        }
    }

    /// Persist pending entries. No-op for ephemeral caches or when clean.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self
            .state
            .lock()
            .map_err(|_| RpgError::Store("feature cache lock poisoned".to_string()))?;
        if !state.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&state.entries)
            .map_err(|e| RpgError::Store(e.to_string()))?;
        std::fs::write(path, json)?;
        state.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
