//! Overlay OCR result cache
//!
//! OCR sampling is the most expensive producer, so its output can be kept
//! between runs. The cache is keyed by the source identity together with the
//! resolved overlay parameters and the detector's default severity: changing
//! any of them yields a different key.
//!
//! Cache failures are never fatal. A read or write that fails is logged and
//! treated as a miss.

use crate::preset::OverlayTextParams;
use pqc_common::{Issue, Severity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Persisted overlay detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedOverlay {
    pub issues: Vec<Issue>,
    pub sample_interval: f64,
}

/// Storage for overlay results, supplied by the caller
pub trait OverlayCache: Send + Sync {
    fn load(&self, key: &str) -> Option<CachedOverlay>;
    fn store(&self, key: &str, entry: &CachedOverlay);
}

/// SHA-256 hex digest over the source identity, overlay parameters and the
/// severity given to issues without keyword hits
pub fn cache_key(source_id: &str, params: &OverlayTextParams, default_severity: Severity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            params.sample_interval,
            params.min_confidence,
            params.min_chars,
            params.min_duration,
            params.min_box_height,
            params.allowlist_phrases,
            params.flag_keywords,
            default_severity.as_str()
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

/// One JSON file per key: `<dir>/<key>.ocr.json`
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    dir: PathBuf,
}

impl JsonFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.ocr.json"))
    }
}

impl OverlayCache for JsonFileCache {
    fn load(&self, key: &str) -> Option<CachedOverlay> {
        let path = self.entry_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Overlay cache miss");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to read overlay cache entry: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(entry) => {
                debug!(path = %path.display(), "Overlay cache hit");
                Some(entry)
            }
            Err(e) => {
                warn!(path = %path.display(), "Ignoring corrupt overlay cache entry: {}", e);
                None
            }
        }
    }

    fn store(&self, key: &str, entry: &CachedOverlay) {
        let path = self.entry_path(key);
        let result = std::fs::create_dir_all(&self.dir)
            .map_err(pqc_common::Error::from)
            .and_then(|_| Ok(serde_json::to_string_pretty(entry)?))
            .and_then(|json| Ok(std::fs::write(&path, json)?));

        match result {
            Ok(()) => debug!(path = %path.display(), issues = entry.issues.len(), "Stored overlay cache entry"),
            Err(e) => warn!(path = %path.display(), "Failed to write overlay cache entry: {}", e),
        }
    }
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedOverlay>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OverlayCache for MemoryCache {
    fn load(&self, key: &str) -> Option<CachedOverlay> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn store(&self, key: &str, entry: &CachedOverlay) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), entry.clone());
            }
            Err(_) => warn!("Overlay memory cache lock poisoned, entry not stored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::default_preset;
    use pqc_common::{Catalog, DetectorKind};
    use tempfile::TempDir;

    fn params() -> OverlayTextParams {
        default_preset(Catalog::builtin())
            .detector(DetectorKind::OverlayText)
            .and_then(|d| d.overlay_params())
            .cloned()
            .unwrap()
    }

    fn entry() -> CachedOverlay {
        CachedOverlay {
            issues: Vec::new(),
            sample_interval: 1.0,
        }
    }

    #[test]
    fn test_cache_key_depends_on_params() {
        let base = params();
        let mut tweaked = params();
        tweaked.min_chars += 1;

        let key = cache_key("clip.mxf", &base, Severity::NonCritical);
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key("clip.mxf", &base, Severity::NonCritical));
        assert_ne!(key, cache_key("clip.mxf", &tweaked, Severity::NonCritical));
        assert_ne!(key, cache_key("other.mxf", &base, Severity::NonCritical));
    }

    #[test]
    fn test_cache_key_depends_on_default_severity() {
        let p = params();
        let key = cache_key("clip.mxf", &p, Severity::NonCritical);

        assert_ne!(key, cache_key("clip.mxf", &p, Severity::Informational));
        assert_ne!(key, cache_key("clip.mxf", &p, Severity::Critical));
    }

    #[test]
    fn test_json_file_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path().join("nested"));

        assert!(cache.load("abc").is_none());
        cache.store("abc", &entry());

        assert!(cache.entry_path("abc").exists());
        assert_eq!(cache.load("abc"), Some(entry()));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = JsonFileCache::new(dir.path());
        std::fs::write(cache.entry_path("bad"), "{ not json").unwrap();

        assert!(cache.load("bad").is_none());
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.store("k", &entry());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.load("k"), Some(entry()));
        assert!(cache.load("missing").is_none());
    }
}
