use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One persisted translation. The source text is kept so a hash collision
/// on the key is detected instead of served.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTranslation {
    source: String,
    translation: String,
}

/// Translations persisted across conversions, in a sled tree keyed by
/// [`CacheKey::disk_key`](super::CacheKey::disk_key).
pub struct DiskCache {
    db: Db,
}

impl DiskCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheInit(format!("Failed to create cache directory {}: {e}", parent.display()))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let message = e.to_string();
            if message.contains("WouldBlock") || message.contains("lock") {
                Error::CacheInit(format!(
                    "Translation cache at {} is held by another conversion.\n\
                    If no conversion is running, remove {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::CacheInit(format!("Failed to open cache at {}: {e}", path.display()))
            }
        })?;

        debug!("Opened translation store at {} ({} entries)", path.display(), db.len());
        Ok(Self { db })
    }

    /// Stored translation of `source` under `key`, if any.
    pub fn get(&self, key: &str, source: &str) -> Option<String> {
        let bytes = match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read error: {}", e);
                return None;
            }
        };

        match serde_json::from_slice::<StoredTranslation>(&bytes) {
            Ok(entry) if entry.source == source => Some(entry.translation),
            Ok(entry) => {
                warn!("Cache key {} holds {:?}, not {:?}; ignoring", key, entry.source, source);
                None
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Persist a translation and flush, so finished work survives a crash
    /// later in the conversion.
    pub fn insert(&self, key: &str, source: &str, translation: &str) -> Result<()> {
        let entry = StoredTranslation {
            source: source.to_string(),
            translation: translation.to_string(),
        };
        let bytes = serde_json::to_vec(&entry).map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .insert(key.as_bytes(), bytes)
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.db.clear().map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}
