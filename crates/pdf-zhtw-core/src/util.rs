//! Utility functions shared across the crate.

use std::path::{Path, PathBuf};

use crate::cache::DiskCache;
use crate::error::Result;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Get the default persistent translation cache path.
pub fn translation_cache_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("pdf-zhtw")
}

/// Empty the persistent translation store at `path` (default location when
/// `None`), returning how many translations were dropped.
pub fn clear_translation_cache(path: Option<&Path>) -> Result<usize> {
    let cache_path = path.map_or_else(translation_cache_path, Path::to_path_buf);
    if !cache_path.exists() {
        return Ok(0);
    }

    let store = DiskCache::new(&cache_path)?;
    let count = store.len();
    store.clear()?;
    Ok(count)
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
