//! Load Cache Module
//! Memoizes a load cycle per session, keyed on a fingerprint of the data
//! directory and the configuration that drives the loader.

use super::loader::{DataLoader, Dataset};
use super::locator::Locator;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// SHA-256 over the sorted directory listing: NFC name, size and modification
/// time of every regular file. A missing directory has a fingerprint of its own.
pub fn directory_fingerprint(dir: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dir.to_string_lossy().as_bytes());

    if !dir.is_dir() {
        hasher.update(b"\0missing");
        return format!("{:x}", hasher.finalize());
    }

    for (name, path) in Locator::new(dir).candidates() {
        let (len, modified) = std::fs::metadata(&path)
            .map(|meta| {
                let modified = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                (meta.len(), modified)
            })
            .unwrap_or((0, 0));
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(len.to_le_bytes());
        hasher.update(modified.to_le_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Holds the last loaded dataset and the key it was loaded under.
#[derive(Default)]
pub struct LoadCache {
    entry: Option<(String, Arc<Dataset>)>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key: directory fingerprint plus the serialized loader configuration.
    pub fn key_for(loader: &DataLoader) -> String {
        let config = loader.config();
        let mut hasher = Sha256::new();
        hasher.update(directory_fingerprint(&config.data_dir).as_bytes());
        hasher.update(serde_json::to_string(config).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Return the cached dataset when the key is unchanged, otherwise load again.
    pub fn get_or_load(&mut self, loader: &DataLoader) -> Arc<Dataset> {
        let key = Self::key_for(loader);
        if let Some((cached_key, dataset)) = &self.entry {
            if *cached_key == key {
                debug!("load cache hit");
                return Arc::clone(dataset);
            }
        }

        info!("load cache miss, reading data directory");
        let dataset = Arc::new(loader.load());
        self.entry = Some((key, Arc::clone(&dataset)));
        dataset
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}
