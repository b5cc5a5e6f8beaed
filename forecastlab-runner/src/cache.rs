//! Explicit caches owned by the calling layer.
//!
//! - [`FeatureCache`]: derived feature tables in memory, keyed by series fingerprint
//! - [`ComparisonCache`]: comparison outcomes on disk as JSON, keyed by a
//!   content hash of the series fingerprint and comparison config
//!
//! A hit returns exactly what a fresh computation would; nothing here is global.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::debug;

use forecastlab_core::domain::PriceSeries;
use forecastlab_core::features::{derive, FeatureTable};

use crate::compare::Comparison;
use crate::config::CompareConfig;

// ─── Feature cache ───────────────────────────────────────────────────

/// Memoizes `derive` per distinct series. Safe to share across threads.
#[derive(Debug, Default)]
pub struct FeatureCache {
    tables: Mutex<HashMap<String, Arc<FeatureTable>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached table for `series`, deriving and storing it on a miss.
    pub fn get_or_derive(&self, series: &PriceSeries) -> Arc<FeatureTable> {
        let key = series.fingerprint();
        if let Some(table) = self.lock_tables().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(fingerprint = %key, "feature cache hit");
            return table;
        }

        // Derive outside the lock; a concurrent miss on the same key derives
        // the same table and the first insert wins.
        let table = Arc::new(derive(series));
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(fingerprint = %key, rows = table.len(), "feature cache miss");
        Arc::clone(self.lock_tables().entry(key).or_insert(table))
    }

    pub fn contains(&self, series: &PriceSeries) -> bool {
        self.lock_tables().contains_key(&series.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.lock_tables().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since construction or the last [`clear`](Self::clear).
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn clear(&self) {
        self.lock_tables().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn lock_tables(&self) -> MutexGuard<'_, HashMap<String, Arc<FeatureTable>>> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─── Comparison cache ────────────────────────────────────────────────

/// Content hash identifying one comparison run: the series plus the
/// training cut-off, grid and options.
pub fn comparison_key(series: &PriceSeries, config: &CompareConfig) -> Result<String> {
    let config_json =
        serde_json::to_string(config).context("Failed to serialize comparison config")?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(series.fingerprint().as_bytes());
    hasher.update(config_json.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Comparison outcomes stored as `<key>.json` under a directory.
#[derive(Debug, Clone)]
pub struct ComparisonCache {
    cache_dir: PathBuf,
}

impl ComparisonCache {
    /// Opens the cache, creating the directory if needed.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).context("Failed to create cache directory")?;
        Ok(Self { cache_dir })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }

    pub fn get(&self, key: &str) -> Result<Option<Comparison>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path).context("Failed to read cached comparison")?;
        let comparison =
            serde_json::from_str(&json).context("Failed to deserialize cached comparison")?;
        Ok(Some(comparison))
    }

    pub fn put(&self, key: &str, comparison: &Comparison) -> Result<()> {
        let json =
            serde_json::to_string_pretty(comparison).context("Failed to serialize comparison")?;
        std::fs::write(self.entry_path(key), json).context("Failed to write cached comparison")?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove cached comparison")?;
        }
        Ok(())
    }

    /// Number of cached comparisons.
    pub fn len(&self) -> Result<usize> {
        let count = std::fs::read_dir(&self.cache_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().is_file()
                    && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
            })
            .count();
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }
}
