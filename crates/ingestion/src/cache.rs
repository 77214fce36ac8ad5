//! Content-addressed cache of canonical tables.
//!
//! Entries are keyed by the SHA-256 of the source bytes together with the
//! configuration that built them, so an unchanged source is never parsed twice
//! and a changed one always is. The cache holds at most `capacity` tables and
//! evicts the least recently used one when full.

use crate::normalizer::Normalizer;
use lemans_core::config::{NormalizerConfig, SourceConfig};
use lemans_core::{CanonicalTable, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default number of tables kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Hex SHA-256 of a source.
pub fn source_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    digest: String,
    source: SourceConfig,
    normalizer: NormalizerConfig,
}

/// A file read under one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathKey {
    path: PathBuf,
    source: SourceConfig,
    normalizer: NormalizerConfig,
}

#[derive(Debug)]
struct Entry {
    table: Arc<CanonicalTable>,
    last_used: u64,
}

/// Memoized canonical tables.
#[derive(Debug)]
pub struct TableCache {
    entries: HashMap<CacheKey, Entry>,
    /// Last key loaded from each path and configuration, so a rewritten file
    /// evicts its old table.
    by_path: HashMap<PathKey, CacheKey>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl TableCache {
    /// Create an empty cache with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache holding at most `capacity` tables (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_path: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Load a file through the cache.
    pub fn load_path(
        &mut self,
        path: impl AsRef<Path>,
        normalizer: &Normalizer,
    ) -> Result<Arc<CanonicalTable>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let key = Self::key(&bytes, normalizer);
        let path_key = PathKey {
            path: path.to_path_buf(),
            source: key.source.clone(),
            normalizer: key.normalizer,
        };

        if let Some(previous) = self.by_path.insert(path_key, key.clone()) {
            let still_referenced = self.by_path.values().any(|k| *k == previous);
            if !still_referenced {
                debug!(path = %path.display(), "source changed, evicting previous table");
                self.entries.remove(&previous);
            }
        }

        self.get_or_build(key, &bytes, normalizer)
    }

    /// Load an in-memory source through the cache.
    pub fn load_bytes(&mut self, bytes: &[u8], normalizer: &Normalizer) -> Result<Arc<CanonicalTable>> {
        let key = Self::key(bytes, normalizer);
        self.get_or_build(key, bytes, normalizer)
    }

    fn key(bytes: &[u8], normalizer: &Normalizer) -> CacheKey {
        CacheKey {
            digest: source_digest(bytes),
            source: normalizer.source_config().clone(),
            normalizer: *normalizer.config(),
        }
    }

    fn get_or_build(
        &mut self,
        key: CacheKey,
        bytes: &[u8],
        normalizer: &Normalizer,
    ) -> Result<Arc<CanonicalTable>> {
        self.tick += 1;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = self.tick;
            self.hits += 1;
            debug!(digest = %key.digest, "table cache hit");
            return Ok(Arc::clone(&entry.table));
        }

        self.misses += 1;
        debug!(digest = %key.digest, "table cache miss");
        let table = Arc::new(normalizer.normalize_bytes(bytes)?);
        if self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.entries.insert(
            key,
            Entry {
                table: Arc::clone(&table),
                last_used: self.tick,
            },
        );
        Ok(table)
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());
        if let Some(oldest) = oldest {
            debug!(digest = %oldest.digest, "cache full, evicting least recently used table");
            self.entries.remove(&oldest);
            self.by_path.retain(|_, k| *k != oldest);
        }
    }

    /// Maximum number of cached tables.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no tables.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that built a table.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Drop all cached tables.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_path.clear();
    }
}
