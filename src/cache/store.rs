//! Artifact cache: an index of rendered PNG files on disk.
//!
//! The index is the only state shared between concurrent renders. Lookups
//! take the read lock; store, cleanup and invalidation take the write lock
//! and touch the filesystem inside it, so a lookup never returns a path that
//! a concurrent sweep has already deleted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::key::CacheKey;
use crate::error::Result;
use crate::render::encode::{png_dimensions, promote, remove_quietly, STAGING_EXTENSION};

/// One registered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    pub artifact_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

/// Counters since the cache was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an expired entry or a missing file
    pub stale: u64,
    pub stores: u64,
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    stores: AtomicU64,
    evicted: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Index of rendered artifacts with TTL expiry and a runtime on/off switch.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    ttl: Duration,
    enabled: AtomicBool,
    index: RwLock<HashMap<CacheKey, CacheEntry>>,
    counters: Counters,
}

impl ArtifactCache {
    /// Open a cache directory, creating it if needed.
    ///
    /// Existing artifacts are registered again (created-at is the file's
    /// modification time) and staging files left by interrupted renders are
    /// removed.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration, enabled: bool) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let cache = Self {
            dir,
            ttl,
            enabled: AtomicBool::new(enabled),
            index: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        };
        let restored = cache.rehydrate()?;
        tracing::debug!(dir = %cache.dir.display(), restored, enabled, "opened artifact cache");
        Ok(cache)
    }

    fn rehydrate(&self) -> Result<usize> {
        let mut index = self.index.write();
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if !path.is_file() {
                continue;
            }
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if extension == STAGING_EXTENSION {
                remove_quietly(&path);
                continue;
            }
            if extension != "png" {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(CacheKey::parse)
            else {
                continue;
            };
            let created_at = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => DateTime::<Utc>::from(modified),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping artifact without mtime");
                    continue;
                }
            };
            let (width, height) = match png_dimensions(&path) {
                Ok(dims) => dims,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "removing unreadable artifact");
                    remove_quietly(&path);
                    continue;
                }
            };
            index.insert(
                key.clone(),
                CacheEntry {
                    key,
                    artifact_path: path,
                    width,
                    height,
                    created_at,
                },
            );
        }
        Ok(index.len())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Canonical artifact path for a key.
    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        tracing::info!(enabled, "artifact cache toggled");
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        self.is_older_than_ttl(entry.created_at, now)
    }

    fn is_older_than_ttl(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // Entries from the future (clock skew) are not expired.
        (now - created_at).to_std().is_ok_and(|age| age > self.ttl)
    }

    /// Path of a live artifact, or `None` on a miss.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        self.lookup_at(key, Utc::now())
    }

    /// [`Self::lookup`] evaluated at `now`.
    ///
    /// Expired entries and entries whose file is gone count as misses.
    /// Entries with a missing file are dropped from the index.
    pub fn lookup_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<PathBuf> {
        if !self.is_cache_enabled() {
            return None;
        }

        let stale_path = {
            let index = self.index.read();
            let Some(entry) = index.get(key) else {
                Counters::bump(&self.counters.misses, 1);
                tracing::debug!(key = %key, "cache miss");
                return None;
            };
            if self.is_expired(entry, now) {
                Counters::bump(&self.counters.stale, 1);
                tracing::debug!(key = %key, created_at = %entry.created_at, "cache entry expired");
                return None;
            }
            if entry.artifact_path.is_file() {
                Counters::bump(&self.counters.hits, 1);
                tracing::debug!(key = %key, path = %entry.artifact_path.display(), "cache hit");
                return Some(entry.artifact_path.clone());
            }
            entry.artifact_path.clone()
        };

        Counters::bump(&self.counters.stale, 1);
        tracing::warn!(key = %key, path = %stale_path.display(), "cached artifact missing on disk");
        let mut index = self.index.write();
        let still_missing = index
            .get(key)
            .is_some_and(|e| e.artifact_path == stale_path && !stale_path.is_file());
        if still_missing {
            index.remove(key);
        }
        None
    }

    /// Register a staged artifact under `key`.
    ///
    /// Returns `Ok(None)` without touching the staged file when the cache is
    /// disabled. Otherwise the staged file is renamed to the canonical path,
    /// any superseded artifact at a different path is removed, and the entry
    /// is inserted.
    pub fn store(&self, key: &CacheKey, staged: &Path, width: u32, height: u32) -> Result<Option<PathBuf>> {
        self.store_at(key, staged, width, height, Utc::now())
    }

    /// [`Self::store`] with an explicit creation time.
    pub fn store_at(
        &self,
        key: &CacheKey,
        staged: &Path,
        width: u32,
        height: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>> {
        if !self.is_cache_enabled() {
            return Ok(None);
        }
        let target = self.artifact_path(key);

        let mut index = self.index.write();
        if let Some(previous) = index.get(key) {
            if previous.artifact_path != target {
                remove_quietly(&previous.artifact_path);
            }
        }
        if staged != target {
            promote(staged, &target)?;
        }
        index.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                artifact_path: target.clone(),
                width,
                height,
                created_at: now,
            },
        );
        Counters::bump(&self.counters.stores, 1);
        tracing::debug!(key = %key, path = %target.display(), width, height, "stored artifact");
        Ok(Some(target))
    }

    /// Remove expired entries and entries whose file is gone, deleting their
    /// files. Artifacts in the directory that no entry references (written
    /// while the cache was disabled) are deleted once their modification
    /// time is past the TTL. Returns the number of entries and files removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    /// [`Self::cleanup`] evaluated at `now`.
    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut index = self.index.write();
        let doomed: Vec<CacheKey> = index
            .values()
            .filter(|e| self.is_expired(e, now) || !e.artifact_path.is_file())
            .map(|e| e.key.clone())
            .collect();

        for key in &doomed {
            if let Some(entry) = index.remove(key) {
                remove_quietly(&entry.artifact_path);
            }
        }
        let unindexed = self.sweep_unindexed(&index, now);
        let remaining = index.len();
        drop(index);

        let evicted = doomed.len().saturating_add(unindexed);
        Counters::bump(
            &self.counters.evicted,
            u64::try_from(evicted).unwrap_or(u64::MAX),
        );
        if evicted > 0 {
            tracing::info!(evicted, remaining, "cache cleanup evicted entries");
        } else {
            tracing::debug!(remaining, "cache cleanup found nothing to evict");
        }
        evicted
    }

    /// Delete expired `<key>.png` files the index does not reference.
    ///
    /// Called with the index write lock held, so no store can register one of
    /// these files mid-sweep.
    fn sweep_unindexed(&self, index: &HashMap<CacheKey, CacheEntry>, now: DateTime<Utc>) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot list cache directory");
                return 0;
            }
        };
        let mut removed = 0;
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("png") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).and_then(CacheKey::parse) else {
                continue;
            };
            if index.get(&key).is_some_and(|entry| entry.artifact_path == path) {
                continue;
            }
            let expired = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .is_ok_and(|modified| self.is_older_than_ttl(DateTime::<Utc>::from(modified), now));
            if expired {
                tracing::debug!(path = %path.display(), "removing unindexed artifact");
                remove_quietly(&path);
                removed += 1;
            }
        }
        removed
    }

    /// Drop an entry and delete its file. Returns whether an entry existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut index = self.index.write();
        match index.remove(key) {
            Some(entry) => {
                remove_quietly(&entry.artifact_path);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.index.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Snapshot of all entries, ordered by key.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.index.read().values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            stale: load(&self.counters.stale),
            stores: load(&self.counters.stores),
            evicted: load(&self.counters.evicted),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::cache::key::derive_key;

    const DAY: Duration = Duration::from_secs(86_400);

    /// Write a tiny valid PNG as a staged file.
    fn stage(cache: &ArtifactCache, key: &CacheKey) -> PathBuf {
        let mut pixmap = tiny_skia::Pixmap::new(4, 3).unwrap();
        pixmap.fill(tiny_skia::Color::WHITE);
        crate::render::write_staged_png(&pixmap, &cache.artifact_path(key)).unwrap()
    }

    #[test]
    fn test_store_then_lookup_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let key = derive_key(80.0, "t1").unwrap();
        assert!(cache.lookup(&key).is_none());

        let staged = stage(&cache, &key);
        let path = cache.store(&key, &staged, 4, 3).unwrap().unwrap();
        assert_eq!(path, cache.artifact_path(&key));
        assert!(!staged.exists());
        assert_eq!(cache.lookup(&key), Some(path));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores), (1, 1, 1));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let ttl = Duration::from_secs(60);
        let cache = ArtifactCache::open(dir.path(), ttl, true).unwrap();
        let key = derive_key(80.0, "t1").unwrap();
        let t0 = Utc::now();
        let staged = stage(&cache, &key);
        let path = cache.store_at(&key, &staged, 4, 3, t0).unwrap().unwrap();

        let at_ttl = t0 + chrono::Duration::seconds(60);
        assert!(cache.lookup_at(&key, at_ttl).is_some());
        let past_ttl = t0 + chrono::Duration::seconds(61);
        assert!(cache.lookup_at(&key, past_ttl).is_none());

        assert_eq!(cache.cleanup_at(past_ttl), 1);
        assert!(!path.exists());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_a_miss_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let key = derive_key(1.0, "t").unwrap();
        let staged = stage(&cache, &key);
        let path = cache.store(&key, &staged, 4, 3).unwrap().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(cache.lookup(&key).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().stale, 1);
    }

    #[test]
    fn test_disabled_cache_is_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, false).unwrap();
        let key = derive_key(1.0, "t").unwrap();
        let staged = stage(&cache, &key);
        assert_eq!(cache.store(&key, &staged, 4, 3).unwrap(), None);
        assert!(staged.exists());
        assert!(cache.lookup(&key).is_none());
        assert!(cache.is_empty());

        cache.set_enabled(true);
        assert!(cache.is_cache_enabled());
        assert!(cache.store(&key, &staged, 4, 3).unwrap().is_some());
        cache.set_enabled(false);
        assert!(cache.lookup(&key).is_none());
    }

    #[test]
    fn test_overwrite_keeps_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let key = derive_key(2.0, "t").unwrap();
        for _ in 0..3 {
            let staged = stage(&cache, &key);
            cache.store(&key, &staged, 4, 3).unwrap();
        }
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_open_rehydrates_and_clears_staging() {
        let dir = tempfile::tempdir().unwrap();
        let key = derive_key(3.0, "t").unwrap();
        {
            let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
            let staged = stage(&cache, &key);
            cache.store(&key, &staged, 4, 3).unwrap();
            // An interrupted render leaves this behind
            stage(&cache, &key);
        }
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        let reopened = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let entry = reopened.get(&key).unwrap();
        assert_eq!((entry.width, entry.height), (4, 3));
        assert!(reopened.lookup(&key).is_some());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == STAGING_EXTENSION))
            .count();
        assert_eq!(leftovers, 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_sweeps_artifacts_written_while_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, false).unwrap();
        let keys: Vec<CacheKey> = (0..3).map(|i| derive_key(f64::from(i), "t").unwrap()).collect();
        for key in &keys {
            let staged = stage(&cache, key);
            assert_eq!(cache.store(key, &staged, 4, 3).unwrap(), None);
            promote(&staged, &cache.artifact_path(key)).unwrap();
        }
        std::fs::write(dir.path().join("notes.png"), "not an artifact").unwrap();

        assert_eq!(cache.cleanup_at(Utc::now()), 0);
        assert!(keys.iter().all(|k| cache.artifact_path(k).exists()));

        let later = Utc::now() + chrono::Duration::days(2);
        assert_eq!(cache.cleanup_at(later), 3);
        assert!(keys.iter().all(|k| !cache.artifact_path(k).exists()));
        assert!(dir.path().join("notes.png").exists());
        assert_eq!(cache.stats().evicted, 3);
    }

    #[test]
    fn test_cleanup_keeps_live_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let old = derive_key(5.0, "t").unwrap();
        let fresh = derive_key(6.0, "t").unwrap();
        let now = Utc::now();
        let staged = stage(&cache, &old);
        cache.store_at(&old, &staged, 4, 3, now - chrono::Duration::days(2)).unwrap();
        let staged = stage(&cache, &fresh);
        cache.store_at(&fresh, &staged, 4, 3, now).unwrap();

        assert_eq!(cache.cleanup_at(now), 1);
        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, fresh);
        assert!(cache.artifact_path(&fresh).exists());
    }

    #[test]
    fn test_invalidate_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), DAY, true).unwrap();
        let key = derive_key(4.0, "t").unwrap();
        let staged = stage(&cache, &key);
        let path = cache.store(&key, &staged, 4, 3).unwrap().unwrap();
        assert!(cache.invalidate(&key));
        assert!(!path.exists());
        assert!(!cache.invalidate(&key));
    }
}
