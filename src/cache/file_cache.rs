//! Disk-backed LRU cache for image buffers.
//!
//! A [`FileCache`] owns a directory tree and stores each entry in a file
//! whose path mirrors its key. The in-memory state is bookkeeping only: an
//! LRU index of keys to sizes, the disk quota and the current usage.
//!
//! # Contract
//!
//! - A quota of zero means unlimited.
//! - Entries whose size alone meets the quota are rejected.
//! - Adding an existing key promotes it without rewriting the file.
//! - Eviction walks the LRU tail until the new entry fits. Evictions that
//!   precede a failed write are not rolled back.
//! - All runtime operations are best-effort: disk failures make the
//!   operation a silent no-op, never an error for the caller.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

use crate::error::CacheError;

/// In-memory bookkeeping for the cache directory.
struct CacheState {
    /// Disk quota in bytes; zero means no limit.
    quota: u64,

    /// Current disk usage in bytes.
    usage: u64,

    /// Keys ordered by access recency, most recent first, with entry sizes.
    entries: LruCache<String, u64>,
}

/// A filesystem-backed LRU cache with a disk quota.
///
/// Shared by reference; all mutation happens behind one lock per cache.
pub struct FileCache {
    root: PathBuf,
    state: RwLock<CacheState>,
}

impl FileCache {
    /// Establish a cache rooted at `root` with the given quota in bytes.
    ///
    /// With a nonzero quota any existing directory at the root is removed
    /// first, guaranteeing a clean slate. With quota zero the existing tree
    /// is preserved and entries are re-admitted lazily on access.
    pub async fn open(root: impl Into<PathBuf>, quota: u64) -> Result<FileCache, CacheError> {
        let root = root.into();

        match tokio::fs::metadata(&root).await {
            Ok(meta) => {
                if meta.is_dir() && quota > 0 {
                    tokio::fs::remove_dir_all(&root).await?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tokio::fs::create_dir_all(&root).await?;

        Ok(FileCache {
            root,
            state: RwLock::new(CacheState {
                quota,
                usage: 0,
                entries: LruCache::unbounded(),
            }),
        })
    }

    /// The directory this cache owns.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a buffer under a key.
    ///
    /// Entries at least as large as the quota are refused. If the key is
    /// already present it is promoted to most-recently-used and the file is
    /// left untouched. Failures to write leave the cache without the entry.
    pub async fn add(&self, key: &str, data: &Bytes) {
        let Some(path) = self.entry_path(key) else {
            return;
        };

        let size = data.len() as u64;
        let mut state = self.state.write().await;

        if state.quota > 0 && size >= state.quota {
            return;
        }

        // Existing entries are promoted, not rewritten.
        if state.entries.get(key).is_some() {
            return;
        }

        if let Some(parent) = path.parent() {
            if tokio::fs::create_dir_all(parent).await.is_err() {
                return;
            }
        }

        state.entries.push(key.to_string(), size);

        // Make room before writing. If the write below fails, these
        // evictions stay evicted.
        while state.quota > 0 && state.usage + size > state.quota {
            if !evict_tail(&self.root, &mut state).await {
                break;
            }
        }

        if tokio::fs::write(&path, data).await.is_err() {
            state.entries.pop(key);
            return;
        }

        state.usage += size;
    }

    /// Fetch a buffer by key, promoting it to most-recently-used.
    ///
    /// A file present on disk but not yet tracked (warm start with an
    /// unlimited quota) is admitted transparently.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let path = self.entry_path(key)?;

        {
            let mut state = self.state.write().await;

            if state.entries.get(key).is_some() {
                match tokio::fs::read(&path).await {
                    Ok(buf) => return Some(Bytes::from(buf)),
                    Err(_) => {
                        // The file went away underneath us; drop the entry.
                        if let Some(size) = state.entries.pop(key) {
                            state.usage = state.usage.saturating_sub(size);
                        }
                        return None;
                    }
                }
            }
        }

        let buf = tokio::fs::read(&path).await.ok()?;
        let data = Bytes::from(buf);
        self.add(key, &data).await;

        Some(data)
    }

    /// Remove an entry and its file.
    pub async fn remove(&self, key: &str) {
        let Some(path) = self.entry_path(key) else {
            return;
        };

        let mut state = self.state.write().await;

        if let Some(size) = state.entries.pop(key) {
            let _ = tokio::fs::remove_file(&path).await;
            state.usage = state.usage.saturating_sub(size);
        }
    }

    /// Evict the least-recently-used entry.
    pub async fn remove_oldest(&self) {
        let mut state = self.state.write().await;
        evict_tail(&self.root, &mut state).await;
    }

    /// Raise the effective quota to the greater of the current and new
    /// values; zero (unlimited) supersedes any finite quota.
    pub async fn raise_quota(&self, quota: u64) {
        let mut state = self.state.write().await;

        if quota == 0 || (state.quota > 0 && state.quota < quota) {
            state.quota = quota;
        }
    }

    /// Current disk usage in bytes.
    pub async fn usage(&self) -> u64 {
        self.state.read().await.usage
    }

    /// Effective quota in bytes; zero means unlimited.
    pub async fn quota(&self) -> u64 {
        self.state.read().await.quota
    }

    /// Number of tracked entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Resolve a key to its on-disk path.
    ///
    /// Keys escaping the cache root are refused.
    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));

        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return None,
            }
        }

        Some(self.root.join(relative))
    }
}

/// Drop the LRU tail entry and its file. Returns false when empty.
async fn evict_tail(root: &Path, state: &mut CacheState) -> bool {
    let Some((key, size)) = state.entries.pop_lru() else {
        return false;
    };

    let _ = tokio::fs::remove_file(root.join(key.trim_start_matches('/'))).await;
    state.usage = state.usage.saturating_sub(size);

    true
}

// =============================================================================
// Tests
// =============================================================================
