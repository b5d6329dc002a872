//! Process-wide registry of file caches.
//!
//! At most one [`FileCache`] exists per root path within the process; every
//! consumer of the same root shares the instance by reference. The registry
//! is an explicit, injectable context created at service start rather than a
//! global.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::FileCache;
use crate::error::CacheError;

/// Registry mapping cache roots to their single in-process instance.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Mutex<HashMap<PathBuf, Arc<FileCache>>>,
}

impl CacheRegistry {
    pub fn new() -> CacheRegistry {
        CacheRegistry::default()
    }

    /// Open the cache for a root, creating it on first use.
    ///
    /// When the root is already registered the existing instance is
    /// returned, with its effective quota raised to the greater of the
    /// existing and requested values (zero meaning unlimited supersedes any
    /// finite quota).
    pub async fn open(
        &self,
        root: impl Into<PathBuf>,
        quota: u64,
    ) -> Result<Arc<FileCache>, CacheError> {
        let root = root.into();
        let mut caches = self.caches.lock().await;

        if let Some(existing) = caches.get(&root) {
            existing.raise_quota(quota).await;
            return Ok(Arc::clone(existing));
        }

        let cache = Arc::new(FileCache::open(&root, quota).await?);
        caches.insert(root, Arc::clone(&cache));

        Ok(cache)
    }
}

// =============================================================================
// Tests
// =============================================================================
