//! Registry of sources, keyed by region and bucket.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::cache::CacheRegistry;
use crate::error::StoreError;

use super::{Source, StoreProvider};

/// Fallback source named by the service configuration.
///
/// Configured credentials apply only to the default source; sources selected
/// per request through headers authenticate ambiently.
#[derive(Debug, Clone, Default)]
pub struct SourceDefaults {
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Resolves and owns one [`Source`] per `(region, bucket)` pair.
///
/// Each source is created at most once and bound to a local cache rooted at
/// `{cache_root}/{base}/{region}/{bucket}` with the configured quota.
pub struct SourceRegistry<P: StoreProvider> {
    provider: P,
    defaults: SourceDefaults,
    quota: u64,
    cache_base: String,
    cache_root: PathBuf,
    caches: CacheRegistry,
    sources: Mutex<HashMap<String, Arc<Source<P::Store>>>>,
}

impl<P: StoreProvider> SourceRegistry<P> {
    /// Create a registry with caches rooted in the system temp directory.
    pub fn new(provider: P, defaults: SourceDefaults, quota: u64, cache_base: &str) -> Self {
        Self::with_cache_root(provider, defaults, quota, cache_base, std::env::temp_dir())
    }

    /// Create a registry with an explicit cache root directory.
    pub fn with_cache_root(
        provider: P,
        defaults: SourceDefaults,
        quota: u64,
        cache_base: &str,
        cache_root: PathBuf,
    ) -> Self {
        SourceRegistry {
            provider,
            defaults,
            quota,
            cache_base: cache_base.to_string(),
            cache_root,
            caches: CacheRegistry::new(),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the source for a request.
    ///
    /// An empty region or bucket falls back to the configured defaults; the
    /// configured credentials are only applied to that default source.
    pub async fn resolve(
        &self,
        region: &str,
        bucket: &str,
    ) -> Result<Arc<Source<P::Store>>, StoreError> {
        let (region, bucket, access_key, secret_key) = if region.is_empty() || bucket.is_empty() {
            (
                self.defaults.region.as_str(),
                self.defaults.bucket.as_str(),
                self.defaults.access_key.as_str(),
                self.defaults.secret_key.as_str(),
            )
        } else {
            (region, bucket, "", "")
        };

        if region.is_empty() || bucket.is_empty() {
            return Err(StoreError::NoSource);
        }

        let key = format!("{}/{}", region, bucket);
        let mut sources = self.sources.lock().await;

        if let Some(source) = sources.get(&key) {
            return Ok(Arc::clone(source));
        }

        let store = self
            .provider
            .open(region, bucket, access_key, secret_key)
            .await?;

        let cache_dir = self
            .cache_root
            .join(&self.cache_base)
            .join(region)
            .join(bucket);

        let cache = self
            .caches
            .open(&cache_dir, self.quota)
            .await
            .map_err(|e| StoreError::CacheInit(e.to_string()))?;

        info!(
            "initialized source {} with cache at {}",
            key,
            cache_dir.display()
        );

        let source = Arc::new(Source::with_cache(store, cache));
        sources.insert(key, Arc::clone(&source));

        Ok(source)
    }
}

// =============================================================================
// Tests
// =============================================================================
