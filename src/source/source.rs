//! A source: one remote bucket paired with an optional local cache.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::cache::FileCache;
use crate::error::StoreError;

use super::ObjectStore;

/// Binding of a remote bucket to a local cache.
///
/// Reads prefer the cache and populate it on miss. Writes go to the cache
/// and then publish to the store atomically: the payload is uploaded under a
/// temporary name, copied server-side to the final key and the temporary
/// object deleted, so readers never observe a half-written object.
pub struct Source<S> {
    store: S,
    cache: Option<Arc<FileCache>>,
}

impl<S: ObjectStore> Source<S> {
    /// Create a source without a local cache.
    pub fn new(store: S) -> Source<S> {
        Source { store, cache: None }
    }

    /// Create a source backed by a local cache.
    pub fn with_cache(store: S, cache: Arc<FileCache>) -> Source<S> {
        Source {
            store,
            cache: Some(cache),
        }
    }

    /// The underlying object store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch data from the local cache or the bucket.
    ///
    /// Bucket hits are mirrored into the cache before returning.
    pub async fn get(&self, name: &str) -> Result<Bytes, StoreError> {
        if let Some(cache) = &self.cache {
            if let Some(data) = cache.get(name).await {
                return Ok(data);
            }
        }

        let data = self.store.get(name).await?;

        if let Some(cache) = &self.cache {
            cache.add(name, &data).await;
        }

        Ok(data)
    }

    /// Insert data into the local cache and the bucket.
    ///
    /// The upload lands under `name + ".tmp"` and is renamed into place with
    /// a server-side copy once complete.
    pub async fn put(&self, name: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        if let Some(cache) = &self.cache {
            cache.add(name, &data).await;
        }

        let tmp = format!("{}.tmp", name);

        self.store.put(&tmp, data, content_type).await?;
        self.store.copy(&tmp, name).await?;

        if let Err(e) = self.store.delete(std::slice::from_ref(&tmp)).await {
            warn!("failed to delete temporary object '{}': {}", tmp, e);
        }

        Ok(())
    }

    /// Remove one or more objects from the local cache and the bucket.
    pub async fn delete(&self, names: &[String]) -> Result<(), StoreError> {
        if let Some(cache) = &self.cache {
            for name in names {
                cache.remove(name).await;
            }
        }

        self.store.delete(names).await
    }

    /// Enumerate the directories directly below a path in the bucket.
    pub async fn list_dirs(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.store.list_dirs(name).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store that records every call for ordering assertions.
    #[derive(Default)]
    pub struct MockStore {
        objects: Mutex<HashMap<String, Bytes>>,
        log: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn with_object(self, key: &str, data: &[u8]) -> Self {
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), Bytes::copy_from_slice(data));
            self
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl ObjectStore for MockStore {
        async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
            self.log.lock().unwrap().push(format!("get {}", key));
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))
        }

        async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StoreError> {
            self.log.lock().unwrap().push(format!("put {}", key));
            self.objects.lock().unwrap().insert(key.to_string(), data);
            Ok(())
        }

        async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("copy {} {}", src_key, dst_key));
            let data = self
                .objects
                .lock()
                .unwrap()
                .get(src_key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(src_key.to_string()))?;
            self.objects.lock().unwrap().insert(dst_key.to_string(), data);
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
            for key in keys {
                self.log.lock().unwrap().push(format!("delete {}", key));
                self.objects.lock().unwrap().remove(key);
            }
            Ok(())
        }

        async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.log.lock().unwrap().push(format!("list {}", prefix));
            let objects = self.objects.lock().unwrap();
            let mut dirs: Vec<String> = objects
                .keys()
                .filter_map(|key| {
                    let rest = key.strip_prefix(prefix)?;
                    let dir = rest.split('/').next()?;
                    if rest.contains('/') {
                        Some(format!("{}{}/", prefix, dir))
                    } else {
                        None
                    }
                })
                .collect();
            dirs.sort();
            dirs.dedup();
            Ok(dirs)
        }
    }

    async fn cached_source(store: MockStore) -> (TempDir, Source<MockStore>) {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(
            FileCache::open(dir.path().join("cache"), 0).await.unwrap(),
        );
        (dir, Source::with_cache(store, cache))
    }

    #[tokio::test]
    async fn test_get_populates_cache() {
        let store = MockStore::default().with_object("images/a.jpg", b"payload");
        let (_dir, source) = cached_source(store).await;

        assert_eq!(&source.get("images/a.jpg").await.unwrap()[..], b"payload");

        // Second read is served locally.
        assert_eq!(&source.get("images/a.jpg").await.unwrap()[..], b"payload");
        assert_eq!(source.store().log(), vec!["get images/a.jpg"]);
    }

    #[tokio::test]
    async fn test_get_missing_propagates() {
        let (_dir, source) = cached_source(MockStore::default()).await;
        assert!(matches!(
            source.get("absent.jpg").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_publishes_atomically() {
        let (_dir, source) = cached_source(MockStore::default()).await;

        source
            .put("images/out.jpg", Bytes::from_static(b"data"), "image/jpeg")
            .await
            .unwrap();

        // Upload to temp, server-side copy, temp delete; the final key is
        // only ever written by the copy.
        assert_eq!(
            source.store().log(),
            vec![
                "put images/out.jpg.tmp",
                "copy images/out.jpg.tmp images/out.jpg",
                "delete images/out.jpg.tmp",
            ]
        );
        assert!(source.store().contains("images/out.jpg"));
        assert!(!source.store().contains("images/out.jpg.tmp"));
    }

    #[tokio::test]
    async fn test_put_mirrors_to_cache() {
        let (_dir, source) = cached_source(MockStore::default()).await;

        source
            .put("images/out.jpg", Bytes::from_static(b"data"), "image/jpeg")
            .await
            .unwrap();

        // The read is served from cache: no store get appears in the log.
        let data = source.get("images/out.jpg").await.unwrap();
        assert_eq!(&data[..], b"data");
        assert!(!source.store().log().iter().any(|l| l.starts_with("get")));
    }

    #[tokio::test]
    async fn test_delete_removes_everywhere() {
        let store = MockStore::default().with_object("images/a.jpg", b"x");
        let (_dir, source) = cached_source(store).await;

        source.get("images/a.jpg").await.unwrap();
        source
            .delete(&["images/a.jpg".to_string()])
            .await
            .unwrap();

        assert!(!source.store().contains("images/a.jpg"));
        assert!(matches!(
            source.get("images/a.jpg").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_dirs_passthrough() {
        let store = MockStore::default()
            .with_object("images/width=500/a.jpg", b"1")
            .with_object("images/width=200,fit=crop/a.jpg", b"2")
            .with_object("images/a.jpg", b"3");
        let source = Source::new(store);

        let dirs = source.list_dirs("images/").await.unwrap();
        assert_eq!(
            dirs,
            vec!["images/width=200,fit=crop/", "images/width=500/"]
        );
    }

    #[tokio::test]
    async fn test_uncached_source_reads_store_every_time() {
        let store = MockStore::default().with_object("a.jpg", b"x");
        let source = Source::new(store);

        source.get("a.jpg").await.unwrap();
        source.get("a.jpg").await.unwrap();

        assert_eq!(source.store().log().len(), 2);
    }
}
