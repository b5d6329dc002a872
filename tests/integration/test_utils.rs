//! Shared utilities for integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use ico::codec::{Codec, CodecSettings};
use ico::error::StoreError;
use ico::server::{create_router, AppState};
use ico::source::{ObjectStore, SourceDefaults, SourceRegistry, StoreProvider};

// =============================================================================
// Test images
// =============================================================================

/// Encode a gradient JPEG of the given dimensions.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Check that a buffer starts with the JPEG magic number.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

/// Decode a buffer and return its dimensions.
pub fn decoded_dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

// =============================================================================
// Mock object store
// =============================================================================

#[derive(Default)]
struct MockStoreInner {
    objects: Mutex<HashMap<String, Bytes>>,
    log: Mutex<Vec<String>>,
}

/// In-memory object store shared between the test and the service.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<MockStoreInner>,
}

impl MockStore {
    pub fn insert(&self, key: &str, data: &[u8]) {
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.objects.lock().unwrap().contains_key(key)
    }

    pub fn log(&self) -> Vec<String> {
        self.inner.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.inner.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.record(format!("get {}", key));
        self.inner
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StoreError> {
        self.record(format!("put {}", key));
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.record(format!("copy {} {}", src_key, dst_key));
        let data = self
            .inner
            .objects
            .lock()
            .unwrap()
            .get(src_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(src_key.to_string()))?;
        self.inner
            .objects
            .lock()
            .unwrap()
            .insert(dst_key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.record(format!("delete {}", key));
            self.inner.objects.lock().unwrap().remove(key);
        }
        Ok(())
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.record(format!("list {}", prefix));
        let objects = self.inner.objects.lock().unwrap();
        let mut dirs: Vec<String> = objects
            .keys()
            .filter_map(|key| {
                let rest = key.strip_prefix(prefix)?;
                if rest.contains('/') {
                    let dir = rest.split('/').next()?;
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

/// Provider handing out per-bucket mock stores.
#[derive(Clone, Default)]
pub struct MockProvider {
    buckets: Arc<Mutex<HashMap<String, MockStore>>>,
}

impl MockProvider {
    /// The store for a bucket, creating it on first use.
    pub fn bucket(&self, name: &str) -> MockStore {
        self.buckets
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl StoreProvider for MockProvider {
    type Store = MockStore;

    async fn open(
        &self,
        _region: &str,
        bucket: &str,
        _access_key: &str,
        _secret_key: &str,
    ) -> Result<MockStore, StoreError> {
        Ok(self.bucket(bucket))
    }
}

// =============================================================================
// Application harness
// =============================================================================

/// A router wired to mock storage, plus handles for inspection.
pub struct TestApp {
    pub router: Router,
    pub provider: MockProvider,

    // Keeps the per-test cache directory alive.
    _cache_dir: TempDir,
}

impl TestApp {
    /// The default-bucket store.
    pub fn store(&self) -> MockStore {
        self.provider.bucket("images")
    }
}

/// Build a service instance over mock storage with `images` as the default
/// bucket.
pub fn build_app() -> TestApp {
    let cache_dir = TempDir::new().unwrap();
    let provider = MockProvider::default();

    let registry = SourceRegistry::with_cache_root(
        provider.clone(),
        SourceDefaults {
            region: "us-east-1".to_string(),
            bucket: "images".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
        },
        0,
        "ico",
        cache_dir.path().to_path_buf(),
    );

    let codec = Codec::init(CodecSettings::default());
    let state = AppState::new(registry, codec);
    let router = create_router(state, false);

    TestApp {
        router,
        provider,
        _cache_dir: cache_dir,
    }
}

/// Poll until a condition holds or a timeout elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
