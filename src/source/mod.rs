//! Object store bindings and the source layer.
//!
//! A [`Source`] binds a remote bucket to an optional local file cache and is
//! the only way request handling touches storage. Sources are resolved per
//! `(region, bucket)` pair by the [`SourceRegistry`] and created at most
//! once.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Dispatch handlers            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │      SourceRegistry (region/bucket)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       Source (cache + atomic put)       │
//! │   ┌───────────┐       ┌─────────────┐   │
//! │   │ FileCache │       │ ObjectStore │   │
//! │   └───────────┘       └─────────────┘   │
//! └─────────────────────────────────────────┘
//! ```

mod registry;
mod s3;
#[allow(clippy::module_inception)]
mod source;

pub use registry::{SourceDefaults, SourceRegistry};
pub use s3::{create_s3_client, is_known_region, S3ObjectStore, S3StoreProvider};
pub use source::Source;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

/// Remote object storage, scoped to a single bucket.
///
/// Implementations are expected to be cheap to share; the S3 implementation
/// clones an SDK client handle.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Upload an object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Server-side copy within the bucket.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError>;

    /// Batch-delete objects.
    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Enumerate the common prefixes (directories) directly below a path.
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Opens object stores for `(region, bucket)` pairs.
///
/// Abstracting store construction keeps the registry and dispatch layer
/// testable against in-memory stores.
#[async_trait]
pub trait StoreProvider: Send + Sync + 'static {
    type Store: ObjectStore;

    /// Open a store bound to the named bucket.
    ///
    /// Empty credentials mean ambient (instance profile) authentication.
    async fn open(
        &self,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self::Store, StoreError>;
}
