//! Local disk cache layer.
//!
//! Transformed artifacts are mirrored on local disk so repeat requests are
//! served without a round trip to the object store. The cache is an LRU over
//! files with a configurable disk quota; a process-wide registry guarantees
//! a single cache instance per directory root.
//!
//! # Components
//!
//! - [`FileCache`]: disk-backed LRU with quota, usage accounting and
//!   best-effort failure semantics
//! - [`CacheRegistry`]: injectable path-to-instance registry, write-once per
//!   root, raising quotas on re-registration

mod file_cache;
mod registry;

pub use file_cache::FileCache;
pub use registry::CacheRegistry;
