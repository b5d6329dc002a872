//! Ico - An on-demand image transformation service
//!
//! This library provides the core functionality for transforming images
//! stored in S3-compatible object storage: a declarative parameter pipeline,
//! a typed codec facade, a quota-bounded local file cache and a source layer
//! with atomic publish semantics.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod server;
pub mod source;

// Re-export commonly used types
pub use crate::cache::{CacheRegistry, FileCache};
pub use crate::codec::{Codec, CodecSettings, Handle};
pub use crate::config::Config;
pub use crate::error::{
    CacheError, CodecError, ImageError, ParamsError, ProcessError, StoreError,
};
pub use crate::image::{content_type_of, Image, ImageKind};
pub use crate::pipeline::{CropGravity, Fit, Operation, Pipeline, RawParams, TransformParams};
pub use crate::server::{
    create_router, health_handler, process_handler, purge_flat_handler, purge_handler, AppState,
    ErrorResponse, HealthResponse, PublishQueue, PurgeResponse,
};
pub use crate::source::{
    create_s3_client, is_known_region, ObjectStore, S3ObjectStore, S3StoreProvider, Source,
    SourceDefaults, SourceRegistry, StoreProvider,
};
