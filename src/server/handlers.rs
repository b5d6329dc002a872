//! HTTP request handlers for the image transformation API.
//!
//! # Endpoints
//!
//! - `GET /ico/{params}/{image...}` - Transform an image, write back async
//! - `HEAD /ico/{params}/{image...}` - Same, publish before responding
//! - `DELETE /ico/{image...}` - Purge an image and all processed variants
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::ProcessError;
use crate::image::{content_type_of, Image};
use crate::pipeline::Pipeline;
use crate::source::{Source, SourceRegistry, StoreProvider};

use super::publish::{PublishQueue, DEFAULT_PUBLISH_CAPACITY};

/// Cache directives attached to every successful image response.
const CACHE_CONTROL: &str = "no-transform,public,max-age=86400,s-maxage=2592000";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to all handlers via Axum's State.
pub struct AppState<P: StoreProvider> {
    /// Source resolver for region/bucket pairs
    pub sources: Arc<SourceRegistry<P>>,

    /// The process-wide codec
    pub codec: Arc<Codec>,

    /// Queue for asynchronous write-back of processed artifacts
    pub publisher: PublishQueue<P::Store>,
}

impl<P: StoreProvider> AppState<P> {
    /// Create application state with a default-capacity publish queue.
    pub fn new(sources: SourceRegistry<P>, codec: Arc<Codec>) -> Self {
        Self {
            sources: Arc::new(sources),
            codec,
            publisher: PublishQueue::new(DEFAULT_PUBLISH_CAPACITY),
        }
    }
}

impl<P: StoreProvider> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            codec: Arc::clone(&self.codec),
            publisher: self.publisher.clone(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error body returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Purge confirmation body.
#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub result: bool,
}

/// Build a JSON response with an explicit charset.
fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    let body = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(Body::from(body))
        .unwrap()
}

/// Build an image response with cache-friendly headers.
///
/// The content type is derived from the payload's magic number.
fn image_response(data: Bytes) -> Response {
    let content_type = content_type_of(&data);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .body(Body::from(data))
        .unwrap()
}

/// All request failures surface as 400 with the validator's or engine's
/// message in a JSON body.
impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        warn!("request failed: {}", self);

        json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: self.to_string(),
            },
        )
    }
}

// =============================================================================
// Key derivation
// =============================================================================

/// Compute the object key of a processed artifact.
///
/// The parameter string becomes a directory between the image's directory
/// and its basename, making the layout reversible from the URL.
fn derived_key(image: &str, params: &str) -> String {
    match image.rfind('/') {
        Some(i) => format!("{}/{}/{}", &image[..i], params, &image[i + 1..]),
        None => format!("{}/{}", params, image),
    }
}

/// Split an image path into its directory (without trailing slash) and
/// basename.
fn split_image_path(image: &str) -> (&str, &str) {
    match image.rfind('/') {
        Some(i) => (&image[..i], &image[i + 1..]),
        None => ("", image),
    }
}

/// Resolve the source for a request from its headers, falling back to the
/// configured defaults.
async fn resolve_source<P: StoreProvider>(
    state: &AppState<P>,
    headers: &HeaderMap,
) -> Result<Arc<Source<P::Store>>, ProcessError> {
    let region = headers
        .get("x-s3-region")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let bucket = headers
        .get("x-s3-bucket")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    Ok(state.sources.resolve(region, bucket).await?)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image transformation requests.
///
/// # Endpoint
///
/// `GET|HEAD /ico/{params}/{image...}`
///
/// # Headers
///
/// - `X-S3-Region`, `X-S3-Bucket`: select the source; defaults apply when
///   absent
///
/// # Response
///
/// - `200 OK` with the processed bytes, `Content-Type` from the payload
///   magic and long-lived cache headers
/// - `400 Bad Request` with `{"error": msg}` for validation, codec and
///   store failures
///
/// A processed artifact already present in the cache or bucket is streamed
/// back directly without invoking the pipeline. On a miss the original is
/// fetched and transformed; GET requests publish the result asynchronously
/// after responding, other methods publish before responding.
pub async fn process_handler<P: StoreProvider>(
    State(state): State<AppState<P>>,
    Path((params, image)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ProcessError> {
    if image.is_empty() {
        return Err(ProcessError::EmptyImagePath);
    }

    let source = resolve_source(&state, &headers).await?;
    let derived = derived_key(&image, &params);

    // Serve an existing processed artifact directly.
    if let Ok(data) = source.get(&derived).await {
        debug!("serving processed artifact '{}'", derived);
        return Ok(image_response(data));
    }

    // Prepare the pipeline before fetching the original, so parameter
    // errors never cost a bucket round trip.
    let pipeline = Pipeline::new(&params, Arc::clone(&state.codec))?;

    let original = Image::new(source.get(&image).await?)?;
    let processed = pipeline.process(original).await?;
    let content_type = processed.kind.mime();

    if method == Method::GET {
        state
            .publisher
            .enqueue(source, derived, processed.data.clone(), content_type);
    } else {
        source
            .put(&derived, processed.data.clone(), content_type)
            .await?;
    }

    Ok(image_response(processed.data))
}

/// Purge an original image along with all of its processed variants.
///
/// # Endpoint
///
/// `DELETE /ico/{image...}`
///
/// Every parameter-named subdirectory of the image's directory holds one
/// variant under the same basename; the union of those keys plus the
/// original is deleted from the local cache and the bucket.
pub async fn purge_handler<P: StoreProvider>(
    State(state): State<AppState<P>>,
    Path((head, tail)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ProcessError> {
    purge(state, headers, format!("{}/{}", head, tail)).await
}

/// Purge variant for images at the bucket root (no directory component).
pub async fn purge_flat_handler<P: StoreProvider>(
    State(state): State<AppState<P>>,
    Path(image): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ProcessError> {
    purge(state, headers, image).await
}

async fn purge<P: StoreProvider>(
    state: AppState<P>,
    headers: HeaderMap,
    image: String,
) -> Result<Response, ProcessError> {
    if image.is_empty() {
        return Err(ProcessError::EmptyImagePath);
    }

    let source = resolve_source(&state, &headers).await?;
    let (dir, file) = split_image_path(&image);

    // Each variant directory below the image's directory holds one
    // processed rendition of it.
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{}/", dir)
    };

    let mut dirs = source.list_dirs(&prefix).await?;
    dirs.push(prefix);

    let names: Vec<String> = dirs
        .iter()
        .map(|d| {
            let d = d.trim_end_matches('/');
            if d.is_empty() {
                file.to_string()
            } else {
                format!("{}/{}", d, file)
            }
        })
        .collect();

    source.delete(&names).await?;

    Ok(json_response(StatusCode::OK, &PurgeResponse { result: true }))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
