//! API integration tests for the transform endpoint.
//!
//! Tests verify:
//! - Processed-hit fast path (no pipeline work)
//! - Full fetch-origin, transform, publish flow for GET and HEAD
//! - HTTP response codes, headers and error bodies

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{
    build_app, create_test_jpeg, decoded_dimensions, is_valid_jpeg, wait_until,
};

const CACHE_CONTROL: &str = "no-transform,public,max-age=86400,s-maxage=2592000";

// =============================================================================
// Transform flow
// =============================================================================

#[tokio::test]
async fn test_transform_success() {
    let app = build_app();
    app.store()
        .insert("photos/cat.jpg", &create_test_jpeg(400, 200));

    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        CACHE_CONTROL
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(is_valid_jpeg(&body));
    assert_eq!(decoded_dimensions(&body), (100, 50));
}

#[tokio::test]
async fn test_transform_publishes_asynchronously() {
    let app = build_app();
    let store = app.store();
    store.insert("photos/cat.jpg", &create_test_jpeg(400, 200));

    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The processed artifact lands in the bucket after the response,
    // published through the temp-upload/copy/delete protocol.
    let published = wait_until(|| store.contains("photos/width=100/cat.jpg")).await;
    assert!(published, "write-back never reached the store");

    let log = store.log();
    assert!(log.contains(&"put photos/width=100/cat.jpg.tmp".to_string()));
    assert!(log
        .contains(&"copy photos/width=100/cat.jpg.tmp photos/width=100/cat.jpg".to_string()));
    assert!(!store.contains("photos/width=100/cat.jpg.tmp"));
}

#[tokio::test]
async fn test_head_publishes_before_responding() {
    let app = build_app();
    let store = app.store();
    store.insert("photos/cat.jpg", &create_test_jpeg(400, 200));

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Synchronous publish: visible as soon as the response is.
    assert!(store.contains("photos/width=100/cat.jpg"));
}

#[tokio::test]
async fn test_processed_hit_skips_pipeline() {
    let app = build_app();
    let store = app.store();

    // A pre-existing processed artifact; deliberately not a resized version
    // of anything, so any pipeline invocation would be detectable.
    let artifact = create_test_jpeg(77, 33);
    store.insert("photos/width=100/cat.jpg", &artifact);

    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &artifact[..]);

    // Only the derived-key read hit the store; the original was never
    // fetched and nothing was decoded or published.
    assert_eq!(store.log(), vec!["get photos/width=100/cat.jpg"]);
}

#[tokio::test]
async fn test_repeat_request_served_from_local_cache() {
    let app = build_app();
    let store = app.store();
    store.insert("photos/cat.jpg", &create_test_jpeg(400, 200));

    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_until(|| store.contains("photos/width=100/cat.jpg")).await;
    let reads_before = store.log().iter().filter(|l| l.starts_with("get")).count();

    // The write-back populated the local cache, so the repeat request
    // never reaches the bucket.
    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reads_after = store.log().iter().filter(|l| l.starts_with("get")).count();
    assert_eq!(reads_before, reads_after);
}

#[tokio::test]
async fn test_bucket_header_selects_source() {
    let app = build_app();
    let other = app.provider.bucket("other-bucket");
    other.insert("pic.jpg", &create_test_jpeg(200, 100));

    let request = Request::builder()
        .uri("/ico/width=50/pic.jpg")
        .header("X-S3-Region", "eu-west-1")
        .header("X-S3-Bucket", "other-bucket")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(decoded_dimensions(&body), (50, 25));

    // The default bucket never saw the request.
    assert!(app.store().log().is_empty());
}

#[tokio::test]
async fn test_enlargement_returns_original_bytes() {
    let app = build_app();
    let original = create_test_jpeg(100, 50);
    app.store().insert("photos/small.jpg", &original);

    let request = Request::builder()
        .uri("/ico/width=800/photos/small.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], &original[..]);
}

// =============================================================================
// Error handling
// =============================================================================

#[tokio::test]
async fn test_malformed_params_rejected() {
    let app = build_app();
    app.store().insert("cat.jpg", &create_test_jpeg(100, 100));

    let request = Request::builder()
        .uri("/ico/width/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json; charset=utf-8"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(parsed["error"].as_str().unwrap().contains("malformed"));
}

#[tokio::test]
async fn test_unknown_parameter_rejected() {
    let app = build_app();

    let request = Request::builder()
        .uri("/ico/width=100,rotate=90/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(parsed["error"].as_str().unwrap().contains("rotate"));
}

#[tokio::test]
async fn test_out_of_range_quality_rejected() {
    let app = build_app();

    let request = Request::builder()
        .uri("/ico/width=100,quality=150/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(parsed["error"].as_str().unwrap().contains("quality"));
}

#[tokio::test]
async fn test_missing_original_rejected() {
    let app = build_app();

    let request = Request::builder()
        .uri("/ico/width=100/photos/absent.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unsupported_payload_rejected() {
    let app = build_app();
    app.store().insert("notes.txt", b"just some text");

    let request = Request::builder()
        .uri("/ico/width=100/notes.txt")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(parsed["error"]
        .as_str()
        .unwrap()
        .contains("unknown or unhandled file type"));
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_app();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "healthy");
}
