//! Integration tests for the purge endpoint.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{build_app, create_test_jpeg, wait_until};

#[tokio::test]
async fn test_purge_removes_original_and_variants() {
    let app = build_app();
    let store = app.store();

    store.insert("photos/cat.jpg", &create_test_jpeg(100, 100));
    store.insert("photos/width=100/cat.jpg", &create_test_jpeg(100, 100));
    store.insert(
        "photos/width=50,fit=crop/cat.jpg",
        &create_test_jpeg(50, 50),
    );

    // An unrelated sibling must survive the purge.
    store.insert("photos/dog.jpg", &create_test_jpeg(100, 100));

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/ico/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["result"], true);

    assert!(!store.contains("photos/cat.jpg"));
    assert!(!store.contains("photos/width=100/cat.jpg"));
    assert!(!store.contains("photos/width=50,fit=crop/cat.jpg"));
    assert!(store.contains("photos/dog.jpg"));
}

#[tokio::test]
async fn test_purge_root_level_image() {
    let app = build_app();
    let store = app.store();

    store.insert("cat.jpg", &create_test_jpeg(100, 100));
    store.insert("width=100/cat.jpg", &create_test_jpeg(100, 100));

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/ico/cat.jpg")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!store.contains("cat.jpg"));
    assert!(!store.contains("width=100/cat.jpg"));
}

#[tokio::test]
async fn test_purge_then_transform_reprocesses() {
    let app = build_app();
    let store = app.store();
    store.insert("photos/cat.jpg", &create_test_jpeg(400, 200));

    // Produce and purge a variant.
    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap();

    // Let the write-back land before purging, so it cannot resurrect the
    // variant afterwards.
    assert!(wait_until(|| store.contains("photos/width=100/cat.jpg")).await);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/ico/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The original is gone too, so a new transform request now fails.
    let request = Request::builder()
        .uri("/ico/width=100/photos/cat.jpg")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
