//! Router configuration for the image transformation service.
//!
//! # Route Structure
//!
//! ```text
//! /health                          - Health check
//! /ico/{params}/{image...}         - Transform endpoint (GET, HEAD)
//! /ico/{image...}                  - Purge endpoint (DELETE)
//! ```

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::source::StoreProvider;

use super::handlers::{
    health_handler, process_handler, purge_flat_handler, purge_handler, AppState,
};

/// Create the application router.
///
/// The transform routes accept GET and HEAD; purge routes accept DELETE on
/// both nested and root-level image paths.
pub fn create_router<P>(state: AppState<P>, enable_tracing: bool) -> Router
where
    P: StoreProvider,
{
    let service_routes = Router::new()
        .route(
            "/{params}/{*image}",
            get(process_handler::<P>).delete(purge_handler::<P>),
        )
        .route("/{*image}", delete(purge_flat_handler::<P>))
        .with_state(state);

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/ico", service_routes);

    if enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
