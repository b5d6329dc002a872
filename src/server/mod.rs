//! HTTP server layer.
//!
//! This module provides the HTTP API of the transformation service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET/HEAD /ico/{params}/{image...}   DELETE /ico/{image...}  │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  handlers   │  │   publish    │  │        routes          │  │
//! │  │ (dispatch)  │  │ (write-back) │  │   (router config)      │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod publish;
pub mod routes;

pub use handlers::{
    health_handler, process_handler, purge_flat_handler, purge_handler, AppState, ErrorResponse,
    HealthResponse, PurgeResponse,
};
pub use publish::{PublishQueue, DEFAULT_PUBLISH_CAPACITY};
pub use routes::create_router;
