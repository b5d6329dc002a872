//! Ico - An on-demand image transformation service.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ico::{
    codec::{Codec, CodecSettings},
    config::Config,
    server::{create_router, AppState},
    source::{S3StoreProvider, SourceRegistry},
};

#[tokio::main]
async fn main() {
    // Parse configuration from CLI and environment
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Starting Ico");
    if !config.s3_bucket.is_empty() {
        info!("  Default source: {}/{}", config.s3_region, config.s3_bucket);
    }
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  Cache quota: {} bytes", config.quota);

    // Initialize the codec once for the process
    let codec = Codec::init(CodecSettings::default());

    // Create the source registry over S3-backed stores
    let provider = S3StoreProvider::new(config.s3_endpoint.clone());
    let registry = SourceRegistry::new(
        provider,
        config.source_defaults(),
        config.quota,
        &config.cache_base,
    );

    // Build application state and router
    let state = AppState::new(registry, codec);
    let router = create_router(state, !config.no_tracing);

    // Bind and serve
    let addr = config.bind_address();
    info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "ico=debug,tower_http=debug"
    } else {
        "ico=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
