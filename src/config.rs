//! Configuration management for the transformation service.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `ICO_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Environment Variables
//!
//! - `ICO_HOST` - Server bind address (default: 0.0.0.0)
//! - `ICO_PORT` - Server port (default: 6116)
//! - `ICO_S3_REGION` - Default S3 region for requests without source headers
//! - `ICO_S3_BUCKET` - Default S3 bucket
//! - `ICO_S3_ACCESS_KEY` - Access key for the default source; empty uses IAM
//! - `ICO_S3_SECRET_KEY` - Secret key for the default source; empty uses IAM
//! - `ICO_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `ICO_QUOTA` - Local cache quota in bytes (default: 0 = unlimited)
//! - `ICO_CACHE_BASE` - Cache directory name under the temp dir

use clap::Parser;

use crate::source::SourceDefaults;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 6116;

/// Default base directory name for local caches.
pub const DEFAULT_CACHE_BASE: &str = "ico";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Ico - An on-demand image transformation service.
///
/// Transforms images stored in S3 or S3-compatible storage according to a
/// declarative parameter pipeline, mirroring results to a local disk cache
/// and back to the bucket.
#[derive(Parser, Debug, Clone)]
#[command(name = "ico")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "ICO_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "ICO_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// Default S3 region, used when a request carries no source headers.
    #[arg(long, default_value = "", env = "ICO_S3_REGION")]
    pub s3_region: String,

    /// Default S3 bucket, used when a request carries no source headers.
    #[arg(long, default_value = "", env = "ICO_S3_BUCKET")]
    pub s3_bucket: String,

    /// Access key for the default source. If empty, access is attempted
    /// with IAM.
    #[arg(long, default_value = "", env = "ICO_S3_ACCESS_KEY")]
    pub s3_access_key: String,

    /// Secret key for the default source. If empty, access is attempted
    /// with IAM.
    #[arg(long, default_value = "", env = "ICO_S3_SECRET_KEY")]
    pub s3_secret_key: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "ICO_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Local cache quota in bytes; 0 means unlimited.
    #[arg(long, default_value_t = 0, env = "ICO_QUOTA")]
    pub quota: u64,

    /// Directory name for local caches, created under the system temp dir.
    #[arg(long, default_value = DEFAULT_CACHE_BASE, env = "ICO_CACHE_BASE")]
    pub cache_base: String,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        // Credentials only make sense as a pair.
        if self.s3_access_key.is_empty() != self.s3_secret_key.is_empty() {
            return Err(
                "s3-access-key and s3-secret-key must be provided together; \
                 leave both empty to use IAM"
                    .to_string(),
            );
        }

        if self.cache_base.is_empty() {
            return Err("cache_base must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The default source described by this configuration.
    pub fn source_defaults(&self) -> SourceDefaults {
        SourceDefaults {
            region: self.s3_region.clone(),
            bucket: self.s3_bucket.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
