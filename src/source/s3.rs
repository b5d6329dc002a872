//! S3-backed object store implementation.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::error::StoreError;

use super::{ObjectStore, StoreProvider};

/// Regions accepted for source resolution.
const KNOWN_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-south-1",
    "sa-east-1",
];

/// Static credentials are issued with a 5 year expiry.
const CREDENTIAL_LIFETIME: Duration = Duration::from_secs(5 * 365 * 24 * 60 * 60);

/// Check whether a region name is in the known-region table.
pub fn is_known_region(region: &str) -> bool {
    KNOWN_REGIONS.contains(&region)
}

/// Create an S3 client for a region, with optional custom endpoint and
/// static credentials.
///
/// Empty credentials fall back to the default provider chain, which covers
/// instance-profile (IAM) authentication. A custom endpoint switches the
/// client to path-style addressing for S3-compatible services (MinIO, etc.).
pub async fn create_s3_client(
    region: &str,
    endpoint_url: Option<&str>,
    access_key: &str,
    secret_key: &str,
) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if !access_key.is_empty() && !secret_key.is_empty() {
        let credentials = aws_credential_types::Credentials::new(
            access_key,
            secret_key,
            None,
            Some(SystemTime::now() + CREDENTIAL_LIFETIME),
            "ico-static",
        );
        config_loader = config_loader.credentials_provider(credentials);
    }

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}

// =============================================================================
// S3ObjectStore
// =============================================================================

/// S3 implementation of [`ObjectStore`], scoped to one bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> S3ObjectStore {
        S3ObjectStore { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Object keys are stored without a leading slash.
fn object_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);

                if not_found {
                    StoreError::NotFound(format!("s3://{}/{}", self.bucket, object_key(key)))
                } else {
                    StoreError::Read(e.to_string())
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key(key))
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(())
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        let copy_source = format!("{}/{}", self.bucket, object_key(src_key));

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(object_key(dst_key))
            .copy_source(copy_source)
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects: Vec<ObjectIdentifier> = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(object_key(key))
                    .build()
                    .map_err(|e| StoreError::Write(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::Write(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;

        Ok(())
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(object_key(prefix))
            .delimiter("/")
            .send()
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        let dirs = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(|p| format!("/{}", p))
            .collect();

        Ok(dirs)
    }
}

// =============================================================================
// S3StoreProvider
// =============================================================================

/// Opens [`S3ObjectStore`] instances, validating the region first.
pub struct S3StoreProvider {
    endpoint_url: Option<String>,
}

impl S3StoreProvider {
    pub fn new(endpoint_url: Option<String>) -> S3StoreProvider {
        S3StoreProvider { endpoint_url }
    }
}

#[async_trait]
impl StoreProvider for S3StoreProvider {
    type Store = S3ObjectStore;

    async fn open(
        &self,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<S3ObjectStore, StoreError> {
        if !is_known_region(region) {
            return Err(StoreError::UnknownRegion(region.to_string()));
        }

        let client = create_s3_client(
            region,
            self.endpoint_url.as_deref(),
            access_key,
            secret_key,
        )
        .await;

        Ok(S3ObjectStore::new(client, bucket.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
