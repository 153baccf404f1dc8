use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StorageError;

/// How long a presigned image upload URL stays valid.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// ImageStorage
///
/// Object storage for post images. Clients upload directly to the bucket with a
/// presigned URL and then reference the returned key from the post payload.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Creates the bucket if missing. Only called for local MinIO setups.
    async fn ensure_bucket_exists(&self);

    /// Signs a PUT for `key`, pinned to `content_type`.
    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<String, StorageError>;
}

/// image_key
///
/// Builds the object key for a new image: `posts/{author}/{uuid}.{ext}`.
/// Only the extension of the client filename is kept.
pub fn image_key(author_id: Uuid, filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!("posts/{}/{}.{}", author_id, Uuid::new_v4(), extension)
}

/// S3ImageStorage
///
/// S3-compatible client (MinIO locally). Path-style addressing is forced
/// because MinIO does not serve virtual-host buckets.
#[derive(Clone)]
pub struct S3ImageStorage {
    client: s3::Client,
    bucket_name: String,
}

impl S3ImageStorage {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket fails harmlessly when the bucket is already there.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn presign_upload(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

/// MockImageStorage
///
/// Deterministic stand-in used by tests; never touches the network.
#[derive(Clone, Default)]
pub struct MockImageStorage {
    /// When true, every presign call fails.
    pub should_fail: bool,
}

impl MockImageStorage {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl ImageStorage for MockImageStorage {
    async fn ensure_bucket_exists(&self) {}

    async fn presign_upload(&self, key: &str, _content_type: &str) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Presign("mock storage failure".to_string()));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            key
        ))
    }
}

/// StorageState
pub type StorageState = Arc<dyn ImageStorage>;
