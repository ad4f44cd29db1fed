//! Object storage for the finished archive
//!
//! The packager needs exactly two storage operations: upload one file, and
//! mint a pre-signed GET URL for it. [`S3ObjectStore`] is the production
//! implementation; [`InMemoryObjectStore`] captures uploads for tests.

use crate::error::{Error, Result};
use crate::file_space::FileSpace;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Object storage operations used by the packager. Thread-safe; calls are stateless.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file to `bucket` under `key`, replacing any existing object.
    async fn put_file(&self, bucket: &str, key: &str, file: &Path) -> Result<()>;

    /// Generate a pre-signed GET URL for `bucket`/`key` expiring at `expires_at`.
    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String>;
}

/// Production [`ObjectStore`] backed by S3
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a store using credentials and region from the ambient AWS environment.
    pub async fn new() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: Client::new(&config),
        }
    }

    /// Create a store from a pre-built S3 client (custom endpoint, test harness).
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, bucket: &str, key: &str, file: &Path) -> Result<()> {
        let start = Instant::now();
        let body = ByteStream::from_path(file).await.map_err(|e| {
            Error::Storage(format!("failed to read {}: {e}", file.display()))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket,
                    key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                Error::Storage(e.to_string())
            })?;

        tracing::info!(
            bucket,
            key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        let expires_in = (expires_at - Utc::now()).to_std().map_err(|_| {
            Error::Storage("pre-signed URL expiration is in the past".to_string())
        })?;
        let presigning_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }
}

/// In-process [`ObjectStore`] used by tests
///
/// Uploaded bytes are captured at put time (the packager deletes the local
/// archive right after uploading, so reading it back later is impossible).
pub struct InMemoryObjectStore {
    file_space: Arc<dyn FileSpace>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a store that reads uploaded files through `file_space`.
    pub fn new(file_space: Arc<dyn FileSpace>) -> Self {
        Self {
            file_space,
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Vec<u8>>> {
        match self.objects.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bytes of a stored object, if present
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock().get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// All stored (bucket, key) pairs
    pub fn keys(&self) -> Vec<(String, String)> {
        self.lock().keys().cloned().collect()
    }

    /// Number of stored objects
    pub fn object_count(&self) -> usize {
        self.lock().len()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_file(&self, bucket: &str, key: &str, file: &Path) -> Result<()> {
        let bytes = self.file_space.read(file)?;
        self.lock()
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        Ok(format!(
            "https://{bucket}.example.com/{key}?expires={}",
            expires_at.timestamp()
        ))
    }
}
