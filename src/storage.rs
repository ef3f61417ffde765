use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";
pub const WAV_CONTENT_TYPE: &str = "audio/wav";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 put of {key} failed: {message}")]
    Put { key: String, message: String },
    #[error("S3 get of {key} failed: {message}")]
    Get { key: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage as seen by the relay: one bucket, byte blobs under string keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;

    /// `s3://bucket/key` form, as expected by the transcription service.
    fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket(), key)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` once, then up to `max_retries` more times. Delays double
    /// from `2 * base_delay_ms`, with jitter, capped at five seconds.
    pub async fn run<F, Fut, T>(&self, what: &str, operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms.max(1))
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.max_retries);

        Retry::spawn(strategy, operation).await.map_err(|e| {
            warn!("{} failed after {} retries: {}", what, self.max_retries, e);
            e
        })
    }
}

pub struct S3Storage {
    client: Client,
    bucket: String,
    retry: RetryPolicy,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            retry,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!("Uploading {} bytes to s3://{}/{}", body.len(), self.bucket, key);
        let body = &body;

        self.retry
            .run(&format!("upload of {}", key), || async move {
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(ByteStream::from(body.clone()))
                    .content_type(content_type)
                    .send()
                    .await
                    .map_err(|e| StorageError::Put {
                        key: key.to_string(),
                        message: e.to_string(),
                    })
            })
            .await?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let data = self
            .retry
            .run(&format!("download of {}", key), || async move {
                let output = self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| StorageError::Get {
                        key: key.to_string(),
                        message: e.to_string(),
                    })?;

                output
                    .body
                    .collect()
                    .await
                    .map(|data| data.into_bytes())
                    .map_err(|e| StorageError::Get {
                        key: key.to_string(),
                        message: e.to_string(),
                    })
            })
            .await?;

        info!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);
        Ok(data)
    }
}
