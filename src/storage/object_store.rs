use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::errors::AppError;

/// Byte storage addressed by key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the key.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError>;

    async fn size_of(&self, key: &str) -> Result<i64, AppError>;

    /// A URL a client can fetch the object from.
    async fn url_of(&self, key: &str) -> Result<String, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            presign_expiry,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| {
                log::error!("Failed to upload {} to S3: {:?}", key, err);
                AppError::AWSError("Failed to upload file".to_string())
            })?;
        Ok(key.to_string())
    }

    async fn size_of(&self, key: &str) -> Result<i64, AppError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| AppError::AWSError(format!("head_object failed for {}: {}", key, err)))?;
        output
            .content_length()
            .ok_or_else(|| AppError::AWSError(format!("No content length for {}", key)))
    }

    async fn url_of(&self, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|err| AppError::AWSError(err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| AppError::AWSError(format!("Failed to presign {}: {}", key, err)))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| AppError::AWSError(format!("Failed to delete {}: {}", key, err)))?;
        Ok(())
    }
}
