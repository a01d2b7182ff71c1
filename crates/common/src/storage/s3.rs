//! S3-compatible object store (AWS S3, MinIO, LocalStack)

use super::{Container, ObjectStore};
use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct S3ObjectStore {
    client: S3Client,
    raw_bucket: String,
    processed_bucket: String,
    create_buckets: bool,
}

impl S3ObjectStore {
    /// Build a client from configuration
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "vaultdrop-config",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        info!(
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            raw_bucket = %config.raw_bucket,
            processed_bucket = %config.processed_bucket,
            "Object store client configured"
        );

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            raw_bucket: config.raw_bucket.clone(),
            processed_bucket: config.processed_bucket.clone(),
            create_buckets: config.create_buckets,
        })
    }

    fn bucket(&self, container: Container) -> &str {
        match container {
            Container::Raw => &self.raw_bucket,
            Container::Processed => &self.processed_bucket,
        }
    }

    async fn put_stream(
        &self,
        container: Container,
        key: &str,
        body: ByteStream,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(self.bucket(container))
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::storage("put", key, e.into_service_error()))?;

        debug!(container = container.as_str(), key, "Object stored");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_bytes(
        &self,
        container: Container,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<()> {
        self.put_stream(container, key, ByteStream::from(data), content_type)
            .await
    }

    async fn put_file(
        &self,
        container: Container,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| AppError::storage("read spool", key, e))?;
        self.put_stream(container, key, body, content_type).await
    }

    async fn get(&self, container: Container, key: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(self.bucket(container))
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    AppError::ObjectNotFound { key: key.to_string() }
                } else {
                    AppError::storage("get", key, service_error)
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::storage("read body", key, e))?;

        Ok(data.into_bytes())
    }

    async fn presign(&self, container: Container, key: &str, ttl: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| AppError::Signing {
            message: format!("invalid presign ttl: {}", e),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(self.bucket(container))
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Signing {
                message: format!("presign {} failed: {}", key, e),
            })?;

        Ok(request.uri().to_string())
    }

    async fn ensure_containers(&self) -> Result<()> {
        for bucket in [&self.raw_bucket, &self.processed_bucket] {
            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => continue,
                Err(e) if self.create_buckets => {
                    warn!(bucket = %bucket, error = %e, "Bucket missing, creating");
                    self.client
                        .create_bucket()
                        .bucket(bucket)
                        .send()
                        .await
                        .map_err(|e| AppError::storage("create bucket", bucket.as_str(), e.into_service_error()))?;
                }
                Err(e) => {
                    return Err(AppError::Configuration {
                        message: format!("bucket {} is not available: {}", bucket, e),
                    });
                }
            }
        }

        info!("Object store buckets ready");
        Ok(())
    }
}
