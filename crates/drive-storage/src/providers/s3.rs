//! S3-compatible object storage provider (requires the `s3` feature).

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::{PresignedRequest as SdkPresignedRequest, PresigningConfig};
use aws_sdk_s3::types::{Tag, Tagging};
use chrono::Utc;
use tracing::{debug, info};

use drive_core::config::StorageConfig;
use drive_core::error::{AppError, ErrorKind};
use drive_core::result::AppResult;
use drive_core::traits::{ObjectStorage, PresignedRequest};

/// S3-compatible storage provider.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStorage {
    /// Build a client from the storage configuration.
    ///
    /// Static credentials are used when configured, otherwise the default
    /// AWS provider chain applies.
    pub async fn connect(config: &StorageConfig) -> AppResult<Self> {
        let s3 = &config.s3;
        if s3.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }

        info!(
            endpoint = %s3.endpoint,
            region = %s3.region,
            bucket = %s3.bucket,
            "Initializing S3 storage provider"
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(s3.region.clone()));
        if !s3.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                s3.access_key.clone(),
                s3.secret_key.clone(),
                None,
                None,
                "drive-config",
            ));
        }
        if !s3.endpoint.is_empty() {
            loader = loader.endpoint_url(s3.endpoint.clone());
        }
        let shared = loader.load().await;

        let client_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(s3.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(client_config),
            bucket: s3.bucket.clone(),
            presign_expiry: Duration::from_secs(config.presign_expiry_seconds),
        })
    }

    fn presigning(&self) -> AppResult<PresigningConfig> {
        PresigningConfig::expires_in(self.presign_expiry).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid presign expiry", e)
        })
    }

    fn convert(&self, request: SdkPresignedRequest) -> PresignedRequest {
        PresignedRequest {
            url: request.uri().to_string(),
            method: request.method().to_string(),
            headers: request
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            expires_at: Utc::now()
                + chrono::Duration::seconds(self.presign_expiry.as_secs() as i64),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn presign_upload(&self, key: &str, size: i64) -> AppResult<PresignedRequest> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size)
            .presigned(self.presigning()?)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ObjectStorage,
                    format!("Failed to presign upload for {key}"),
                    e,
                )
            })?;
        debug!(key, size, "Presigned upload");
        Ok(self.convert(request))
    }

    async fn presign_download(&self, key: &str) -> AppResult<PresignedRequest> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(self.presigning()?)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ObjectStorage,
                    format!("Failed to presign download for {key}"),
                    e,
                )
            })?;
        debug!(key, "Presigned download");
        Ok(self.convert(request))
    }

    async fn tag_object(&self, key: &str, tag: &str, value: &str) -> AppResult<()> {
        let tag = Tag::builder()
            .key(tag)
            .value(value)
            .build()
            .map_err(|e| AppError::with_source(ErrorKind::ObjectStorage, "Invalid object tag", e))?;
        let tagging = Tagging::builder().tag_set(tag).build().map_err(|e| {
            AppError::with_source(ErrorKind::ObjectStorage, "Invalid object tag set", e)
        })?;

        self.client
            .put_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ObjectStorage,
                    format!("Failed to tag object {key}"),
                    e,
                )
            })?;
        Ok(())
    }
}
