//! # drive-storage
//!
//! Object storage providers for the cloud drive. File contents never pass
//! through the drive: providers mint presigned URLs and tag objects for
//! bucket lifecycle rules.

pub mod providers;

use std::sync::Arc;

use drive_core::config::StorageConfig;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::ObjectStorage;

pub use providers::MemoryObjectStorage;
#[cfg(feature = "s3")]
pub use providers::S3ObjectStorage;

/// Build the provider selected by `config.provider`.
pub async fn connect(config: &StorageConfig) -> AppResult<Arc<dyn ObjectStorage>> {
    match config.provider.as_str() {
        #[cfg(feature = "s3")]
        "s3" => Ok(Arc::new(S3ObjectStorage::connect(config).await?)),
        "memory" => Ok(Arc::new(MemoryObjectStorage::new(
            config.presign_expiry_seconds,
        ))),
        other => Err(AppError::configuration(format!(
            "Unknown storage provider '{other}'"
        ))),
    }
}
