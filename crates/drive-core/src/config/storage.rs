//! Object storage configuration.

use serde::{Deserialize, Serialize};

/// Top-level object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Provider backing file contents: `"s3"` or `"memory"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Lifetime of presigned upload and download URLs in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_seconds: u64,
    /// S3-compatible storage configuration.
    #[serde(default)]
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            presign_expiry_seconds: default_presign_expiry(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO). Empty uses AWS.
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// S3 bucket name.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Access key ID.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Address the bucket by path instead of virtual host.
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: default_bucket(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: default_force_path_style(),
        }
    }
}

fn default_provider() -> String {
    "s3".to_string()
}

fn default_presign_expiry() -> u64 {
    1800
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket() -> String {
    "drive".to_string()
}

fn default_force_path_style() -> bool {
    true
}
