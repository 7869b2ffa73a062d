//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod auth;
pub mod database;
pub mod drive;
pub mod logging;
pub mod storage;

use serde::{Deserialize, Serialize};

pub use self::auth::AuthConfig;
pub use self::database::DatabaseConfig;
pub use self::drive::DriveConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::{S3StorageConfig, StorageConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Quota, naming, and bin settings.
    #[serde(default)]
    pub drive: DriveConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `DRIVE__`
    /// (e.g. `DRIVE__DATABASE__URL`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DRIVE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.drive.bin_retention()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: AppConfig = config::Config::builder()
            .set_override("database.url", "postgres://localhost/drive")
            .expect("override")
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.storage.presign_expiry_seconds, 1800);
        assert_eq!(config.drive.bin_retention_hours, 72);
        assert_eq!(config.drive.max_name_length, 255);
        assert_eq!(config.drive.sweep_cron, "0 0 * * * *");
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_database_url_is_rejected() {
        let result: Result<AppConfig, _> = config::Config::builder()
            .build()
            .expect("build")
            .try_deserialize();
        assert!(result.is_err());
    }
}
