//! Drive behaviour: quota, naming, and bin retention.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Per-user drive limits and bin lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Storage quota granted to every user, in bytes (default 5 GiB).
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: i64,
    /// Maximum length of an entry name in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// How long binned entries are kept before the sweep deletes them.
    #[serde(default = "default_bin_retention_hours")]
    pub bin_retention_hours: i64,
    /// Cron expression (with seconds) driving the bin sweep.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            quota_bytes: default_quota_bytes(),
            max_name_length: default_max_name_length(),
            bin_retention_hours: default_bin_retention_hours(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

impl DriveConfig {
    /// Retention window as a duration.
    ///
    /// Fails unless `bin_retention_hours` is positive and representable.
    pub fn bin_retention(&self) -> AppResult<chrono::Duration> {
        if self.bin_retention_hours <= 0 {
            return Err(AppError::configuration(format!(
                "drive.bin_retention_hours must be positive, got {}",
                self.bin_retention_hours
            )));
        }
        chrono::Duration::try_hours(self.bin_retention_hours).ok_or_else(|| {
            AppError::configuration(format!(
                "drive.bin_retention_hours is out of range: {}",
                self.bin_retention_hours
            ))
        })
    }
}

fn default_quota_bytes() -> i64 {
    5 * 1024 * 1024 * 1024
}

fn default_max_name_length() -> usize {
    255
}

fn default_bin_retention_hours() -> i64 {
    72
}

fn default_sweep_cron() -> String {
    "0 0 * * * *".to_string()
}
