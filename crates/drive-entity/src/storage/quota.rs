//! Per-user quota value object.

use serde::{Deserialize, Serialize};

/// Quota position of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageQuota {
    /// Total quota in bytes.
    pub total_bytes: i64,
    /// Currently used bytes.
    pub used_bytes: i64,
}

impl UsageQuota {
    /// Create a quota from total and used values.
    pub fn new(total_bytes: i64, used_bytes: i64) -> Self {
        Self {
            total_bytes,
            used_bytes,
        }
    }

    /// Remaining bytes, never negative.
    pub fn free_bytes(&self) -> i64 {
        (self.total_bytes - self.used_bytes).max(0)
    }

    /// Check if adding the given number of bytes would exceed the quota.
    pub fn would_exceed(&self, additional_bytes: i64) -> bool {
        additional_bytes > self.free_bytes()
    }
}
