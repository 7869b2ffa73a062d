//! Expiry sweep of binned entries.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use drive_service::BinService;

use super::{JobExecutionError, ScheduledJob};

/// Deletes binned entries older than the retention window, then the
/// shares nothing references anymore.
#[derive(Debug, Clone)]
pub struct BinSweepJob {
    /// Bin service performing the sweep
    bin: BinService,
    /// Cron expression
    schedule: String,
}

impl BinSweepJob {
    /// Create a sweep job running on `schedule`
    pub fn new(bin: BinService, schedule: impl Into<String>) -> Self {
        Self {
            bin,
            schedule: schedule.into(),
        }
    }
}

#[async_trait]
impl ScheduledJob for BinSweepJob {
    fn name(&self) -> &str {
        "bin_sweep"
    }

    fn schedule(&self) -> &str {
        &self.schedule
    }

    async fn run(&self) -> Result<Value, JobExecutionError> {
        tracing::info!("Running bin sweep");
        let report = self.bin.sweep_expired(Utc::now()).await?;

        if report.failed_batches > 0 {
            return Err(JobExecutionError::Transient(format!(
                "{} sweep batches failed",
                report.failed_batches
            )));
        }

        Ok(serde_json::json!({
            "task": "bin_sweep",
            "records_removed": report.records_removed,
            "entries_removed": report.entries_removed,
            "bytes_reclaimed": report.bytes_reclaimed,
            "shares_removed": report.shares_removed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use drive_core::config::AppConfig;
    use drive_database::MemoryDriveStore;
    use drive_service::{DriveServices, SignupRequest, UploadItem};
    use drive_storage::MemoryObjectStorage;

    #[tokio::test]
    async fn test_sweep_job_reports_removed_entries() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://unused" },
            "auth": { "jwt_secret": "test-secret" },
        }))
        .unwrap();
        let store = Arc::new(MemoryDriveStore::new());
        let services =
            DriveServices::new(store.clone(), Arc::new(MemoryObjectStorage::default()), &config)
                .unwrap();

        let token = services
            .users
            .signup(SignupRequest {
                username: "alice".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();
        let ctx = services.authenticate(&token.token).await.unwrap();
        let uploaded = services
            .uploads
            .upload_batch(
                &ctx,
                ctx.drive_id,
                &[UploadItem {
                    path: "old.log".to_string(),
                    is_directory: false,
                    size: 42,
                }],
            )
            .await
            .unwrap();
        let id = uploaded["old.log"].id;
        services.bin.move_to_bin(&ctx, &[id]).await.unwrap();
        store
            .backdate_bin_record(id, Utc::now() - chrono::Duration::days(4))
            .await
            .unwrap();

        let job = BinSweepJob::new(services.bin.clone(), "0 0 * * * *");
        let summary = job.run().await.unwrap();

        assert_eq!(summary["entries_removed"], 1);
        assert_eq!(summary["bytes_reclaimed"], 42);
        assert_eq!(job.name(), "bin_sweep");
    }
}
