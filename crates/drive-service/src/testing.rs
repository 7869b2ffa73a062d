//! Service fixture over in-memory backends.

use std::ops::Deref;
use std::sync::Arc;

use drive_core::config::AppConfig;
use drive_core::traits::Identity;
use drive_core::types::EntryId;
use drive_database::{DriveStore, MemoryDriveStore};
use drive_storage::MemoryObjectStorage;

use crate::context::RequestContext;
use crate::services::DriveServices;
use crate::upload::UploadItem;
use crate::user::provision;

pub(crate) struct Fixture {
    pub store: Arc<MemoryDriveStore>,
    pub storage: Arc<MemoryObjectStorage>,
    services: DriveServices,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_quota(5 * 1024 * 1024 * 1024).await
    }

    pub async fn with_quota(quota_bytes: i64) -> Self {
        let mut config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://unused" },
            "auth": { "jwt_secret": "test-secret" },
        }))
        .expect("config");
        config.drive.quota_bytes = quota_bytes;

        let store = Arc::new(MemoryDriveStore::new());
        let storage = Arc::new(MemoryObjectStorage::default());
        let services = DriveServices::new(store.clone(), storage.clone(), &config).expect("services");
        Self {
            store,
            storage,
            services,
        }
    }

    /// Registers a user without hashing a password.
    pub async fn user(&self, username: &str) -> RequestContext {
        let (user, changes) = provision(username, String::new());
        self.store.apply(changes).await.expect("provision user");
        RequestContext::new(Identity {
            user_id: user.id,
            drive_id: user.drive_id,
            bin_id: user.bin_id,
        })
    }

    /// Uploads a single file and returns its id.
    pub async fn file(&self, ctx: &RequestContext, parent: EntryId, name: &str, size: i64) -> EntryId {
        let item = UploadItem {
            path: name.to_string(),
            is_directory: false,
            size,
        };
        let uploaded = self
            .uploads
            .upload_batch(ctx, parent, &[item])
            .await
            .expect("upload file");
        uploaded[name].id
    }
}

impl Deref for Fixture {
    type Target = DriveServices;

    fn deref(&self) -> &DriveServices {
        &self.services
    }
}
