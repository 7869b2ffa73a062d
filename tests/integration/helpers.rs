//! Shared test helpers for integration tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use drive_core::config::AppConfig;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::{EntryId, ShareId, UserId};
use drive_database::{DriveStore, MemoryDriveStore};
use drive_entity::bin::BinRecord;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, ListFilter};
use drive_entity::share::Share;
use drive_entity::user::User;
use drive_service::{DriveServices, RequestContext, SignupRequest, UploadItem, UploadedEntry};
use drive_storage::MemoryObjectStorage;

/// Test application context
pub struct TestApp {
    /// All drive services
    pub services: DriveServices,
    /// Store for direct inspection
    pub store: Arc<MemoryDriveStore>,
    /// Object storage recorder
    pub storage: Arc<MemoryObjectStorage>,
    /// Application config
    pub config: AppConfig,
}

impl TestApp {
    /// Create a new test application with the given quota
    pub fn new(quota_bytes: i64) -> Self {
        let store = Arc::new(MemoryDriveStore::new());
        Self::build(quota_bytes, store.clone(), store)
    }

    /// Create a test application whose store can be told to reject one
    /// user's change sets
    pub fn with_faults(quota_bytes: i64) -> (Self, Arc<FaultyStore>) {
        let store = Arc::new(MemoryDriveStore::new());
        let faulty = Arc::new(FaultyStore {
            inner: store.clone(),
            failing_user: Mutex::new(None),
        });
        (Self::build(quota_bytes, store, faulty.clone()), faulty)
    }

    fn build(quota_bytes: i64, store: Arc<MemoryDriveStore>, backend: Arc<dyn DriveStore>) -> Self {
        let mut config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "memory" },
            "auth": { "jwt_secret": "integration-secret" },
            "storage": { "provider": "memory" },
        }))
        .expect("Failed to build test config");
        config.drive.quota_bytes = quota_bytes;

        let storage = Arc::new(MemoryObjectStorage::new(config.storage.presign_expiry_seconds));
        let services = DriveServices::new(backend, storage.clone(), &config)
            .expect("Failed to build services");

        Self {
            services,
            store,
            storage,
            config,
        }
    }

    /// Sign up a user and return its request context
    pub async fn signup(&self, username: &str) -> RequestContext {
        let token = self
            .services
            .users
            .signup(SignupRequest {
                username: username.to_string(),
                password: format!("{username}-password"),
            })
            .await
            .expect("Signup failed");
        self.services
            .authenticate(&token.authorization())
            .await
            .expect("Token rejected")
    }

    /// Upload a batch of `(path, size)` items, sizes `None` meaning folders
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        parent: EntryId,
        items: &[(&str, Option<i64>)],
    ) -> BTreeMap<String, UploadedEntry> {
        let items: Vec<UploadItem> = items
            .iter()
            .map(|(path, size)| UploadItem {
                path: path.to_string(),
                is_directory: size.is_none(),
                size: size.unwrap_or(0),
            })
            .collect();
        self.services
            .uploads
            .upload_batch(ctx, parent, &items)
            .await
            .expect("Upload failed")
    }
}

/// Memory store that fails every change set adjusting a chosen user's
/// used space
#[derive(Debug)]
pub struct FaultyStore {
    inner: Arc<MemoryDriveStore>,
    failing_user: Mutex<Option<UserId>>,
}

impl FaultyStore {
    /// Reject change sets touching `user_id`'s quota, or nothing with `None`
    pub async fn fail_user(&self, user_id: Option<UserId>) {
        *self.failing_user.lock().await = user_id;
    }
}

#[async_trait]
impl DriveStore for FaultyStore {
    async fn find_entry(&self, id: EntryId) -> AppResult<Option<Entry>> {
        self.inner.find_entry(id).await
    }

    async fn find_entries(&self, ids: &[EntryId]) -> AppResult<Vec<Entry>> {
        self.inner.find_entries(ids).await
    }

    async fn find_children(&self, parent_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.inner.find_children(parent_id, filter).await
    }

    async fn find_descendants(&self, root_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.inner.find_descendants(root_id, filter).await
    }

    async fn find_ancestors(&self, id: EntryId) -> AppResult<Vec<Entry>> {
        self.inner.find_ancestors(id).await
    }

    async fn find_sibling_names(
        &self,
        parent_id: EntryId,
        is_directory: bool,
        names: &[String],
    ) -> AppResult<Vec<String>> {
        self.inner.find_sibling_names(parent_id, is_directory, names).await
    }

    async fn find_shared_roots(&self, user_id: UserId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.inner.find_shared_roots(user_id, filter).await
    }

    async fn find_share(&self, id: ShareId) -> AppResult<Option<Share>> {
        self.inner.find_share(id).await
    }

    async fn count_share_references(&self, id: ShareId) -> AppResult<u64> {
        self.inner.count_share_references(id).await
    }

    async fn find_bin_record(&self, id: EntryId) -> AppResult<Option<BinRecord>> {
        self.inner.find_bin_record(id).await
    }

    async fn find_bin_records(&self, ids: &[EntryId]) -> AppResult<Vec<BinRecord>> {
        self.inner.find_bin_records(ids).await
    }

    async fn find_expired_bin_records(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<BinRecord>> {
        self.inner.find_expired_bin_records(cutoff).await
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        if let Some(failing) = *self.failing_user.lock().await {
            let touches = changes.iter().any(|mutation| {
                matches!(mutation, Mutation::AdjustUsedSpace { user_id, .. } if *user_id == failing)
            });
            if touches {
                return Err(AppError::storage_failure(format!(
                    "Injected failure for user {failing}"
                )));
            }
        }
        self.inner.apply(changes).await
    }

    async fn delete_unreferenced_shares(&self) -> AppResult<u64> {
        self.inner.delete_unreferenced_shares().await
    }
}
