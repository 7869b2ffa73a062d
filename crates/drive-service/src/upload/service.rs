//! Upload admission, entry creation, and upload URLs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::storage::object_key;
use drive_core::traits::{ObjectStorage, PresignedRequest};
use drive_core::types::EntryId;
use drive_database::DriveStore;
use drive_entity::change::{ChangeSet, Mutation};

use crate::context::RequestContext;
use crate::quota::QuotaService;

use super::plan::{UploadItem, UploadPlan};

/// An entry created by an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedEntry {
    /// Assigned entry id.
    pub id: EntryId,
    /// Parent the entry was created in.
    pub parent_id: EntryId,
    /// Entry name.
    pub name: String,
    /// Whether the entry is a folder.
    pub is_directory: bool,
    /// Where to PUT the content. Folders have none.
    pub upload: Option<PresignedRequest>,
}

/// Creates uploaded entries and hands out upload URLs.
#[derive(Debug, Clone)]
pub struct UploadService {
    store: Arc<dyn DriveStore>,
    quota: Arc<QuotaService>,
    storage: Arc<dyn ObjectStorage>,
    max_name_length: usize,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        store: Arc<dyn DriveStore>,
        quota: Arc<QuotaService>,
        storage: Arc<dyn ObjectStorage>,
        max_name_length: usize,
    ) -> Self {
        Self {
            store,
            quota,
            storage,
            max_name_length,
        }
    }

    /// Creates every entry of a batch under `parent_id` in one transaction.
    ///
    /// The batch size is reserved against the quota of the parent's owner
    /// in the same transaction. Upload URLs are only returned once that
    /// transaction has committed. The result is keyed by normalized path.
    pub async fn upload_batch(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        items: &[UploadItem],
    ) -> AppResult<BTreeMap<String, UploadedEntry>> {
        let parent = self
            .store
            .find_entry(parent_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {parent_id} not found")))?;
        let plan = UploadPlan::build(items, &parent, self.max_name_length)?;
        let parent = self
            .quota
            .check_upload(ctx, parent.id, &plan.top_level, plan.total_size)
            .await?;

        let mut uploaded = BTreeMap::new();
        for (path, entry) in &plan.entries {
            let upload = if entry.is_file() {
                let key = object_key(entry.owner_id, entry.id);
                Some(self.storage.presign_upload(&key, entry.size).await?)
            } else {
                None
            };
            uploaded.insert(
                path.clone(),
                UploadedEntry {
                    id: entry.id,
                    parent_id: entry.parent_id.unwrap_or(parent.id),
                    name: entry.name.clone(),
                    is_directory: entry.is_directory,
                    upload,
                },
            );
        }

        let mut changes = ChangeSet::new();
        let count = plan.entries.len();
        for (_, entry) in plan.entries {
            changes.push(Mutation::InsertEntry(entry));
        }
        self.quota.charge(&mut changes, parent.owner_id, plan.total_size);
        self.store.apply(changes).await?;

        info!(
            user_id = %ctx.user_id,
            parent_id = %parent.id,
            owner_id = %parent.owner_id,
            entries = count,
            bytes = plan.total_size,
            "Upload batch created"
        );
        Ok(uploaded)
    }
}
