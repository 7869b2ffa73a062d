//! Quota ledger and upload admission.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use drive_auth::AccessResolver;
use drive_core::error::{AppError, ErrorKind};
use drive_core::result::AppResult;
use drive_core::types::{EntryId, UserId};
use drive_database::DriveStore;
use drive_entity::change::ChangeSet;
use drive_entity::entry::Entry;
use drive_entity::permission::Access;
use drive_entity::storage::UsageQuota;

use crate::context::RequestContext;
use crate::guard;

/// Name and kind of a top-level entry about to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadName {
    /// Entry name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

/// Tracks used space against the configured per-user quota.
///
/// Entries are charged to the owner of the tree they live in.
#[derive(Debug, Clone)]
pub struct QuotaService {
    store: Arc<dyn DriveStore>,
    access: Arc<AccessResolver>,
    quota_bytes: i64,
}

impl QuotaService {
    /// Creates a quota service granting every user `quota_bytes`.
    pub fn new(store: Arc<dyn DriveStore>, access: Arc<AccessResolver>, quota_bytes: i64) -> Self {
        Self {
            store,
            access,
            quota_bytes,
        }
    }

    /// Quota granted to every user.
    pub fn quota_bytes(&self) -> i64 {
        self.quota_bytes
    }

    /// Current quota position of a user.
    pub async fn usage(&self, user_id: UserId) -> AppResult<UsageQuota> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;
        Ok(UsageQuota::new(self.quota_bytes, user.used_space))
    }

    /// Bytes the user can still upload.
    pub async fn get_free_space(&self, user_id: UserId) -> AppResult<i64> {
        Ok(self.usage(user_id).await?.free_bytes())
    }

    /// Append a reservation of `bytes` to `changes`.
    ///
    /// The change set fails as a whole if the reservation would overrun
    /// the quota at commit time.
    pub fn charge(&self, changes: &mut ChangeSet, user_id: UserId, bytes: i64) {
        changes.adjust_used_space(user_id, bytes, Some(self.quota_bytes));
    }

    /// Reserve `bytes` for a user on its own.
    pub async fn reserve(&self, user_id: UserId, bytes: i64) -> AppResult<()> {
        if bytes < 0 {
            return Err(AppError::validation("Cannot reserve a negative amount"));
        }
        let mut changes = ChangeSet::new();
        self.charge(&mut changes, user_id, bytes);
        self.store.apply(changes).await?;
        info!(user_id = %user_id, bytes, "Reserved space");
        Ok(())
    }

    /// Give back `bytes` to a user. Used space never drops below zero.
    pub async fn release(&self, user_id: UserId, bytes: i64) -> AppResult<()> {
        if bytes < 0 {
            return Err(AppError::validation("Cannot release a negative amount"));
        }
        let mut changes = ChangeSet::new();
        changes.adjust_used_space(user_id, -bytes, None);
        if changes.is_empty() {
            return Ok(());
        }
        self.store.apply(changes).await?;
        info!(user_id = %user_id, bytes, "Released space");
        Ok(())
    }

    /// Check that the caller may upload `top_level` into `parent_id`.
    ///
    /// Requires edit access on a directory outside the bin, names free
    /// among existing children of the same kind, and enough free space
    /// with the parent's owner. Returns the parent.
    pub async fn check_upload(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        top_level: &[UploadName],
        total_size: i64,
    ) -> AppResult<Entry> {
        let parent = self.access.require(ctx.user_id, parent_id, Access::Edit).await?;
        guard::ensure_directory(&parent)?;
        guard::ensure_outside_bin(self.store.as_ref(), &parent).await?;

        for is_directory in [false, true] {
            let names: Vec<String> = top_level
                .iter()
                .filter(|n| n.is_directory == is_directory)
                .map(|n| n.name.clone())
                .collect();
            let mut seen = HashSet::new();
            if let Some(dup) = names.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(AppError::collision(format!("'{dup}' appears twice in the upload")));
            }
            if names.is_empty() {
                continue;
            }
            let taken = self
                .store
                .find_sibling_names(parent.id, is_directory, &names)
                .await?;
            if let Some(name) = taken.first() {
                return Err(AppError::collision(format!(
                    "'{name}' already exists in {}",
                    parent.id
                )));
            }
        }

        if total_size < 0 {
            return Err(AppError::validation("Upload size cannot be negative"));
        }
        let usage = self.usage(parent.owner_id).await?;
        if usage.would_exceed(total_size) {
            return Err(AppError::quota_exceeded(format!(
                "Upload of {total_size} bytes exceeds the {} bytes left",
                usage.free_bytes()
            )));
        }

        debug!(user_id = %ctx.user_id, parent_id = %parent.id, total_size, "Upload admitted");
        Ok(parent)
    }

    /// Whether [`check_upload`](Self::check_upload) would pass.
    ///
    /// Refusals are `false`; only store failures are errors.
    pub async fn can_upload(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        top_level: &[UploadName],
        total_size: i64,
    ) -> AppResult<bool> {
        match self.check_upload(ctx, parent_id, top_level, total_size).await {
            Ok(_) => Ok(true),
            Err(e)
                if matches!(
                    e.kind,
                    ErrorKind::NotFound
                        | ErrorKind::PermissionDenied
                        | ErrorKind::Validation
                        | ErrorKind::Collision
                        | ErrorKind::QuotaExceeded
                ) =>
            {
                debug!(user_id = %ctx.user_id, parent_id = %parent_id, reason = %e, "Upload refused");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
