//! Resolves what a user may do with an entry.
//!
//! Resolution order:
//! 1. Owner check: the entry's owner has full access.
//! 2. No share: nobody else has access.
//! 3. Share lookup: editors get edit access, readers get read access.
//!
//! Root entries (drive and bin roots) therefore stay owner-only unless a
//! share is applied to them directly.

use std::sync::Arc;

use tracing::debug;

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::{EntryId, UserId};
use drive_database::DriveStore;
use drive_entity::entry::Entry;
use drive_entity::permission::Access;

/// Resolves [`Access`] levels through ownership and share groups.
#[derive(Debug, Clone)]
pub struct AccessResolver {
    store: Arc<dyn DriveStore>,
}

impl AccessResolver {
    /// Creates a resolver over the given store.
    pub fn new(store: Arc<dyn DriveStore>) -> Self {
        Self { store }
    }

    /// Resolves the access of `user_id` on the entry with `entry_id`.
    pub async fn resolve_access(&self, user_id: UserId, entry_id: EntryId) -> AppResult<Access> {
        let entry = self
            .store
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {entry_id} not found")))?;
        self.access_for(user_id, &entry).await
    }

    /// Resolves the access of `user_id` on an already loaded entry.
    pub async fn access_for(&self, user_id: UserId, entry: &Entry) -> AppResult<Access> {
        if entry.owner_id == user_id {
            return Ok(Access::Owner);
        }

        let Some(share_id) = entry.share_id else {
            return Ok(Access::None);
        };

        let access = match self.store.find_share(share_id).await? {
            Some(share) if share.can_edit(user_id) => Access::Edit,
            Some(share) if share.can_read(user_id) => Access::Read,
            _ => Access::None,
        };

        debug!(
            user_id = %user_id,
            entry_id = %entry.id,
            share_id = %share_id,
            access = %access,
            "Resolved shared access"
        );
        Ok(access)
    }

    /// Loads the entry and checks that `user_id` has at least `required` on it.
    ///
    /// Fails with `NotFound` for a missing entry and `PermissionDenied` for
    /// insufficient access. Read paths should [`conceal`](AppError::conceal)
    /// the error.
    pub async fn require(
        &self,
        user_id: UserId,
        entry_id: EntryId,
        required: Access,
    ) -> AppResult<Entry> {
        let entry = self
            .store
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Entry {entry_id} not found")))?;
        self.require_loaded(user_id, entry, required).await
    }

    /// Same as [`require`](Self::require) for an entry the caller already holds.
    pub async fn require_loaded(
        &self,
        user_id: UserId,
        entry: Entry,
        required: Access,
    ) -> AppResult<Entry> {
        let access = self.access_for(user_id, &entry).await?;
        if !access.has_at_least(required) {
            return Err(AppError::permission_denied(format!(
                "{required} access to entry {} required, caller has {access}",
                entry.id
            )));
        }
        Ok(entry)
    }
}
