//! Applying and reading share policies.

use std::sync::Arc;

use tracing::info;

use drive_auth::AccessResolver;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::EntryId;
use drive_database::DriveStore;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::EntryPatch;
use drive_entity::permission::Access;
use drive_entity::share::{Share, SharePolicies};

use crate::context::RequestContext;
use crate::guard;
use crate::tree::Subtree;

/// Manages share groups.
#[derive(Debug, Clone)]
pub struct ShareService {
    store: Arc<dyn DriveStore>,
    access: Arc<AccessResolver>,
}

impl ShareService {
    /// Creates a new share service.
    pub fn new(store: Arc<dyn DriveStore>, access: Arc<AccessResolver>) -> Self {
        Self { store, access }
    }

    /// Shares an entry and everything inheriting from it.
    ///
    /// When the entry is the root of a share nothing outside its subtree
    /// references, that share is updated in place. Otherwise a new share
    /// is created and propagated down the subtree, stopping at
    /// descendants that carry a share of their own.
    pub async fn apply_share(
        &self,
        ctx: &RequestContext,
        entry_id: EntryId,
        policies: SharePolicies,
    ) -> AppResult<Share> {
        let store = self.store.as_ref();
        let entry = self.access.require(ctx.user_id, entry_id, Access::Owner).await?;
        guard::ensure_outside_bin(store, &entry).await?;

        let policies = policies.normalized(entry.owner_id);
        let parent_share = match entry.parent_id {
            Some(parent_id) => store.find_entry(parent_id).await?.and_then(|p| p.share_id),
            None => None,
        };
        let subtree = Subtree::load(store, entry.clone()).await?;

        if let Some(share_id) = entry.share_id.filter(|id| Some(*id) != parent_share) {
            let references = store.count_share_references(share_id).await?;
            if references == subtree.count_share(share_id) {
                let share = store
                    .find_share(share_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::inconsistent_state(format!("Share {share_id} is missing"))
                    })?
                    .with_policies(policies);

                let mut changes = ChangeSet::new();
                changes.push(Mutation::UpdateShare(share.clone()));
                store.apply(changes).await?;

                info!(
                    user_id = %ctx.user_id,
                    entry_id = %entry.id,
                    share_id = %share.id,
                    "Share updated"
                );
                return Ok(share);
            }
        }

        let share = Share::new(policies);
        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertShare(share.clone()));
        let propagated = subtree.rederive_shares(Some(share.id));
        let count = propagated.len();
        for (id, share_id) in propagated {
            changes.update_entry(EntryPatch::new(id).share(share_id));
        }
        store.apply(changes).await?;

        info!(
            user_id = %ctx.user_id,
            entry_id = %entry.id,
            share_id = %share.id,
            entries = count,
            "Share created"
        );
        Ok(share)
    }

    /// Share currently covering an entry the caller can read.
    pub async fn share_of(&self, ctx: &RequestContext, entry_id: EntryId) -> AppResult<Option<Share>> {
        let entry = self
            .access
            .require(ctx.user_id, entry_id, Access::Read)
            .await
            .map_err(AppError::conceal)?;
        match entry.share_id {
            Some(share_id) => self.store.find_share(share_id).await,
            None => Ok(None),
        }
    }
}
