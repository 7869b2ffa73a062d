//! Moving entries into the bin and removing them for good.

use std::collections::hash_map::Entry as Slot;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use drive_auth::AccessResolver;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::ObjectStorage;
use drive_core::traits::storage::{BINNED_TAG, object_key};
use drive_core::types::{EntryId, ShareId, UserId};
use drive_database::DriveStore;
use drive_entity::bin::{BinRecord, BinnedEntry};
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, EntryPatch, ListFilter};
use drive_entity::permission::Access;

use crate::context::RequestContext;
use crate::naming;
use crate::tree::Subtree;

/// Outcome of a purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Entries deleted.
    pub entries_removed: usize,
    /// Bytes given back to the quota.
    pub bytes_reclaimed: i64,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Bin records deleted.
    pub records_removed: usize,
    /// Entries deleted.
    pub entries_removed: usize,
    /// Bytes given back to quotas.
    pub bytes_reclaimed: i64,
    /// Share groups nothing referenced anymore.
    pub shares_removed: u64,
    /// Owner batches and cleanups that failed and are retried next time.
    pub failed_batches: usize,
}

/// Deletion of whole binned subtrees, ready to apply.
struct Removal {
    changes: ChangeSet,
    records: usize,
    entries: usize,
    bytes: i64,
}

/// Manages the bin of every user.
#[derive(Debug, Clone)]
pub struct BinService {
    pub(super) store: Arc<dyn DriveStore>,
    pub(super) access: Arc<AccessResolver>,
    pub(super) storage: Arc<dyn ObjectStorage>,
    pub(super) retention: chrono::Duration,
}

impl BinService {
    /// Creates a bin service keeping binned entries for `retention`.
    pub fn new(
        store: Arc<dyn DriveStore>,
        access: Arc<AccessResolver>,
        storage: Arc<dyn ObjectStorage>,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            access,
            storage,
            retention,
        }
    }

    /// Moves entries into the bin of their owner.
    ///
    /// Every node of every subtree gets a bin record remembering its parent
    /// and, for share roots, its share. Only the top-level entries are
    /// reparented. All binned nodes lose their share so nobody else can
    /// reach them. Returns the ids of the top-level entries.
    pub async fn move_to_bin(
        &self,
        ctx: &RequestContext,
        entry_ids: &[EntryId],
    ) -> AppResult<Vec<EntryId>> {
        if entry_ids.is_empty() {
            return Err(AppError::validation("Nothing to move to the bin"));
        }
        let store = self.store.as_ref();

        let mut requested = HashSet::new();
        let mut targets = Vec::with_capacity(entry_ids.len());
        for &id in entry_ids {
            if !requested.insert(id) {
                continue;
            }
            let entry = self.access.require(ctx.user_id, id, Access::Edit).await?;
            if entry.is_root() {
                return Err(AppError::validation("Root directories cannot be moved to the bin"));
            }
            if store.find_bin_record(id).await?.is_some() {
                return Err(AppError::validation(format!("Entry {id} is already in the bin")));
            }
            targets.push(entry);
        }

        let mut tops = Vec::with_capacity(targets.len());
        for entry in targets {
            let ancestors = store.find_ancestors(entry.id).await?;
            if ancestors.iter().skip(1).any(|a| requested.contains(&a.id)) {
                debug!(entry_id = %entry.id, "Binned through an ancestor");
                continue;
            }
            tops.push(entry);
        }

        let now = Utc::now();
        let mut changes = ChangeSet::new();
        let mut bins: HashMap<UserId, EntryId> = HashMap::new();
        let mut taken: HashMap<(EntryId, bool), HashSet<String>> = HashMap::new();
        let mut files = Vec::new();
        let mut binned = Vec::with_capacity(tops.len());

        for top in tops {
            let bin_id = match bins.get(&top.owner_id) {
                Some(bin_id) => *bin_id,
                None => {
                    let owner = store.find_user(top.owner_id).await?.ok_or_else(|| {
                        AppError::inconsistent_state(format!("Owner of {} does not exist", top.id))
                    })?;
                    bins.insert(top.owner_id, owner.bin_id);
                    owner.bin_id
                }
            };

            let names = match taken.entry((bin_id, top.is_directory)) {
                Slot::Occupied(slot) => slot.into_mut(),
                Slot::Vacant(slot) => {
                    let filter = if top.is_directory {
                        ListFilter::FoldersOnly
                    } else {
                        ListFilter::FilesOnly
                    };
                    let existing = store.find_children(bin_id, filter).await?;
                    slot.insert(existing.into_iter().map(|e| e.name).collect())
                }
            };
            let name = naming::disambiguate(&top.name, top.is_directory, names);
            names.insert(name.clone());

            let parent_share = match top.parent_id {
                Some(parent_id) => store.find_entry(parent_id).await?.and_then(|p| p.share_id),
                None => None,
            };

            let subtree = Subtree::load(store, top.clone()).await?;
            let mut shares: HashMap<EntryId, Option<ShareId>> = HashMap::new();
            for node in subtree.top_down() {
                let prev_parent_id = node.parent_id.ok_or_else(|| {
                    AppError::inconsistent_state(format!("Entry {} has no parent", node.id))
                })?;
                let inherited = if node.id == top.id {
                    parent_share
                } else {
                    shares.get(&prev_parent_id).copied().flatten()
                };
                shares.insert(node.id, node.share_id);

                let renamed = node.id == top.id && name != top.name;
                changes.push(Mutation::InsertBinRecord(BinRecord {
                    id: node.id,
                    put_at: now,
                    prev_parent_id,
                    prev_share_id: node.share_id.filter(|s| Some(*s) != inherited),
                    prev_name: renamed.then(|| top.name.clone()),
                }));

                let mut patch = EntryPatch::new(node.id);
                if node.id == top.id {
                    patch = patch.parent(bin_id);
                    if renamed {
                        patch = patch.name(name.clone());
                    }
                }
                if node.share_id.is_some() {
                    patch = patch.share(None);
                }
                changes.update_entry(patch);

                if node.is_file() {
                    files.push(object_key(node.owner_id, node.id));
                }
            }
            binned.push(top.id);
        }

        store.apply(changes).await?;
        info!(
            user_id = %ctx.user_id,
            entries = binned.len(),
            files = files.len(),
            "Entries moved to the bin"
        );

        self.tag_objects(&files, "true").await;
        Ok(binned)
    }

    /// Lists the top-level entries of the caller's bin.
    pub async fn list_bin(&self, ctx: &RequestContext) -> AppResult<Vec<BinnedEntry>> {
        let entries = self.store.find_children(ctx.bin_id, ListFilter::All).await?;
        let ids: Vec<EntryId> = entries.iter().map(|e| e.id).collect();
        let mut records: HashMap<EntryId, BinRecord> = self
            .store
            .find_bin_records(&ids)
            .await?
            .into_iter()
            .map(|record| (record.id, record))
            .collect();

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                records
                    .remove(&entry.id)
                    .map(|bin| BinnedEntry { entry, bin })
            })
            .collect())
    }

    /// Deletes entries from the caller's bin for good.
    ///
    /// Ids that are not direct children of the bin are skipped.
    pub async fn purge(&self, ctx: &RequestContext, entry_ids: &[EntryId]) -> AppResult<PurgeReport> {
        let mut seen = HashSet::new();
        let mut tops = Vec::new();
        for &id in entry_ids {
            if !seen.insert(id) {
                continue;
            }
            let entry = self
                .store
                .find_entry(id)
                .await?
                .filter(|entry| entry.parent_id == Some(ctx.bin_id));
            let recorded = match &entry {
                Some(_) => self.store.find_bin_record(id).await?.is_some(),
                None => false,
            };
            match entry {
                Some(entry) if recorded => tops.push(entry),
                _ => debug!(user_id = %ctx.user_id, entry_id = %id, "Skipping entry outside the bin"),
            }
        }
        if tops.is_empty() {
            return Ok(PurgeReport::default());
        }

        let removal = self.removal(&tops).await?;
        let report = PurgeReport {
            entries_removed: removal.entries,
            bytes_reclaimed: removal.bytes,
        };
        self.store.apply(removal.changes).await?;

        info!(
            user_id = %ctx.user_id,
            entries = report.entries_removed,
            bytes = report.bytes_reclaimed,
            "Bin entries purged"
        );
        Ok(report)
    }

    /// Deletes everything binned longer than the retention window.
    ///
    /// Each owner's entries are removed in their own transaction. A failed
    /// batch is logged and left for the next sweep. Unreferenced shares
    /// are cleaned up afterwards.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let cutoff = now - self.retention;
        let expired = self.store.find_expired_bin_records(cutoff).await?;
        let expired_ids: HashSet<EntryId> = expired.iter().map(|record| record.id).collect();
        let ids: Vec<EntryId> = expired_ids.iter().copied().collect();

        let mut by_owner: BTreeMap<UserId, Vec<Entry>> = BTreeMap::new();
        for entry in self.store.find_entries(&ids).await? {
            let nested = entry.parent_id.is_some_and(|p| expired_ids.contains(&p));
            if !nested {
                by_owner.entry(entry.owner_id).or_default().push(entry);
            }
        }

        let mut report = SweepReport::default();
        for (owner_id, tops) in by_owner {
            let outcome = match self.removal(&tops).await {
                Ok(removal) => {
                    let counts = (removal.records, removal.entries, removal.bytes);
                    self.store.apply(removal.changes).await.map(|()| counts)
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok((records, entries, bytes)) => {
                    report.records_removed += records;
                    report.entries_removed += entries;
                    report.bytes_reclaimed += bytes;
                    info!(owner_id = %owner_id, entries, bytes, "Expired bin entries removed");
                }
                Err(e) => {
                    report.failed_batches += 1;
                    error!(owner_id = %owner_id, error = %e, "Bin sweep batch failed");
                }
            }
        }

        match self.store.delete_unreferenced_shares().await {
            Ok(removed) => report.shares_removed = removed,
            Err(e) => {
                report.failed_batches += 1;
                error!(error = %e, "Share cleanup failed");
            }
        }

        info!(
            cutoff = %cutoff,
            records = report.records_removed,
            entries = report.entries_removed,
            bytes = report.bytes_reclaimed,
            shares = report.shares_removed,
            failed = report.failed_batches,
            "Bin sweep finished"
        );
        Ok(report)
    }

    /// Records, entries, and quota refunds removing `tops` with their
    /// subtrees.
    async fn removal(&self, tops: &[Entry]) -> AppResult<Removal> {
        let store = self.store.as_ref();
        let mut records = Vec::new();
        let mut doomed = Vec::new();
        let mut refunds: BTreeMap<UserId, i64> = BTreeMap::new();

        for top in tops {
            let subtree = Subtree::load(store, top.clone()).await?;
            let ids = subtree.ids();
            records.extend(store.find_bin_records(&ids).await?.into_iter().map(|r| r.id));
            for node in subtree.bottom_up() {
                if node.is_file() {
                    *refunds.entry(node.owner_id).or_default() += node.size;
                }
                doomed.push(node.id);
            }
        }

        let mut changes = ChangeSet::new();
        changes.extend(records.iter().map(|id| Mutation::DeleteBinRecord(*id)));
        changes.extend(doomed.iter().map(|id| Mutation::DeleteEntry(*id)));
        for (owner_id, bytes) in &refunds {
            changes.adjust_used_space(*owner_id, -bytes, None);
        }

        Ok(Removal {
            changes,
            records: records.len(),
            entries: doomed.len(),
            bytes: refunds.values().sum(),
        })
    }

    /// Sets the binned tag on stored objects. Failures are logged.
    pub(super) async fn tag_objects(&self, keys: &[String], value: &str) {
        for key in keys {
            if let Err(e) = self.storage.tag_object(key, BINNED_TAG, value).await {
                warn!(key = %key, value, error = %e, "Failed to tag object");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use drive_core::ErrorKind;
    use drive_entity::share::SharePolicies;

    #[tokio::test]
    async fn test_move_to_bin_records_every_node() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        let inner = fx.hierarchy.create_folder(&alice, d, "inner").await.unwrap();
        let f = fx.file(&alice, inner, "f.txt", 7).await;

        let binned = fx.bin.move_to_bin(&alice, &[inner, d]).await.unwrap();
        assert_eq!(binned, vec![d]);

        let listed = fx.bin.list_bin(&alice).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].bin.prev_parent_id, alice.drive_id);

        let record = fx.store.find_bin_record(f).await.unwrap().unwrap();
        assert_eq!(record.prev_parent_id, inner);
        let entry = fx.store.find_entry(f).await.unwrap().unwrap();
        assert_eq!(entry.parent_id, Some(inner));

        let err = fx.hierarchy.create_folder(&alice, inner, "x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_move_to_bin_refusals() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        fx.shares
            .apply_share(
                &alice,
                d,
                SharePolicies {
                    can_read_users: vec![bob.user_id],
                    can_edit_users: Vec::new(),
                },
            )
            .await
            .unwrap();

        let err = fx.bin.move_to_bin(&alice, &[alice.drive_id]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let err = fx.bin.move_to_bin(&bob, &[d]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        fx.bin.move_to_bin(&alice, &[d]).await.unwrap();
        let err = fx.bin.move_to_bin(&alice, &[d]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_purge_reclaims_space_for_bin_children_only() {
        let fx = Fixture::with_quota(1000).await;
        let alice = fx.user("alice").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        let f = fx.file(&alice, d, "f", 300).await;
        let kept = fx.file(&alice, alice.drive_id, "kept", 100).await;
        assert_eq!(fx.quota.get_free_space(alice.user_id).await.unwrap(), 600);

        fx.bin.move_to_bin(&alice, &[d]).await.unwrap();
        let report = fx.bin.purge(&alice, &[d, f, kept]).await.unwrap();

        assert_eq!(report.entries_removed, 2);
        assert_eq!(report.bytes_reclaimed, 300);
        assert_eq!(fx.quota.get_free_space(alice.user_id).await.unwrap(), 900);
        assert!(fx.store.find_entry(f).await.unwrap().is_none());
        assert!(fx.store.find_entry(kept).await.unwrap().is_some());
        assert!(fx.bin.list_bin(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries_and_orphan_shares() {
        let fx = Fixture::with_quota(1000).await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        let f = fx.file(&alice, d, "f", 120).await;
        let g = fx.file(&alice, d, "g", 80).await;
        let fresh = fx.file(&alice, alice.drive_id, "fresh", 50).await;
        fx.shares
            .apply_share(
                &alice,
                d,
                SharePolicies {
                    can_read_users: vec![bob.user_id],
                    can_edit_users: Vec::new(),
                },
            )
            .await
            .unwrap();

        fx.bin.move_to_bin(&alice, &[d, fresh]).await.unwrap();
        let long_ago = Utc::now() - chrono::Duration::hours(100);
        for id in [d, f, g] {
            fx.store.backdate_bin_record(id, long_ago).await.unwrap();
        }

        let report = fx.bin.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(report.records_removed, 3);
        assert_eq!(report.entries_removed, 3);
        assert_eq!(report.bytes_reclaimed, 200);
        assert_eq!(report.shares_removed, 1);
        assert_eq!(report.failed_batches, 0);

        assert_eq!(fx.quota.usage(alice.user_id).await.unwrap().used_bytes, 50);
        assert_eq!(fx.store.share_count().await, 0);
        let left = fx.bin.list_bin(&alice).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].entry.id, fresh);

        let again = fx.bin.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }
}
