//! Restoring entries from the bin.
//!
//! A restored entry goes back to the parent it had before binning. If
//! that parent is gone or still binned, it goes to the drive root instead.
//! Descendants binned together with it stay where they are. Names taken
//! at the destination get a ` (n)` suffix, so a restore never collides.

use std::collections::hash_map::Entry as Slot;
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::info;

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::storage::object_key;
use drive_core::types::{EntryId, ShareId};
use drive_entity::bin::BinRecord;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, EntryPatch, ListFilter};

use crate::context::RequestContext;
use crate::naming;
use crate::tree::Subtree;

use super::service::BinService;

struct Restored {
    entry: Entry,
    record: BinRecord,
    /// Parent after the restore.
    parent_id: EntryId,
    /// Name after the restore.
    name: String,
    explicit: bool,
}

impl BinService {
    /// Restores direct children of the caller's bin together with
    /// everything binned inside them.
    ///
    /// With `restore_all_to_drive` every listed entry goes to the drive
    /// root. Returns the listed entries as restored.
    pub async fn restore(
        &self,
        ctx: &RequestContext,
        entry_ids: &[EntryId],
        restore_all_to_drive: bool,
    ) -> AppResult<Vec<Entry>> {
        if entry_ids.is_empty() {
            return Err(AppError::validation("Nothing to restore"));
        }
        let store = self.store.as_ref();

        let mut nodes: Vec<Restored> = Vec::new();
        let mut restoring: HashSet<EntryId> = HashSet::new();
        for &id in entry_ids {
            if restoring.contains(&id) {
                continue;
            }
            let entry = store
                .find_entry(id)
                .await?
                .filter(|entry| entry.parent_id == Some(ctx.bin_id))
                .ok_or_else(|| {
                    AppError::inconsistent_state(format!("Entry {id} is not in the bin"))
                })?;
            let record = store.find_bin_record(id).await?.ok_or_else(|| {
                AppError::inconsistent_state(format!("Entry {id} has no bin record"))
            })?;

            let subtree = Subtree::load(store, entry).await?;
            let mut records: HashMap<EntryId, BinRecord> = store
                .find_bin_records(&subtree.ids())
                .await?
                .into_iter()
                .map(|record| (record.id, record))
                .collect();
            records.remove(&id);

            for node in subtree.top_down() {
                let (record, explicit, parent_id) = if node.id == id {
                    (record.clone(), true, record.prev_parent_id)
                } else {
                    let Some(record) = records.remove(&node.id) else {
                        continue;
                    };
                    let parent_id = node.parent_id.unwrap_or(id);
                    (record, false, parent_id)
                };
                restoring.insert(node.id);
                nodes.push(Restored {
                    entry: node.clone(),
                    record,
                    parent_id,
                    name: node.name.clone(),
                    explicit,
                });
            }
        }

        // Destinations and names of the listed entries.
        let mut taken: HashMap<(EntryId, bool), HashSet<String>> = HashMap::new();
        for node in nodes.iter_mut().filter(|node| node.explicit) {
            node.parent_id = if restore_all_to_drive {
                ctx.drive_id
            } else {
                self.destination(ctx, &node.entry, node.record.prev_parent_id, &restoring)
                    .await?
            };

            let names = match taken.entry((node.parent_id, node.entry.is_directory)) {
                Slot::Occupied(slot) => slot.into_mut(),
                Slot::Vacant(slot) => {
                    let filter = if node.entry.is_directory {
                        ListFilter::FoldersOnly
                    } else {
                        ListFilter::FilesOnly
                    };
                    let existing = store.find_children(node.parent_id, filter).await?;
                    slot.insert(existing.into_iter().map(|e| e.name).collect())
                }
            };
            let wanted = node
                .record
                .prev_name
                .clone()
                .unwrap_or_else(|| node.entry.name.clone());
            node.name = naming::disambiguate(&wanted, node.entry.is_directory, names);
            names.insert(node.name.clone());
        }

        let shares = self.restored_shares(&nodes, &restoring).await?;

        let mut changes = ChangeSet::new();
        let mut files = Vec::new();
        let mut restored = Vec::new();
        let now = Utc::now();
        for node in &nodes {
            let mut patch = EntryPatch::new(node.entry.id);
            if node.explicit {
                patch = patch.parent(node.parent_id);
                if node.name != node.entry.name {
                    patch = patch.name(node.name.clone());
                }
            }
            let share = shares.get(&node.entry.id).copied().flatten();
            if share != node.entry.share_id {
                patch = patch.share(share);
            }
            changes.update_entry(patch.clone());
            changes.push(Mutation::DeleteBinRecord(node.entry.id));

            if node.entry.is_file() {
                files.push(object_key(node.entry.owner_id, node.entry.id));
            }
            if node.explicit {
                let mut entry = node.entry.clone();
                patch.apply_to(&mut entry, now);
                restored.push(entry);
            }
        }

        store.apply(changes).await?;
        info!(
            user_id = %ctx.user_id,
            entries = restored.len(),
            nodes = nodes.len(),
            to_drive = restore_all_to_drive,
            "Entries restored from the bin"
        );

        self.tag_objects(&files, "false").await;
        Ok(restored)
    }

    /// Where a listed entry goes when restored to its previous place.
    async fn destination(
        &self,
        ctx: &RequestContext,
        entry: &Entry,
        prev_parent_id: EntryId,
        restoring: &HashSet<EntryId>,
    ) -> AppResult<EntryId> {
        if restoring.contains(&prev_parent_id) {
            return Ok(prev_parent_id);
        }
        let usable = match self.store.find_entry(prev_parent_id).await? {
            Some(parent) => {
                parent.is_directory
                    && parent.owner_id == entry.owner_id
                    && parent.id != ctx.bin_id
                    && self.store.find_bin_record(parent.id).await?.is_none()
            }
            None => false,
        };
        Ok(if usable { prev_parent_id } else { ctx.drive_id })
    }

    /// Share of every restored node. A node that was the root of a share
    /// that still exists gets it back, everything else inherits from its
    /// new parent.
    async fn restored_shares(
        &self,
        nodes: &[Restored],
        restoring: &HashSet<EntryId>,
    ) -> AppResult<HashMap<EntryId, Option<ShareId>>> {
        let store = self.store.as_ref();
        let mut resolved: HashMap<EntryId, Option<ShareId>> = HashMap::new();
        let mut outside: HashMap<EntryId, Option<ShareId>> = HashMap::new();
        let mut live: HashMap<ShareId, bool> = HashMap::new();

        let mut pending: Vec<&Restored> = nodes.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for node in pending {
                let inherited = if restoring.contains(&node.parent_id) {
                    match resolved.get(&node.parent_id) {
                        Some(share) => *share,
                        None => {
                            waiting.push(node);
                            continue;
                        }
                    }
                } else {
                    match outside.get(&node.parent_id) {
                        Some(share) => *share,
                        None => {
                            let share = store
                                .find_entry(node.parent_id)
                                .await?
                                .and_then(|parent| parent.share_id);
                            outside.insert(node.parent_id, share);
                            share
                        }
                    }
                };

                let own = match node.record.prev_share_id {
                    Some(share_id) => {
                        let exists = match live.get(&share_id) {
                            Some(exists) => *exists,
                            None => {
                                let exists = store.find_share(share_id).await?.is_some();
                                live.insert(share_id, exists);
                                exists
                            }
                        };
                        exists.then_some(share_id)
                    }
                    None => None,
                };
                resolved.insert(node.entry.id, own.or(inherited));
            }

            if waiting.len() == before {
                return Err(AppError::inconsistent_state(
                    "Restored entries form a cycle",
                ));
            }
            pending = waiting;
        }
        Ok(resolved)
    }
}
