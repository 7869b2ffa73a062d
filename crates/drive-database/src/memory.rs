//! In-process [`DriveStore`].
//!
//! Mirrors the PostgreSQL schema constraints: foreign keys are checked as
//! each mutation lands, sibling-name uniqueness is checked once the whole
//! change set has been applied (it is deferred in the schema too).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::{EntryId, ShareId, UserId};
use drive_entity::bin::BinRecord;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, ListFilter};
use drive_entity::share::Share;
use drive_entity::user::User;

use crate::store::DriveStore;

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<UserId, User>,
    entries: HashMap<EntryId, Entry>,
    shares: HashMap<ShareId, Share>,
    bin: HashMap<EntryId, BinRecord>,
}

impl State {
    fn children_of(&self, parent_id: EntryId) -> Vec<&Entry> {
        self.entries
            .values()
            .filter(|e| e.parent_id == Some(parent_id))
            .collect()
    }

    fn require_directory(&self, id: EntryId) -> AppResult<()> {
        match self.entries.get(&id) {
            Some(entry) if entry.is_directory => Ok(()),
            Some(_) => Err(violation(format!("parent {id} is not a directory"))),
            None => Err(violation(format!("parent {id} does not exist"))),
        }
    }

    fn require_share(&self, share_id: Option<ShareId>) -> AppResult<()> {
        match share_id {
            Some(id) if !self.shares.contains_key(&id) => {
                Err(violation(format!("share {id} does not exist")))
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, mutation: Mutation) -> AppResult<()> {
        match mutation {
            Mutation::InsertUser(user) => {
                if self.users.contains_key(&user.id)
                    || self.users.values().any(|u| u.username == user.username)
                {
                    return Err(violation("users_username_key"));
                }
                self.users.insert(user.id, user);
            }
            Mutation::InsertEntry(entry) => {
                if self.entries.contains_key(&entry.id) {
                    return Err(violation(format!("entry {} already exists", entry.id)));
                }
                if !self.users.contains_key(&entry.owner_id) {
                    return Err(violation(format!("owner {} does not exist", entry.owner_id)));
                }
                if let Some(parent_id) = entry.parent_id {
                    self.require_directory(parent_id)?;
                }
                self.require_share(entry.share_id)?;
                self.entries.insert(entry.id, entry);
            }
            Mutation::UpdateEntry(patch) => {
                if let Some(parent_id) = patch.parent_id {
                    if parent_id == patch.id {
                        return Err(violation(format!("entry {parent_id} cannot contain itself")));
                    }
                    self.require_directory(parent_id)?;
                }
                if let Some(share_id) = patch.share_id {
                    self.require_share(share_id)?;
                }
                let entry = self
                    .entries
                    .get_mut(&patch.id)
                    .ok_or_else(|| missing(format!("Entry {}", patch.id)))?;
                patch.apply_to(entry, Utc::now());
            }
            Mutation::DeleteEntry(id) => {
                if !self.entries.contains_key(&id) {
                    return Err(missing(format!("Entry {id}")));
                }
                if !self.children_of(id).is_empty() {
                    return Err(violation(format!("entry {id} still has children")));
                }
                if self.bin.contains_key(&id) {
                    return Err(violation(format!("entry {id} still has a bin record")));
                }
                if self.users.values().any(|u| u.drive_id == id || u.bin_id == id) {
                    return Err(violation(format!("entry {id} is a user root")));
                }
                self.entries.remove(&id);
            }
            Mutation::InsertShare(share) => {
                if self.shares.contains_key(&share.id) {
                    return Err(violation(format!("share {} already exists", share.id)));
                }
                self.shares.insert(share.id, share);
            }
            Mutation::UpdateShare(share) => {
                let slot = self
                    .shares
                    .get_mut(&share.id)
                    .ok_or_else(|| missing(format!("Share {}", share.id)))?;
                *slot = share;
            }
            Mutation::InsertBinRecord(record) => {
                if !self.entries.contains_key(&record.id) {
                    return Err(violation(format!("entry {} does not exist", record.id)));
                }
                if self.bin.contains_key(&record.id) {
                    return Err(violation(format!("entry {} is already binned", record.id)));
                }
                self.require_share(record.prev_share_id)?;
                self.bin.insert(record.id, record);
            }
            Mutation::DeleteBinRecord(id) => {
                self.bin
                    .remove(&id)
                    .ok_or_else(|| missing(format!("Bin record {id}")))?;
            }
            Mutation::AdjustUsedSpace {
                user_id,
                delta,
                limit,
            } => {
                let user = self
                    .users
                    .get_mut(&user_id)
                    .ok_or_else(|| missing(format!("User {user_id}")))?;
                let wanted = user.used_space + delta;
                if limit.is_some_and(|limit| wanted > limit) {
                    return Err(AppError::quota_exceeded(format!(
                        "Reserving {delta} bytes would exceed the quota of user {user_id}"
                    )));
                }
                user.used_space = wanted.max(0);
            }
        }
        Ok(())
    }

    fn check_sibling_names(&self) -> AppResult<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in self.entries.values() {
            if let Some(parent_id) = entry.parent_id {
                if !seen.insert((parent_id, entry.is_directory, entry.name.as_str())) {
                    return Err(violation("entries_sibling_name_key"));
                }
            }
        }
        Ok(())
    }
}

fn violation(detail: impl std::fmt::Display) -> AppError {
    AppError::storage_failure(format!("Failed to apply change set: {detail}"))
}

fn missing(what: String) -> AppError {
    AppError::storage_failure(format!("{what} no longer exists"))
}

fn sort_listing(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// [`DriveStore`] kept entirely in memory.
///
/// Each change set is applied to a copy of the state under the write lock
/// and only swapped in when every mutation and constraint succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriveStore {
    state: Arc<RwLock<State>>,
}

impl MemoryDriveStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored shares.
    pub async fn share_count(&self) -> usize {
        self.state.read().await.shares.len()
    }

    /// Number of stored entries.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Overwrite the put time of a bin record.
    pub async fn backdate_bin_record(&self, id: EntryId, put_at: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.write().await;
        let record = state
            .bin
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Bin record {id} not found")))?;
        record.put_at = put_at;
        Ok(())
    }
}

#[async_trait]
impl DriveStore for MemoryDriveStore {
    async fn find_entry(&self, id: EntryId) -> AppResult<Option<Entry>> {
        Ok(self.state.read().await.entries.get(&id).cloned())
    }

    async fn find_entries(&self, ids: &[EntryId]) -> AppResult<Vec<Entry>> {
        let state = self.state.read().await;
        let unique: HashSet<&EntryId> = ids.iter().collect();
        let mut entries: Vec<Entry> = unique
            .into_iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect();
        sort_listing(&mut entries);
        Ok(entries)
    }

    async fn find_children(&self, parent_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        let state = self.state.read().await;
        let mut children: Vec<Entry> = state
            .children_of(parent_id)
            .into_iter()
            .filter(|e| filter.accepts(e.is_directory))
            .cloned()
            .collect();
        sort_listing(&mut children);
        Ok(children)
    }

    async fn find_descendants(&self, root_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        let state = self.state.read().await;
        let mut levels: Vec<Vec<Entry>> = Vec::new();
        let mut frontier = vec![root_id];
        while !frontier.is_empty() {
            let mut level: Vec<Entry> = Vec::new();
            for parent_id in frontier {
                level.extend(state.children_of(parent_id).into_iter().cloned());
            }
            frontier = level
                .iter()
                .filter(|e| e.is_directory)
                .map(|e| e.id)
                .collect();
            sort_listing(&mut level);
            levels.push(level);
        }
        Ok(levels
            .into_iter()
            .flatten()
            .filter(|e| filter.accepts(e.is_directory))
            .collect())
    }

    async fn find_ancestors(&self, id: EntryId) -> AppResult<Vec<Entry>> {
        let state = self.state.read().await;
        let mut chain = Vec::new();
        let mut cursor = state.entries.get(&id);
        while let Some(entry) = cursor {
            chain.push(entry.clone());
            cursor = entry.parent_id.and_then(|p| state.entries.get(&p));
        }
        Ok(chain)
    }

    async fn find_sibling_names(
        &self,
        parent_id: EntryId,
        is_directory: bool,
        names: &[String],
    ) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        let mut taken: Vec<String> = state
            .children_of(parent_id)
            .into_iter()
            .filter(|e| e.is_directory == is_directory && names.contains(&e.name))
            .map(|e| e.name.clone())
            .collect();
        taken.sort();
        Ok(taken)
    }

    async fn find_shared_roots(&self, user_id: UserId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        let state = self.state.read().await;
        let mut roots: Vec<Entry> = state
            .entries
            .values()
            .filter(|e| e.owner_id != user_id && filter.accepts(e.is_directory))
            .filter(|e| {
                e.share_id
                    .and_then(|s| state.shares.get(&s))
                    .is_some_and(|s| s.can_read(user_id) || s.can_edit(user_id))
            })
            .filter(|e| {
                let parent_share = e
                    .parent_id
                    .and_then(|p| state.entries.get(&p))
                    .map(|p| p.share_id);
                parent_share.is_none_or(|share| share != e.share_id)
            })
            .cloned()
            .collect();
        sort_listing(&mut roots);
        Ok(roots)
    }

    async fn find_share(&self, id: ShareId) -> AppResult<Option<Share>> {
        Ok(self.state.read().await.shares.get(&id).cloned())
    }

    async fn count_share_references(&self, id: ShareId) -> AppResult<u64> {
        let state = self.state.read().await;
        let entries = state
            .entries
            .values()
            .filter(|e| e.share_id == Some(id))
            .count();
        let records = state
            .bin
            .values()
            .filter(|r| r.prev_share_id == Some(id))
            .count();
        Ok((entries + records) as u64)
    }

    async fn find_bin_record(&self, id: EntryId) -> AppResult<Option<BinRecord>> {
        Ok(self.state.read().await.bin.get(&id).cloned())
    }

    async fn find_bin_records(&self, ids: &[EntryId]) -> AppResult<Vec<BinRecord>> {
        let state = self.state.read().await;
        let unique: HashSet<&EntryId> = ids.iter().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| state.bin.get(id).cloned())
            .collect())
    }

    async fn find_expired_bin_records(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<BinRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<BinRecord> = state
            .bin
            .values()
            .filter(|r| r.expired(cutoff))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.put_at);
        Ok(records)
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let count = changes.len();
        for mutation in changes {
            next.apply(mutation)?;
        }
        next.check_sibling_names()?;
        *guard = next;

        debug!(mutations = count, "Change set committed");
        Ok(())
    }

    async fn delete_unreferenced_shares(&self) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let referenced: HashSet<ShareId> = state
            .entries
            .values()
            .filter_map(|e| e.share_id)
            .chain(state.bin.values().filter_map(|r| r.prev_share_id))
            .collect();
        let before = state.shares.len();
        state.shares.retain(|id, _| referenced.contains(id));
        Ok((before - state.shares.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::ErrorKind;
    use drive_entity::entry::EntryPatch;

    fn make_user(username: &str) -> (User, Entry, Entry) {
        let id = UserId::new();
        let drive = Entry::directory(id, None, None, "drive");
        let bin = Entry::directory(id, None, None, "bin");
        let user = User {
            id,
            username: username.to_string(),
            password_hash: "hash".to_string(),
            used_space: 0,
            drive_id: drive.id,
            bin_id: bin.id,
            created_at: Utc::now(),
        };
        (user, drive, bin)
    }

    async fn make_store() -> (MemoryDriveStore, User) {
        let store = MemoryDriveStore::new();
        let (user, drive, bin) = make_user("alice");
        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertUser(user.clone()))
            .push(Mutation::InsertEntry(drive))
            .push(Mutation::InsertEntry(bin));
        store.apply(changes).await.expect("seed");
        (store, user)
    }

    #[tokio::test]
    async fn test_failed_change_set_leaves_state_untouched() {
        let (store, user) = make_store().await;
        let a = Entry::directory(user.id, Some(user.drive_id), None, "A");
        let dup = Entry::directory(user.id, Some(user.drive_id), None, "A");

        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertEntry(a.clone()))
            .push(Mutation::InsertEntry(dup));
        let err = store.apply(changes).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::StorageFailure);
        assert!(store.find_entry(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sibling_uniqueness_is_checked_after_the_whole_set() {
        let (store, user) = make_store().await;
        let a = Entry::file(user.id, user.drive_id, None, "a.txt", 1);
        let b = Entry::file(user.id, user.drive_id, None, "b.txt", 1);
        let mut seed = ChangeSet::new();
        seed.push(Mutation::InsertEntry(a.clone()))
            .push(Mutation::InsertEntry(b.clone()));
        store.apply(seed).await.unwrap();

        // Swapping two names passes through a transient duplicate.
        let mut swap = ChangeSet::new();
        swap.update_entry(EntryPatch::new(a.id).name("b.txt"))
            .update_entry(EntryPatch::new(b.id).name("a.txt"));
        store.apply(swap).await.unwrap();

        let a = store.find_entry(a.id).await.unwrap().unwrap();
        assert_eq!(a.name, "b.txt");
    }

    #[tokio::test]
    async fn test_file_and_folder_may_share_a_name() {
        let (store, user) = make_store().await;
        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertEntry(Entry::directory(
                user.id,
                Some(user.drive_id),
                None,
                "A",
            )))
            .push(Mutation::InsertEntry(Entry::file(
                user.id,
                user.drive_id,
                None,
                "A",
                3,
            )));
        store.apply(changes).await.unwrap();
        assert_eq!(
            store
                .find_children(user.drive_id, ListFilter::All)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_used_space_limit_and_clamp() {
        let (store, user) = make_store().await;

        let mut over = ChangeSet::new();
        over.adjust_used_space(user.id, 11, Some(10));
        let err = store.apply(over).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);

        let mut ok = ChangeSet::new();
        ok.adjust_used_space(user.id, 10, Some(10));
        store.apply(ok).await.unwrap();

        let mut refund = ChangeSet::new();
        refund.adjust_used_space(user.id, -25, None);
        store.apply(refund).await.unwrap();
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().used_space, 0);
    }

    #[tokio::test]
    async fn test_descendants_are_ordered_by_depth() {
        let (store, user) = make_store().await;
        let d = Entry::directory(user.id, Some(user.drive_id), None, "D");
        let f = Entry::directory(user.id, Some(d.id), None, "F");
        let g = Entry::file(user.id, f.id, None, "g", 1);
        let mut changes = ChangeSet::new();
        changes
            .push(Mutation::InsertEntry(d.clone()))
            .push(Mutation::InsertEntry(f.clone()))
            .push(Mutation::InsertEntry(g.clone()));
        store.apply(changes).await.unwrap();

        let all = store.find_descendants(user.drive_id, ListFilter::All).await.unwrap();
        let ids: Vec<EntryId> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![d.id, f.id, g.id]);

        let folders = store
            .find_descendants(user.drive_id, ListFilter::FoldersOnly)
            .await
            .unwrap();
        assert_eq!(folders.len(), 2);

        let ancestors = store.find_ancestors(g.id).await.unwrap();
        let ids: Vec<EntryId> = ancestors.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![g.id, f.id, d.id, user.drive_id]);
    }

    #[tokio::test]
    async fn test_delete_refuses_non_empty_directory() {
        let (store, user) = make_store().await;
        let d = Entry::directory(user.id, Some(user.drive_id), None, "D");
        let f = Entry::file(user.id, d.id, None, "f", 1);
        let mut seed = ChangeSet::new();
        seed.push(Mutation::InsertEntry(d.clone()))
            .push(Mutation::InsertEntry(f));
        store.apply(seed).await.unwrap();

        let mut delete = ChangeSet::new();
        delete.push(Mutation::DeleteEntry(d.id));
        assert!(store.apply(delete).await.is_err());
    }
}
