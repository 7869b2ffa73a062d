//! Entry lookups, listings, folder creation, renames, and moves with
//! access enforcement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use drive_auth::AccessResolver;
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::traits::storage::object_key;
use drive_core::traits::{ObjectStorage, PresignedRequest};
use drive_core::types::{EntryId, ShareId, UserId};
use drive_database::DriveStore;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, EntryPatch, ListFilter};
use drive_entity::permission::Access;

use crate::context::RequestContext;
use crate::guard;
use crate::naming;
use crate::tree::Subtree;

/// One entry of a move request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveItem {
    /// Entry to move.
    pub id: EntryId,
    /// Parent the caller believes the entry currently has.
    pub parent_id: EntryId,
    /// New name to apply together with the move.
    #[serde(default)]
    pub name: Option<String>,
}

/// Request to move entries under a new parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Entries to move.
    pub entries: Vec<MoveItem>,
    /// Destination directory.
    pub new_parent_id: EntryId,
}

/// Manages the entry hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyService {
    /// Drive store.
    store: Arc<dyn DriveStore>,
    /// Access resolver.
    access: Arc<AccessResolver>,
    /// Object storage for download URLs.
    storage: Arc<dyn ObjectStorage>,
    /// Maximum entry name length.
    max_name_length: usize,
}

impl HierarchyService {
    /// Creates a new hierarchy service.
    pub fn new(
        store: Arc<dyn DriveStore>,
        access: Arc<AccessResolver>,
        storage: Arc<dyn ObjectStorage>,
        max_name_length: usize,
    ) -> Self {
        Self {
            store,
            access,
            storage,
            max_name_length,
        }
    }

    /// Gets an entry the caller can read.
    pub async fn get_entry(&self, ctx: &RequestContext, entry_id: EntryId) -> AppResult<Entry> {
        self.access
            .require(ctx.user_id, entry_id, Access::Read)
            .await
            .map_err(AppError::conceal)
    }

    /// Lists the children of a directory, or all of its descendants when
    /// `recursive` is set.
    ///
    /// Callers other than the owner only see entries they can read.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        filter: ListFilter,
        recursive: bool,
    ) -> AppResult<Vec<Entry>> {
        let parent = self.get_entry(ctx, parent_id).await?;
        guard::ensure_directory(&parent)?;

        let entries = if recursive {
            self.store.find_descendants(parent.id, filter).await?
        } else {
            self.store.find_children(parent.id, filter).await?
        };

        if parent.owner_id == ctx.user_id {
            return Ok(entries);
        }
        self.readable(ctx.user_id, entries).await
    }

    /// Lists every folder below `parent_id`.
    pub async fn list_folders_recursive(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
    ) -> AppResult<Vec<Entry>> {
        self.list_children(ctx, parent_id, ListFilter::FoldersOnly, true)
            .await
    }

    /// Lists the roots of shares other users granted the caller.
    pub async fn list_shared_entries(
        &self,
        ctx: &RequestContext,
        filter: ListFilter,
    ) -> AppResult<Vec<Entry>> {
        self.store.find_shared_roots(ctx.user_id, filter).await
    }

    /// Whether any of `names` is taken by a child of the same kind.
    pub async fn detect_name_collision(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        names: &[String],
        is_directory: bool,
    ) -> AppResult<bool> {
        let parent = self.get_entry(ctx, parent_id).await?;
        if names.is_empty() {
            return Ok(false);
        }
        let taken = self
            .store
            .find_sibling_names(parent.id, is_directory, names)
            .await?;
        Ok(!taken.is_empty())
    }

    /// Creates a folder. It joins the parent's share and belongs to the
    /// parent's owner.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        parent_id: EntryId,
        name: &str,
    ) -> AppResult<EntryId> {
        naming::validate_name(name, self.max_name_length)?;
        let parent = self.access.require(ctx.user_id, parent_id, Access::Edit).await?;
        guard::ensure_directory(&parent)?;
        guard::ensure_outside_bin(self.store.as_ref(), &parent).await?;
        self.ensure_name_free(parent.id, name, true).await?;

        let folder = Entry::directory(parent.owner_id, Some(parent.id), parent.share_id, name);
        let folder_id = folder.id;
        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertEntry(folder));
        self.store.apply(changes).await?;

        info!(
            user_id = %ctx.user_id,
            entry_id = %folder_id,
            parent_id = %parent.id,
            name = %name,
            "Folder created"
        );
        Ok(folder_id)
    }

    /// Renames an entry in place.
    pub async fn rename(
        &self,
        ctx: &RequestContext,
        entry_id: EntryId,
        name: &str,
    ) -> AppResult<Entry> {
        naming::validate_name(name, self.max_name_length)?;
        let mut entry = self.access.require(ctx.user_id, entry_id, Access::Edit).await?;
        let Some(parent_id) = entry.parent_id else {
            return Err(AppError::validation("Root directories cannot be renamed"));
        };
        guard::ensure_outside_bin(self.store.as_ref(), &entry).await?;
        if entry.name == name {
            return Ok(entry);
        }
        self.ensure_name_free(parent_id, name, entry.is_directory).await?;

        let patch = EntryPatch::new(entry.id).name(name);
        let mut changes = ChangeSet::new();
        changes.update_entry(patch.clone());
        self.store.apply(changes).await?;
        patch.apply_to(&mut entry, Utc::now());

        info!(user_id = %ctx.user_id, entry_id = %entry.id, name = %name, "Entry renamed");
        Ok(entry)
    }

    /// Moves entries under a new parent, all or nothing.
    ///
    /// Each entry may be renamed on the way. Share ids inherited from the
    /// old location are replaced by the new parent's share. Entries that
    /// are the root of their own share keep it.
    pub async fn move_entries(
        &self,
        ctx: &RequestContext,
        req: MoveRequest,
    ) -> AppResult<Vec<Entry>> {
        if req.entries.is_empty() {
            return Err(AppError::validation("Nothing to move"));
        }
        let store = self.store.as_ref();

        let target = self
            .access
            .require(ctx.user_id, req.new_parent_id, Access::Edit)
            .await?;
        guard::ensure_directory(&target)?;
        guard::ensure_outside_bin(store, &target).await?;

        let requested: HashSet<EntryId> = req.entries.iter().map(|item| item.id).collect();
        if requested.len() != req.entries.len() {
            return Err(AppError::validation("An entry is listed twice in the move"));
        }
        let target_lineage: HashSet<EntryId> = store
            .find_ancestors(target.id)
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect();

        let mut moving: Vec<(Entry, String)> = Vec::with_capacity(req.entries.len());
        for item in &req.entries {
            let entry = self.access.require(ctx.user_id, item.id, Access::Edit).await?;
            if entry.is_root() {
                return Err(AppError::validation("Root directories cannot be moved"));
            }
            if entry.parent_id != Some(item.parent_id) {
                return Err(AppError::inconsistent_state(format!(
                    "Entry {} is no longer in {}",
                    entry.id, item.parent_id
                )));
            }
            if store.find_bin_record(entry.id).await?.is_some() {
                return Err(AppError::validation(format!(
                    "Entry {} is in the bin and must be restored first",
                    entry.id
                )));
            }
            if entry.owner_id != target.owner_id {
                return Err(AppError::validation("Entries cannot be moved between drives"));
            }
            if target_lineage.contains(&entry.id) {
                return Err(AppError::validation(format!(
                    "Cannot move {} into itself or one of its descendants",
                    entry.id
                )));
            }
            let ancestors = store.find_ancestors(entry.id).await?;
            if ancestors.iter().skip(1).any(|a| requested.contains(&a.id)) {
                return Err(AppError::validation(format!(
                    "Entry {} is moved together with one of its ancestors",
                    entry.id
                )));
            }

            let name = match &item.name {
                Some(name) => {
                    naming::validate_name(name, self.max_name_length)?;
                    name.clone()
                }
                None => entry.name.clone(),
            };
            moving.push((entry, name));
        }

        let mut claimed: HashSet<(String, bool)> = HashSet::new();
        for (entry, name) in &moving {
            if !claimed.insert((name.clone(), entry.is_directory)) {
                return Err(AppError::collision(format!("'{name}' is used twice in the move")));
            }
        }
        for child in store.find_children(target.id, ListFilter::All).await? {
            if !requested.contains(&child.id)
                && claimed.contains(&(child.name.clone(), child.is_directory))
            {
                return Err(AppError::collision(format!(
                    "'{}' already exists in {}",
                    child.name, target.id
                )));
            }
        }

        let mut changes = ChangeSet::new();
        let mut patches = Vec::with_capacity(moving.len());
        let mut parent_shares: HashMap<EntryId, Option<ShareId>> = HashMap::new();
        for (entry, name) in &moving {
            let old_parent_share = match entry.parent_id {
                Some(parent_id) => match parent_shares.get(&parent_id) {
                    Some(share) => *share,
                    None => {
                        let share = store
                            .find_entry(parent_id)
                            .await?
                            .and_then(|parent| parent.share_id);
                        parent_shares.insert(parent_id, share);
                        share
                    }
                },
                None => None,
            };
            let independent = entry.share_id.is_some() && entry.share_id != old_parent_share;
            let root_share = if independent {
                entry.share_id
            } else {
                target.share_id
            };

            let subtree = Subtree::load(store, entry.clone()).await?;
            let mut patch = EntryPatch::new(entry.id).parent(target.id);
            if *name != entry.name {
                patch = patch.name(name.clone());
            }
            for (id, share) in subtree.rederive_shares(root_share) {
                if id == entry.id {
                    patch = patch.share(share);
                } else {
                    changes.update_entry(EntryPatch::new(id).share(share));
                }
            }
            changes.update_entry(patch.clone());
            patches.push(patch);
        }

        self.store.apply(changes).await?;

        let now = Utc::now();
        let moved: Vec<Entry> = moving
            .into_iter()
            .zip(patches)
            .map(|((mut entry, _), patch)| {
                patch.apply_to(&mut entry, now);
                entry
            })
            .collect();

        info!(
            user_id = %ctx.user_id,
            parent_id = %target.id,
            count = moved.len(),
            "Entries moved"
        );
        Ok(moved)
    }

    /// Presigned download request for a file the caller can read.
    pub async fn download_url(
        &self,
        ctx: &RequestContext,
        entry_id: EntryId,
    ) -> AppResult<PresignedRequest> {
        let entry = self.get_entry(ctx, entry_id).await?;
        if entry.is_directory {
            return Err(AppError::validation("Directories cannot be downloaded"));
        }
        let request = self
            .storage
            .presign_download(&object_key(entry.owner_id, entry.id))
            .await?;
        debug!(user_id = %ctx.user_id, entry_id = %entry.id, "Download URL issued");
        Ok(request)
    }

    async fn ensure_name_free(
        &self,
        parent_id: EntryId,
        name: &str,
        is_directory: bool,
    ) -> AppResult<()> {
        let taken = self
            .store
            .find_sibling_names(parent_id, is_directory, &[name.to_string()])
            .await?;
        if !taken.is_empty() {
            let kind = if is_directory { "folder" } else { "file" };
            return Err(AppError::collision(format!(
                "A {kind} named '{name}' already exists in {parent_id}"
            )));
        }
        Ok(())
    }

    /// Keeps the entries `user_id` can read. Access of a non-owner depends
    /// only on the share, so results are cached per share.
    async fn readable(&self, user_id: UserId, entries: Vec<Entry>) -> AppResult<Vec<Entry>> {
        let mut by_share: HashMap<Option<ShareId>, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.owner_id != user_id {
                let readable = match by_share.get(&entry.share_id) {
                    Some(readable) => *readable,
                    None => {
                        let readable = self
                            .access
                            .access_for(user_id, &entry)
                            .await?
                            .has_at_least(Access::Read);
                        by_share.insert(entry.share_id, readable);
                        readable
                    }
                };
                if !readable {
                    continue;
                }
            }
            visible.push(entry);
        }
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use drive_core::ErrorKind;
    use drive_entity::share::SharePolicies;

    fn item(id: EntryId, parent_id: EntryId) -> MoveItem {
        MoveItem {
            id,
            parent_id,
            name: None,
        }
    }

    #[tokio::test]
    async fn test_owner_and_stranger_access() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();

        for id in [alice.drive_id, alice.bin_id, d] {
            assert_eq!(fx.access.resolve_access(alice.user_id, id).await.unwrap(), Access::Owner);
            assert_eq!(fx.access.resolve_access(bob.user_id, id).await.unwrap(), Access::None);
        }

        let err = fx.hierarchy.get_entry(&bob, d).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Refused);
        let err = fx.hierarchy.get_entry(&bob, EntryId::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Refused);
        let err = fx.hierarchy.create_folder(&bob, d, "x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_folder_names_collide_by_kind() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;

        fx.hierarchy.create_folder(&alice, alice.drive_id, "A").await.unwrap();
        let err = fx.hierarchy.create_folder(&alice, alice.drive_id, "A").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Collision);

        fx.file(&alice, alice.drive_id, "A", 1).await;
        let names = vec!["A".to_string()];
        assert!(fx.hierarchy.detect_name_collision(&alice, alice.drive_id, &names, true).await.unwrap());
        assert!(fx.hierarchy.detect_name_collision(&alice, alice.drive_id, &names, false).await.unwrap());
        let other = vec!["B".to_string()];
        assert!(!fx.hierarchy.detect_name_collision(&alice, alice.drive_id, &other, false).await.unwrap());

        let err = fx.hierarchy.create_folder(&alice, alice.drive_id, "a/b").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_colliding_move_changes_nothing() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let src = fx.hierarchy.create_folder(&alice, alice.drive_id, "src").await.unwrap();
        let dst = fx.hierarchy.create_folder(&alice, alice.drive_id, "dst").await.unwrap();
        let a = fx.file(&alice, src, "a", 1).await;
        let b = fx.file(&alice, src, "b", 1).await;
        let c = fx.file(&alice, src, "c", 1).await;
        fx.file(&alice, dst, "b", 1).await;

        let req = MoveRequest {
            entries: vec![item(a, src), item(b, src), item(c, src)],
            new_parent_id: dst,
        };
        let err = fx.hierarchy.move_entries(&alice, req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Collision);

        let left = fx.hierarchy.list_children(&alice, src, ListFilter::All, false).await.unwrap();
        assert_eq!(left.len(), 3);

        let req = MoveRequest {
            entries: vec![
                item(a, src),
                MoveItem {
                    id: b,
                    parent_id: src,
                    name: Some("b2".to_string()),
                },
                item(c, src),
            ],
            new_parent_id: dst,
        };
        let moved = fx.hierarchy.move_entries(&alice, req).await.unwrap();
        assert_eq!(moved.len(), 3);
        assert!(moved.iter().all(|e| e.parent_id == Some(dst)));
        let names: Vec<&str> = moved.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b2", "c"]);
    }

    #[tokio::test]
    async fn test_move_refuses_cycles_and_stale_parents() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        let inner = fx.hierarchy.create_folder(&alice, d, "inner").await.unwrap();

        let into_self = MoveRequest {
            entries: vec![item(d, alice.drive_id)],
            new_parent_id: inner,
        };
        let err = fx.hierarchy.move_entries(&alice, into_self).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let stale = MoveRequest {
            entries: vec![item(inner, alice.drive_id)],
            new_parent_id: alice.drive_id,
        };
        let err = fx.hierarchy.move_entries(&alice, stale).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InconsistentState);

        let into_bin = MoveRequest {
            entries: vec![item(inner, d)],
            new_parent_id: alice.bin_id,
        };
        let err = fx.hierarchy.move_entries(&alice, into_bin).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_move_rederives_inherited_shares() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let carol = fx.user("carol").await;
        let shared = fx.hierarchy.create_folder(&alice, alice.drive_id, "shared").await.unwrap();
        let private = fx.hierarchy.create_folder(&alice, alice.drive_id, "private").await.unwrap();
        let doc = fx.file(&alice, shared, "doc", 1).await;
        let own = fx.hierarchy.create_folder(&alice, shared, "own").await.unwrap();

        let readers = |ctx: &RequestContext| SharePolicies {
            can_read_users: vec![ctx.user_id],
            can_edit_users: Vec::new(),
        };
        fx.shares.apply_share(&alice, shared, readers(&bob)).await.unwrap();
        fx.shares.apply_share(&alice, own, readers(&carol)).await.unwrap();

        let req = MoveRequest {
            entries: vec![item(doc, shared), item(own, shared)],
            new_parent_id: private,
        };
        fx.hierarchy.move_entries(&alice, req).await.unwrap();

        assert_eq!(fx.access.resolve_access(bob.user_id, doc).await.unwrap(), Access::None);
        assert_eq!(fx.access.resolve_access(carol.user_id, own).await.unwrap(), Access::Read);
    }

    #[tokio::test]
    async fn test_listing_hides_unreadable_children() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let bob = fx.user("bob").await;
        let carol = fx.user("carol").await;
        let d = fx.hierarchy.create_folder(&alice, alice.drive_id, "D").await.unwrap();
        let open = fx.hierarchy.create_folder(&alice, d, "open").await.unwrap();
        let closed = fx.hierarchy.create_folder(&alice, d, "closed").await.unwrap();
        fx.file(&alice, closed, "secret", 1).await;

        let readers = |ctx: &RequestContext| SharePolicies {
            can_read_users: vec![ctx.user_id],
            can_edit_users: Vec::new(),
        };
        fx.shares.apply_share(&alice, d, readers(&bob)).await.unwrap();
        fx.shares.apply_share(&alice, closed, readers(&carol)).await.unwrap();

        let seen = fx.hierarchy.list_children(&bob, d, ListFilter::All, true).await.unwrap();
        let ids: Vec<EntryId> = seen.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![open]);

        let all = fx.hierarchy.list_children(&alice, d, ListFilter::All, true).await.unwrap();
        assert_eq!(all.len(), 3);
        let folders = fx.hierarchy.list_folders_recursive(&alice, alice.drive_id).await.unwrap();
        assert_eq!(folders.len(), 3);

        let shared = fx.hierarchy.list_shared_entries(&carol, ListFilter::All).await.unwrap();
        assert_eq!(shared.iter().map(|e| e.id).collect::<Vec<_>>(), vec![closed]);
    }

    #[tokio::test]
    async fn test_rename_and_download() {
        let fx = Fixture::new().await;
        let alice = fx.user("alice").await;
        let f = fx.file(&alice, alice.drive_id, "a.txt", 5).await;
        fx.file(&alice, alice.drive_id, "b.txt", 5).await;

        let err = fx.hierarchy.rename(&alice, f, "b.txt").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Collision);
        let renamed = fx.hierarchy.rename(&alice, f, "c.txt").await.unwrap();
        assert_eq!(renamed.name, "c.txt");
        let err = fx.hierarchy.rename(&alice, alice.drive_id, "x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let url = fx.hierarchy.download_url(&alice, f).await.unwrap();
        assert_eq!(url.method, "GET");
        assert!(url.url.contains(&object_key(alice.user_id, f)));
        let err = fx.hierarchy.download_url(&alice, alice.drive_id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
