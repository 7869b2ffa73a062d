//! Entry entity model.

use chrono::{DateTime, Utc};
use drive_core::types::{EntryId, ShareId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A file or directory in some user's tree.
///
/// Bin membership is not stored here. An entry is binned exactly when a
/// [`BinRecord`](crate::bin::BinRecord) with the same id exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    /// Unique entry identifier.
    pub id: EntryId,
    /// The user who created the entry. Never changes.
    pub owner_id: UserId,
    /// Containing directory. `None` only for drive and bin roots.
    pub parent_id: Option<EntryId>,
    /// Share group granting other users access.
    pub share_id: Option<ShareId>,
    /// Directory or file. Never changes.
    pub is_directory: bool,
    /// Content size in bytes, 0 for directories.
    pub size: i64,
    /// Entry name, unique among siblings of the same kind.
    pub name: String,
    /// Last time the entry was created, moved, or renamed.
    pub modified_at: DateTime<Utc>,
}

impl Entry {
    /// A new directory owned by `owner_id`.
    pub fn directory(
        owner_id: UserId,
        parent_id: Option<EntryId>,
        share_id: Option<ShareId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            owner_id,
            parent_id,
            share_id,
            is_directory: true,
            size: 0,
            name: name.into(),
            modified_at: Utc::now(),
        }
    }

    /// A new file of `size` bytes owned by `owner_id`.
    pub fn file(
        owner_id: UserId,
        parent_id: EntryId,
        share_id: Option<ShareId>,
        name: impl Into<String>,
        size: i64,
    ) -> Self {
        Self {
            id: EntryId::new(),
            owner_id,
            parent_id: Some(parent_id),
            share_id,
            is_directory: false,
            size,
            name: name.into(),
            modified_at: Utc::now(),
        }
    }

    /// Check if this is a root (drive or bin root).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_directory
    }
}

/// Partial update of an entry. `None` fields stay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    /// Entry to update.
    pub id: EntryId,
    /// New containing directory.
    pub parent_id: Option<EntryId>,
    /// New name.
    pub name: Option<String>,
    /// New share group; `Some(None)` clears it.
    pub share_id: Option<Option<ShareId>>,
}

impl EntryPatch {
    /// An empty patch for `id`.
    pub fn new(id: EntryId) -> Self {
        Self {
            id,
            parent_id: None,
            name: None,
            share_id: None,
        }
    }

    /// Move the entry under `parent_id`.
    pub fn parent(mut self, parent_id: EntryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Rename the entry.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set or clear the share group.
    pub fn share(mut self, share_id: Option<ShareId>) -> Self {
        self.share_id = Some(share_id);
        self
    }

    /// Whether the patch touches the entry's position or name.
    pub fn relocates(&self) -> bool {
        self.parent_id.is_some() || self.name.is_some()
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.parent_id.is_none() && self.name.is_none() && self.share_id.is_none()
    }

    /// Apply the patch to an in-memory entry.
    pub fn apply_to(&self, entry: &mut Entry, now: DateTime<Utc>) {
        if let Some(parent_id) = self.parent_id {
            entry.parent_id = Some(parent_id);
        }
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(share_id) = self.share_id {
            entry.share_id = share_id;
        }
        if self.relocates() {
            entry.modified_at = now;
        }
    }
}
