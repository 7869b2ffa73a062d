//! The store seam every drive service talks to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use drive_core::result::AppResult;
use drive_core::types::{EntryId, ShareId, UserId};
use drive_entity::bin::BinRecord;
use drive_entity::change::ChangeSet;
use drive_entity::entry::{Entry, ListFilter};
use drive_entity::share::Share;
use drive_entity::user::User;

/// Persistent state of the drive.
///
/// Reads are plain queries. Every write goes through [`DriveStore::apply`],
/// which commits a whole [`ChangeSet`] or nothing.
///
/// Listings are ordered directories first, then by name. Descendant
/// listings are additionally ordered by depth, shallowest first.
#[async_trait]
pub trait DriveStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find an entry by id.
    async fn find_entry(&self, id: EntryId) -> AppResult<Option<Entry>>;

    /// Find all entries among `ids` that exist.
    async fn find_entries(&self, ids: &[EntryId]) -> AppResult<Vec<Entry>>;

    /// Direct children of `parent_id`.
    async fn find_children(&self, parent_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>>;

    /// Transitive children of `root_id`, excluding the root itself.
    async fn find_descendants(&self, root_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>>;

    /// The entry itself followed by its ancestors up to the root.
    async fn find_ancestors(&self, id: EntryId) -> AppResult<Vec<Entry>>;

    /// The subset of `names` already used by children of `parent_id` of the given kind.
    async fn find_sibling_names(
        &self,
        parent_id: EntryId,
        is_directory: bool,
        names: &[String],
    ) -> AppResult<Vec<String>>;

    /// Entries owned by others that are the root of a share listing `user_id`.
    async fn find_shared_roots(&self, user_id: UserId, filter: ListFilter) -> AppResult<Vec<Entry>>;

    /// Find a share group by id.
    async fn find_share(&self, id: ShareId) -> AppResult<Option<Share>>;

    /// Entries and bin records that reference the share.
    async fn count_share_references(&self, id: ShareId) -> AppResult<u64>;

    /// Find the bin record of an entry.
    async fn find_bin_record(&self, id: EntryId) -> AppResult<Option<BinRecord>>;

    /// Find the bin records among `ids` that exist.
    async fn find_bin_records(&self, ids: &[EntryId]) -> AppResult<Vec<BinRecord>>;

    /// Bin records put before `cutoff`, oldest first.
    async fn find_expired_bin_records(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<BinRecord>>;

    /// Find a user by id.
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Find a user by username.
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Apply every mutation of `changes` atomically, in order.
    async fn apply(&self, changes: ChangeSet) -> AppResult<()>;

    /// Delete shares referenced by no entry and no bin record. Returns the count.
    async fn delete_unreferenced_shares(&self) -> AppResult<u64>;
}
