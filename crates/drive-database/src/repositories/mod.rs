//! PostgreSQL repositories and the store built from them.

pub mod bin;
pub mod entry;
pub mod share;
pub mod user;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use drive_core::error::{AppError, ErrorKind};
use drive_core::result::AppResult;
use drive_core::types::{EntryId, ShareId, UserId};
use drive_entity::bin::BinRecord;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::{Entry, ListFilter};
use drive_entity::share::Share;
use drive_entity::user::User;

use crate::store::DriveStore;

pub use bin::BinRepository;
pub use entry::EntryRepository;
pub use share::ShareRepository;
pub use user::UserRepository;

/// Map a sqlx error to a store failure, naming the violated constraint.
pub(crate) fn store_error(context: &str, e: sqlx::Error) -> AppError {
    let message = match &e {
        sqlx::Error::Database(db_err) => match db_err.constraint() {
            Some(constraint) => format!("{context}: constraint {constraint} violated"),
            None => format!("{context}: {}", db_err.message()),
        },
        _ => context.to_string(),
    };
    AppError::with_source(ErrorKind::StorageFailure, message, e)
}

/// Fail when a write that targets an existing row touched nothing.
pub(crate) fn expect_row(rows_affected: u64, what: impl FnOnce() -> String) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::storage_failure(format!("{} no longer exists", what())));
    }
    Ok(())
}

/// [`DriveStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgDriveStore {
    pool: PgPool,
    entries: EntryRepository,
    shares: ShareRepository,
    bin: BinRepository,
    users: UserRepository,
}

impl PgDriveStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            entries: EntryRepository::new(pool.clone()),
            shares: ShareRepository::new(pool.clone()),
            bin: BinRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    async fn execute(conn: &mut PgConnection, mutation: &Mutation) -> AppResult<()> {
        match mutation {
            Mutation::InsertUser(user) => UserRepository::insert(conn, user).await,
            Mutation::InsertEntry(entry) => EntryRepository::insert(conn, entry).await,
            Mutation::UpdateEntry(patch) => EntryRepository::update(conn, patch).await,
            Mutation::DeleteEntry(id) => EntryRepository::delete(conn, *id).await,
            Mutation::InsertShare(share) => ShareRepository::insert(conn, share).await,
            Mutation::UpdateShare(share) => ShareRepository::update(conn, share).await,
            Mutation::InsertBinRecord(record) => BinRepository::insert(conn, record).await,
            Mutation::DeleteBinRecord(id) => BinRepository::delete(conn, *id).await,
            Mutation::AdjustUsedSpace {
                user_id,
                delta,
                limit,
            } => UserRepository::adjust_used_space(conn, *user_id, *delta, *limit).await,
        }
    }
}

#[async_trait]
impl DriveStore for PgDriveStore {
    async fn find_entry(&self, id: EntryId) -> AppResult<Option<Entry>> {
        self.entries.find_by_id(id).await
    }

    async fn find_entries(&self, ids: &[EntryId]) -> AppResult<Vec<Entry>> {
        self.entries.find_by_ids(ids).await
    }

    async fn find_children(&self, parent_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.entries.find_children(parent_id, filter).await
    }

    async fn find_descendants(&self, root_id: EntryId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.entries.find_descendants(root_id, filter).await
    }

    async fn find_ancestors(&self, id: EntryId) -> AppResult<Vec<Entry>> {
        self.entries.find_ancestors(id).await
    }

    async fn find_sibling_names(
        &self,
        parent_id: EntryId,
        is_directory: bool,
        names: &[String],
    ) -> AppResult<Vec<String>> {
        self.entries
            .find_sibling_names(parent_id, is_directory, names)
            .await
    }

    async fn find_shared_roots(&self, user_id: UserId, filter: ListFilter) -> AppResult<Vec<Entry>> {
        self.entries.find_shared_roots(user_id, filter).await
    }

    async fn find_share(&self, id: ShareId) -> AppResult<Option<Share>> {
        self.shares.find_by_id(id).await
    }

    async fn count_share_references(&self, id: ShareId) -> AppResult<u64> {
        self.shares.count_references(id).await
    }

    async fn find_bin_record(&self, id: EntryId) -> AppResult<Option<BinRecord>> {
        self.bin.find_by_id(id).await
    }

    async fn find_bin_records(&self, ids: &[EntryId]) -> AppResult<Vec<BinRecord>> {
        self.bin.find_by_ids(ids).await
    }

    async fn find_expired_bin_records(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<BinRecord>> {
        self.bin.find_put_before(cutoff).await
    }

    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        self.users.find_by_id(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        self.users.find_by_username(username).await
    }

    async fn apply(&self, changes: ChangeSet) -> AppResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to begin transaction", e))?;

        // Dropping `tx` on the error path rolls everything back.
        for mutation in &changes {
            Self::execute(&mut *tx, mutation).await?;
        }

        // Sibling-name uniqueness is deferred, so violations surface here.
        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit change set", e))?;

        debug!(mutations = changes.len(), "Change set committed");
        Ok(())
    }

    async fn delete_unreferenced_shares(&self) -> AppResult<u64> {
        self.shares.delete_unreferenced().await
    }
}
