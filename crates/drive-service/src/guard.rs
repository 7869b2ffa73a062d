//! Checks shared by every service that writes into the hierarchy.

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_database::DriveStore;
use drive_entity::entry::Entry;

/// Whether `entry` is the bin root of its owner.
pub(crate) async fn is_bin_root(store: &dyn DriveStore, entry: &Entry) -> AppResult<bool> {
    if !entry.is_root() {
        return Ok(false);
    }
    let owner = store.find_user(entry.owner_id).await?.ok_or_else(|| {
        AppError::inconsistent_state(format!("Owner of root {} does not exist", entry.id))
    })?;
    Ok(owner.bin_id == entry.id)
}

/// Fail when `entry` is a bin root or sits in a bin.
pub(crate) async fn ensure_outside_bin(store: &dyn DriveStore, entry: &Entry) -> AppResult<()> {
    if store.find_bin_record(entry.id).await?.is_some() {
        return Err(AppError::validation(format!("Entry {} is in the bin", entry.id)));
    }
    if is_bin_root(store, entry).await? {
        return Err(AppError::validation("The bin cannot be modified directly"));
    }
    Ok(())
}

/// Fail unless `entry` is a directory.
pub(crate) fn ensure_directory(entry: &Entry) -> AppResult<()> {
    if !entry.is_directory {
        return Err(AppError::validation(format!("Entry {} is not a directory", entry.id)));
    }
    Ok(())
}
