//! Bin record entity model.

use chrono::{DateTime, Utc};
use drive_core::types::{EntryId, ShareId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::entry::Entry;

/// Marks an entry as binned and remembers where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BinRecord {
    /// The binned entry.
    pub id: EntryId,
    /// When the entry was moved to the bin.
    pub put_at: DateTime<Utc>,
    /// Parent before binning.
    pub prev_parent_id: EntryId,
    /// Share the entry was the root of before binning, if any.
    pub prev_share_id: Option<ShareId>,
    /// Name before binning, when it had to change to fit into the bin root.
    pub prev_name: Option<String>,
}

impl BinRecord {
    /// Check whether the record is older than `cutoff`.
    pub fn expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.put_at < cutoff
    }
}

/// An entry listed from the bin together with its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinnedEntry {
    /// The entry as it currently sits in the bin.
    pub entry: Entry,
    /// Its bin record.
    pub bin: BinRecord,
}
