//! Unit-of-work description for multi-row mutations.
//!
//! Services never write rows one by one. They describe the full effect of
//! an operation as a [`ChangeSet`] and hand it to the store, which applies
//! every [`Mutation`] in order inside one transaction or none of them.

use drive_core::types::{EntryId, UserId};
use serde::{Deserialize, Serialize};

use crate::bin::BinRecord;
use crate::entry::{Entry, EntryPatch};
use crate::share::Share;
use crate::user::User;

/// A single row-level write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Create a user account.
    InsertUser(User),
    /// Create an entry. Its parent must already exist.
    InsertEntry(Entry),
    /// Update an existing entry.
    UpdateEntry(EntryPatch),
    /// Delete an existing entry that has no children left.
    DeleteEntry(EntryId),
    /// Create a share group.
    InsertShare(Share),
    /// Replace the member lists of an existing share group.
    UpdateShare(Share),
    /// Register an entry in the bin.
    InsertBinRecord(BinRecord),
    /// Remove an existing bin record.
    DeleteBinRecord(EntryId),
    /// Add `delta` bytes to the user's used space, clamped at zero.
    ///
    /// When `limit` is set the whole change set fails with
    /// `QuotaExceeded` if the new total would exceed it.
    AdjustUsedSpace {
        /// User charged or refunded.
        user_id: UserId,
        /// Signed byte count.
        delta: i64,
        /// Upper bound on the resulting used space.
        limit: Option<i64>,
    },
}

/// Ordered list of mutations applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    /// An empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mutation.
    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    /// Append an entry update unless it changes nothing.
    pub fn update_entry(&mut self, patch: EntryPatch) -> &mut Self {
        if !patch.is_empty() {
            self.mutations.push(Mutation::UpdateEntry(patch));
        }
        self
    }

    /// Append a used-space adjustment unless it is zero.
    pub fn adjust_used_space(&mut self, user_id: UserId, delta: i64, limit: Option<i64>) -> &mut Self {
        if delta != 0 || limit.is_some() {
            self.mutations.push(Mutation::AdjustUsedSpace {
                user_id,
                delta,
                limit,
            });
        }
        self
    }

    /// Number of mutations.
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Check if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Iterate over the mutations in application order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }
}

impl Extend<Mutation> for ChangeSet {
    fn extend<T: IntoIterator<Item = Mutation>>(&mut self, iter: T) {
        self.mutations.extend(iter);
    }
}

impl IntoIterator for ChangeSet {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patches_and_zero_deltas_are_skipped() {
        let mut changes = ChangeSet::new();
        changes
            .update_entry(EntryPatch::new(EntryId::new()))
            .adjust_used_space(UserId::new(), 0, None);
        assert!(changes.is_empty());

        changes.adjust_used_space(UserId::new(), 0, Some(10));
        assert_eq!(changes.len(), 1);
    }
}
