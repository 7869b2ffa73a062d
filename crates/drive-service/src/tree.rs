//! Loaded subtrees and share re-derivation.

use std::collections::HashMap;

use drive_core::result::AppResult;
use drive_core::types::{EntryId, ShareId};
use drive_database::DriveStore;
use drive_entity::entry::{Entry, ListFilter};

/// An entry together with all of its descendants, shallowest first.
#[derive(Debug, Clone)]
pub struct Subtree {
    root: Entry,
    descendants: Vec<Entry>,
}

impl Subtree {
    /// Load the subtree rooted at `root`.
    pub async fn load(store: &dyn DriveStore, root: Entry) -> AppResult<Self> {
        let descendants = if root.is_directory {
            store.find_descendants(root.id, ListFilter::All).await?
        } else {
            Vec::new()
        };
        Ok(Self { root, descendants })
    }

    /// Root first, then every descendant after its parent.
    pub fn top_down(&self) -> impl DoubleEndedIterator<Item = &Entry> {
        std::iter::once(&self.root).chain(self.descendants.iter())
    }

    /// Every descendant before its parent, root last.
    pub fn bottom_up(&self) -> impl Iterator<Item = &Entry> {
        self.top_down().rev()
    }

    /// Ids of all nodes, root first.
    pub fn ids(&self) -> Vec<EntryId> {
        self.top_down().map(|entry| entry.id).collect()
    }

    /// Total size of the files in the subtree.
    pub fn total_size(&self) -> i64 {
        self.top_down().filter(|entry| entry.is_file()).map(|entry| entry.size).sum()
    }

    /// Number of nodes currently carrying `share_id`.
    pub fn count_share(&self, share_id: ShareId) -> u64 {
        self.top_down()
            .filter(|entry| entry.share_id == Some(share_id))
            .count() as u64
    }

    /// Share ids after giving the root `root_share`.
    ///
    /// A node whose share equals its parent's follows the parent's new
    /// share. Any other node is the root of an independent share and keeps
    /// its own, along with everything inheriting from it. Only nodes whose
    /// share actually changes are returned.
    pub fn rederive_shares(&self, root_share: Option<ShareId>) -> Vec<(EntryId, Option<ShareId>)> {
        let mut old: HashMap<EntryId, Option<ShareId>> = HashMap::new();
        let mut new: HashMap<EntryId, Option<ShareId>> = HashMap::new();
        let mut changed = Vec::new();

        for entry in self.top_down() {
            let share = if entry.id == self.root.id {
                root_share
            } else {
                match entry.parent_id {
                    Some(parent_id) if old.get(&parent_id) == Some(&entry.share_id) => {
                        new.get(&parent_id).copied().flatten()
                    }
                    _ => entry.share_id,
                }
            };

            old.insert(entry.id, entry.share_id);
            new.insert(entry.id, share);
            if share != entry.share_id {
                changed.push((entry.id, share));
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::types::UserId;

    /// D(S) -> F(S) -> G(T) -> H(T), plus D -> K(S)
    fn sample() -> (Subtree, ShareId, ShareId) {
        let owner = UserId::new();
        let s = ShareId::new();
        let t = ShareId::new();
        let d = Entry::directory(owner, Some(EntryId::new()), Some(s), "D");
        let f = Entry::directory(owner, Some(d.id), Some(s), "F");
        let k = Entry::file(owner, d.id, Some(s), "K", 10);
        let g = Entry::directory(owner, Some(f.id), Some(t), "G");
        let h = Entry::file(owner, g.id, Some(t), "H", 5);
        let tree = Subtree {
            root: d,
            descendants: vec![f, k, g, h],
        };
        (tree, s, t)
    }

    #[test]
    fn test_rederive_stops_at_independent_shares() {
        let (tree, _, t) = sample();
        let u = ShareId::new();
        let changed = tree.rederive_shares(Some(u));

        let ids: Vec<EntryId> = changed.iter().map(|(id, _)| *id).collect();
        let names: Vec<&str> = tree
            .top_down()
            .filter(|entry| ids.contains(&entry.id))
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(names, vec!["D", "F", "K"]);
        assert!(changed.iter().all(|(_, share)| *share == Some(u)));
        assert_eq!(tree.count_share(t), 2);
    }

    #[test]
    fn test_rederive_to_same_share_changes_nothing() {
        let (tree, s, _) = sample();
        assert!(tree.rederive_shares(Some(s)).is_empty());
    }

    #[test]
    fn test_ordering_and_sizes() {
        let (tree, _, _) = sample();
        assert_eq!(tree.total_size(), 15);
        assert_eq!(tree.bottom_up().last().map(|e| e.name.as_str()), Some("D"));
        assert_eq!(tree.ids().len(), 5);
    }
}
