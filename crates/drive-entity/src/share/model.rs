//! Share group entity model.

use chrono::{DateTime, Utc};
use drive_core::types::{ShareId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A share group referenced by the `share_id` of every entry it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Share {
    /// Unique share identifier.
    pub id: ShareId,
    /// Users granted read access.
    pub can_read_users: Vec<UserId>,
    /// Users granted edit access.
    pub can_edit_users: Vec<UserId>,
    /// When the share was created.
    pub created_at: DateTime<Utc>,
    /// When the member lists last changed.
    pub updated_at: DateTime<Utc>,
}

impl Share {
    /// Create a new share from already normalized policies.
    pub fn new(policies: SharePolicies) -> Self {
        let now = Utc::now();
        Self {
            id: ShareId::new(),
            can_read_users: policies.can_read_users,
            can_edit_users: policies.can_edit_users,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace both member lists.
    pub fn with_policies(mut self, policies: SharePolicies) -> Self {
        self.can_read_users = policies.can_read_users;
        self.can_edit_users = policies.can_edit_users;
        self.updated_at = Utc::now();
        self
    }

    /// Check if `user_id` may edit entries covered by the share.
    pub fn can_edit(&self, user_id: UserId) -> bool {
        self.can_edit_users.contains(&user_id)
    }

    /// Check if `user_id` may read entries covered by the share.
    pub fn can_read(&self, user_id: UserId) -> bool {
        self.can_read_users.contains(&user_id)
    }
}

/// Requested membership of a share group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePolicies {
    /// Users to grant read access.
    #[serde(default)]
    pub can_read_users: Vec<UserId>,
    /// Users to grant edit access.
    #[serde(default)]
    pub can_edit_users: Vec<UserId>,
}

impl SharePolicies {
    /// Normalize the lists for storage.
    ///
    /// The owner is stripped from both lists, duplicates are dropped, and a
    /// user listed as editor is removed from the readers.
    pub fn normalized(self, owner_id: UserId) -> Self {
        let mut can_edit_users: Vec<UserId> = Vec::with_capacity(self.can_edit_users.len());
        for user in self.can_edit_users {
            if user != owner_id && !can_edit_users.contains(&user) {
                can_edit_users.push(user);
            }
        }

        let mut can_read_users: Vec<UserId> = Vec::with_capacity(self.can_read_users.len());
        for user in self.can_read_users {
            if user != owner_id && !can_edit_users.contains(&user) && !can_read_users.contains(&user)
            {
                can_read_users.push(user);
            }
        }

        Self {
            can_read_users,
            can_edit_users,
        }
    }

    /// Check whether nobody besides the owner is granted anything.
    pub fn is_empty(&self) -> bool {
        self.can_read_users.is_empty() && self.can_edit_users.is_empty()
    }
}
