//! Resolved access level of a user on an entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level, ordered by privilege: Owner > Edit > Read > None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// No access.
    None,
    /// Listed in the share's readers.
    Read,
    /// Listed in the share's editors.
    Edit,
    /// Owns the entry.
    Owner,
}

impl Access {
    /// Check if this access grants at least the given level.
    pub fn has_at_least(&self, required: Access) -> bool {
        *self >= required
    }

    /// Check if this access allows write operations.
    pub fn can_write(&self) -> bool {
        self.has_at_least(Self::Edit)
    }

    /// Return the access as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Edit => "edit",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
