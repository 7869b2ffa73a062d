//! Listing filter.

use serde::{Deserialize, Serialize};

/// Restricts listings to one kind of entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    /// Only files.
    FilesOnly,
    /// Only directories.
    FoldersOnly,
    /// Files and directories.
    #[default]
    All,
}

impl ListFilter {
    /// The `is_directory` value to match, or `None` for everything.
    pub fn is_directory(&self) -> Option<bool> {
        match self {
            Self::FilesOnly => Some(false),
            Self::FoldersOnly => Some(true),
            Self::All => None,
        }
    }

    /// Check whether an entry of the given kind passes the filter.
    pub fn accepts(&self, is_directory: bool) -> bool {
        self.is_directory().is_none_or(|wanted| wanted == is_directory)
    }
}
