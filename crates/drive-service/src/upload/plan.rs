//! Turning client-relative paths into entries.
//!
//! Every item gets its id first. Parents are then resolved through a
//! path to id map seeded with the batch root, so a batch can describe a
//! whole folder tree in any order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::EntryId;
use drive_entity::entry::Entry;

use crate::naming;
use crate::quota::UploadName;

/// One file or folder of an upload batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadItem {
    /// Path relative to the upload target, `/`-separated.
    pub path: String,
    /// Whether the item is a folder.
    pub is_directory: bool,
    /// File size in bytes. Ignored for folders.
    #[serde(default)]
    pub size: i64,
}

/// Entries ready to be inserted for one batch.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    /// Normalized path and entry, parents before children.
    pub entries: Vec<(String, Entry)>,
    /// Items placed directly in the target.
    pub top_level: Vec<UploadName>,
    /// Sum of file sizes.
    pub total_size: i64,
}

impl UploadPlan {
    /// Build the entries of a batch uploaded into `parent`.
    ///
    /// Everything belongs to the parent's owner and joins its share.
    pub fn build(items: &[UploadItem], parent: &Entry, max_name_length: usize) -> AppResult<Self> {
        if items.is_empty() {
            return Err(AppError::validation("Upload batch is empty"));
        }

        let mut normalized: Vec<(Vec<String>, &UploadItem)> = Vec::with_capacity(items.len());
        for item in items {
            let segments = split_path(&item.path)?;
            for segment in &segments {
                naming::validate_name(segment, max_name_length)?;
            }
            if !item.is_directory && item.size < 0 {
                return Err(AppError::validation(format!(
                    "'{}' has a negative size",
                    item.path
                )));
            }
            normalized.push((segments, item));
        }

        let mut ids: HashMap<(String, bool), EntryId> = HashMap::new();
        let mut directories: HashMap<String, EntryId> = HashMap::new();
        for (segments, item) in &normalized {
            let path = segments.join("/");
            let id = EntryId::new();
            if ids.insert((path.clone(), item.is_directory), id).is_some() {
                return Err(AppError::collision(format!("'{path}' appears twice in the upload")));
            }
            if item.is_directory {
                directories.insert(path, id);
            }
        }

        normalized.sort_by_key(|(segments, _)| segments.len());

        let mut entries = Vec::with_capacity(normalized.len());
        let mut top_level = Vec::new();
        let mut total_size = 0i64;
        for (segments, item) in normalized {
            let path = segments.join("/");
            let (name, dirs) = match segments.split_last() {
                Some((name, dirs)) => (name.clone(), dirs),
                None => return Err(AppError::validation("Upload path is empty")),
            };
            let parent_id = if dirs.is_empty() {
                top_level.push(UploadName {
                    name: name.clone(),
                    is_directory: item.is_directory,
                });
                parent.id
            } else {
                let dir_path = dirs.join("/");
                *directories.get(&dir_path).ok_or_else(|| {
                    AppError::inconsistent_state(format!(
                        "Folder '{dir_path}' of '{path}' is not part of the upload"
                    ))
                })?
            };
            let id = ids
                .get(&(path.clone(), item.is_directory))
                .copied()
                .ok_or_else(|| AppError::internal(format!("No id assigned to '{path}'")))?;

            let mut entry = if item.is_directory {
                Entry::directory(parent.owner_id, Some(parent_id), parent.share_id, name)
            } else {
                total_size = total_size.checked_add(item.size).ok_or_else(|| {
                    AppError::validation("Upload batch is too large")
                })?;
                Entry::file(parent.owner_id, parent_id, parent.share_id, name, item.size)
            };
            entry.id = id;
            entries.push((path, entry));
        }

        Ok(Self {
            entries,
            top_level,
            total_size,
        })
    }

    /// Entry ids keyed by normalized path.
    pub fn ids_by_path(&self) -> BTreeMap<&str, EntryId> {
        self.entries
            .iter()
            .map(|(path, entry)| (path.as_str(), entry.id))
            .collect()
    }
}

fn split_path(path: &str) -> AppResult<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(AppError::validation("Upload path is empty"));
    }
    trimmed
        .split('/')
        .map(|segment| match segment {
            "" | "." | ".." => Err(AppError::validation(format!(
                "Upload path '{path}' has an invalid segment"
            ))),
            _ => Ok(segment.to_string()),
        })
        .collect()
}
