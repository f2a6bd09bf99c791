//! Provides logic for narrowing cached file lists with local filters.

use super::{FileRecord, Group, LocalFilter};

/// A utility struct for filtering cached file lists.
///
/// This struct is stateless and provides methods as associated functions.
/// All filtering preserves the source order.
pub struct SearchEngine;

impl SearchEngine {
    /// Filters a slice of `FileRecord`s based on the provided `LocalFilter`.
    pub fn filter_files(files: &[FileRecord], filter: &LocalFilter) -> Vec<FileRecord> {
        files
            .iter()
            .filter(|file| Self::matches_filter(file, filter))
            .cloned()
            .collect()
    }

    /// Applies the filter to every group and drops groups left without files.
    ///
    /// With an empty filter the groups are returned unchanged, including
    /// groups that were already empty.
    pub fn filter_groups(groups: &[Group], filter: &LocalFilter) -> Vec<Group> {
        if filter.is_empty() {
            return groups.to_vec();
        }
        groups
            .iter()
            .map(|group| Group {
                group_name: group.group_name.clone(),
                group_id: group.group_id.clone(),
                files: Self::filter_files(&group.files, filter),
            })
            .filter(|group| !group.files.is_empty())
            .collect()
    }

    /// Checks if a single `FileRecord` matches the given filter criteria.
    pub fn matches_filter(file: &FileRecord, filter: &LocalFilter) -> bool {
        if let Some(uploader) = &filter.uploader {
            if &file.owner_id != uploader {
                return false;
            }
        }

        if !filter.kind.admits(file.kind()) {
            return false;
        }

        if let Some(tag) = &filter.tag {
            if !file.tags.iter().any(|t| t == tag) {
                return false;
            }
        }

        true
    }

    /// Case-insensitive match of a query against filename and tags.
    pub fn matches_text(file: &FileRecord, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        file.filename.to_lowercase().contains(&query)
            || file.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}
