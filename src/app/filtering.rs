//! Derives what the user is currently looking at from cached data and the
//! filter state.
//!
//! Everything here is a pure function of its inputs: the same folder, query
//! state, filters and snapshot always produce the same listing, in source
//! order.

use serde::Serialize;

use crate::app::state::AppState;
use crate::core::search::SearchEngine;
use crate::core::{FileRecord, Group, LocalFilter};

/// The visible listing.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum VisibleListing {
    /// Home level: the groups, narrowed by local filters.
    Groups(Vec<Group>),
    /// Inside a folder: its files, narrowed by local filters.
    Files(Vec<FileRecord>),
    /// A committed, non-empty search is in effect.
    SearchResults(Vec<FileRecord>),
}

impl VisibleListing {
    /// Number of entries at the top level of the listing.
    pub fn len(&self) -> usize {
        match self {
            VisibleListing::Groups(groups) => groups.len(),
            VisibleListing::Files(files) | VisibleListing::SearchResults(files) => files.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The files of a file listing; empty for the home level.
    pub fn files(&self) -> &[FileRecord] {
        match self {
            VisibleListing::Groups(_) => &[],
            VisibleListing::Files(files) | VisibleListing::SearchResults(files) => files,
        }
    }
}

/// Computes the visible listing for the current state.
pub fn visible_files(state: &AppState) -> VisibleListing {
    visible_files_on_data(
        &state.snapshot.groups,
        state.current_folder.as_ref(),
        state.committed_query.as_deref(),
        &state.search_results,
        &state.filter,
    )
}

/// A "pure" function that composes raw data with the filter state.
///
/// Search results are already scoped to the uploader by the gateway, so
/// only the kind and tag filters are applied to them.
fn visible_files_on_data(
    groups: &[Group],
    current_folder: Option<&Group>,
    committed_query: Option<&str>,
    search_results: &[FileRecord],
    filter: &LocalFilter,
) -> VisibleListing {
    if committed_query.is_some_and(|q| !q.trim().is_empty()) {
        let result_filter = LocalFilter {
            uploader: None,
            ..filter.clone()
        };
        return VisibleListing::SearchResults(SearchEngine::filter_files(
            search_results,
            &result_filter,
        ));
    }

    match current_folder {
        Some(folder) => VisibleListing::Files(SearchEngine::filter_files(&folder.files, filter)),
        None => VisibleListing::Groups(SearchEngine::filter_groups(groups, filter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::core::file_kind::KindFilter;
    use crate::core::{FileSnapshot, MY_UPLOADS_GROUP};
    use crate::utils::test_helpers::sample_file;

    fn create_test_state() -> AppState {
        let mut state = AppState::with_config(ClientConfig::default());
        let mut image = sample_file("f2", "u2", None);
        image.file_type = "image".into();
        state.apply_snapshot(FileSnapshot {
            groups: vec![
                Group {
                    group_name: MY_UPLOADS_GROUP.into(),
                    group_id: None,
                    files: vec![sample_file("f1", "u1", None), image],
                },
                Group {
                    group_name: "CS101".into(),
                    group_id: None,
                    files: vec![sample_file("f3", "u3", Some("g-cs101"))],
                },
            ],
            known_users: Default::default(),
        });
        state
    }

    fn ids(files: &[FileRecord]) -> Vec<&str> {
        files.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_entering_folder_shows_its_files() {
        let mut state = create_test_state();
        state.set_uploader_filter(None);
        let cs101 = state.snapshot.find_group("CS101").cloned().unwrap();
        state.enter_folder(cs101);

        let listing = visible_files(&state);
        assert!(matches!(listing, VisibleListing::Files(_)));
        assert_eq!(ids(listing.files()), vec!["f3"]);
    }

    #[test]
    fn test_home_level_lists_groups_in_source_order() {
        let state = create_test_state();
        match visible_files(&state) {
            VisibleListing::Groups(groups) => {
                let names: Vec<_> = groups.iter().map(|g| g.group_name.as_str()).collect();
                assert_eq!(names, vec![MY_UPLOADS_GROUP, "CS101"]);
            }
            other => panic!("expected groups, got {:?}", other),
        }
    }

    #[test]
    fn test_uploader_filter_inside_folder() {
        let mut state = create_test_state();
        let mine = state.snapshot.find_group(MY_UPLOADS_GROUP).cloned().unwrap();
        state.enter_folder(mine);
        state.set_uploader_filter(Some("u2".into()));

        assert_eq!(ids(visible_files(&state).files()), vec!["f2"]);
    }

    #[test]
    fn test_committed_search_takes_precedence() {
        let mut state = create_test_state();
        let ticket = state.begin_search("exam".into());
        state.finish_search(ticket, Ok(vec![sample_file("s1", "u9", None)]));

        let listing = visible_files(&state);
        assert!(matches!(listing, VisibleListing::SearchResults(_)));
        assert_eq!(ids(listing.files()), vec!["s1"]);
    }

    #[test]
    fn test_kind_filter_applies_to_search_results() {
        let mut state = create_test_state();
        let ticket = state.begin_search("x".into());
        state.finish_search(ticket, Ok(vec![sample_file("pdf", "u1", None)]));
        state.set_kind_filter(KindFilter::Images);

        assert!(visible_files(&state).is_empty());
    }

    #[test]
    fn test_visible_files_is_referentially_consistent() {
        let mut state = create_test_state();
        state.set_uploader_filter(Some("u1".into()));
        assert_eq!(visible_files(&state), visible_files(&state));

        let mine = state.snapshot.find_group(MY_UPLOADS_GROUP).cloned().unwrap();
        state.enter_folder(mine);
        assert_eq!(visible_files(&state), visible_files(&state));
    }
}
