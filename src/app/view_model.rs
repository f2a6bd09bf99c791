//! Responsible for transforming the `AppState` into a `UiState` view model.
//!
//! This module acts as a presentation layer, preparing data specifically for
//! consumption by the UI: it decorates the visible listing with selection
//! flags and uploader labels and computes display-related properties.

use serde::Serialize;
use std::collections::BTreeMap;

use super::filtering::{visible_files, VisibleListing};
use super::selection::SelectionMode;
use super::state::AppState;
use crate::core::file_kind::{FileKind, KindFilter};
use crate::core::normalize::join_tags;
use crate::core::{
    user_label, Collection, CollectionDetail, FileId, FileRecord, Group, KnownUsers,
};

/// Collapsed home-level groups show this many files.
pub const GROUP_PREVIEW_LEN: usize = 3;

/// A serializable representation of the client state for the UI.
#[derive(Serialize, Clone, Debug)]
pub struct UiState {
    pub user_id: Option<String>,
    pub current_folder: Option<String>,
    pub listing: ListingView,
    pub visible_count: usize,
    pub search_query: String,
    pub committed_query: Option<String>,
    pub is_searching: bool,
    pub is_loading: bool,
    pub is_uploading: bool,
    pub uploader_filter: Option<String>,
    pub kind_filter: KindFilter,
    pub tag_filter: Option<String>,
    pub uploaders: Vec<UploaderOption>,
    pub mode: SelectionMode,
    pub selection_count: usize,
    pub selected_ids: Vec<FileId>,
    pub detail_file: Option<FileView>,
    pub merge_picker_open: bool,
    pub collections: Vec<Collection>,
    pub open_collection: Option<CollectionDetail>,
    pub status_message: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum ListingView {
    Groups(Vec<GroupView>),
    Files(Vec<FileView>),
    SearchResults(Vec<FileView>),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GroupView {
    pub group_name: String,
    pub is_my_uploads: bool,
    pub total_files: usize,
    pub is_expanded: bool,
    /// All files when expanded, otherwise the first few.
    pub files: Vec<FileView>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FileView {
    pub id: FileId,
    pub filename: String,
    pub kind: FileKind,
    pub tags: Vec<String>,
    /// The tags as the edit form shows them.
    pub tags_text: String,
    pub uploader: String,
    pub upload_date: Option<String>,
    pub url: String,
    pub summary: String,
    pub is_selected: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploaderOption {
    pub id: String,
    pub label: String,
}

/// Creates the complete `UiState` from the current `AppState`.
pub fn generate_ui_state(state: &AppState) -> UiState {
    let listing = visible_files(state);
    let visible_count = listing.len();
    let known_users = &state.snapshot.known_users;

    let listing = match listing {
        VisibleListing::Groups(groups) => ListingView::Groups(
            groups
                .iter()
                .map(|g| build_group_view(g, state, known_users))
                .collect(),
        ),
        VisibleListing::Files(files) => ListingView::Files(
            files
                .iter()
                .map(|f| build_file_view(f, state, known_users))
                .collect(),
        ),
        VisibleListing::SearchResults(files) => ListingView::SearchResults(
            files
                .iter()
                .map(|f| build_file_view(f, state, known_users))
                .collect(),
        ),
    };

    let status_message = if state.is_loading {
        "Loading files...".to_string()
    } else if state.is_searching {
        format!(
            "Searching for \"{}\"...",
            state.committed_query.as_deref().unwrap_or_default()
        )
    } else if state.selection.is_selecting() {
        format!("{} selected", state.selection.count())
    } else {
        state.status_message.clone()
    };

    UiState {
        user_id: state.config.user_id.clone(),
        current_folder: state.current_folder.as_ref().map(|g| g.group_name.clone()),
        listing,
        visible_count,
        search_query: state.search_query.clone(),
        committed_query: state.committed_query.clone(),
        is_searching: state.is_searching,
        is_loading: state.is_loading,
        is_uploading: state.uploads_in_flight > 0,
        uploader_filter: state.filter.uploader.clone(),
        kind_filter: state.filter.kind,
        tag_filter: state.filter.tag.clone(),
        uploaders: uploader_options(state),
        mode: state.selection.mode(),
        selection_count: state.selection.count(),
        selected_ids: state.selection.selected().iter().cloned().collect(),
        detail_file: state
            .detail_file
            .as_ref()
            .map(|f| build_file_view(f, state, known_users)),
        merge_picker_open: state.merge_picker_open,
        collections: state.collections.clone(),
        open_collection: state.open_collection.clone(),
        status_message,
    }
}

fn build_group_view(group: &Group, state: &AppState, known_users: &KnownUsers) -> GroupView {
    let is_expanded = state.expanded_groups.contains(&group.group_name);
    let shown = if is_expanded {
        group.files.len()
    } else {
        GROUP_PREVIEW_LEN.min(group.files.len())
    };
    GroupView {
        group_name: group.group_name.clone(),
        is_my_uploads: group.is_my_uploads(),
        total_files: group.files.len(),
        is_expanded,
        files: group.files[..shown]
            .iter()
            .map(|f| build_file_view(f, state, known_users))
            .collect(),
    }
}

fn build_file_view(file: &FileRecord, state: &AppState, known_users: &KnownUsers) -> FileView {
    FileView {
        id: file.id.clone(),
        filename: file.filename.clone(),
        kind: file.kind(),
        tags: file.tags.clone(),
        tags_text: join_tags(&file.tags),
        uploader: user_label(known_users, &file.owner_id).to_string(),
        upload_date: file
            .upload_date
            .map(|d| d.format("%Y-%m-%d").to_string()),
        url: file.url.clone(),
        summary: file
            .detail_summary
            .clone()
            .unwrap_or_else(|| "No summary available for this file.".to_string()),
        is_selected: state.selection.contains(&file.id),
    }
}

/// Owners present in the current scope, for the uploader filter.
///
/// The currently selected uploader is always offered so it can be cleared.
pub fn uploader_options(state: &AppState) -> Vec<UploaderOption> {
    let known_users = &state.snapshot.known_users;
    let mut owners: BTreeMap<String, String> = BTreeMap::new();

    let scope: Box<dyn Iterator<Item = &FileRecord>> = match &state.current_folder {
        Some(folder) => Box::new(folder.files.iter()),
        None => Box::new(state.snapshot.groups.iter().flat_map(|g| g.files.iter())),
    };
    for file in scope.filter(|f| !f.owner_id.is_empty()) {
        owners
            .entry(file.owner_id.clone())
            .or_insert_with(|| user_label(known_users, &file.owner_id).to_string());
    }
    if let Some(selected) = &state.filter.uploader {
        owners
            .entry(selected.clone())
            .or_insert_with(|| user_label(known_users, selected).to_string());
    }

    let mut options: Vec<UploaderOption> = owners
        .into_iter()
        .map(|(id, label)| UploaderOption { id, label })
        .collect();
    options.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::core::{FileSnapshot, MY_UPLOADS_GROUP};
    use crate::utils::test_helpers::sample_file;
    use std::time::Instant;

    fn create_test_state() -> AppState {
        let mut state = AppState::with_config(ClientConfig {
            user_id: Some("u1".into()),
            ..Default::default()
        });
        let mut known_users = KnownUsers::new();
        known_users.insert("u1".into(), "Aom".into());
        known_users.insert("u2".into(), "Beam".into());
        state.apply_snapshot(FileSnapshot {
            groups: vec![
                Group {
                    group_name: MY_UPLOADS_GROUP.into(),
                    group_id: None,
                    files: (1..=5)
                        .map(|n| sample_file(&format!("f{n}"), "u1", None))
                        .collect(),
                },
                Group {
                    group_name: "CS101".into(),
                    group_id: Some("g1".into()),
                    files: vec![
                        sample_file("c1", "u2", Some("g1")),
                        sample_file("c2", "u3", Some("g1")),
                    ],
                },
            ],
            known_users,
        });
        state
    }

    #[test]
    fn test_collapsed_groups_show_preview() {
        let mut state = create_test_state();
        let ui_state = generate_ui_state(&state);
        match &ui_state.listing {
            ListingView::Groups(groups) => {
                assert_eq!(groups[0].total_files, 5);
                assert_eq!(groups[0].files.len(), GROUP_PREVIEW_LEN);
                assert!(groups[0].is_my_uploads);
            }
            other => panic!("expected groups, got {:?}", other),
        }

        state.toggle_group_expansion(MY_UPLOADS_GROUP);
        match generate_ui_state(&state).listing {
            ListingView::Groups(groups) => assert_eq!(groups[0].files.len(), 5),
            other => panic!("expected groups, got {:?}", other),
        }
    }

    #[test]
    fn test_file_views_carry_selection_and_labels() {
        let mut state = create_test_state();
        let cs101 = state.snapshot.find_group("CS101").cloned().unwrap();
        state.enter_folder(cs101);
        let token = state
            .selection
            .press_start(FileId::from("c1"), Instant::now());
        state.selection.long_press_elapsed(token);

        let ui_state = generate_ui_state(&state);
        assert_eq!(ui_state.mode, SelectionMode::Selecting);
        assert_eq!(ui_state.selection_count, 1);
        assert_eq!(ui_state.status_message, "1 selected");
        match ui_state.listing {
            ListingView::Files(files) => {
                assert!(files[0].is_selected);
                assert_eq!(files[0].uploader, "Beam");
                assert!(!files[1].is_selected);
                assert_eq!(files[1].uploader, "u3");
            }
            other => panic!("expected files, got {:?}", other),
        }
    }

    #[test]
    fn test_detail_view_prefills_tag_text() {
        let mut state = create_test_state();
        let mut file = sample_file("f9", "u2", None);
        file.tags = vec!["Calculus".into(), "Exam".into()];
        state.detail_file = Some(file);

        let detail = generate_ui_state(&state).detail_file.unwrap();
        assert_eq!(detail.tags_text, "Calculus, Exam");
        assert_eq!(detail.uploader, "Beam");
    }

    #[test]
    fn test_uploader_options_follow_scope() {
        let mut state = create_test_state();
        let home: Vec<_> = uploader_options(&state).into_iter().map(|o| o.id).collect();
        assert_eq!(home, vec!["u1", "u2", "u3"]);

        let cs101 = state.snapshot.find_group("CS101").cloned().unwrap();
        state.enter_folder(cs101);
        let labels: Vec<_> = uploader_options(&state)
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["Beam", "u3"]);
    }

    #[test]
    fn test_ui_state_serializes_listing_with_kind_tag() {
        let state = create_test_state();
        let value = serde_json::to_value(generate_ui_state(&state)).unwrap();
        assert_eq!(value["listing"]["kind"], "groups");
        assert_eq!(value["mode"], "browsing");
        assert_eq!(value["visible_count"], 2);
    }
}
