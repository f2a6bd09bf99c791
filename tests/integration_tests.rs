//! Integration tests for the Filefolio client engine.
//!
//! These drive the engine through IPC messages against an in-memory gateway
//! and observe it through the `UserEvent` channel, the way a presentation
//! layer would.

use filefolio::app::filtering::{visible_files, VisibleListing};
use filefolio::app::selection::SelectionMode;
use filefolio::app::{self, events::UserEvent, state::AppState, SharedGateway};
use filefolio::config::ClientConfig;
use filefolio::core::{FileId, FileSnapshot, Group, KnownUsers, MY_UPLOADS_GROUP};
use filefolio::utils::test_helpers::{sample_file, setup_test_logging, FakeGateway};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Contains the test infrastructure.
mod helpers {
    use super::*;
    use filefolio::app::events::IpcMessage;
    use filefolio::app::proxy::EventProxy;

    /// A channel-backed `EventProxy` standing in for the presentation layer.
    #[derive(Clone)]
    pub struct TestEventProxy {
        pub sender: mpsc::UnboundedSender<UserEvent>,
    }

    impl EventProxy for TestEventProxy {
        fn send_event(&self, event: UserEvent) {
            if let Err(e) = self.sender.send(event) {
                // Panic in a test if the receiver is dropped, as it indicates a test setup error.
                panic!("Test receiver dropped: {}", e);
            }
        }
    }

    /// `TestHarness` sets up a complete, isolated engine for each test case.
    pub struct TestHarness {
        pub gateway: Arc<FakeGateway>,
        pub state: Arc<Mutex<AppState>>,
        pub proxy: TestEventProxy,
        pub event_rx: mpsc::UnboundedReceiver<UserEvent>,
    }

    impl TestHarness {
        pub fn new(snapshot: FileSnapshot) -> Self {
            setup_test_logging();
            let (event_tx, event_rx) = mpsc::unbounded_channel();
            let config = ClientConfig {
                user_id: Some("u1".into()),
                ..Default::default()
            };
            Self {
                gateway: Arc::new(FakeGateway::with_snapshot(snapshot)),
                state: Arc::new(Mutex::new(AppState::with_config(config))),
                proxy: TestEventProxy { sender: event_tx },
                event_rx,
            }
        }

        /// A harness whose state already holds the gateway's snapshot.
        pub async fn loaded(snapshot: FileSnapshot) -> Self {
            let harness = Self::new(snapshot);
            harness.send("refresh", Value::Null).await;
            harness
        }

        pub fn shared_gateway(&self) -> SharedGateway {
            self.gateway.clone()
        }

        /// Runs one IPC command to completion.
        pub async fn send(&self, command: &str, payload: Value) {
            let msg = IpcMessage {
                command: command.to_string(),
                payload,
            };
            app::dispatch(
                msg,
                self.shared_gateway(),
                self.proxy.clone(),
                self.state.clone(),
            )
            .await;
        }

        pub fn state(&self) -> MutexGuard<'_, AppState> {
            self.state.lock().unwrap()
        }

        pub fn drain_events(&mut self) -> Vec<UserEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }

        pub fn errors(&mut self) -> Vec<String> {
            self.drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    UserEvent::ShowError(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        pub fn notices(&mut self) -> Vec<String> {
            self.drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    UserEvent::Notice(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        pub fn visible_ids(&self) -> Vec<String> {
            visible_files(&self.state())
                .files()
                .iter()
                .map(|f| f.id.to_string())
                .collect()
        }

        /// Holds a press on `id` past the long-press threshold and releases it.
        /// Requires a paused clock.
        pub async fn long_press(&self, id: &str) {
            self.send("pressStart", json!({"id": id})).await;
            tokio::time::sleep(Duration::from_millis(600)).await;
            self.send("pressRelease", json!({"id": id})).await;
        }
    }
}

use helpers::TestHarness;

fn campus_snapshot() -> FileSnapshot {
    let mut known_users = KnownUsers::new();
    known_users.insert("u1".into(), "Aom".into());
    known_users.insert("u2".into(), "Beam".into());
    FileSnapshot {
        groups: vec![
            Group {
                group_name: MY_UPLOADS_GROUP.into(),
                group_id: None,
                files: vec![sample_file("f1", "u1", None), sample_file("f2", "u1", None)],
            },
            Group {
                group_name: "CS101".into(),
                group_id: Some("g-cs101".into()),
                files: vec![sample_file("f3", "u2", Some("g-cs101"))],
            },
        ],
        known_users,
    }
}

#[tokio::test]
async fn test_entering_folder_shows_only_its_files() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;

    assert_eq!(harness.visible_ids(), vec!["f3"]);
}

#[tokio::test(start_paused = true)]
async fn test_merge_adds_only_new_files() {
    let snapshot = FileSnapshot {
        groups: vec![Group {
            group_name: MY_UPLOADS_GROUP.into(),
            group_id: None,
            files: ["1", "2", "3"]
                .into_iter()
                .map(|id| sample_file(id, "u1", None))
                .collect(),
        }],
        known_users: Default::default(),
    };
    let mut harness = TestHarness::loaded(snapshot).await;
    harness.gateway.add_collection(
        "c1",
        "Exam prep",
        "u1",
        vec![sample_file("1", "u1", None), sample_file("2", "u1", None)],
    );

    harness.long_press("2").await;
    harness.send("tapFile", json!({"id": "3"})).await;
    harness.drain_events();
    harness.send("mergeSelection", json!({"id": "c1"})).await;

    let report = harness
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            UserEvent::MergeComplete(report) => Some(report),
            _ => None,
        })
        .expect("merge should complete");
    assert_eq!(report.message(), "1 new file added to \"Exam prep\"");

    let expected: BTreeSet<FileId> = ["1", "2", "3"].into_iter().map(FileId::from).collect();
    assert_eq!(harness.gateway.collection_members("c1"), Some(expected));
    assert_eq!(harness.state().selection.mode(), SelectionMode::Browsing);
}

#[tokio::test(start_paused = true)]
async fn test_long_press_then_tap_round_trips_selection_mode() {
    let harness = TestHarness::loaded(campus_snapshot()).await;

    harness.long_press("f1").await;
    {
        let state = harness.state();
        assert_eq!(state.selection.mode(), SelectionMode::Selecting);
        let expected: BTreeSet<FileId> = [FileId::from("f1")].into_iter().collect();
        assert_eq!(state.selection.selected(), &expected);
        assert!(state.detail_file.is_none());
    }

    harness.send("tapFile", json!({"id": "f1"})).await;
    let state = harness.state();
    assert!(state.selection.selected().is_empty());
    assert_eq!(state.selection.mode(), SelectionMode::Browsing);
}

#[tokio::test(start_paused = true)]
async fn test_pointer_cancel_prevents_long_press() {
    let harness = TestHarness::loaded(campus_snapshot()).await;

    harness.send("pressStart", json!({"id": "f1"})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.send("pointerCancel", Value::Null).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(harness.state().selection.mode(), SelectionMode::Browsing);
}

#[tokio::test]
async fn test_empty_search_commit_sends_nothing() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness.send("setSearchQuery", json!({"query": ""})).await;
    harness.send("commitSearch", Value::Null).await;

    assert_eq!(harness.gateway.call_count("search_files"), 0);
    let state = harness.state();
    assert!(state.search_results.is_empty());
    assert!(!state.is_searching);
}

#[tokio::test]
async fn test_uploader_change_reruns_search_with_new_scope() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness.send("setSearchQuery", json!({"query": "f"})).await;
    harness.send("commitSearch", Value::Null).await;
    assert_eq!(harness.visible_ids(), vec!["f1", "f2", "f3"]);

    harness
        .send("setUploaderFilter", json!({"uploader": "u2"}))
        .await;

    let requests = harness.gateway.search_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].owner_id.as_deref(), Some("u2"));
    assert_eq!(harness.visible_ids(), vec!["f3"]);
    assert!(matches!(
        visible_files(&harness.state()),
        VisibleListing::SearchResults(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_search_response_after_navigation_is_dropped() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;
    harness.gateway.set_delay("search_files", Duration::from_millis(200));
    harness.send("setSearchQuery", json!({"query": "f3"})).await;

    let search = {
        let gateway = harness.shared_gateway();
        let proxy = harness.proxy.clone();
        let state = harness.state.clone();
        tokio::spawn(async move { app::commands::commit_search(gateway.as_ref(), proxy, state).await })
    };
    while harness.gateway.call_count("search_files") == 0 {
        tokio::task::yield_now().await;
    }
    harness.send("exitFolder", Value::Null).await;
    search.await.unwrap();

    let state = harness.state();
    assert!(state.current_folder.is_none());
    assert!(state.committed_query.is_none());
    assert!(state.search_results.is_empty());
    assert!(!state.is_searching);
}

#[tokio::test]
async fn test_refresh_returns_home_when_folder_disappears() {
    let mut harness = TestHarness::loaded(campus_snapshot()).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;
    harness.drain_events();

    let mut snapshot = campus_snapshot();
    snapshot.groups.retain(|g| g.group_name != "CS101");
    harness.gateway.set_snapshot(snapshot);
    harness.send("refresh", Value::Null).await;

    let notices = harness.notices();
    assert_eq!(notices, vec!["Group 'CS101' no longer exists".to_string()]);
    assert!(harness.state().current_folder.is_none());
}

#[tokio::test]
async fn test_failed_refresh_keeps_listing() {
    let mut harness = TestHarness::loaded(campus_snapshot()).await;
    harness.drain_events();
    harness.gateway.fail_next("list_files");

    harness.send("refresh", Value::Null).await;

    assert_eq!(harness.errors().len(), 1);
    let state = harness.state();
    assert_eq!(state.snapshot.groups.len(), 2);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_upload_into_empty_shared_folder_goes_ungrouped() {
    let mut snapshot = campus_snapshot();
    snapshot.groups.push(Group {
        group_name: "Empty Club".into(),
        group_id: None,
        files: vec![],
    });
    let mut harness = TestHarness::loaded(snapshot).await;
    harness
        .send("enterFolder", json!({"name": "Empty Club"}))
        .await;
    harness.drain_events();

    harness
        .send(
            "uploadFile",
            json!({"filename": "poster.png", "bytes": [137, 80, 78, 71]}),
        )
        .await;

    let uploads = harness.gateway.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].group_id, None);
    assert_eq!(harness.notices().len(), 1);
}

#[tokio::test]
async fn test_upload_in_folder_carries_group_and_refreshes() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;

    harness
        .send(
            "uploadFile",
            json!({"filename": "syllabus.pdf", "bytes": [37, 80, 68, 70]}),
        )
        .await;

    assert_eq!(
        harness.gateway.uploads()[0].group_id.as_deref(),
        Some("g-cs101")
    );
    assert_eq!(harness.visible_ids().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_last_selected_file_ends_selection() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness.long_press("f2").await;
    assert!(harness.state().selection.is_selecting());

    harness.send("deleteFile", json!({"id": "f2"})).await;

    let state = harness.state();
    assert_eq!(state.selection.mode(), SelectionMode::Browsing);
    assert!(state.snapshot.find_file(&FileId::from("f2")).is_none());
}

#[tokio::test]
async fn test_kind_and_tag_filters_reset_on_folder_change() {
    let harness = TestHarness::loaded(campus_snapshot()).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;
    harness
        .send("setKindFilter", json!({"kind": "images"}))
        .await;
    assert!(harness.visible_ids().is_empty());

    harness.send("exitFolder", Value::Null).await;
    harness
        .send("enterFolder", json!({"name": "CS101"}))
        .await;
    assert_eq!(harness.visible_ids(), vec!["f3"]);
}

#[tokio::test]
async fn test_raw_ipc_message_is_dispatched() {
    let mut harness = TestHarness::new(campus_snapshot());
    app::handle_ipc_message(
        r#"{"command": "refresh"}"#.to_string(),
        harness.shared_gateway(),
        harness.proxy.clone(),
        harness.state.clone(),
    );

    let loaded = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = harness.event_rx.recv().await {
            if let UserEvent::StateUpdate(ui_state) = event {
                if !ui_state.is_loading && ui_state.visible_count == 2 {
                    return true;
                }
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(loaded);
}
