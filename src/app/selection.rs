//! The multi-select state machine and its long-press gesture tracker.
//!
//! The mode is derived from the selection set itself: the engine is
//! `Selecting` exactly when at least one file is selected. Every operation
//! that could empty the set therefore drops back to `Browsing` on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::config::DEFAULT_LONG_PRESS_MS;
use crate::core::FileId;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Browsing,
    Selecting,
}

/// State of the current pointer press, if any.
#[derive(Clone, Debug, PartialEq)]
pub enum PressState {
    Idle,
    /// A press is held and the long-press timer is running.
    Armed {
        file_id: FileId,
        token: u64,
        started_at: Instant,
    },
    /// The long press already fired; the matching release must not count as
    /// a tap.
    Fired,
}

/// What a tap on a file resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    /// Browsing: the file's detail view should open.
    OpenDetail(FileId),
    /// Selecting: the file was added to the selection.
    Selected(FileId),
    /// Selecting: the file was removed and other files remain selected.
    Deselected(FileId),
    /// Selecting: the last selected file was removed.
    SelectionEmptied,
}

/// What releasing a press resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The press ended before the threshold and counts as a tap.
    Tap(TapOutcome),
    /// The press had already turned into a long press.
    LongPressEnded,
    /// No press was being tracked, e.g. it was cancelled by pointer movement.
    Ignored,
}

#[derive(Clone, Debug)]
pub struct SelectionEngine {
    selected: BTreeSet<FileId>,
    press: PressState,
    next_token: u64,
    long_press: Duration,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LONG_PRESS_MS))
    }
}

impl SelectionEngine {
    pub fn new(long_press: Duration) -> Self {
        Self {
            selected: BTreeSet::new(),
            press: PressState::Idle,
            next_token: 0,
            long_press,
        }
    }

    pub fn mode(&self) -> SelectionMode {
        if self.selected.is_empty() {
            SelectionMode::Browsing
        } else {
            SelectionMode::Selecting
        }
    }

    pub fn is_selecting(&self) -> bool {
        self.mode() == SelectionMode::Selecting
    }

    pub fn selected(&self) -> &BTreeSet<FileId> {
        &self.selected
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, id: &FileId) -> bool {
        self.selected.contains(id)
    }

    pub fn press_state(&self) -> &PressState {
        &self.press
    }

    pub fn long_press_threshold(&self) -> Duration {
        self.long_press
    }

    pub fn set_long_press_threshold(&mut self, threshold: Duration) {
        self.long_press = threshold;
    }

    /// Starts tracking a press on `file_id` and returns the timer token.
    ///
    /// Any press still being tracked is superseded.
    pub fn press_start(&mut self, file_id: FileId, now: Instant) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        tracing::debug!("Press armed on {} (token {})", file_id, token);
        self.press = PressState::Armed {
            file_id,
            token,
            started_at: now,
        };
        token
    }

    /// Called when the long-press timer for `token` expires.
    ///
    /// Returns `true` if this entered selection mode. A token from a press
    /// that was released, cancelled or superseded is ignored, as is a long
    /// press while already selecting.
    pub fn long_press_elapsed(&mut self, token: u64) -> bool {
        let file_id = match &self.press {
            PressState::Armed {
                file_id, token: t, ..
            } if *t == token => file_id.clone(),
            _ => return false,
        };

        if self.is_selecting() {
            // Already selecting: the press stays a plain tap candidate.
            return false;
        }

        tracing::debug!("Long press on {} entered selection mode", file_id);
        self.selected.insert(file_id);
        self.press = PressState::Fired;
        true
    }

    /// Ends the press on `file_id`.
    pub fn press_release(&mut self, file_id: &FileId) -> ReleaseOutcome {
        match std::mem::replace(&mut self.press, PressState::Idle) {
            PressState::Armed { file_id: armed, .. } if &armed == file_id => {
                ReleaseOutcome::Tap(self.tap(file_id.clone()))
            }
            PressState::Fired => ReleaseOutcome::LongPressEnded,
            _ => ReleaseOutcome::Ignored,
        }
    }

    /// Pointer moved or left the item: the press is abandoned without a tap.
    pub fn pointer_cancel(&mut self) {
        if matches!(self.press, PressState::Armed { .. }) {
            tracing::debug!("Press cancelled before the long-press threshold");
        }
        self.press = PressState::Idle;
    }

    /// A plain tap or click on a file.
    pub fn tap(&mut self, file_id: FileId) -> TapOutcome {
        if !self.is_selecting() {
            return TapOutcome::OpenDetail(file_id);
        }
        if self.selected.remove(&file_id) {
            if self.selected.is_empty() {
                tracing::debug!("Selection emptied, back to browsing");
                TapOutcome::SelectionEmptied
            } else {
                TapOutcome::Deselected(file_id)
            }
        } else {
            self.selected.insert(file_id.clone());
            TapOutcome::Selected(file_id)
        }
    }

    /// Leaves selection mode and forgets the selection.
    pub fn cancel(&mut self) {
        self.selected.clear();
        self.press = PressState::Idle;
    }

    /// Drops a file from the selection, e.g. after it was deleted.
    pub fn remove(&mut self, file_id: &FileId) -> bool {
        self.selected.remove(file_id)
    }
}
