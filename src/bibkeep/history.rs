//! # Undo/Redo
//!
//! A bounded list of whole-file snapshots with a pointer to the current one.
//!
//! ```text
//!  entries:  [Init] [Write] [Delete] [Write]
//!  pointer:                    ^
//!  undo  -> restores entries[pointer - 1], reports what was undone
//!  redo  -> restores entries[pointer + 1], reports what was redone
//! ```
//!
//! Saving while the pointer is not at the tail drops everything after it, so
//! redo is only ever possible right after an undo. At capacity with the
//! pointer at the tail, the oldest snapshot is evicted.
//!
//! The history never touches the filesystem itself. `undo`/`redo` take the
//! restore step as a closure and only move the pointer once it succeeded.

use crate::error::{BibError, Result};
use crate::model::ActionKind;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_HISTORY_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub action: ActionKind,
    pub path: PathBuf,
    pub text: String,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UndoRedo {
    entries: VecDeque<Snapshot>,
    pointer: usize,
    capacity: usize,
}

impl Default for UndoRedo {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl UndoRedo {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            pointer: 0,
            capacity,
        }
    }

    pub fn save_operation(&mut self, text: &str, path: &Path, action: ActionKind) {
        let snapshot = Snapshot {
            action,
            path: path.to_path_buf(),
            text: text.to_string(),
            taken_at: Utc::now(),
        };

        if self.entries.is_empty() {
            self.entries.push_back(snapshot);
            self.pointer = 0;
        } else if self.entries.len() == self.capacity && self.pointer == self.entries.len() - 1 {
            self.entries.push_back(snapshot);
            self.entries.pop_front();
        } else {
            self.pointer += 1;
            self.entries.truncate(self.pointer);
            self.entries.push_back(snapshot);
        }

        debug!(
            %action,
            path = %path.display(),
            len = self.entries.len(),
            pointer = self.pointer,
            "history snapshot saved"
        );
    }

    /// Steps back one snapshot. `restore` receives the snapshot to bring back;
    /// the pointer only moves when it returns `Ok`. Returns the action that
    /// was undone.
    pub fn undo<F>(&mut self, restore: F) -> Result<ActionKind>
    where
        F: FnOnce(&Snapshot) -> Result<()>,
    {
        if !self.is_undo_possible() {
            return Err(BibError::NoUndoAvailable);
        }
        let target = self.pointer - 1;
        restore(&self.entries[target])?;

        let undone = self.entries[self.pointer].action;
        self.pointer = target;
        debug!(%undone, pointer = self.pointer, "undo");
        Ok(undone)
    }

    /// Steps forward one snapshot. Same contract as [`UndoRedo::undo`].
    pub fn redo<F>(&mut self, restore: F) -> Result<ActionKind>
    where
        F: FnOnce(&Snapshot) -> Result<()>,
    {
        if !self.is_redo_possible() {
            return Err(BibError::NoRedoAvailable);
        }
        let target = self.pointer + 1;
        restore(&self.entries[target])?;

        self.pointer = target;
        let redone = self.entries[target].action;
        debug!(%redone, pointer = self.pointer, "redo");
        Ok(redone)
    }

    pub fn is_undo_possible(&self) -> bool {
        self.pointer > 0 && self.entries.len() > 1
    }

    pub fn is_redo_possible(&self) -> bool {
        !self.entries.is_empty() && self.pointer + 1 < self.entries.len()
    }

    /// True while nothing has been recorded yet.
    pub fn is_init(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.pointer)
    }

    pub fn pointer(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.pointer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }
}
