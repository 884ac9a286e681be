//! Undo/redo command stack.
//!
//! Each entry stores a scope (one overlay or the whole document) with its
//! before and after snapshots. Undo applies `before` and moves the entry to
//! the redo stack; redo applies `after` and moves it back.

use std::sync::Arc;

use crate::geometry::Rect;
use crate::overlay::{Overlay, OverlayId};
use crate::raster::BaseImage;

pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Image, overlay sequence and pending crop, captured as one unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentState {
    pub base: Option<Arc<BaseImage>>,
    pub overlays: Vec<Overlay>,
    pub crop: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// One overlay and its position in the sequence; `None` when absent.
    Overlay {
        id: OverlayId,
        slot: Option<(usize, Overlay)>,
    },
    Document(DocumentState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub label: String,
    pub before: Snapshot,
    pub after: Snapshot,
}

impl HistoryEntry {
    pub fn new(label: impl Into<String>, before: Snapshot, after: Snapshot) -> Self {
        Self {
            label: label.into(),
            before,
            after,
        }
    }

    pub fn is_document_scope(&self) -> bool {
        matches!(self.before, Snapshot::Document(_))
    }
}

#[derive(Debug, Clone)]
pub struct UndoLog {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl UndoLog {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Pushes a fresh user action. Any redo branch is discarded and the
    /// oldest entries fall off past the limit.
    pub fn record(&mut self, entry: HistoryEntry) {
        tracing::debug!(label = %entry.label, depth = self.undo.len() + 1, "history entry recorded");
        self.undo.push(entry);
        self.redo.clear();
        if self.undo.len() > self.limit {
            let overflow = self.undo.len() - self.limit;
            self.undo.drain(..overflow);
        }
    }

    pub fn take_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop()
    }

    pub fn take_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// Returns an entry to the undo stack after a redo without touching the
    /// remaining redo branch.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
