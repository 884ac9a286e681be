//! Central state holder: base image, overlay sequence, pending crop and the
//! undo log. Every mutation bumps the revision counter.

use std::sync::Arc;

use crate::geometry::Rect;
use crate::history::{DocumentState, HistoryEntry, Snapshot, UndoLog};
use crate::overlay::{Overlay, OverlayId};
use crate::raster::BaseImage;

#[derive(Debug, Clone)]
pub struct Document {
    base: Option<Arc<BaseImage>>,
    overlays: Vec<Overlay>,
    crop: Option<Rect>,
    next_id: u64,
    revision: u64,
    image_generation: u64,
    history: UndoLog,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// What an undo or redo step touched.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedStep {
    pub label: String,
    pub document_scope: bool,
    pub overlay: Option<OverlayId>,
}

impl Document {
    pub fn new() -> Self {
        Self::with_history(UndoLog::default())
    }

    pub fn with_history(history: UndoLog) -> Self {
        Self {
            base: None,
            overlays: Vec::new(),
            crop: None,
            next_id: 1,
            revision: 0,
            image_generation: 0,
            history,
        }
    }

    pub fn base(&self) -> Option<&BaseImage> {
        self.base.as_deref()
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn overlay(&self, id: OverlayId) -> Option<&Overlay> {
        self.overlays.iter().find(|overlay| overlay.id == id)
    }

    pub fn index_of(&self, id: OverlayId) -> Option<usize> {
        self.overlays.iter().position(|overlay| overlay.id == id)
    }

    pub fn crop(&self) -> Option<Rect> {
        self.crop
    }

    /// Monotonic counter bumped after every change; the redraw signal.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Changes only when the base image is replaced.
    pub fn image_generation(&self) -> u64 {
        self.image_generation
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn state(&self) -> DocumentState {
        DocumentState {
            base: self.base.clone(),
            overlays: self.overlays.clone(),
            crop: self.crop,
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn allocate_id(&mut self) -> OverlayId {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        OverlayId(id)
    }

    fn overlay_snapshot(&self, id: OverlayId) -> Snapshot {
        let slot = self
            .index_of(id)
            .map(|index| (index, self.overlays[index].clone()));
        Snapshot::Overlay { id, slot }
    }

    /// Transient crop rect; not recorded in history until committed.
    pub fn set_crop(&mut self, crop: Option<Rect>) {
        if self.crop != crop {
            self.crop = crop;
            self.touch();
        }
    }

    /// Appends `overlay` on top with a freshly allocated id.
    pub fn add_overlay(&mut self, mut overlay: Overlay) -> OverlayId {
        let id = self.allocate_id();
        overlay.id = id;
        let label = format!("add {}", overlay.kind.label());
        let before = self.overlay_snapshot(id);
        self.overlays.push(overlay);
        let after = self.overlay_snapshot(id);
        self.history.record(HistoryEntry::new(label, before, after));
        self.touch();
        tracing::debug!(overlay_id = %id, "overlay added");
        id
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> Option<Overlay> {
        let index = self.index_of(id)?;
        let before = self.overlay_snapshot(id);
        let removed = self.overlays.remove(index);
        let label = format!("delete {}", removed.kind.label());
        self.history
            .record(HistoryEntry::new(label, before, Snapshot::Overlay { id, slot: None }));
        self.touch();
        tracing::debug!(overlay_id = %id, "overlay removed");
        Some(removed)
    }

    /// Undo-tracked mutation. Returns `false` when the overlay is missing or the
    /// mutator left it unchanged (nothing is recorded then).
    pub fn update_overlay(&mut self, id: OverlayId, mutator: impl FnOnce(&mut Overlay)) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let previous = self.overlays[index].clone();
        mutator(&mut self.overlays[index]);
        self.overlays[index].id = id;
        self.register_overlay_undo(id, previous)
    }

    /// Mutation without history, for continuous drag feedback. Pair with
    /// [`Document::register_overlay_undo`] when the gesture ends.
    pub fn update_overlay_live(&mut self, id: OverlayId, mutator: impl FnOnce(&mut Overlay)) -> bool {
        let Some(overlay) = self.overlays.iter_mut().find(|overlay| overlay.id == id) else {
            return false;
        };
        mutator(overlay);
        overlay.id = id;
        self.touch();
        true
    }

    /// Records one step from `previous` to the overlay's current state.
    pub fn register_overlay_undo(&mut self, id: OverlayId, previous: Overlay) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.overlays[index] == previous {
            return false;
        }
        let label = format!("edit {}", previous.kind.label());
        let before = Snapshot::Overlay {
            id,
            slot: Some((index, previous)),
        };
        let after = self.overlay_snapshot(id);
        self.history.record(HistoryEntry::new(label, before, after));
        self.touch();
        true
    }

    /// Swaps in a whole new document state as one undoable step. The image
    /// generation advances when the base image changes.
    pub fn replace_state(&mut self, label: impl Into<String>, state: DocumentState) {
        let before = Snapshot::Document(self.state());
        let after = Snapshot::Document(state.clone());
        self.apply_document(state);
        self.history.record(HistoryEntry::new(label, before, after));
        self.touch();
    }

    pub fn undo(&mut self) -> Option<AppliedStep> {
        let entry = self.history.take_undo()?;
        let step = self.apply_snapshot(&entry.before, &entry.label);
        self.history.push_redo(entry);
        tracing::debug!(label = %step.label, "undo applied");
        Some(step)
    }

    pub fn redo(&mut self) -> Option<AppliedStep> {
        let entry = self.history.take_redo()?;
        let step = self.apply_snapshot(&entry.after, &entry.label);
        self.history.push_undo(entry);
        tracing::debug!(label = %step.label, "redo applied");
        Some(step)
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot, label: &str) -> AppliedStep {
        let step = match snapshot {
            Snapshot::Overlay { id, slot } => {
                self.apply_overlay_slot(*id, slot.as_ref());
                AppliedStep {
                    label: label.to_string(),
                    document_scope: false,
                    overlay: Some(*id),
                }
            }
            Snapshot::Document(state) => {
                self.apply_document(state.clone());
                AppliedStep {
                    label: label.to_string(),
                    document_scope: true,
                    overlay: None,
                }
            }
        };
        self.touch();
        step
    }

    fn apply_overlay_slot(&mut self, id: OverlayId, slot: Option<&(usize, Overlay)>) {
        let current = self.index_of(id);
        match (current, slot) {
            (Some(index), Some((target, overlay))) if index == *target => {
                self.overlays[index] = overlay.clone();
            }
            (Some(index), Some((target, overlay))) => {
                self.overlays.remove(index);
                let target = (*target).min(self.overlays.len());
                self.overlays.insert(target, overlay.clone());
            }
            (Some(index), None) => {
                self.overlays.remove(index);
            }
            (None, Some((target, overlay))) => {
                let target = (*target).min(self.overlays.len());
                self.overlays.insert(target, overlay.clone());
            }
            (None, None) => {}
        }
        self.sync_next_id();
    }

    fn apply_document(&mut self, state: DocumentState) {
        let same_image = match (&self.base, &state.base) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if !same_image {
            self.image_generation = self.image_generation.wrapping_add(1);
        }
        self.base = state.base;
        self.overlays = state.overlays;
        self.crop = state.crop;
        self.sync_next_id();
    }

    /// Ids stay unique after overlays are restored from a snapshot.
    fn sync_next_id(&mut self) {
        let max_id = self
            .overlays
            .iter()
            .map(|overlay| overlay.id.0)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_id.saturating_add(1));
    }
}
