use crate::input::{resolve_shortcut, InputContext, Modifiers, ShortcutAction, ShortcutKey};
use crate::overlay::{Overlay, OverlayId};

use super::Canvas;

impl Canvas {
    /// Handles a key press. Returns `true` when the key was consumed.
    pub fn key_down(&mut self, key: ShortcutKey, modifiers: Modifiers) -> bool {
        if key == ShortcutKey::Space && self.text_session.is_none() {
            self.hold_to_pan = true;
            return true;
        }
        let context = InputContext {
            text_editing: self.text_session.is_some(),
            crop_pending: self.document.crop().is_some(),
        };
        let Some(action) = resolve_shortcut(key, modifiers, context) else {
            return false;
        };
        self.apply_shortcut(action);
        true
    }

    pub fn key_up(&mut self, key: ShortcutKey) {
        if key == ShortcutKey::Space {
            self.hold_to_pan = false;
        }
    }

    pub fn apply_shortcut(&mut self, action: ShortcutAction) {
        tracing::debug!(?action, "shortcut");
        match action {
            ShortcutAction::TextInsert(ch) => self.edit_text(|session| session.insert(ch)),
            ShortcutAction::TextInsertLineBreak => self.edit_text(|session| session.insert('\n')),
            ShortcutAction::TextDeleteBackward => self.edit_text(|session| session.delete_backward()),
            ShortcutAction::TextCommit => {
                self.commit_text_session();
            }
            ShortcutAction::TextCancel => self.cancel_text_session(),
            ShortcutAction::CropCommit => {
                self.commit_crop();
            }
            ShortcutAction::CropCancel | ShortcutAction::Cancel => self.cancel(),
            ShortcutAction::Undo => {
                self.undo();
            }
            ShortcutAction::Redo => {
                self.redo();
            }
            ShortcutAction::DeleteSelection => {
                self.delete_selected_overlay();
            }
            ShortcutAction::ZoomIn => self.zoom_in(),
            ShortcutAction::ZoomOut => self.zoom_out(),
            ShortcutAction::ZoomToFit => self.zoom_to_fit(),
            ShortcutAction::SelectTool(tool) => self.set_tool(tool),
        }
    }

    /// Escape: drops the gesture, the pending crop, the preview and the selection.
    pub fn cancel(&mut self) {
        self.abort_gesture();
        self.cancel_crop();
        self.selected = None;
        self.request_redraw();
    }

    fn edit_text(&mut self, edit: impl FnOnce(&mut super::TextSession)) {
        if let Some(session) = self.text_session.as_mut() {
            edit(session);
            self.request_redraw();
        }
    }

    pub fn cancel_text_session(&mut self) {
        if self.text_session.take().is_some() {
            self.request_redraw();
        }
    }

    /// Ends the text session. New text becomes an overlay unless blank; an
    /// edited overlay is updated, or deleted when its text was cleared.
    pub fn commit_text_session(&mut self) -> Option<OverlayId> {
        let session = self.text_session.take()?;
        self.request_redraw();
        match session.target() {
            None if session.is_blank() => None,
            None => {
                let overlay = session.to_overlay();
                let id = self.add_overlay(overlay);
                self.selected = Some(id);
                Some(id)
            }
            Some(id) if session.is_blank() => {
                self.remove_overlay(id);
                None
            }
            Some(id) => {
                let edited: Overlay = session.to_overlay();
                self.update_overlay(id, |overlay| {
                    overlay.text = edited.text;
                    overlay.frame = edited.frame;
                });
                Some(id)
            }
        }
    }
}
