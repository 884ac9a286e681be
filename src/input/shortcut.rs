use crate::canvas::Tool;

use super::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    Character(char),
    Enter,
    Escape,
    Delete,
    Backspace,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    pub text_editing: bool,
    pub crop_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    TextInsert(char),
    TextInsertLineBreak,
    TextDeleteBackward,
    TextCommit,
    TextCancel,
    CropCommit,
    CropCancel,
    Undo,
    Redo,
    DeleteSelection,
    Cancel,
    ZoomIn,
    ZoomOut,
    ZoomToFit,
    SelectTool(Tool),
}

fn resolve_text_shortcut(key: ShortcutKey, modifiers: Modifiers) -> Option<ShortcutAction> {
    match (key, modifiers.ctrl, modifiers.shift) {
        (ShortcutKey::Enter, _, true) => Some(ShortcutAction::TextInsertLineBreak),
        (ShortcutKey::Enter, _, false) => Some(ShortcutAction::TextCommit),
        (ShortcutKey::Escape, _, _) => Some(ShortcutAction::TextCancel),
        (ShortcutKey::Backspace, false, _) => Some(ShortcutAction::TextDeleteBackward),
        (ShortcutKey::Space, false, _) => Some(ShortcutAction::TextInsert(' ')),
        (ShortcutKey::Character(ch), false, _) => Some(ShortcutAction::TextInsert(ch)),
        _ => None,
    }
}

fn resolve_crop_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    match key {
        ShortcutKey::Enter => Some(ShortcutAction::CropCommit),
        ShortcutKey::Escape => Some(ShortcutAction::CropCancel),
        _ => None,
    }
}

fn resolve_tool_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    let tool = match key {
        ShortcutKey::Character('v') => Tool::Select,
        ShortcutKey::Character('h') => Tool::Grab,
        ShortcutKey::Character('r') => Tool::Rectangle,
        ShortcutKey::Character('e') => Tool::Ellipse,
        ShortcutKey::Character('l') => Tool::Line,
        ShortcutKey::Character('a') => Tool::Arrow,
        ShortcutKey::Character('t') => Tool::Text,
        ShortcutKey::Character('b') => Tool::Blur,
        ShortcutKey::Character('c') => Tool::Crop,
        _ => return None,
    };
    Some(ShortcutAction::SelectTool(tool))
}

fn resolve_canvas_shortcut(key: ShortcutKey, modifiers: Modifiers) -> Option<ShortcutAction> {
    let key = match key {
        ShortcutKey::Character(ch) => ShortcutKey::Character(ch.to_ascii_lowercase()),
        other => other,
    };
    match (key, modifiers.ctrl, modifiers.shift) {
        (ShortcutKey::Character('z'), true, false) => Some(ShortcutAction::Undo),
        (ShortcutKey::Character('z'), true, true) | (ShortcutKey::Character('y'), true, _) => {
            Some(ShortcutAction::Redo)
        }
        (ShortcutKey::Delete, false, false) | (ShortcutKey::Backspace, false, false) => {
            Some(ShortcutAction::DeleteSelection)
        }
        (ShortcutKey::Escape, _, _) => Some(ShortcutAction::Cancel),
        (ShortcutKey::Character('+') | ShortcutKey::Character('='), _, _) => {
            Some(ShortcutAction::ZoomIn)
        }
        (ShortcutKey::Character('-'), _, _) => Some(ShortcutAction::ZoomOut),
        (ShortcutKey::Character('0'), _, false) => Some(ShortcutAction::ZoomToFit),
        (_, false, false) => resolve_tool_shortcut(key),
        _ => None,
    }
}

/// Maps a key press to a canvas action. An open text session captures the
/// keyboard; a pending crop claims confirm and cancel before the canvas does.
pub fn resolve_shortcut(
    key: ShortcutKey,
    modifiers: Modifiers,
    context: InputContext,
) -> Option<ShortcutAction> {
    if context.text_editing {
        return resolve_text_shortcut(key, modifiers);
    }

    if context.crop_pending {
        if let Some(action) = resolve_crop_shortcut(key) {
            return Some(action);
        }
    }

    resolve_canvas_shortcut(key, modifiers)
}
