//! Input events consumed by the canvas. Positions are in view space.

mod shortcut;

pub use shortcut::{resolve_shortcut, InputContext, ShortcutAction, ShortcutKey};

use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const fn new(shift: bool, ctrl: bool, alt: bool) -> Self {
        Self { shift, ctrl, alt }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    /// 1 for a single click, 2 for a double click.
    pub click_count: u32,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub const fn at(position: Point) -> Self {
        Self {
            position,
            click_count: 1,
            modifiers: Modifiers::new(false, false, false),
        }
    }

    pub const fn with_clicks(mut self, click_count: u32) -> Self {
        self.click_count = click_count;
        self
    }

    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Wheel or touchpad scroll. Deltas are view pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    pub position: Point,
    pub delta_x: f64,
    pub delta_y: f64,
    pub modifiers: Modifiers,
}

/// Pinch gesture step; `scale` is the multiplicative zoom change since the
/// previous step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchEvent {
    pub center: Point,
    pub scale: f64,
}
