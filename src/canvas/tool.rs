use crate::geometry::{Point, Rect};
use crate::hit_test::ResizeHandle;
use crate::overlay::{OverlayId, OverlayKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Grab,
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Text,
    Blur,
    Crop,
}

impl Tool {
    /// Overlay kind a drag with this tool produces.
    pub const fn shape_kind(self) -> Option<OverlayKind> {
        match self {
            Self::Rectangle => Some(OverlayKind::Rectangle),
            Self::Ellipse => Some(OverlayKind::Ellipse),
            Self::Line => Some(OverlayKind::Line),
            Self::Arrow => Some(OverlayKind::Arrow),
            Self::Blur => Some(OverlayKind::Blur),
            Self::Select | Self::Grab | Self::Text | Self::Crop => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Grab => "grab",
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Text => "text",
            Self::Blur => "blur",
            Self::Crop => "crop",
        }
    }
}

/// Pointer gesture in flight. Drag updates are computed from these original
/// values plus the cumulative pointer delta.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    DrawingShape {
        anchor: Point,
    },
    DrawingCrop {
        anchor: Point,
    },
    MovingOverlay {
        id: OverlayId,
        drag_start: Point,
        original_frame: Rect,
        original_start: Option<Point>,
        original_end: Option<Point>,
    },
    ResizingOverlay {
        id: OverlayId,
        handle: ResizeHandle,
        drag_start: Point,
        original_frame: Rect,
    },
    Panning {
        drag_start_view: Point,
        original_pan: Point,
    },
}

impl InteractionState {
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DrawingShape { .. } => "drawing-shape",
            Self::DrawingCrop { .. } => "drawing-crop",
            Self::MovingOverlay { .. } => "moving-overlay",
            Self::ResizingOverlay { .. } => "resizing-overlay",
            Self::Panning { .. } => "panning",
        }
    }
}
