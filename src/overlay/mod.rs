//! Annotation entities drawn over the base image.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Color, Point, Rect};

/// Stable identity of an overlay. Selection and history refer to overlays by
/// id only and resolve them against the current sequence on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Rectangle,
    Ellipse,
    Line,
    Arrow,
    Text,
    Blur,
}

impl OverlayKind {
    /// Line and arrow overlays are defined by their endpoints; the frame is derived.
    pub const fn is_segment(self) -> bool {
        matches!(self, Self::Line | Self::Arrow)
    }

    pub const fn is_blur(self) -> bool {
        matches!(self, Self::Blur)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Text => "text",
            Self::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub stroke_color: Color,
    pub fill_color: Color,
    pub stroke_width: f64,
    pub font_name: String,
    pub font_size: f64,
    pub blur_radius: f64,
    pub corner_radius: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::rgb(0xE5, 0x39, 0x35),
            fill_color: Color::TRANSPARENT,
            stroke_width: 3.0,
            font_name: DEFAULT_FONT_NAME.to_string(),
            font_size: 24.0,
            blur_radius: 10.0,
            corner_radius: 0.0,
        }
    }
}

pub const DEFAULT_FONT_NAME: &str = "Sans";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub kind: OverlayKind,
    pub frame: Rect,
    pub style: OverlayStyle,
    pub text: Option<String>,
    pub start: Option<Point>,
    pub end: Option<Point>,
}

impl Overlay {
    /// Frame-authoritative overlay (rectangle, ellipse, blur, text).
    pub fn with_frame(id: OverlayId, kind: OverlayKind, frame: Rect, style: OverlayStyle) -> Self {
        Self {
            id,
            kind,
            frame,
            style,
            text: None,
            start: None,
            end: None,
        }
    }

    /// Endpoint-authoritative overlay (line, arrow).
    pub fn segment(
        id: OverlayId,
        kind: OverlayKind,
        start: Point,
        end: Point,
        style: OverlayStyle,
    ) -> Self {
        Self {
            id,
            kind,
            frame: Rect::from_corners(start, end),
            style,
            text: None,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn text(id: OverlayId, frame: Rect, content: impl Into<String>, style: OverlayStyle) -> Self {
        Self {
            text: Some(content.into()),
            ..Self::with_frame(id, OverlayKind::Text, frame, style)
        }
    }

    pub fn endpoints(&self) -> Option<(Point, Point)> {
        if !self.kind.is_segment() {
            return None;
        }
        Some((self.start?, self.end?))
    }

    pub fn set_endpoints(&mut self, start: Point, end: Point) {
        self.start = Some(start);
        self.end = Some(end);
        self.frame = Rect::from_corners(start, end);
    }

    /// Moves the overlay by `(dx, dy)` from its current geometry.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.frame = self.frame.translate(dx, dy);
        self.start = self.start.map(|point| point.offset(dx, dy));
        self.end = self.end.map(|point| point.offset(dx, dy));
    }

    /// Replaces the frame. Segment endpoints are remapped proportionally from
    /// the old frame into the new one so the frame stays their bounding box.
    pub fn set_frame(&mut self, frame: Rect) {
        if let Some((start, end)) = self.endpoints() {
            let old = self.frame;
            let remap = |point: Point| {
                Point::new(
                    remap_axis(point.x, old.x, old.width, frame.x, frame.width),
                    remap_axis(point.y, old.y, old.height, frame.y, frame.height),
                )
            };
            self.set_endpoints(remap(start), remap(end));
        } else {
            self.frame = frame;
        }
    }

    /// Endpoint box (segments) or frame, padded by the stroke width.
    pub fn hit_rect(&self) -> Rect {
        let pad = self.style.stroke_width.max(0.0);
        match self.endpoints() {
            Some((start, end)) => Rect::from_corners(start, end).inflate(pad),
            None => self.frame.inflate(pad),
        }
    }

    /// Area the overlay may paint to, including arrowheads and stroke overhang.
    pub fn paint_bounds(&self) -> Rect {
        let stroke = self.style.stroke_width.max(0.0);
        match self.endpoints() {
            Some((start, end)) => Rect::from_corners(start, end).inflate(stroke * 3.0 + 10.0),
            None => self.frame.inflate(stroke / 2.0),
        }
    }

    pub fn text_content(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

fn remap_axis(value: f64, old_origin: f64, old_extent: f64, origin: f64, extent: f64) -> f64 {
    if old_extent.abs() <= f64::EPSILON {
        return origin + (value - old_origin).clamp(0.0, extent.max(0.0));
    }
    origin + (value - old_origin) / old_extent * extent
}
