//! Spatial queries over overlays and resize-handle geometry.

use crate::geometry::{Point, Rect};
use crate::overlay::{Overlay, OverlayId};

pub const DEFAULT_MIN_RESIZE_SIZE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    TopLeft,
    TopMiddle,
    TopRight,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 8] = [
        Self::TopLeft,
        Self::TopMiddle,
        Self::TopRight,
        Self::MiddleLeft,
        Self::MiddleRight,
        Self::BottomLeft,
        Self::BottomMiddle,
        Self::BottomRight,
    ];

    const fn moves_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::MiddleLeft | Self::BottomLeft)
    }

    const fn moves_right(self) -> bool {
        matches!(self, Self::TopRight | Self::MiddleRight | Self::BottomRight)
    }

    const fn moves_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopMiddle | Self::TopRight)
    }

    const fn moves_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomMiddle | Self::BottomRight)
    }

    /// Position of this handle on `rect`.
    pub fn position(self, rect: Rect) -> Point {
        let x = if self.moves_left() {
            rect.x
        } else if self.moves_right() {
            rect.max_x()
        } else {
            rect.x + rect.width / 2.0
        };
        let y = if self.moves_top() {
            rect.y
        } else if self.moves_bottom() {
            rect.max_y()
        } else {
            rect.y + rect.height / 2.0
        };
        Point::new(x, y)
    }
}

pub fn handle_points(rect: Rect) -> [(ResizeHandle, Point); 8] {
    ResizeHandle::ALL.map(|handle| (handle, handle.position(rect)))
}

/// Nearest handle within `radius_px` screen pixels. The radius is divided by
/// `view_scale` so the on-screen target stays the same size at any zoom.
pub fn hit_test_handles(
    rect: Rect,
    point: Point,
    radius_px: f64,
    view_scale: f64,
) -> Option<ResizeHandle> {
    let scale = if view_scale > 0.0 { view_scale } else { 1.0 };
    let radius = radius_px / scale;
    handle_points(rect)
        .into_iter()
        .map(|(handle, position)| (handle, position.distance_to(point)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(handle, _)| handle)
}

/// Applies a cumulative drag delta to the edges `handle` controls. Width and
/// height never drop below `min_size`; the opposite edge stays put.
pub fn apply_handle_resize(
    handle: ResizeHandle,
    delta: (f64, f64),
    rect: Rect,
    min_size: f64,
) -> Rect {
    let (dx, dy) = delta;
    let min_size = min_size.max(0.0);
    let mut left = rect.x;
    let mut right = rect.max_x();
    let mut top = rect.y;
    let mut bottom = rect.max_y();

    if handle.moves_left() {
        left += dx;
    }
    if handle.moves_right() {
        right += dx;
    }
    if handle.moves_top() {
        top += dy;
    }
    if handle.moves_bottom() {
        bottom += dy;
    }

    if right - left < min_size {
        if handle.moves_left() {
            left = right - min_size;
        } else {
            right = left + min_size;
        }
    }
    if bottom - top < min_size {
        if handle.moves_top() {
            top = bottom - min_size;
        } else {
            bottom = top + min_size;
        }
    }

    Rect::new(left, top, right - left, bottom - top)
}

/// Distance from `point` to the segment `start..end`, projecting onto the
/// segment with the parameter clamped to `[0, 1]`.
pub fn point_segment_distance(point: Point, start: Point, end: Point) -> f64 {
    let (dx, dy) = start.delta_to(end);
    let length_sq = dx * dx + dy * dy;
    if length_sq <= f64::EPSILON {
        return point.distance_to(start);
    }
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(Point::new(start.x + t * dx, start.y + t * dy))
}

pub fn overlay_contains(overlay: &Overlay, point: Point, tolerance: f64) -> bool {
    match overlay.endpoints() {
        Some((start, end)) => point_segment_distance(point, start, end) <= tolerance,
        None => overlay.frame.inflate(tolerance).contains(point),
    }
}

/// Topmost overlay under `point`, scanning from the end of the sequence.
pub fn hit_test_overlays(overlays: &[Overlay], point: Point, tolerance: f64) -> Option<OverlayId> {
    overlays
        .iter()
        .rev()
        .filter(|overlay| overlay.hit_rect().inflate(tolerance).contains(point))
        .find(|overlay| overlay_contains(overlay, point, tolerance))
        .map(|overlay| overlay.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{OverlayKind, OverlayStyle};

    fn rect_overlay(id: u64, frame: Rect) -> Overlay {
        Overlay::with_frame(
            OverlayId(id),
            OverlayKind::Rectangle,
            frame,
            OverlayStyle::default(),
        )
    }

    #[test]
    fn hit_test_prefers_latest_inserted_overlay() {
        let overlays = vec![
            rect_overlay(1, Rect::new(0.0, 0.0, 100.0, 100.0)),
            rect_overlay(2, Rect::new(50.0, 50.0, 100.0, 100.0)),
            rect_overlay(3, Rect::new(200.0, 200.0, 10.0, 10.0)),
        ];
        assert_eq!(
            hit_test_overlays(&overlays, Point::new(75.0, 75.0), 3.0),
            Some(OverlayId(2))
        );
        assert_eq!(
            hit_test_overlays(&overlays, Point::new(10.0, 10.0), 3.0),
            Some(OverlayId(1))
        );
        assert_eq!(hit_test_overlays(&overlays, Point::new(180.0, 20.0), 3.0), None);
    }

    #[test]
    fn segment_hit_uses_distance_not_bounding_box() {
        let line = Overlay::segment(
            OverlayId(7),
            OverlayKind::Line,
            Point::new(0.0, 0.0),
            Point::new(100.0, 100.0),
            OverlayStyle::default(),
        );
        let overlays = vec![line];
        assert_eq!(
            hit_test_overlays(&overlays, Point::new(50.0, 52.0), 3.0),
            Some(OverlayId(7))
        );
        // Inside the bounding box, far from the diagonal.
        assert_eq!(hit_test_overlays(&overlays, Point::new(90.0, 10.0), 3.0), None);
    }

    #[test]
    fn point_segment_distance_clamps_projection_to_endpoints() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(10.0, 0.0);
        assert_eq!(point_segment_distance(Point::new(5.0, 4.0), start, end), 4.0);
        assert_eq!(point_segment_distance(Point::new(-3.0, 4.0), start, end), 5.0);
        assert_eq!(point_segment_distance(Point::new(13.0, 4.0), start, end), 5.0);
        assert_eq!(point_segment_distance(Point::new(3.0, 4.0), start, start), 5.0);
    }

    #[test]
    fn handle_hit_radius_is_constant_on_screen() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        let near_corner = Point::new(103.0, 103.0);
        assert_eq!(
            hit_test_handles(rect, near_corner, 8.0, 1.0),
            Some(ResizeHandle::BottomRight)
        );
        // At 4x zoom the 8px target only reaches 2 image units.
        assert_eq!(hit_test_handles(rect, near_corner, 8.0, 4.0), None);
        assert_eq!(
            hit_test_handles(rect, Point::new(50.0, -1.0), 8.0, 4.0),
            Some(ResizeHandle::TopMiddle)
        );
    }

    #[test]
    fn hit_test_handles_picks_nearest_when_targets_overlap() {
        let rect = Rect::new(0.0, 0.0, 6.0, 6.0);
        assert_eq!(
            hit_test_handles(rect, Point::new(5.5, 0.5), 8.0, 1.0),
            Some(ResizeHandle::TopRight)
        );
    }

    #[test]
    fn corner_handle_moves_origin_and_shrinks_extent() {
        let rect = Rect::new(10.0, 10.0, 100.0, 60.0);
        let resized = apply_handle_resize(ResizeHandle::TopLeft, (5.0, 10.0), rect, 4.0);
        assert_eq!(resized, Rect::new(15.0, 20.0, 95.0, 50.0));
    }

    #[test]
    fn edge_handle_changes_only_its_axis() {
        let rect = Rect::new(10.0, 10.0, 100.0, 60.0);
        let resized = apply_handle_resize(ResizeHandle::MiddleRight, (25.0, 40.0), rect, 4.0);
        assert_eq!(resized, Rect::new(10.0, 10.0, 125.0, 60.0));
    }

    #[test]
    fn resize_never_goes_below_min_size_for_any_delta() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        for handle in ResizeHandle::ALL {
            for delta in [-1000.0, -25.0, -19.0, 0.0, 19.0, 25.0, 1000.0] {
                let resized = apply_handle_resize(handle, (delta, -delta), rect, 4.0);
                assert!(resized.width >= 4.0, "{handle:?} {delta} -> {resized:?}");
                assert!(resized.height >= 4.0, "{handle:?} {delta} -> {resized:?}");
            }
        }
    }

    #[test]
    fn collapsing_left_edge_keeps_right_edge_anchored() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        let resized = apply_handle_resize(ResizeHandle::MiddleLeft, (100.0, 0.0), rect, 4.0);
        assert_eq!(resized, Rect::new(26.0, 10.0, 4.0, 20.0));
    }
}
