//! Image-space to view-space mapping: fit-scale, user zoom and pan.

use crate::geometry::{Point, Rect, Size};

const ZOOM_MIN: f64 = 0.05;
const ZOOM_MAX: f64 = 16.0;
const ZOOM_LEVELS: &[f64] = &[
    0.05, 0.08, 0.1, 0.125, 0.16, 0.2, 0.25, 0.33, 0.5, 0.67, 0.75, 0.8, 0.9, 1.0, 1.1, 1.25,
    1.5, 1.75, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 12.0, 16.0,
];
const ZOOM_LEVEL_EPSILON: f64 = 1e-6;

/// Scale that makes an image exactly fill the viewport along its tighter axis.
/// Degenerate inputs fall back to 1 instead of dividing by zero.
pub fn fit_scale(viewport: Size, image: Option<Size>) -> f64 {
    let Some(image) = image.filter(|image| !image.is_empty()) else {
        return 1.0;
    };
    if viewport.is_empty() {
        return 1.0;
    }
    (viewport.width / image.width).min(viewport.height / image.height)
}

/// Affine map `view = image * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f64,
    offset: Point,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    pub const fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: Point::ZERO,
        }
    }

    /// Scales by `fit * zoom`, centers the scaled image in the viewport, then
    /// adds the pan offset. With no image the result is scale 1 plus pan.
    pub fn new(viewport: Size, image: Option<Size>, zoom: f64, pan: Point) -> Self {
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        let Some(image) = image.filter(|image| !image.is_empty()) else {
            return Self {
                scale: 1.0,
                offset: pan,
            };
        };
        let scale = fit_scale(viewport, Some(image)) * zoom;
        let center_x = (viewport.width - image.width * scale) / 2.0;
        let center_y = (viewport.height - image.height * scale) / 2.0;
        Self {
            scale,
            offset: Point::new(center_x + pan.x, center_y + pan.y),
        }
    }

    pub const fn total_scale(&self) -> f64 {
        self.scale
    }

    pub const fn offset(&self) -> Point {
        self.offset
    }

    pub fn image_to_view(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale + self.offset.x,
            point.y * self.scale + self.offset.y,
        )
    }

    pub fn view_to_image(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.offset.x) / self.scale,
            (point.y - self.offset.y) / self.scale,
        )
    }

    pub fn image_rect_to_view(&self, rect: Rect) -> Rect {
        let origin = self.image_to_view(rect.origin());
        Rect::new(
            origin.x,
            origin.y,
            rect.width * self.scale,
            rect.height * self.scale,
        )
    }

    pub fn view_rect_to_image(&self, rect: Rect) -> Rect {
        let origin = self.view_to_image(rect.origin());
        Rect::new(
            origin.x,
            origin.y,
            rect.width / self.scale,
            rect.height / self.scale,
        )
    }

    /// Converts an on-screen distance to image units.
    pub fn view_length_to_image(&self, length: f64) -> f64 {
        length / self.scale
    }

    pub fn to_skia(&self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(
            self.scale as f32,
            0.0,
            0.0,
            self.scale as f32,
            self.offset.x as f32,
            self.offset.y as f32,
        )
    }
}

/// User-controlled zoom factor and pan offset, applied on top of fit-scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f64,
    pan: Point,
    zoom_min: f64,
    zoom_max: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub const fn new() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ZERO,
            zoom_min: ZOOM_MIN,
            zoom_max: ZOOM_MAX,
        }
    }

    pub fn with_zoom_bounds(mut self, zoom_min: f64, zoom_max: f64) -> Self {
        if zoom_min > 0.0 && zoom_max >= zoom_min {
            self.zoom_min = zoom_min;
            self.zoom_max = zoom_max;
            self.zoom = self.clamp_zoom(self.zoom);
        }
        self
    }

    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    pub const fn pan(&self) -> Point {
        self.pan
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.zoom_min, self.zoom_max)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = self.clamp_zoom(zoom);
        }
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan.offset(dx, dy);
    }

    pub fn next_zoom_in(&self) -> f64 {
        ZOOM_LEVELS
            .iter()
            .copied()
            .find(|level| *level > self.zoom + ZOOM_LEVEL_EPSILON)
            .map_or(self.zoom_max, |level| self.clamp_zoom(level))
    }

    pub fn next_zoom_out(&self) -> f64 {
        ZOOM_LEVELS
            .iter()
            .rev()
            .copied()
            .find(|level| *level < self.zoom - ZOOM_LEVEL_EPSILON)
            .map_or(self.zoom_min, |level| self.clamp_zoom(level))
    }

    /// Back to fit-to-viewport: zoom 1, no pan.
    pub fn reset(&mut self) {
        self.zoom = self.clamp_zoom(1.0);
        self.pan = Point::ZERO;
    }

    pub fn transform(&self, viewport: Size, image: Option<Size>) -> ViewTransform {
        ViewTransform::new(viewport, image, self.zoom, self.pan)
    }

    /// Changes zoom while keeping the image point under `anchor` (view space) fixed.
    pub fn zoom_around(&mut self, zoom: f64, anchor: Point, viewport: Size, image: Option<Size>) {
        let before = self.transform(viewport, image);
        let image_point = before.view_to_image(anchor);
        self.set_zoom(zoom);
        let after = self.transform(viewport, image).image_to_view(image_point);
        self.pan_by(anchor.x - after.x, anchor.y - after.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_point_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn view_to_image_inverts_image_to_view() {
        let transform = ViewTransform::new(
            Size::new(1280.0, 720.0),
            Some(Size::new(800.0, 600.0)),
            1.37,
            Point::new(-41.5, 12.25),
        );
        for point in [
            Point::new(0.0, 0.0),
            Point::new(799.0, 599.0),
            Point::new(-120.3, 44.7),
            Point::new(0.1, 1e4),
        ] {
            assert_point_close(transform.view_to_image(transform.image_to_view(point)), point);
        }
    }

    #[test]
    fn fit_scale_uses_tighter_axis_and_centers_image() {
        let transform =
            ViewTransform::new(Size::new(1000.0, 500.0), Some(Size::new(800.0, 600.0)), 1.0, Point::ZERO);
        let scale = 500.0 / 600.0;
        assert!((transform.total_scale() - scale).abs() < 1e-12);
        let origin = transform.image_to_view(Point::ZERO);
        assert_point_close(origin, Point::new((1000.0 - 800.0 * scale) / 2.0, 0.0));
    }

    #[test]
    fn missing_image_yields_unit_scale_without_dividing_by_zero() {
        let transform = ViewTransform::new(Size::new(0.0, 0.0), None, 2.0, Point::new(5.0, 6.0));
        assert_eq!(transform.total_scale(), 1.0);
        assert_point_close(transform.view_to_image(Point::new(5.0, 6.0)), Point::ZERO);

        let degenerate =
            ViewTransform::new(Size::new(0.0, 0.0), Some(Size::new(100.0, 100.0)), 1.0, Point::ZERO);
        assert!(degenerate.total_scale().is_finite());
    }

    #[test]
    fn image_rect_to_view_scales_extent_and_maps_origin() {
        let transform =
            ViewTransform::new(Size::new(400.0, 300.0), Some(Size::new(400.0, 300.0)), 2.0, Point::ZERO);
        let rect = transform.image_rect_to_view(Rect::new(10.0, 20.0, 30.0, 40.0));
        let origin = transform.image_to_view(Point::new(10.0, 20.0));
        assert_eq!(rect, Rect::new(origin.x, origin.y, 60.0, 80.0));
        assert!(transform
            .view_rect_to_image(rect)
            .approx_eq(Rect::new(10.0, 20.0, 30.0, 40.0), 1e-9));
    }

    #[test]
    fn zoom_steps_follow_level_ladder_and_clamp() {
        let mut viewport = Viewport::new();
        viewport.set_zoom(viewport.next_zoom_in());
        assert_eq!(viewport.zoom(), 1.1);

        viewport.set_zoom(1.37);
        assert_eq!(viewport.next_zoom_in(), 1.5);
        assert_eq!(viewport.next_zoom_out(), 1.25);

        for _ in 0..100 {
            viewport.set_zoom(viewport.next_zoom_in());
        }
        assert_eq!(viewport.zoom(), ZOOM_MAX);

        for _ in 0..100 {
            viewport.set_zoom(viewport.next_zoom_out());
        }
        assert_eq!(viewport.zoom(), ZOOM_MIN);
    }

    #[test]
    fn zoom_around_keeps_anchor_point_fixed() {
        let view = Size::new(800.0, 600.0);
        let image = Some(Size::new(1600.0, 1200.0));
        let mut viewport = Viewport::new();
        let anchor = Point::new(123.0, 456.0);
        let before = viewport.transform(view, image).view_to_image(anchor);

        viewport.zoom_around(3.0, anchor, view, image);

        let after = viewport.transform(view, image).view_to_image(anchor);
        assert_point_close(before, after);
        assert_eq!(viewport.zoom(), 3.0);
    }

    #[test]
    fn reset_restores_fit_and_clears_pan() {
        let mut viewport = Viewport::new();
        viewport.set_zoom(4.0);
        viewport.pan_by(120.0, -30.0);
        viewport.reset();
        assert_eq!(viewport.zoom(), 1.0);
        assert_eq!(viewport.pan(), Point::ZERO);
    }
}
