//! Scene drawing shared by the live preview and the flattened export.
//!
//! Both targets go through [`Renderer::draw_scene`]: base image, then blur
//! patches in z-order, then vector overlays in z-order. The preview only adds
//! decorations on top, so what the user sees is what gets exported.

pub mod text;

use std::f64::consts::PI;

use image::RgbaImage;
use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

use crate::blur::{render_blur, BlurCache, BlurPatch};
use crate::geometry::{Color, Point, Rect, Size};
use crate::hit_test::handle_points;
use crate::overlay::{Overlay, OverlayKind};
use crate::raster::{pixmap_from_rgba, rgba_from_pixmap, BaseImage};
use crate::transform::ViewTransform;

const ARROW_HEAD_SPREAD: f64 = PI / 6.0;
/// Cubic control distance approximating a quarter circle.
const BEZIER_K: f64 = 0.552_284_749_8;
const PREVIEW_BACKGROUND: Color = Color::rgb(0x2B, 0x2B, 0x2B);
const SELECTION_COLOR: Color = Color::rgb(0x3D, 0x8B, 0xFF);
const CROP_DIM: Color = Color::rgba(0, 0, 0, 128);

/// Filled head of an arrow: the tip sits on the segment end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowHead {
    pub tip: Point,
    pub barb_left: Point,
    pub barb_right: Point,
}

impl ArrowHead {
    /// Where the shaft meets the head.
    pub fn base(&self) -> Point {
        Point::new(
            (self.barb_left.x + self.barb_right.x) / 2.0,
            (self.barb_left.y + self.barb_right.y) / 2.0,
        )
    }
}

pub fn arrow_head_length(stroke_width: f64) -> f64 {
    stroke_width.max(0.0) * 3.5 + 8.0
}

/// Head geometry for an arrow from `start` to `end`; `None` for a zero-length arrow.
pub fn arrow_head(start: Point, end: Point, stroke_width: f64) -> Option<ArrowHead> {
    let (dx, dy) = start.delta_to(end);
    if dx.hypot(dy) <= f64::EPSILON {
        return None;
    }
    let theta = dy.atan2(dx);
    let length = arrow_head_length(stroke_width);
    let barb = |angle: f64| Point::new(end.x - length * angle.cos(), end.y - length * angle.sin());
    Some(ArrowHead {
        tip: end,
        barb_left: barb(theta - ARROW_HEAD_SPREAD),
        barb_right: barb(theta + ARROW_HEAD_SPREAD),
    })
}

/// Output extent of a flattened export in image space: the crop rect when one
/// is set, else the image bounds joined with every overlay's paint bounds.
pub fn export_extent(
    base: Option<&BaseImage>,
    overlays: &[Overlay],
    crop: Option<Rect>,
) -> Option<Rect> {
    if let Some(crop) = crop {
        return (!crop.is_empty()).then_some(crop);
    }
    let extent = base
        .map(BaseImage::bounds)
        .into_iter()
        .chain(overlays.iter().map(Overlay::paint_bounds))
        .reduce(Rect::union)?;
    (!extent.is_empty()).then_some(extent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    /// Fill uncovered pixels with white instead of leaving them transparent.
    pub opaque: bool,
}

/// Everything the scene draw needs from the document.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub base: Option<&'a BaseImage>,
    /// Bumped whenever `base` is replaced; keys the cached base pixmap.
    pub base_generation: u64,
    pub overlays: &'a [Overlay],
}

/// Live-surface extras drawn after the scene, in view space.
#[derive(Clone, Copy, Default)]
pub struct Decorations<'a> {
    pub preview: Option<&'a Overlay>,
    pub selection: Option<&'a Overlay>,
    pub crop: Option<Rect>,
    pub handle_size: f64,
}

/// Owns the derived raster caches. Holds no authoritative document state.
#[derive(Default)]
pub struct Renderer {
    blur_cache: BlurCache,
    base_pixmap: Option<(u64, Pixmap)>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blur_cache(&self) -> &BlurCache {
        &self.blur_cache
    }

    pub fn blur_cache_mut(&mut self) -> &mut BlurCache {
        &mut self.blur_cache
    }

    /// Forgets every cached raster; used when the base image is replaced.
    pub fn clear_caches(&mut self) {
        self.blur_cache.clear();
        self.base_pixmap = None;
    }

    fn base_pixmap(&mut self, base: &BaseImage, generation: u64) -> Option<&Pixmap> {
        let stale = !matches!(&self.base_pixmap, Some((cached, _)) if *cached == generation);
        if stale {
            self.base_pixmap = pixmap_from_rgba(base.pixels()).map(|pixmap| (generation, pixmap));
        }
        self.base_pixmap.as_ref().map(|(_, pixmap)| pixmap)
    }

    /// Draws base image, blur patches, then vector overlays through `transform`
    /// (image space to target pixels).
    pub fn draw_scene(&mut self, pixmap: &mut Pixmap, scene: &Scene<'_>, transform: Transform) {
        let Some(base) = scene.base else {
            for overlay in scene.overlays.iter().filter(|overlay| !overlay.kind.is_blur()) {
                draw_overlay(pixmap, overlay, transform);
            }
            return;
        };
        let (scale_x, scale_y) = base.pixel_scale();
        let to_points = transform.pre_scale((1.0 / scale_x) as f32, (1.0 / scale_y) as f32);

        if let Some(base_pixmap) = self.base_pixmap(base, scene.base_generation) {
            pixmap.draw_pixmap(0, 0, base_pixmap.as_ref(), &image_paint(), to_points, None);
        } else {
            tracing::debug!("base image could not be converted; drawing overlays only");
        }

        self.blur_cache.retain_overlays(scene.overlays);
        for overlay in scene.overlays.iter().filter(|overlay| overlay.kind.is_blur()) {
            if let Some(patch) = self.blur_cache.patch_for(base, overlay) {
                draw_blur_patch(pixmap, &patch, to_points);
            }
        }
        for overlay in scene.overlays.iter().filter(|overlay| !overlay.kind.is_blur()) {
            draw_overlay(pixmap, overlay, transform);
        }
    }

    /// Frame for the live surface of `viewport` size.
    pub fn render_preview(
        &mut self,
        scene: &Scene<'_>,
        decorations: &Decorations<'_>,
        view: &ViewTransform,
        viewport: Size,
    ) -> Option<Pixmap> {
        let width = viewport.width.ceil().max(1.0) as u32;
        let height = viewport.height.ceil().max(1.0) as u32;
        let mut pixmap = Pixmap::new(width, height)?;
        pixmap.fill(PREVIEW_BACKGROUND.to_skia());

        let transform = view.to_skia();
        self.draw_scene(&mut pixmap, scene, transform);

        if let Some(preview) = decorations.preview {
            if preview.kind.is_blur() {
                if let Some(base) = scene.base {
                    let (scale_x, scale_y) = base.pixel_scale();
                    if let Some(patch) = render_blur(base, preview.frame, preview.style.blur_radius) {
                        let to_points =
                            transform.pre_scale((1.0 / scale_x) as f32, (1.0 / scale_y) as f32);
                        draw_blur_patch(&mut pixmap, &patch, to_points);
                    }
                }
                draw_outline(&mut pixmap, view.image_rect_to_view(preview.frame), SELECTION_COLOR);
            } else {
                draw_overlay(&mut pixmap, preview, transform);
            }
        }
        if let Some(selected) = decorations.selection {
            draw_selection(&mut pixmap, selected, view, decorations.handle_size);
        }
        if let Some(crop) = decorations.crop {
            draw_crop_dimming(&mut pixmap, view.image_rect_to_view(crop), viewport);
        }
        Some(pixmap)
    }

    /// Flattens the scene into a raster at the base image's pixel density.
    /// `None` for a zero-area extent or when the target cannot be allocated.
    pub fn export(
        &mut self,
        scene: &Scene<'_>,
        crop: Option<Rect>,
        options: ExportOptions,
    ) -> Option<RgbaImage> {
        let extent = export_extent(scene.base, scene.overlays, crop)?;
        let (scale_x, scale_y) = scene.base.map_or((1.0, 1.0), BaseImage::pixel_scale);
        let width = (extent.width * scale_x).round();
        let height = (extent.height * scale_y).round();
        if width < 1.0 || height < 1.0 {
            tracing::debug!(?extent, "export extent rounds to zero pixels");
            return None;
        }
        let Some(mut pixmap) = Pixmap::new(width as u32, height as u32) else {
            tracing::warn!(width, height, "export target could not be allocated");
            return None;
        };
        if options.opaque {
            pixmap.fill(Color::WHITE.to_skia());
        }
        let transform = Transform::from_scale(scale_x as f32, scale_y as f32)
            .pre_translate(-extent.x as f32, -extent.y as f32);
        self.draw_scene(&mut pixmap, scene, transform);
        rgba_from_pixmap(&pixmap)
    }
}

fn image_paint() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    }
}

fn draw_blur_patch(pixmap: &mut Pixmap, patch: &BlurPatch, to_points: Transform) {
    let rect = patch.pixel_rect();
    let transform = to_points.pre_translate(rect.x as f32, rect.y as f32);
    pixmap.draw_pixmap(0, 0, patch.pixmap().as_ref(), &image_paint(), transform, None);
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn stroke(width: f64, cap: LineCap) -> Stroke {
    Stroke {
        width: width as f32,
        line_cap: cap,
        line_join: LineJoin::Round,
        ..Stroke::default()
    }
}

fn has_stroke(overlay: &Overlay) -> bool {
    overlay.style.stroke_width > 0.0 && !overlay.style.stroke_color.is_transparent()
}

/// Vector draw of one overlay in image space. Blur overlays are composited
/// from raster patches by the scene draw and are skipped here.
pub fn draw_overlay(pixmap: &mut Pixmap, overlay: &Overlay, transform: Transform) {
    let style = &overlay.style;
    match overlay.kind {
        OverlayKind::Rectangle | OverlayKind::Ellipse => {
            let path = if overlay.kind == OverlayKind::Ellipse {
                ellipse_path(overlay.frame)
            } else {
                rect_path(overlay.frame, style.corner_radius)
            };
            let Some(path) = path else {
                return;
            };
            if !style.fill_color.is_transparent() {
                pixmap.fill_path(
                    &path,
                    &solid_paint(style.fill_color),
                    FillRule::Winding,
                    transform,
                    None,
                );
            }
            if has_stroke(overlay) {
                pixmap.stroke_path(
                    &path,
                    &solid_paint(style.stroke_color),
                    &stroke(style.stroke_width, LineCap::Butt),
                    transform,
                    None,
                );
            }
        }
        OverlayKind::Line => {
            let Some((start, end)) = overlay.endpoints() else {
                return;
            };
            if let Some(path) = segment_path(start, end) {
                if has_stroke(overlay) {
                    pixmap.stroke_path(
                        &path,
                        &solid_paint(style.stroke_color),
                        &stroke(style.stroke_width, LineCap::Round),
                        transform,
                        None,
                    );
                }
            }
        }
        OverlayKind::Arrow => {
            let Some((start, end)) = overlay.endpoints() else {
                return;
            };
            let Some(head) = arrow_head(start, end, style.stroke_width) else {
                return;
            };
            let paint = solid_paint(style.stroke_color);
            if let Some(shaft) = segment_path(start, head.base()) {
                if style.stroke_width > 0.0 {
                    pixmap.stroke_path(
                        &shaft,
                        &paint,
                        &stroke(style.stroke_width, LineCap::Round),
                        transform,
                        None,
                    );
                }
            }
            if let Some(path) = polygon_path(&[head.tip, head.barb_left, head.barb_right]) {
                pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
            }
        }
        OverlayKind::Text => {
            let content = overlay.text_content();
            if content.is_empty() {
                return;
            }
            let path = text::font_book().text_path(
                content,
                &style.font_name,
                style.font_size,
                overlay.frame.origin(),
            );
            if let Some(path) = path {
                pixmap.fill_path(
                    &path,
                    &solid_paint(style.stroke_color),
                    FillRule::Winding,
                    transform,
                    None,
                );
            }
        }
        OverlayKind::Blur => {}
    }
}

fn segment_path(start: Point, end: Point) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    builder.move_to(start.x as f32, start.y as f32);
    builder.line_to(end.x as f32, end.y as f32);
    builder.finish()
}

fn polygon_path(points: &[Point]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut builder = PathBuilder::new();
    builder.move_to(first.x as f32, first.y as f32);
    for point in rest {
        builder.line_to(point.x as f32, point.y as f32);
    }
    builder.close();
    builder.finish()
}

fn rect_path(rect: Rect, corner_radius: f64) -> Option<tiny_skia::Path> {
    if rect.is_empty() {
        return None;
    }
    let radius = corner_radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    if radius <= 0.0 {
        return polygon_path(&[
            rect.origin(),
            Point::new(rect.max_x(), rect.y),
            Point::new(rect.max_x(), rect.max_y()),
            Point::new(rect.x, rect.max_y()),
        ]);
    }

    let (left, top, right, bottom) = (
        rect.x as f32,
        rect.y as f32,
        rect.max_x() as f32,
        rect.max_y() as f32,
    );
    let r = radius as f32;
    let k = (radius * BEZIER_K) as f32;
    let mut builder = PathBuilder::new();
    builder.move_to(left + r, top);
    builder.line_to(right - r, top);
    builder.cubic_to(right - r + k, top, right, top + r - k, right, top + r);
    builder.line_to(right, bottom - r);
    builder.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    builder.line_to(left + r, bottom);
    builder.cubic_to(left + r - k, bottom, left, bottom - r + k, left, bottom - r);
    builder.line_to(left, top + r);
    builder.cubic_to(left, top + r - k, left + r - k, top, left + r, top);
    builder.close();
    builder.finish()
}

fn ellipse_path(rect: Rect) -> Option<tiny_skia::Path> {
    let oval = tiny_skia::Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )?;
    PathBuilder::from_oval(oval)
}

fn draw_outline(pixmap: &mut Pixmap, rect: Rect, color: Color) {
    if let Some(path) = rect_path(rect, 0.0) {
        pixmap.stroke_path(
            &path,
            &solid_paint(color),
            &stroke(1.0, LineCap::Butt),
            Transform::identity(),
            None,
        );
    }
}

fn draw_selection(pixmap: &mut Pixmap, overlay: &Overlay, view: &ViewTransform, handle_size: f64) {
    let frame = view.image_rect_to_view(overlay.frame);
    draw_outline(pixmap, frame, SELECTION_COLOR);

    let half = handle_size.max(1.0) / 2.0;
    for (_, center) in handle_points(frame) {
        let square = Rect::new(center.x - half, center.y - half, half * 2.0, half * 2.0);
        if let Some(path) = rect_path(square, 0.0) {
            pixmap.fill_path(
                &path,
                &solid_paint(Color::WHITE),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
            pixmap.stroke_path(
                &path,
                &solid_paint(SELECTION_COLOR),
                &stroke(1.0, LineCap::Butt),
                Transform::identity(),
                None,
            );
        }
    }
}

/// Darkens the viewport outside `crop` (view space) and outlines the crop.
fn draw_crop_dimming(pixmap: &mut Pixmap, crop: Rect, viewport: Size) {
    let mut builder = PathBuilder::new();
    for rect in [Rect::from_origin_size(Point::ZERO, viewport), crop] {
        builder.move_to(rect.x as f32, rect.y as f32);
        builder.line_to(rect.max_x() as f32, rect.y as f32);
        builder.line_to(rect.max_x() as f32, rect.max_y() as f32);
        builder.line_to(rect.x as f32, rect.max_y() as f32);
        builder.close();
    }
    if let Some(path) = builder.finish() {
        pixmap.fill_path(
            &path,
            &solid_paint(CROP_DIM),
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
    }
    draw_outline(pixmap, crop, Color::WHITE);
}
