//! The interactive canvas: owns the document, turns input into mutations and
//! exposes the operations surrounding UI code drives.

mod interaction;
mod keyboard;
mod text_session;
mod tool;

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tiny_skia::Pixmap;

pub use text_session::TextSession;
pub use tool::{InteractionState, Tool};

use crate::config::CanvasConfig;
use crate::document::{AppliedStep, Document};
use crate::error::{CanvasError, CanvasResult};
use crate::geometry::{Point, Rect, Size};
use crate::history::{DocumentState, UndoLog};
use crate::overlay::{Overlay, OverlayId, OverlayStyle};
use crate::raster::BaseImage;
use crate::render::text::init_font_book;
use crate::render::{Decorations, ExportOptions, Renderer, Scene};
use crate::transform::{ViewTransform, Viewport};

type RedrawSink = Box<dyn FnMut(u64)>;

pub struct Canvas {
    document: Document,
    renderer: Renderer,
    config: CanvasConfig,
    tool: Tool,
    selected: Option<OverlayId>,
    viewport: Viewport,
    viewport_size: Size,
    style: OverlayStyle,
    state: InteractionState,
    preview: Option<Overlay>,
    /// Overlay as it was when the current move or resize began.
    drag_origin: Option<Overlay>,
    hold_to_pan: bool,
    text_session: Option<TextSession>,
    frame_requests: u64,
    redraw: Option<RedrawSink>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("tool", &self.tool)
            .field("selected", &self.selected)
            .field("state", &self.state)
            .field("overlays", &self.document.overlays().len())
            .field("revision", &self.document.revision())
            .finish_non_exhaustive()
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}

impl Canvas {
    pub fn new(config: CanvasConfig) -> Self {
        init_font_book(&config.font_dirs, &config.default_font);
        Self {
            document: Document::with_history(UndoLog::new(config.history_limit)),
            renderer: Renderer::new(),
            tool: Tool::default(),
            selected: None,
            viewport: Viewport::new().with_zoom_bounds(config.zoom_min, config.zoom_max),
            viewport_size: Size::default(),
            style: config.default_style.clone(),
            state: InteractionState::Idle,
            preview: None,
            drag_origin: None,
            hold_to_pan: false,
            text_session: None,
            frame_requests: 0,
            redraw: None,
            config,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.state
    }

    pub fn preview_overlay(&self) -> Option<&Overlay> {
        self.preview.as_ref()
    }

    pub fn text_session(&self) -> Option<&TextSession> {
        self.text_session.as_ref()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport_size
    }

    pub fn style_template(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn set_style_template(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn is_hold_to_pan(&self) -> bool {
        self.hold_to_pan
    }

    /// Selected id, resolved against the current overlay sequence.
    pub fn selected(&self) -> Option<OverlayId> {
        self.selected.filter(|id| self.document.overlay(*id).is_some())
    }

    pub fn selected_overlay(&self) -> Option<&Overlay> {
        self.selected.and_then(|id| self.document.overlay(id))
    }

    pub fn select(&mut self, id: Option<OverlayId>) {
        let id = id.filter(|id| self.document.overlay(*id).is_some());
        if self.selected != id {
            self.selected = id;
            self.request_redraw();
        }
    }

    /// Installs the "request redraw" sink. It receives a monotonically
    /// increasing frame request number.
    pub fn set_redraw_sink(&mut self, sink: impl FnMut(u64) + 'static) {
        self.redraw = Some(Box::new(sink));
    }

    pub fn frame_requests(&self) -> u64 {
        self.frame_requests
    }

    pub(crate) fn request_redraw(&mut self) {
        self.frame_requests = self.frame_requests.wrapping_add(1);
        if let Some(sink) = self.redraw.as_mut() {
            sink(self.frame_requests);
        }
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        if self.viewport_size != size {
            self.viewport_size = size;
            self.request_redraw();
        }
    }

    pub fn view_transform(&self) -> ViewTransform {
        self.viewport
            .transform(self.viewport_size, self.document.base().map(BaseImage::size))
    }

    fn viewport_center(&self) -> Point {
        Point::new(self.viewport_size.width / 2.0, self.viewport_size.height / 2.0)
    }

    pub fn zoom_in(&mut self) {
        let zoom = self.viewport.next_zoom_in();
        self.zoom_to(zoom, self.viewport_center());
    }

    pub fn zoom_out(&mut self) {
        let zoom = self.viewport.next_zoom_out();
        self.zoom_to(zoom, self.viewport_center());
    }

    pub fn zoom_to_fit(&mut self) {
        self.viewport.reset();
        self.request_redraw();
    }

    /// Sets the zoom factor keeping the image point under `anchor` (view
    /// space) in place.
    pub fn zoom_to(&mut self, zoom: f64, anchor: Point) {
        let image = self.document.base().map(BaseImage::size);
        self.viewport
            .zoom_around(zoom, anchor, self.viewport_size, image);
        tracing::debug!(zoom = self.viewport.zoom(), "zoom changed");
        self.request_redraw();
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool == tool {
            return;
        }
        self.abort_gesture();
        if self.text_session.is_some() {
            self.commit_text_session();
        }
        if self.tool == Tool::Crop {
            self.cancel_crop();
        }
        tracing::debug!(from = self.tool.label(), to = tool.label(), "tool switched");
        self.tool = tool;
        self.request_redraw();
    }

    /// Appends an overlay on top (undoable) and returns its assigned id.
    pub fn add_overlay(&mut self, overlay: Overlay) -> OverlayId {
        let id = self.document.add_overlay(overlay);
        self.request_redraw();
        id
    }

    pub fn remove_overlay(&mut self, id: OverlayId) -> bool {
        if self.document.remove_overlay(id).is_none() {
            return false;
        }
        self.renderer.blur_cache_mut().invalidate(id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.request_redraw();
        true
    }

    /// Undo-tracked overlay mutation.
    pub fn update_overlay(&mut self, id: OverlayId, mutator: impl FnOnce(&mut Overlay)) -> bool {
        let changed = self.document.update_overlay(id, mutator);
        if changed {
            self.renderer.blur_cache_mut().invalidate(id);
            self.request_redraw();
        }
        changed
    }

    /// Mutation without an undo entry; finish with [`Canvas::register_overlay_undo`].
    pub fn update_overlay_live(&mut self, id: OverlayId, mutator: impl FnOnce(&mut Overlay)) -> bool {
        let updated = self.document.update_overlay_live(id, mutator);
        if updated {
            self.renderer.blur_cache_mut().invalidate(id);
            self.request_redraw();
        }
        updated
    }

    /// Records one undo step from `previous` to the overlay's current state.
    pub fn register_overlay_undo(&mut self, id: OverlayId, previous: Overlay) -> bool {
        self.document.register_overlay_undo(id, previous)
    }

    pub fn delete_selected_overlay(&mut self) -> bool {
        match self.selected() {
            Some(id) => self.remove_overlay(id),
            None => false,
        }
    }

    /// Restyles the selected overlay as one undo step and makes the style the
    /// template for new overlays.
    pub fn apply_style_to_selection(&mut self, style: OverlayStyle) -> bool {
        self.style = style.clone();
        let Some(id) = self.selected() else {
            return false;
        };
        self.update_overlay(id, |overlay| overlay.style = style)
    }

    /// Flattens image and overlays into the pending crop rect and makes the
    /// result the new base image. One undo step.
    pub fn commit_crop(&mut self) -> bool {
        let Some(crop) = self.document.crop() else {
            return false;
        };
        self.finish_pending_edits();
        let scene = Scene {
            base: self.document.base(),
            base_generation: self.document.image_generation(),
            overlays: self.document.overlays(),
        };
        let Some(pixels) = self
            .renderer
            .export(&scene, Some(crop), ExportOptions::default())
        else {
            tracing::warn!(?crop, "crop could not be rendered; keeping document");
            return false;
        };
        let base = BaseImage::with_point_size(pixels, crop.size());
        tracing::debug!(?crop, "crop committed");
        self.install_base("crop", base);
        true
    }

    /// Sets the pending crop directly, clamped to the image bounds. A rect
    /// fully outside the image clears it.
    pub fn set_crop(&mut self, crop: Option<Rect>) -> CanvasResult<()> {
        let bounds = self
            .document
            .base()
            .map(BaseImage::bounds)
            .ok_or(CanvasError::MissingImage)?;
        self.document
            .set_crop(crop.and_then(|rect| rect.intersection(bounds)));
        self.request_redraw();
        Ok(())
    }

    pub fn cancel_crop(&mut self) {
        if matches!(self.state, InteractionState::DrawingCrop { .. }) {
            self.state = InteractionState::Idle;
        }
        if self.document.crop().is_some() {
            self.document.set_crop(None);
            self.request_redraw();
        }
    }

    /// Import, paste or drop of a new base image. Existing overlays are
    /// dropped with the old image; the whole change is one undo step.
    pub fn replace_base_image(&mut self, base: BaseImage) {
        self.finish_pending_edits();
        self.install_base("replace image", base);
    }

    pub fn load_base_image(&mut self, path: &Path, pixel_density: f64) -> CanvasResult<()> {
        let pixels = image::open(path)?.into_rgba8();
        tracing::info!(?path, width = pixels.width(), height = pixels.height(), "base image loaded");
        self.replace_base_image(BaseImage::new(pixels, pixel_density));
        Ok(())
    }

    /// Ends the gesture and commits open text before the document is
    /// replaced wholesale, so the text lands in the outgoing document.
    fn finish_pending_edits(&mut self) {
        self.abort_gesture();
        if self.text_session.is_some() {
            self.commit_text_session();
        }
    }

    fn install_base(&mut self, label: &str, base: BaseImage) {
        self.document.replace_state(
            label,
            DocumentState {
                base: Some(Arc::new(base)),
                overlays: Vec::new(),
                crop: None,
            },
        );
        self.reset_after_document_change();
    }

    fn reset_after_document_change(&mut self) {
        self.renderer.clear_caches();
        self.viewport.reset();
        self.selected = None;
        self.preview = None;
        self.drag_origin = None;
        self.state = InteractionState::Idle;
        self.request_redraw();
    }

    pub fn undo(&mut self) -> bool {
        self.abort_gesture();
        let step = self.document.undo();
        self.after_history_step(step)
    }

    pub fn redo(&mut self) -> bool {
        self.abort_gesture();
        let step = self.document.redo();
        self.after_history_step(step)
    }

    fn after_history_step(&mut self, step: Option<AppliedStep>) -> bool {
        let Some(step) = step else {
            return false;
        };
        if step.document_scope {
            self.text_session = None;
            self.reset_after_document_change();
        } else {
            if let Some(id) = step.overlay {
                self.renderer.blur_cache_mut().invalidate(id);
            }
            let orphaned = self
                .text_session
                .as_ref()
                .and_then(TextSession::target)
                .is_some_and(|id| self.document.overlay(id).is_none());
            if orphaned {
                if let Some(session) = self.text_session.as_mut() {
                    session.detach();
                }
            }
            self.selected = self.selected();
            self.request_redraw();
        }
        true
    }

    /// Flattened raster of the document, or `None` for a zero-area extent.
    pub fn export(&mut self, options: ExportOptions) -> Option<RgbaImage> {
        let scene = Scene {
            base: self.document.base(),
            base_generation: self.document.image_generation(),
            overlays: self.document.overlays(),
        };
        self.renderer.export(&scene, self.document.crop(), options)
    }

    /// Writes the flattened export; the format follows the file extension.
    /// Nothing is written when there is nothing to export.
    pub fn export_to_path(&mut self, path: &Path, options: ExportOptions) -> CanvasResult<()> {
        let image = self.export(options).ok_or(CanvasError::EmptyExport)?;
        image.save(path)?;
        tracing::info!(?path, width = image.width(), height = image.height(), "export written");
        Ok(())
    }

    /// Renders the live surface at the current viewport size.
    pub fn render_preview(&mut self) -> Option<Pixmap> {
        let view = self.view_transform();
        let session_overlay = self.text_session.as_ref().map(TextSession::to_overlay);
        let editing = self.text_session.as_ref().and_then(TextSession::target);
        let overlays: Cow<'_, [Overlay]> = match editing {
            Some(id) => Cow::Owned(
                self.document
                    .overlays()
                    .iter()
                    .filter(|overlay| overlay.id != id)
                    .cloned()
                    .collect(),
            ),
            None => Cow::Borrowed(self.document.overlays()),
        };
        let scene = Scene {
            base: self.document.base(),
            base_generation: self.document.image_generation(),
            overlays: &overlays,
        };
        let decorations = Decorations {
            preview: self.preview.as_ref().or(session_overlay.as_ref()),
            selection: self.selected.and_then(|id| self.document.overlay(id)),
            crop: self.document.crop(),
            handle_size: self.config.handle_size,
        };
        self.renderer
            .render_preview(&scene, &decorations, &view, self.viewport_size)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::geometry::Color;
    use crate::overlay::OverlayKind;
    use image::Rgba;

    pub(super) fn canvas_with_image(width: u32, height: u32) -> Canvas {
        let mut canvas = Canvas::default();
        canvas.set_viewport_size(Size::new(f64::from(width), f64::from(height)));
        canvas.replace_base_image(BaseImage::from_pixels(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        )));
        canvas
    }

    fn rect_overlay(frame: Rect) -> Overlay {
        Overlay::with_frame(OverlayId(0), OverlayKind::Rectangle, frame, OverlayStyle::default())
    }

    #[test]
    fn redraw_sink_receives_increasing_requests() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut canvas = canvas_with_image(20, 20);
        let sink_seen = Rc::clone(&seen);
        canvas.set_redraw_sink(move |request| sink_seen.borrow_mut().push(request));
        canvas.add_overlay(rect_overlay(Rect::new(1.0, 1.0, 5.0, 5.0)));
        canvas.zoom_in();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen[0] < seen[1]);
    }

    #[test]
    fn selection_is_resolved_after_undo_removes_overlay() {
        let mut canvas = canvas_with_image(100, 100);
        let id = canvas.add_overlay(rect_overlay(Rect::new(10.0, 10.0, 20.0, 20.0)));
        canvas.select(Some(id));
        assert_eq!(canvas.selected(), Some(id));
        assert!(canvas.undo());
        assert_eq!(canvas.selected(), None);
        assert!(canvas.redo());
        assert!(canvas.document().overlay(id).is_some());
    }

    #[test]
    fn delete_selected_overlay_is_undoable() {
        let mut canvas = canvas_with_image(100, 100);
        let id = canvas.add_overlay(rect_overlay(Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!canvas.delete_selected_overlay());
        canvas.select(Some(id));
        assert!(canvas.delete_selected_overlay());
        assert!(canvas.document().overlays().is_empty());
        canvas.undo();
        assert_eq!(canvas.document().overlays().len(), 1);
    }

    #[test]
    fn style_edit_updates_selection_and_template_in_one_step() {
        let mut canvas = canvas_with_image(100, 100);
        let id = canvas.add_overlay(rect_overlay(Rect::new(10.0, 10.0, 20.0, 20.0)));
        canvas.select(Some(id));
        let style = OverlayStyle {
            stroke_color: Color::rgb(0, 128, 0),
            stroke_width: 6.0,
            ..OverlayStyle::default()
        };
        assert!(canvas.apply_style_to_selection(style.clone()));
        assert_eq!(canvas.style_template(), &style);
        assert_eq!(canvas.selected_overlay().map(|overlay| &overlay.style), Some(&style));

        canvas.undo();
        assert_eq!(
            canvas.selected_overlay().map(|overlay| overlay.style.stroke_width),
            Some(OverlayStyle::default().stroke_width)
        );
    }

    #[test]
    fn commit_crop_bakes_overlays_into_new_base_of_crop_size() {
        let mut canvas = canvas_with_image(200, 100);
        canvas.add_overlay(rect_overlay(Rect::new(10.0, 10.0, 20.0, 20.0)));
        canvas.document.set_crop(Some(Rect::new(5.0, 5.0, 60.0, 40.0)));

        assert!(canvas.commit_crop());
        assert!(canvas.document().overlays().is_empty());
        assert!(canvas.document().crop().is_none());
        let base = canvas.document().base().expect("cropped base");
        assert_eq!(base.size(), Size::new(60.0, 40.0));
        assert_eq!(base.pixel_size(), (60, 40));

        assert!(canvas.undo());
        assert_eq!(canvas.document().overlays().len(), 1);
        assert_eq!(canvas.document().base().map(BaseImage::pixel_size), Some((200, 100)));
    }

    #[test]
    fn set_crop_clamps_to_image_and_needs_a_base() {
        let mut canvas = canvas_with_image(100, 50);
        canvas
            .set_crop(Some(Rect::new(80.0, 30.0, 50.0, 50.0)))
            .expect("crop set");
        assert_eq!(canvas.document().crop(), Some(Rect::new(80.0, 30.0, 20.0, 20.0)));
        canvas
            .set_crop(Some(Rect::new(200.0, 200.0, 5.0, 5.0)))
            .expect("crop cleared");
        assert_eq!(canvas.document().crop(), None);

        let mut empty = Canvas::default();
        assert!(matches!(
            empty.set_crop(Some(Rect::new(0.0, 0.0, 5.0, 5.0))),
            Err(CanvasError::MissingImage)
        ));
    }

    #[test]
    fn commit_crop_without_pending_crop_is_a_no_op() {
        let mut canvas = canvas_with_image(50, 50);
        assert!(!canvas.commit_crop());
        assert_eq!(canvas.document().history().undo_depth(), 1);
    }

    #[test]
    fn base_replacement_resets_view_and_selection() {
        let mut canvas = canvas_with_image(100, 100);
        let id = canvas.add_overlay(rect_overlay(Rect::new(10.0, 10.0, 20.0, 20.0)));
        canvas.select(Some(id));
        canvas.zoom_in();
        canvas.replace_base_image(BaseImage::from_pixels(RgbaImage::new(40, 30)));
        assert_eq!(canvas.selected(), None);
        assert_eq!(canvas.viewport().zoom(), 1.0);
        assert_eq!(canvas.viewport().pan(), Point::ZERO);
        assert!(canvas.document().overlays().is_empty());

        assert!(canvas.undo());
        assert_eq!(canvas.document().overlays().len(), 1);
    }

    #[test]
    fn export_to_path_writes_png_and_rejects_empty_documents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.png");

        let mut empty = Canvas::default();
        let err = empty
            .export_to_path(&path, ExportOptions::default())
            .expect_err("empty document");
        assert!(matches!(err, CanvasError::EmptyExport));
        assert!(!path.exists());

        let mut canvas = canvas_with_image(30, 20);
        canvas
            .export_to_path(&path, ExportOptions::default())
            .expect("export written");
        let written = image::open(&path).expect("png readable");
        assert_eq!((written.width(), written.height()), (30, 20));
    }

    #[test]
    fn load_base_image_reads_file_with_pixel_density() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("in.png");
        RgbaImage::from_pixel(64, 32, Rgba([1, 2, 3, 255]))
            .save(&path)
            .expect("png written");

        let mut canvas = Canvas::default();
        canvas.load_base_image(&path, 2.0).expect("image loaded");
        assert_eq!(
            canvas.document().base().map(BaseImage::size),
            Some(Size::new(32.0, 16.0))
        );
        assert!(canvas
            .load_base_image(&dir.path().join("missing.png"), 1.0)
            .is_err());
    }

    #[test]
    fn preview_renders_at_viewport_size() {
        let mut canvas = canvas_with_image(40, 30);
        canvas.set_viewport_size(Size::new(80.0, 50.0));
        let frame = canvas.render_preview().expect("preview frame");
        assert_eq!((frame.width(), frame.height()), (80, 50));
    }
}
