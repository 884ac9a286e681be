use crate::geometry::{Point, Rect};
use crate::hit_test::{apply_handle_resize, hit_test_handles, hit_test_overlays, ResizeHandle};
use crate::input::{PinchEvent, PointerEvent, ScrollEvent};
use crate::overlay::{Overlay, OverlayId, OverlayKind};
use crate::raster::BaseImage;

use super::{Canvas, InteractionState, TextSession, Tool};

/// Hit tolerance never shrinks below this many image units.
const MIN_HIT_TOLERANCE: f64 = 3.0;

impl Canvas {
    /// Hit-test tolerance in image units for the current zoom.
    pub fn hit_tolerance(&self) -> f64 {
        let scale = self.view_transform().total_scale();
        (self.config.hit_tolerance / scale).max(MIN_HIT_TOLERANCE)
    }

    fn to_image(&self, event: &PointerEvent) -> Point {
        self.view_transform().view_to_image(event.position)
    }

    fn selected_handle_at(&self, point: Point) -> Option<(OverlayId, ResizeHandle)> {
        let overlay = self.selected_overlay()?;
        let scale = self.view_transform().total_scale();
        hit_test_handles(overlay.frame, point, self.config.handle_hit_radius, scale)
            .map(|handle| (overlay.id, handle))
    }

    fn overlay_at(&self, point: Point) -> Option<OverlayId> {
        hit_test_overlays(self.document.overlays(), point, self.hit_tolerance())
    }

    pub fn pointer_down(&mut self, event: PointerEvent) {
        if !self.state.is_idle() {
            self.abort_gesture();
        }
        if self.text_session.is_some() {
            self.commit_text_session();
        }

        if self.tool == Tool::Grab || self.hold_to_pan {
            self.state = InteractionState::Panning {
                drag_start_view: event.position,
                original_pan: self.viewport.pan(),
            };
            tracing::debug!("panning started");
            return;
        }

        let point = self.to_image(&event);
        match self.tool {
            Tool::Select => {
                if event.click_count >= 2 && self.begin_text_edit_at(point) {
                    return;
                }
                if !self.begin_manipulation(point) {
                    self.select(None);
                }
            }
            Tool::Crop => {
                if self.document.base().is_some() {
                    self.state = InteractionState::DrawingCrop { anchor: point };
                }
            }
            Tool::Text => {
                if !self.begin_text_edit_at(point) {
                    self.selected = None;
                    self.text_session = Some(TextSession::new(point, self.style.clone()));
                    self.request_redraw();
                }
            }
            Tool::Rectangle | Tool::Ellipse | Tool::Line | Tool::Arrow | Tool::Blur => {
                if !self.begin_manipulation(point) {
                    self.select(None);
                    self.state = InteractionState::DrawingShape { anchor: point };
                }
            }
            Tool::Grab => {}
        }
        tracing::debug!(state = self.state.label(), tool = self.tool.label(), "pointer down");
    }

    /// Resize handle of the selection first, then any overlay under the point.
    fn begin_manipulation(&mut self, point: Point) -> bool {
        if let Some((id, handle)) = self.selected_handle_at(point) {
            return self.begin_resize(id, handle, point);
        }
        match self.overlay_at(point) {
            Some(id) => self.begin_move(id, point),
            None => false,
        }
    }

    fn begin_move(&mut self, id: OverlayId, drag_start: Point) -> bool {
        let Some(overlay) = self.document.overlay(id).cloned() else {
            return false;
        };
        self.state = InteractionState::MovingOverlay {
            id,
            drag_start,
            original_frame: overlay.frame,
            original_start: overlay.start,
            original_end: overlay.end,
        };
        self.drag_origin = Some(overlay);
        self.select(Some(id));
        true
    }

    fn begin_resize(&mut self, id: OverlayId, handle: ResizeHandle, drag_start: Point) -> bool {
        let Some(overlay) = self.document.overlay(id).cloned() else {
            return false;
        };
        self.state = InteractionState::ResizingOverlay {
            id,
            handle,
            drag_start,
            original_frame: overlay.frame,
        };
        self.drag_origin = Some(overlay);
        true
    }

    fn begin_text_edit_at(&mut self, point: Point) -> bool {
        let Some(overlay) = self
            .overlay_at(point)
            .and_then(|id| self.document.overlay(id))
            .filter(|overlay| overlay.kind == OverlayKind::Text)
        else {
            return false;
        };
        let session = TextSession::editing(overlay);
        self.selected = Some(overlay.id);
        self.text_session = Some(session);
        self.request_redraw();
        true
    }

    pub fn pointer_drag(&mut self, event: PointerEvent) {
        let point = self.to_image(&event);
        match self.state {
            InteractionState::Idle => return,
            InteractionState::Panning {
                drag_start_view,
                original_pan,
            } => {
                let (dx, dy) = drag_start_view.delta_to(event.position);
                self.viewport.set_pan(original_pan.offset(dx, dy));
            }
            InteractionState::DrawingShape { anchor } => {
                self.preview = self.shape_between(anchor, point);
            }
            InteractionState::DrawingCrop { anchor } => {
                let crop = self.crop_between(anchor, point);
                self.document.set_crop(crop);
            }
            InteractionState::MovingOverlay {
                id,
                drag_start,
                original_frame,
                original_start,
                original_end,
            } => {
                let (dx, dy) = drag_start.delta_to(point);
                self.update_overlay_live(id, |overlay| {
                    overlay.frame = original_frame.translate(dx, dy);
                    overlay.start = original_start.map(|start| start.offset(dx, dy));
                    overlay.end = original_end.map(|end| end.offset(dx, dy));
                });
            }
            InteractionState::ResizingOverlay {
                id,
                handle,
                drag_start,
                original_frame,
            } => {
                let delta = drag_start.delta_to(point);
                let frame =
                    apply_handle_resize(handle, delta, original_frame, self.config.min_resize_size);
                let Some(origin) = self.drag_origin.clone() else {
                    return;
                };
                self.update_overlay_live(id, move |overlay| {
                    *overlay = origin;
                    overlay.set_frame(frame);
                });
            }
        }
        self.request_redraw();
    }

    pub fn pointer_up(&mut self, event: PointerEvent) {
        self.pointer_drag(event);
        let state = std::mem::take(&mut self.state);
        match state {
            InteractionState::Idle | InteractionState::Panning { .. } => {}
            InteractionState::DrawingShape { .. } => self.commit_preview(),
            InteractionState::DrawingCrop { .. } => {
                tracing::debug!(crop = ?self.document.crop(), "crop pending confirmation");
            }
            InteractionState::MovingOverlay { id, .. } | InteractionState::ResizingOverlay { id, .. } => {
                if let Some(origin) = self.drag_origin.take() {
                    if self.document.register_overlay_undo(id, origin) {
                        tracing::debug!(overlay_id = %id, "drag recorded");
                    }
                }
            }
        }
        self.request_redraw();
    }

    /// Keeps the drawn shape unless it is an accidental micro-drag; lines and
    /// arrows are always kept.
    fn commit_preview(&mut self) {
        let Some(overlay) = self.preview.take() else {
            return;
        };
        let min = self.config.min_shape_size;
        let large_enough = overlay.frame.width >= min || overlay.frame.height >= min;
        if !(large_enough || overlay.kind.is_segment()) {
            tracing::debug!(kind = overlay.kind.label(), "discarding micro-drag");
            return;
        }
        let id = self.add_overlay(overlay);
        self.selected = Some(id);
    }

    fn shape_between(&self, anchor: Point, point: Point) -> Option<Overlay> {
        let kind = self.tool.shape_kind()?;
        let style = self.style.clone();
        let placeholder = OverlayId(0);
        Some(if kind.is_segment() {
            Overlay::segment(placeholder, kind, anchor, point, style)
        } else {
            Overlay::with_frame(placeholder, kind, Rect::from_corners(anchor, point), style)
        })
    }

    fn crop_between(&self, anchor: Point, point: Point) -> Option<Rect> {
        let bounds = self.document.base().map(BaseImage::bounds)?;
        Rect::from_corners(anchor, point).intersection(bounds)
    }

    /// Drops the in-flight gesture. A live move or resize is rolled back to
    /// its starting state without touching history.
    pub fn abort_gesture(&mut self) {
        let state = std::mem::take(&mut self.state);
        if let InteractionState::MovingOverlay { id, .. } | InteractionState::ResizingOverlay { id, .. } =
            state
        {
            if let Some(origin) = self.drag_origin.take() {
                self.update_overlay_live(id, move |overlay| *overlay = origin);
            }
        }
        self.drag_origin = None;
        if self.preview.take().is_some() {
            self.request_redraw();
        }
    }

    /// Wheel scrolling pans; with ctrl held it zooms one ladder step around
    /// the pointer.
    pub fn scroll(&mut self, event: ScrollEvent) {
        if event.modifiers.ctrl {
            if event.delta_y == 0.0 {
                return;
            }
            let zoom = if event.delta_y < 0.0 {
                self.viewport.next_zoom_in()
            } else {
                self.viewport.next_zoom_out()
            };
            self.zoom_to(zoom, event.position);
            return;
        }
        self.viewport.pan_by(-event.delta_x, -event.delta_y);
        self.request_redraw();
    }

    pub fn pinch(&mut self, event: PinchEvent) {
        if !(event.scale.is_finite() && event.scale > 0.0) {
            return;
        }
        let zoom = self.viewport.zoom() * event.scale;
        self.zoom_to(zoom, event.center);
    }
}
