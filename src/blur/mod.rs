//! Region blur: samples the base raster under a rect, blurs it with edge
//! replication and keeps one cached patch per blur overlay.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Mutex, OnceLock};

use image::{imageops, RgbaImage};
use tiny_skia::Pixmap;

use crate::geometry::Rect;
use crate::overlay::{Overlay, OverlayId};
use crate::raster::{pixmap_from_rgba, BaseImage};

/// Gaussian support is cut off at three standard deviations.
const BLUR_MARGIN_SIGMAS: f64 = 3.0;

/// Integer rect in base-raster pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct BlurPatch {
    pixel_rect: PixelRect,
    radius_px: f32,
    pixmap: Pixmap,
}

impl BlurPatch {
    /// Region of the base raster the patch was sampled from.
    pub fn pixel_rect(&self) -> PixelRect {
        self.pixel_rect
    }

    /// Blur strength in raster pixels after density scaling.
    pub fn radius_px(&self) -> f32 {
        self.radius_px
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

/// Converts an image-space rect to the raster's pixel grid, expanding outward
/// to whole pixels and clipping to the raster extent.
pub fn pixel_rect_for(base: &BaseImage, rect: Rect) -> Option<PixelRect> {
    let (scale_x, scale_y) = base.pixel_scale();
    let (width, height) = base.pixel_size();
    let left = (rect.x * scale_x).floor().max(0.0);
    let top = (rect.y * scale_y).floor().max(0.0);
    let right = (rect.max_x() * scale_x).ceil().min(f64::from(width));
    let bottom = (rect.max_y() * scale_y).ceil().min(f64::from(height));
    if !(right > left && bottom > top) {
        return None;
    }
    Some(PixelRect {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

/// Blurs the part of `base` under `rect` (image space). `radius` is in image
/// units and is scaled by the larger pixel density axis. Returns `None` when
/// the rect does not cover any source pixels.
pub fn render_blur(base: &BaseImage, rect: Rect, radius: f64) -> Option<BlurPatch> {
    let pixel_rect = pixel_rect_for(base, rect)?;
    let (scale_x, scale_y) = base.pixel_scale();
    let radius_px = (radius.max(0.0) * scale_x.max(scale_y)) as f32;

    let region = if radius_px > 0.0 {
        blur_context().blur_region(base.pixels(), pixel_rect, radius_px)?
    } else {
        imageops::crop_imm(
            base.pixels(),
            pixel_rect.x,
            pixel_rect.y,
            pixel_rect.width,
            pixel_rect.height,
        )
        .to_image()
    };

    let Some(pixmap) = pixmap_from_rgba(&region) else {
        tracing::debug!(?pixel_rect, "blur patch could not be converted to a pixmap");
        return None;
    };
    Some(BlurPatch {
        pixel_rect,
        radius_px,
        pixmap,
    })
}

/// Process-wide blur resources, created on first use and shared by every
/// blur call. Keeps the edge-padded staging buffer alive between calls.
#[derive(Debug)]
pub struct BlurContext {
    staging: Mutex<Vec<u8>>,
}

static BLUR_CONTEXT: OnceLock<BlurContext> = OnceLock::new();

pub fn blur_context() -> &'static BlurContext {
    BLUR_CONTEXT.get_or_init(|| {
        tracing::debug!("blur context initialized");
        BlurContext {
            staging: Mutex::new(Vec::new()),
        }
    })
}

impl BlurContext {
    /// Gaussian blur of `rect` within `source`. Pixels outside the raster
    /// replicate the nearest border pixel.
    pub fn blur_region(&self, source: &RgbaImage, rect: PixelRect, sigma: f32) -> Option<RgbaImage> {
        let (source_width, source_height) = source.dimensions();
        if source_width == 0 || source_height == 0 {
            return None;
        }
        let margin = (f64::from(sigma) * BLUR_MARGIN_SIGMAS).ceil() as u32;
        let margin = margin.min(source_width.max(source_height));
        let padded_width = rect.width + margin * 2;
        let padded_height = rect.height + margin * 2;

        let mut buffer = self
            .staging
            .lock()
            .map(|mut staging| std::mem::take(&mut *staging))
            .unwrap_or_default();
        buffer.clear();
        buffer.reserve(padded_width as usize * padded_height as usize * 4);
        for y in 0..padded_height {
            let source_y = (i64::from(rect.y) + i64::from(y) - i64::from(margin))
                .clamp(0, i64::from(source_height) - 1) as u32;
            for x in 0..padded_width {
                let source_x = (i64::from(rect.x) + i64::from(x) - i64::from(margin))
                    .clamp(0, i64::from(source_width) - 1) as u32;
                buffer.extend_from_slice(&source.get_pixel(source_x, source_y).0);
            }
        }

        let padded = RgbaImage::from_raw(padded_width, padded_height, buffer)?;
        let blurred = imageops::blur(&padded, sigma);
        let region = imageops::crop_imm(&blurred, margin, margin, rect.width, rect.height).to_image();
        if let Ok(mut staging) = self.staging.lock() {
            *staging = padded.into_raw();
        }
        Some(region)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BlurKey {
    rect: Rect,
    radius: f64,
}

#[derive(Debug)]
struct BlurEntry {
    key: BlurKey,
    patch: Rc<BlurPatch>,
}

/// At most one patch per overlay id, valid only while the overlay's frame and
/// radius match the key it was rendered with.
#[derive(Debug, Default)]
pub struct BlurCache {
    entries: HashMap<OverlayId, BlurEntry>,
}

impl BlurCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached patch for `overlay`, re-rendering when its geometry or radius
    /// changed since the last call.
    pub fn patch_for(&mut self, base: &BaseImage, overlay: &Overlay) -> Option<Rc<BlurPatch>> {
        let key = BlurKey {
            rect: overlay.frame,
            radius: overlay.style.blur_radius,
        };
        if let Some(entry) = self.entries.get(&overlay.id) {
            if entry.key == key {
                return Some(Rc::clone(&entry.patch));
            }
        }

        let Some(patch) = render_blur(base, key.rect, key.radius) else {
            self.entries.remove(&overlay.id);
            tracing::debug!(overlay_id = %overlay.id, rect = ?key.rect, "blur patch unavailable; skipping");
            return None;
        };
        let patch = Rc::new(patch);
        self.entries.insert(
            overlay.id,
            BlurEntry {
                key,
                patch: Rc::clone(&patch),
            },
        );
        Some(patch)
    }

    pub fn invalidate(&mut self, id: OverlayId) {
        self.entries.remove(&id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries for overlays no longer in the document.
    pub fn retain_overlays(&mut self, overlays: &[Overlay]) {
        self.entries
            .retain(|id, _| overlays.iter().any(|overlay| overlay.id == *id));
    }

    pub fn contains(&self, id: OverlayId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
