//! Base raster and conversions between straight-alpha `RgbaImage` buffers and
//! premultiplied `tiny_skia::Pixmap` surfaces.

use image::RgbaImage;
use tiny_skia::{ColorU8, IntSize, Pixmap};

use crate::geometry::{Rect, Size};

/// The image being annotated. `size` is the point-space extent overlays are
/// placed in; the pixel buffer may be denser (e.g. 2x on high-density displays).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseImage {
    pixels: RgbaImage,
    size: Size,
}

impl BaseImage {
    /// Wraps `pixels` whose point size is the pixel size divided by `pixel_density`.
    pub fn new(pixels: RgbaImage, pixel_density: f64) -> Self {
        let density = if pixel_density.is_finite() && pixel_density > 0.0 {
            pixel_density
        } else {
            1.0
        };
        let size = Size::new(
            f64::from(pixels.width()) / density,
            f64::from(pixels.height()) / density,
        );
        Self { pixels, size }
    }

    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self::new(pixels, 1.0)
    }

    pub fn with_point_size(pixels: RgbaImage, size: Size) -> Self {
        Self { pixels, size }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(crate::geometry::Point::ZERO, self.size)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Independent `(pixel / point)` factors for each axis.
    pub fn pixel_scale(&self) -> (f64, f64) {
        let (width, height) = self.pixel_size();
        let scale_x = if self.size.width > 0.0 {
            f64::from(width) / self.size.width
        } else {
            1.0
        };
        let scale_y = if self.size.height > 0.0 {
            f64::from(height) / self.size.height
        } else {
            1.0
        };
        (scale_x, scale_y)
    }
}

pub fn pixmap_from_rgba(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        let premultiplied = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[
            premultiplied.red(),
            premultiplied.green(),
            premultiplied.blue(),
            premultiplied.alpha(),
        ]);
    }
    Pixmap::from_vec(data, size)
}

pub fn rgba_from_pixmap(pixmap: &Pixmap) -> Option<RgbaImage> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_density_divides_point_size() {
        let base = BaseImage::new(RgbaImage::new(1600, 1200), 2.0);
        assert_eq!(base.size(), Size::new(800.0, 600.0));
        assert_eq!(base.pixel_scale(), (2.0, 2.0));
    }

    #[test]
    fn invalid_density_falls_back_to_one() {
        let base = BaseImage::new(RgbaImage::new(10, 20), 0.0);
        assert_eq!(base.size(), Size::new(10.0, 20.0));
    }

    #[test]
    fn pixmap_conversion_preserves_opaque_and_clear_pixels() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([200, 100, 50, 255]));
        image.put_pixel(1, 0, image::Rgba([0, 0, 0, 0]));
        let pixmap = pixmap_from_rgba(&image).expect("pixmap");
        let back = rgba_from_pixmap(&pixmap).expect("image");
        assert_eq!(back, image);
    }

    #[test]
    fn empty_image_has_no_pixmap() {
        assert!(pixmap_from_rgba(&RgbaImage::new(0, 5)).is_none());
    }
}
