//! Icon types: a single bitmap with its scale, and multi-resolution sets.
//!
//! Desktop icons come as a set of representations at different sizes. The
//! template pipeline works on one bitmap, so acquisition picks the
//! highest-fidelity representation from a set.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::error::Result;

/// A rectangle defined in pixel coordinates.
///
/// Used to specify regions within an image, such as the area a view is laid
/// out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RectPx {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a rectangle starting at origin (0, 0) with the given dimensions.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Shrinks the rectangle by `inset` pixels on every side.
    pub fn inset(&self, inset: u32) -> Self {
        let inset = inset.min(self.width / 2).min(self.height / 2);
        Self::new(
            self.x + inset,
            self.y + inset,
            self.width - inset * 2,
            self.height - inset * 2,
        )
    }
}

/// A single icon bitmap with its display scale.
#[derive(Debug, Clone, PartialEq)]
pub struct IconImage {
    /// The image data in RGBA format.
    pub data: RgbaImage,

    /// The display scale factor (1.0 for @1x, 2.0 for @2x...).
    ///
    /// The "logical" size of the icon is `dimensions / scale`.
    pub scale: f32,

    /// The region within the image that contains the actual icon content.
    pub content_bounds: RectPx,
}

impl IconImage {
    pub fn new(data: RgbaImage, scale: f32, content_bounds: RectPx) -> Self {
        Self {
            data,
            scale,
            content_bounds,
        }
    }

    /// Creates a new icon image assuming content fills the entire image.
    pub fn new_full_content(data: RgbaImage, scale: f32) -> Self {
        let content_bounds = RectPx::from_size(data.width(), data.height());
        Self::new(data, scale, content_bounds)
    }

    /// Decodes an encoded image (PNG, JPEG, ICNS-extracted PNG...) at @1x.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let data = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::new_full_content(data, 1.0))
    }

    /// Encodes the bitmap as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.data)
    }

    /// Pixel area, used to rank representations by fidelity.
    pub fn pixel_area(&self) -> u64 {
        u64::from(self.data.width()) * u64::from(self.data.height())
    }
}

/// Encodes an RGBA bitmap as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// A collection of images representing one icon at various sizes and scales.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IconSet {
    pub images: Vec<IconImage>,
}

impl IconSet {
    pub fn new() -> Self {
        Self { images: Vec::new() }
    }

    pub fn add_image(&mut self, image: IconImage) {
        self.images.push(image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The highest-fidelity representation: the one with the most pixels.
    ///
    /// Ties keep the first image added.
    pub fn best_representation(&self) -> Option<&IconImage> {
        self.images
            .iter()
            .rev()
            .max_by_key(|img| img.pixel_area())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rect_px_edges_and_inset() {
        let rect = RectPx::new(10, 20, 100, 200);
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 220);

        let inner = rect.inset(10);
        assert_eq!(inner, RectPx::new(20, 30, 80, 180));

        // Inset never underflows
        let collapsed = RectPx::from_size(10, 10).inset(50);
        assert_eq!(collapsed.width, 0);
    }

    #[test]
    fn best_representation_prefers_largest() {
        let mut set = IconSet::new();
        assert!(set.best_representation().is_none());

        set.add_image(IconImage::new_full_content(RgbaImage::new(16, 16), 1.0));
        set.add_image(IconImage::new_full_content(RgbaImage::new(512, 512), 1.0));
        set.add_image(IconImage::new_full_content(RgbaImage::new(32, 32), 2.0));

        assert_eq!(set.len(), 3);
        assert_eq!(set.best_representation().unwrap().data.width(), 512);
    }

    #[test]
    fn png_encode_decode() {
        let data = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));
        let icon = IconImage::new_full_content(data.clone(), 1.0);
        let decoded = IconImage::decode(&icon.to_png().unwrap()).unwrap();
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.content_bounds, RectPx::from_size(8, 4));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(IconImage::decode(b"not an image").is_err());
    }
}
