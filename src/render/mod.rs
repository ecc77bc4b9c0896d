//! Rasterization of view trees.
//!
//! [`Rasterizer`] walks a [`View`] back to front and paints onto a square
//! canvas. Effect nodes render their content into a separate layer, apply
//! the effect, then composite the layer.
//!
//! # Render Context
//!
//! Nodes communicate through a typed property bag on [`RenderContext`]:
//! color effects emit a [`DominantColor`] sampled from their output, and
//! decals drawn later consume it to pick their tint. Without an upstream
//! emitter a decal samples the canvas underneath itself.

pub mod color;
pub mod svg;
pub mod text;

use std::any::{Any, TypeId};
use std::collections::HashMap;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::error::Result;
use crate::icon::{IconImage, RectPx};
use crate::view::{CANONICAL_SIZE, ColorScheme, Position, View};

/// Lightness removed from the dominant color to tint decals.
const DECAL_DARKEN: f32 = 0.15;

/// State threaded through one rasterization.
pub struct RenderContext {
    /// The canvas being painted.
    pub canvas: RgbaImage,

    /// Scheme semantic colors resolve against.
    pub scheme: ColorScheme,

    properties: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RenderContext {
    pub fn new(size: u32, scheme: ColorScheme) -> Self {
        Self {
            canvas: RgbaImage::new(size, size),
            scheme,
            properties: HashMap::new(),
        }
    }

    /// Sets a typed property that later nodes can read.
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) {
        self.properties.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Gets a typed property set by an earlier node.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.properties
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref())
    }

    /// Runs `paint` against a fresh transparent canvas and returns it,
    /// leaving the current canvas untouched.
    fn layer(&mut self, paint: impl FnOnce(&mut Self) -> Result<()>) -> Result<RgbaImage> {
        let (width, height) = self.canvas.dimensions();
        let saved = std::mem::replace(&mut self.canvas, RgbaImage::new(width, height));
        let painted = paint(self);
        let layer = std::mem::replace(&mut self.canvas, saved);
        painted.map(|()| layer)
    }
}

/// The dominant color of the most recent color effect's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DominantColor(pub [u8; 4]);

/// Paints view trees into square bitmaps.
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    size: u32,
    scheme: ColorScheme,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer {
    /// A rasterizer at the canonical size with the light scheme forced.
    pub fn new() -> Self {
        Self {
            size: CANONICAL_SIZE,
            scheme: ColorScheme::Light,
        }
    }

    /// Renders at another size; view coordinates scale proportionally.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Maps canonical units to output pixels.
    fn factor(&self) -> f32 {
        self.size as f32 / CANONICAL_SIZE as f32
    }

    /// Renders `view` with `icon` as the base image.
    pub fn render(&self, view: &View, icon: &IconImage) -> Result<IconImage> {
        let mut ctx = RenderContext::new(self.size, self.scheme);
        let frame = RectPx::from_size(self.size, self.size);
        self.draw(view, icon, frame, &mut ctx)?;
        trace!(nodes = view.node_count(), size = self.size, "rasterized view");
        Ok(IconImage::new_full_content(ctx.canvas, 1.0))
    }

    fn draw(&self, view: &View, icon: &IconImage, frame: RectPx, ctx: &mut RenderContext) -> Result<()> {
        match view {
            View::Icon => {
                draw_icon(&mut ctx.canvas, icon, frame);
            }
            View::Fill { color } => {
                let fill = Rgba(color.resolve(ctx.scheme));
                for y in frame.y..frame.bottom().min(ctx.canvas.height()) {
                    for x in frame.x..frame.right().min(ctx.canvas.width()) {
                        let dst = ctx.canvas.get_pixel_mut(x, y);
                        *dst = svg::alpha_blend(fill, *dst);
                    }
                }
            }
            View::Stack { children } => {
                for child in children {
                    self.draw(child, icon, frame, ctx)?;
                }
            }
            View::Svg {
                source,
                position,
                scale,
            } => {
                let size = (frame.width.min(frame.height) as f32 * scale.clamp(0.0, 1.0)) as u32;
                if size == 0 {
                    return Ok(());
                }
                let overlay = svg::render_svg(&svg::resolve(source)?, size)?;
                let (x, y) = place(frame, *position, overlay.width(), overlay.height());
                svg::composite_over(&mut ctx.canvas, &overlay, x, y);
            }
            View::Decal { source, scale } => {
                let size = (frame.width.min(frame.height) as f32 * scale.clamp(0.0, 1.0)) as u32;
                if size == 0 {
                    return Ok(());
                }
                let dominant = ctx
                    .get::<DominantColor>()
                    .map(|c| c.0)
                    .unwrap_or_else(|| color::sample_dominant_color(&ctx.canvas, frame));
                let tint = color::darken_color(dominant, DECAL_DARKEN);
                let decal = svg::render_svg_with_color(&svg::resolve(source)?, size, Some(tint))?;
                let (x, y) = place(frame, Position::Center, decal.width(), decal.height());
                svg::composite_over(&mut ctx.canvas, &decal, x, y);
            }
            View::Text(text_view) => {
                text::draw_text(&mut ctx.canvas, text_view, frame, ctx.scheme, self.factor())?;
            }
            View::HueRotation { degrees, content } => {
                let mut layer = ctx.layer(|ctx| self.draw(content, icon, frame, ctx))?;
                color::hue_rotate(&mut layer, *degrees);
                ctx.set(DominantColor(color::sample_dominant_color(&layer, frame)));
                svg::composite_over(&mut ctx.canvas, &layer, 0, 0);
            }
            View::Hue { color: hue, content } => {
                let mut layer = ctx.layer(|ctx| self.draw(content, icon, frame, ctx))?;
                color::hue_blend(&mut layer, hue.resolve(ctx.scheme));
                ctx.set(DominantColor(color::sample_dominant_color(&layer, frame)));
                svg::composite_over(&mut ctx.canvas, &layer, 0, 0);
            }
            View::Grayscale { amount, content } => {
                let mut layer = ctx.layer(|ctx| self.draw(content, icon, frame, ctx))?;
                color::grayscale(&mut layer, *amount);
                svg::composite_over(&mut ctx.canvas, &layer, 0, 0);
            }
            View::Opacity { value, content } => {
                let mut layer = ctx.layer(|ctx| self.draw(content, icon, frame, ctx))?;
                color::opacity(&mut layer, *value);
                svg::composite_over(&mut ctx.canvas, &layer, 0, 0);
            }
            View::Padding { amount, content } => {
                let inset = (*amount as f32 * self.factor()).round() as u32;
                self.draw(content, icon, frame.inset(inset), ctx)?;
            }
        }
        Ok(())
    }
}

/// Scales the icon to fit `frame` preserving aspect ratio, centred.
fn draw_icon(canvas: &mut RgbaImage, icon: &IconImage, frame: RectPx) {
    let (width, height) = icon.data.dimensions();
    if width == 0 || height == 0 || frame.width == 0 || frame.height == 0 {
        return;
    }
    let scale = (frame.width as f32 / width as f32).min(frame.height as f32 / height as f32);
    let target_w = ((width as f32 * scale).round() as u32).max(1);
    let target_h = ((height as f32 * scale).round() as u32).max(1);

    let (x, y) = place(frame, Position::Center, target_w, target_h);
    if (target_w, target_h) == (width, height) {
        svg::composite_over(canvas, &icon.data, x, y);
    } else {
        let resized = imageops::resize(&icon.data, target_w, target_h, FilterType::Lanczos3);
        svg::composite_over(canvas, &resized, x, y);
    }
}

/// Top-left corner for an item of the given size at `position` in `frame`.
fn place(frame: RectPx, position: Position, width: u32, height: u32) -> (i32, i32) {
    let bx = frame.x as i32;
    let by = frame.y as i32;
    let bw = frame.width as i32;
    let bh = frame.height as i32;
    let ow = width as i32;
    let oh = height as i32;

    match position {
        Position::TopLeft => (bx, by),
        Position::TopRight => (bx + bw - ow, by),
        Position::BottomLeft => (bx, by + bh - oh),
        Position::BottomRight => (bx + bw - ow, by + bh - oh),
        Position::Center => (bx + (bw - ow) / 2, by + (bh - oh) / 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Color, SvgSpec};

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="#ffffff"/></svg>"##;

    fn red_icon(size: u32) -> IconImage {
        IconImage::new_full_content(RgbaImage::from_pixel(size, size, Rgba([255, 0, 0, 255])), 1.0)
    }

    #[test]
    fn icon_is_scaled_to_canonical_size() {
        let out = Rasterizer::new().render(&View::Icon, &red_icon(16)).unwrap();
        assert_eq!(out.data.dimensions(), (1024, 1024));
        assert_eq!(out.data.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.data.get_pixel(1023, 1023).0, [255, 0, 0, 255]);
    }

    #[test]
    fn wide_icon_is_letterboxed() {
        let icon = IconImage::new_full_content(
            RgbaImage::from_pixel(20, 10, Rgba([0, 0, 255, 255])),
            1.0,
        );
        let out = Rasterizer::new().with_size(100).render(&View::Icon, &icon).unwrap();
        assert_eq!(out.data.get_pixel(50, 10).0[3], 0);
        assert_eq!(out.data.get_pixel(50, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn padding_insets_the_frame() {
        let view = View::Padding {
            amount: 256,
            content: Box::new(View::Icon),
        };
        let out = Rasterizer::new().with_size(64).render(&view, &red_icon(8)).unwrap();
        // 256 canonical units is a quarter of the edge
        assert_eq!(out.data.get_pixel(10, 10).0[3], 0);
        assert_eq!(out.data.get_pixel(32, 32).0, [255, 0, 0, 255]);
    }

    #[test]
    fn stack_draws_back_to_front() {
        let view = View::stack([
            View::Icon,
            View::Fill {
                color: Color::Rgba([0, 255, 0, 255]),
            },
        ]);
        let out = Rasterizer::new().with_size(8).render(&view, &red_icon(8)).unwrap();
        assert_eq!(out.data.get_pixel(4, 4).0, [0, 255, 0, 255]);
    }

    #[test]
    fn primary_fill_uses_light_scheme() {
        let view = View::Fill {
            color: Color::Primary,
        };
        let out = Rasterizer::new().with_size(4).render(&view, &red_icon(4)).unwrap();
        assert_eq!(out.data.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn effects_apply_only_to_their_content() {
        let view = View::stack([
            View::Fill {
                color: Color::Rgba([255, 0, 0, 255]),
            },
            View::Grayscale {
                amount: 1.0,
                content: Box::new(View::Padding {
                    amount: 256,
                    content: Box::new(View::Fill {
                        color: Color::Rgba([0, 0, 255, 255]),
                    }),
                }),
            },
        ]);
        let out = Rasterizer::new().with_size(64).render(&view, &red_icon(4)).unwrap();
        assert_eq!(out.data.get_pixel(2, 2).0, [255, 0, 0, 255]);
        let [r, g, b, _] = out.data.get_pixel(32, 32).0;
        assert_eq!((r, g), (g, b));
    }

    #[test]
    fn hue_emits_dominant_color_for_decal() {
        let view = View::stack([
            View::Hue {
                color: Color::Blue,
                content: Box::new(View::Icon),
            },
            View::Decal {
                source: SvgSpec::Markup(SQUARE.into()),
                scale: 0.5,
            },
        ]);
        let out = Rasterizer::new().with_size(64).render(&view, &red_icon(64)).unwrap();
        let corner = out.data.get_pixel(1, 1).0;
        let centre = out.data.get_pixel(32, 32).0;
        assert!(corner[2] > corner[0], "hue should turn the icon blue");
        // The white decal is recolored to a darker shade of the icon
        assert!(centre[2] < corner[2] || centre[0] < corner[0]);
        assert_ne!(centre, [255, 255, 255, 255]);
    }

    #[test]
    fn svg_overlay_positions() {
        let view = View::Svg {
            source: SvgSpec::Markup(SQUARE.into()),
            position: Position::BottomRight,
            scale: 0.25,
        };
        let out = Rasterizer::new().with_size(64).render(&view, &red_icon(1)).unwrap();
        assert_eq!(out.data.get_pixel(63, 63).0, [255, 255, 255, 255]);
        assert_eq!(out.data.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn opacity_scales_content_alpha() {
        let view = View::Opacity {
            value: 0.5,
            content: Box::new(View::Icon),
        };
        let out = Rasterizer::new().with_size(4).render(&view, &red_icon(4)).unwrap();
        assert_eq!(out.data.get_pixel(1, 1).0, [255, 0, 0, 128]);
    }

    #[test]
    fn render_context_properties() {
        let mut ctx = RenderContext::new(1, ColorScheme::Light);
        assert_eq!(ctx.get::<DominantColor>(), None);
        ctx.set(DominantColor([1, 2, 3, 4]));
        assert_eq!(ctx.get::<DominantColor>(), Some(&DominantColor([1, 2, 3, 4])));
    }
}
