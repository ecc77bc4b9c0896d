//! SVG rasterization and compositing using resvg/usvg.
//!
//! Shared by the overlay, decal and text nodes of the rasterizer.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree, fontdb};

use crate::error::{NewIconError, Result};
use crate::view::SvgSpec;

/// Resolves an SVG source to markup.
///
/// Emoji sources need the `twemoji` feature; without it, or for characters
/// Twemoji does not cover, this is a render error.
pub fn resolve(spec: &SvgSpec) -> Result<Cow<'_, str>> {
    match spec {
        SvgSpec::Markup(svg) => Ok(Cow::Borrowed(svg.as_str())),
        #[cfg(feature = "twemoji")]
        SvgSpec::Emoji(emoji) => {
            use twemoji_assets::svg::SvgTwemojiAsset;
            let asset = SvgTwemojiAsset::from_emoji(emoji)
                .ok_or_else(|| NewIconError::Render(format!("unsupported emoji {emoji:?}")))?;
            Ok(Cow::Owned(asset.as_ref().to_string()))
        }
        #[cfg(not(feature = "twemoji"))]
        SvgSpec::Emoji(emoji) => Err(NewIconError::Render(format!(
            "emoji {emoji:?} needs the `twemoji` feature"
        ))),
    }
}

/// Parse options with the system font database loaded once per process.
pub(crate) fn options() -> Options<'static> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

    let mut opts = Options::default();
    opts.fontdb = FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            tracing::debug!(faces = db.len(), "loaded system fonts");
            Arc::new(db)
        })
        .clone();
    opts
}

fn parse(svg_data: &str) -> Result<Tree> {
    Tree::from_str(svg_data, &options())
        .map_err(|e| NewIconError::Render(format!("invalid SVG: {e}")))
}

/// Renders an SVG string scaled to fit within `size x size` pixels,
/// preserving aspect ratio.
pub fn render_svg(svg_data: &str, size: u32) -> Result<RgbaImage> {
    render_svg_with_color(svg_data, size, None)
}

/// Renders an SVG string, optionally replacing every fill and stroke color.
///
/// Color replacement turns a monochrome glyph into a tinted decal.
pub fn render_svg_with_color(
    svg_data: &str,
    size: u32,
    fill_color: Option<[u8; 4]>,
) -> Result<RgbaImage> {
    let svg_data = match fill_color {
        Some([r, g, b, _]) => Cow::Owned(replace_svg_colors(svg_data, r, g, b)),
        None => Cow::Borrowed(svg_data),
    };

    let tree = parse(&svg_data)?;

    let svg_size = tree.size();
    let scale = size as f32 / svg_size.width().max(svg_size.height());
    let width = ((svg_size.width() * scale).ceil() as u32).max(1);
    let height = ((svg_size.height() * scale).ceil() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| NewIconError::Render(format!("cannot allocate {width}x{height} pixmap")))?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    Ok(pixmap_to_rgba_image(&pixmap))
}

/// Renders a document at its own pixel size, without scaling.
pub fn render_document(svg_data: &str) -> Result<RgbaImage> {
    let tree = parse(svg_data)?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| NewIconError::Render("cannot allocate pixmap".into()))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap_to_rgba_image(&pixmap))
}

/// Escapes text for use inside SVG markup.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn replace_svg_colors(svg_data: &str, r: u8, g: u8, b: u8) -> String {
    let hex_color = format!("#{r:02x}{g:02x}{b:02x}");
    let result = replace_color_attr(svg_data, "fill", &hex_color);
    replace_color_attr(&result, "stroke", &hex_color)
}

/// Replaces a color attribute value, preserving `none` and `transparent`.
fn replace_color_attr(svg: &str, attr: &str, new_color: &str) -> String {
    let mut result = String::with_capacity(svg.len());
    let pattern = format!("{attr}=\"");
    let mut remaining = svg;

    while let Some(start) = remaining.find(&pattern) {
        result.push_str(&remaining[..start + pattern.len()]);
        remaining = &remaining[start + pattern.len()..];

        if let Some(end) = remaining.find('"') {
            let value = &remaining[..end];
            if value == "none" || value == "transparent" {
                result.push_str(value);
            } else {
                result.push_str(new_color);
            }
            remaining = &remaining[end..];
        }
    }

    result.push_str(remaining);
    result
}

fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, out) in pixmap.pixels().iter().zip(img.pixels_mut()) {
        // tiny_skia stores premultiplied alpha
        let color = pixel.demultiply();
        out.0 = [color.red(), color.green(), color.blue(), color.alpha()];
    }
    img
}

/// Composites `src` onto `dest` at the given offset (source over).
pub fn composite_over(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;

    for (sx, sy, src_pixel) in src.enumerate_pixels() {
        let dx = x + sx as i32;
        let dy = y + sy as i32;
        if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height || src_pixel[3] == 0 {
            continue;
        }
        let dst_pixel = dest.get_pixel_mut(dx as u32, dy as u32);
        *dst_pixel = alpha_blend(*src_pixel, *dst_pixel);
    }
}

/// Alpha blends two RGBA pixels (source over destination).
pub(crate) fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
