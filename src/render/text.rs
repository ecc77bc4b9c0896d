//! Text nodes, drawn by generating an SVG document rendered through usvg
//! with the system fonts.
//!
//! Text shrinks uniformly to fit its frame, down to the node's minimum
//! scale factor, and is centred on the frame centre shifted by `offset_y`.

use image::RgbaImage;
use tracing::warn;

use super::svg::{composite_over, escape_xml, render_document};
use crate::error::Result;
use crate::icon::RectPx;
use crate::view::{ColorScheme, TextView};

/// Font size used for measuring; widths scale linearly from it.
const MEASURE_SIZE: f32 = 100.0;

const LINE_HEIGHT: f32 = 1.2;

/// Resolved geometry of a text node in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    pub font_size: f32,
    pub box_x: f32,
    pub box_y: f32,
    pub box_width: f32,
    pub box_height: f32,
}

/// Draws `text` onto `canvas` within `frame`.
///
/// `factor` maps canonical units to canvas pixels.
pub fn draw_text(
    canvas: &mut RgbaImage,
    text: &TextView,
    frame: RectPx,
    scheme: ColorScheme,
    factor: f32,
) -> Result<()> {
    let scheme = text.scheme.unwrap_or(scheme);
    let lines: Vec<&str> = text.content.split('\n').collect();

    let natural_width = if text.content.trim().is_empty() {
        Some(0.0)
    } else {
        measure_width(text, &lines)?
    };
    let Some(natural_width) = natural_width else {
        warn!("no usable font found, skipping text {:?}", text.content);
        return Ok(());
    };

    let layout = layout(text, lines.len(), natural_width, frame, factor);
    let svg = text_document(canvas.width(), canvas.height(), text, &lines, &layout, scheme, factor);
    let rendered = render_document(&svg)?;
    composite_over(canvas, &rendered, 0, 0);
    Ok(())
}

/// Width of the widest line at [`MEASURE_SIZE`], or `None` when no glyph
/// produced any pixel.
fn measure_width(text: &TextView, lines: &[&str]) -> Result<Option<f32>> {
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as f32;
    let width = ((longest + 2.0) * MEASURE_SIZE * 1.2).ceil() as u32;
    let line_height = MEASURE_SIZE * LINE_HEIGHT;
    let height = ((lines.len() as f32 + 1.0) * line_height).ceil() as u32;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}"><text font-family="{}" font-weight="{}" font-size="{MEASURE_SIZE}" fill="black">"#,
        text.design.families(),
        text.weight.css(),
    );
    for (i, line) in lines.iter().enumerate() {
        svg.push_str(&format!(
            r#"<tspan x="{MEASURE_SIZE}" y="{}">{}</tspan>"#,
            (i as f32 + 1.0) * line_height,
            escape_xml(line)
        ));
    }
    svg.push_str("</text></svg>");

    let img = render_document(&svg)?;
    let mut min_x = u32::MAX;
    let mut max_x = 0;
    for (x, _, pixel) in img.enumerate_pixels() {
        if pixel[3] > 0 {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
        }
    }
    if min_x > max_x {
        return Ok(None);
    }
    Ok(Some((max_x - min_x + 1) as f32))
}

/// Shrink factor that fits `natural_width` x `natural_height` into the
/// available space, bounded below by `minimum`.
pub fn fit_scale(
    natural_width: f32,
    natural_height: f32,
    available_width: f32,
    max_height: Option<f32>,
    minimum: f32,
) -> f32 {
    let mut scale: f32 = 1.0;
    if natural_width > 0.0 {
        scale = scale.min(available_width / natural_width);
    }
    if let Some(max_height) = max_height {
        if natural_height > 0.0 {
            scale = scale.min(max_height / natural_height);
        }
    }
    scale.max(minimum.clamp(0.0, 1.0))
}

/// Computes font size and box geometry for a node.
///
/// `natural_width` is the widest line measured at [`MEASURE_SIZE`].
pub fn layout(
    text: &TextView,
    line_count: usize,
    natural_width: f32,
    frame: RectPx,
    factor: f32,
) -> TextLayout {
    let font_size = text.font_size * factor;
    let padding = text.horizontal_padding * factor;
    let width = natural_width * font_size / MEASURE_SIZE;
    let height = line_count.max(1) as f32 * font_size * LINE_HEIGHT;

    let fixed_width = text.width.map(|w| w * factor);
    let available = fixed_width.unwrap_or((frame.width as f32 - 2.0 * padding).max(0.0));
    let max_height = text.max_height.map(|h| h * factor);

    let scale = fit_scale(width, height, available, max_height, text.minimum_scale_factor);

    let content_width = fixed_width.unwrap_or(width * scale);
    let content_height = match max_height {
        Some(max) => (height * scale).min(max),
        None => height * scale,
    };
    let box_width = content_width + 2.0 * padding;

    let center_x = frame.x as f32 + frame.width as f32 / 2.0;
    let center_y = frame.y as f32 + frame.height as f32 / 2.0 + text.offset_y * factor;

    TextLayout {
        font_size: font_size * scale,
        box_x: center_x - box_width / 2.0,
        box_y: center_y - content_height / 2.0,
        box_width,
        box_height: content_height,
    }
}

fn text_document(
    width: u32,
    height: u32,
    text: &TextView,
    lines: &[&str],
    layout: &TextLayout,
    scheme: ColorScheme,
    factor: f32,
) -> String {
    let mut svg =
        format!(r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#);

    if let Some(background) = &text.background {
        let [r, g, b, a] = background.color.resolve(scheme);
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" fill="rgb({r},{g},{b})" fill-opacity="{}"/>"#,
            layout.box_x,
            layout.box_y,
            layout.box_width,
            layout.box_height,
            background.corner_radius * factor,
            a as f32 / 255.0,
        ));
    }

    if !text.content.trim().is_empty() {
        let [r, g, b, a] = text.color.unwrap_or(crate::view::Color::Primary).resolve(scheme);
        let line_height = layout.font_size * LINE_HEIGHT;
        let block_height = lines.len() as f32 * line_height;
        let top = layout.box_y + (layout.box_height - block_height) / 2.0;
        let center_x = layout.box_x + layout.box_width / 2.0;

        svg.push_str(&format!(
            r#"<text font-family="{}" font-weight="{}" font-size="{}" text-anchor="middle" fill="rgb({r},{g},{b})" fill-opacity="{}">"#,
            text.design.families(),
            text.weight.css(),
            layout.font_size,
            a as f32 / 255.0,
        ));
        for (i, line) in lines.iter().enumerate() {
            // Baseline sits roughly 0.8 em below the top of each line box.
            let baseline = top + i as f32 * line_height + (line_height - layout.font_size) / 2.0
                + layout.font_size * 0.8;
            svg.push_str(&format!(
                r#"<tspan x="{center_x}" y="{baseline}">{}</tspan>"#,
                escape_xml(line)
            ));
        }
        svg.push_str("</text>");
    }

    svg.push_str("</svg>");
    svg
}
