//! Per-pixel color effects.

use image::RgbaImage;
use palette::{Hsl, IntoColor, Srgb};

use crate::icon::RectPx;

/// Rotates the hue of every visible pixel by `degrees`.
pub fn hue_rotate(image: &mut RgbaImage, degrees: f32) {
    let degrees = degrees.rem_euclid(360.0);
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }

        let rgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        let mut hsl: Hsl = rgb.into_color();
        hsl.hue += degrees;
        let rotated: Srgb = hsl.into_color();

        pixel.0 = [to_u8(rotated.red), to_u8(rotated.green), to_u8(rotated.blue), a];
    }
}

/// Hue blend mode: each visible pixel takes the hue and saturation of
/// `color` and keeps its own luminosity. The blend is mixed in by the
/// color's alpha.
pub fn hue_blend(image: &mut RgbaImage, color: [u8; 4]) {
    let source = rgb_f32(color);
    let strength = color[3] as f32 / 255.0;

    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            continue;
        }
        let backdrop = rgb_f32([r, g, b, a]);
        let blended = set_lum(set_sat(source, sat(backdrop)), lum(backdrop));
        let mixed = [0, 1, 2].map(|i| backdrop[i] + (blended[i] - backdrop[i]) * strength);
        pixel.0 = [to_u8(mixed[0]), to_u8(mixed[1]), to_u8(mixed[2]), a];
    }
}

/// Desaturates toward Rec. 709 luma; `amount` 1.0 is fully gray.
pub fn grayscale(image: &mut RgbaImage, amount: f32) {
    let amount = amount.clamp(0.0, 1.0);
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let [rf, gf, bf] = rgb_f32([r, g, b, a]);
        let luma = 0.2126 * rf + 0.7152 * gf + 0.0722 * bf;
        let mix = |c: f32| to_u8(c + (luma - c) * amount);
        pixel.0 = [mix(rf), mix(gf), mix(bf), a];
    }
}

/// Multiplies the alpha of every pixel by `value`.
pub fn opacity(image: &mut RgbaImage, value: f32) {
    let value = value.clamp(0.0, 1.0);
    for pixel in image.pixels_mut() {
        pixel.0[3] = (pixel.0[3] as f32 * value).round() as u8;
    }
}

/// Darkens an RGBA color by reducing its HSL lightness.
pub fn darken_color(color: [u8; 4], amount: f32) -> [u8; 4] {
    let [r, g, b, a] = color;
    let rgb = Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let mut hsl: Hsl = rgb.into_color();
    hsl.lightness = (hsl.lightness - amount).max(0.0);
    let darkened: Srgb = hsl.into_color();
    [to_u8(darkened.red), to_u8(darkened.green), to_u8(darkened.blue), a]
}

/// Alpha-weighted average color of the visible pixels within `bounds`.
///
/// Mid gray when nothing is visible.
pub fn sample_dominant_color(image: &RgbaImage, bounds: RectPx) -> [u8; 4] {
    let mut total = [0u64; 3];
    let mut total_a: u64 = 0;
    let mut count: u64 = 0;

    for y in bounds.y..bounds.bottom().min(image.height()) {
        for x in bounds.x..bounds.right().min(image.width()) {
            let pixel = image.get_pixel(x, y);
            let a = pixel[3] as u64;
            if a > 0 {
                for (sum, channel) in total.iter_mut().zip(pixel.0) {
                    *sum += channel as u64 * a;
                }
                total_a += a;
                count += 1;
            }
        }
    }

    if count == 0 {
        return [128, 128, 128, 255];
    }

    [
        (total[0] / total_a) as u8,
        (total[1] / total_a) as u8,
        (total[2] / total_a) as u8,
        (total_a / count) as u8,
    ]
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn rgb_f32([r, g, b, _]: [u8; 4]) -> [f32; 3] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

fn lum([r, g, b]: [f32; 3]) -> f32 {
    0.3 * r + 0.59 * g + 0.11 * b
}

fn sat([r, g, b]: [f32; 3]) -> f32 {
    r.max(g).max(b) - r.min(g).min(b)
}

fn clip_color(c: [f32; 3]) -> [f32; 3] {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);
    let mut out = c;
    if n < 0.0 {
        out = out.map(|v| l + (v - l) * l / (l - n));
    }
    if x > 1.0 {
        out = out.map(|v| l + (v - l) * (1.0 - l) / (x - l));
    }
    out
}

fn set_lum(c: [f32; 3], l: f32) -> [f32; 3] {
    let d = l - lum(c);
    clip_color(c.map(|v| v + d))
}

fn set_sat(c: [f32; 3], s: f32) -> [f32; 3] {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);
    if max <= min {
        return [0.0; 3];
    }
    c.map(|v| (v - min) * s / (max - min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn hue_rotation_turns_red_green() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        hue_rotate(&mut img, 120.0);
        let [r, g, b, a] = img.get_pixel(0, 0).0;
        assert!(g > 250 && r < 5 && b < 5);
        assert_eq!(a, 255);
    }

    #[test]
    fn hue_rotation_skips_transparent() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 0]));
        hue_rotate(&mut img, 120.0);
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 0]);
    }

    #[test]
    fn hue_blend_takes_hue_keeps_luminosity() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([200, 40, 40, 255]));
        let before = lum(rgb_f32(img.get_pixel(0, 0).0));
        hue_blend(&mut img, [0, 122, 255, 255]);
        let after = img.get_pixel(0, 0).0;

        assert!(after[2] > after[0], "blue hue expected, got {after:?}");
        assert!((lum(rgb_f32(after)) - before).abs() < 0.02);
    }

    #[test]
    fn hue_blend_with_black_desaturates() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([30, 160, 90, 200]));
        hue_blend(&mut img, [0, 0, 0, 255]);
        let [r, g, b, a] = img.get_pixel(0, 0).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 200);
    }

    #[test]
    fn grayscale_full_and_none() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        grayscale(&mut img, 0.0);
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);

        grayscale(&mut img, 1.0);
        let [r, g, b, _] = img.get_pixel(0, 0).0;
        assert_eq!((r, g, b), (54, 54, 54));
    }

    #[test]
    fn opacity_scales_alpha() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 200]));
        opacity(&mut img, 0.5);
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3, 100]);
    }

    #[test]
    fn darken_reduces_lightness() {
        let darker = darken_color([200, 200, 200, 255], 0.15);
        assert!(darker[0] < 200);
        assert_eq!(darker[3], 255);
        assert_eq!(darken_color([0, 0, 0, 255], 0.5), [0, 0, 0, 255]);
    }

    #[test]
    fn dominant_color_defaults_to_gray() {
        let img = RgbaImage::new(4, 4);
        assert_eq!(sample_dominant_color(&img, RectPx::from_size(4, 4)), [128, 128, 128, 255]);

        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        assert_eq!(sample_dominant_color(&img, RectPx::from_size(4, 4)), [10, 20, 30, 255]);
    }
}
