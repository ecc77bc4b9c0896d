//! Serializable view tree returned by templates.
//!
//! A template describes its output as a [`View`]: a small tree of layout and
//! effect nodes over the base icon. Templates serialize it to JSON on their
//! side of the plugin boundary; the host decodes it here and rasterizes it
//! with [`crate::render::Rasterizer`]. All coordinates are in the canonical
//! 1024×1024 space.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "type": "stack",
//!   "children": [
//!     { "type": "hue", "color": "mint", "content": { "type": "icon" } },
//!     { "type": "text", "content": "Hi", "fontSize": 160.0, "weight": "bold" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Edge length of the canonical square every template renders into.
pub const CANONICAL_SIZE: u32 = 1024;

/// A node of the view tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum View {
    /// The base icon, scaled to fit the frame.
    Icon,

    /// A solid fill of the whole frame.
    Fill { color: Color },

    /// Children drawn back to front.
    Stack { children: Vec<View> },

    /// A full-color SVG placed at a position within the frame.
    Svg {
        source: SvgSpec,
        #[serde(default)]
        position: Position,
        #[serde(default = "default_overlay_scale")]
        scale: f32,
    },

    /// A monochrome SVG centred in the frame, tinted with a darkened
    /// version of the dominant color underneath.
    Decal {
        source: SvgSpec,
        #[serde(default = "default_decal_scale")]
        scale: f32,
    },

    /// Text, optionally over a rounded background box.
    Text(TextView),

    /// Rotates the hue of every pixel of `content`.
    HueRotation { degrees: f32, content: Box<View> },

    /// Replaces the hue of `content` with the hue of `color`, keeping its
    /// luminosity. A color without hue (black, white, gray) desaturates.
    Hue { color: Color, content: Box<View> },

    /// Desaturates `content`; `amount` 1.0 is fully gray.
    Grayscale {
        #[serde(default = "default_one")]
        amount: f32,
        content: Box<View>,
    },

    /// Multiplies the alpha of `content`.
    Opacity { value: f32, content: Box<View> },

    /// Lays `content` out in the frame shrunk by `amount` pixels per side.
    Padding { amount: u32, content: Box<View> },
}

impl View {
    /// Convenience constructor for a stack.
    pub fn stack(children: impl IntoIterator<Item = View>) -> Self {
        Self::Stack {
            children: children.into_iter().collect(),
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + match self {
            Self::Stack { children } => children.iter().map(View::node_count).sum(),
            Self::HueRotation { content, .. }
            | Self::Hue { content, .. }
            | Self::Grayscale { content, .. }
            | Self::Opacity { content, .. }
            | Self::Padding { content, .. } => content.node_count(),
            _ => 0,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

fn default_overlay_scale() -> f32 {
    0.375
}

fn default_decal_scale() -> f32 {
    0.5
}

fn default_one() -> f32 {
    1.0
}

/// Where an SVG comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum SvgSpec {
    /// Raw SVG markup.
    Markup(String),
    /// An emoji character, resolved through Twemoji when the `twemoji`
    /// feature is enabled.
    Emoji(String),
}

/// Placement of an overlay within its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    #[default]
    Center,
}

/// Light or dark appearance. Rasterization forces [`ColorScheme::Light`]
/// unless a node overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

/// A color: a semantic color resolved against the color scheme, a named
/// system color, or explicit RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum Color {
    /// Foreground: black in light mode, white in dark mode.
    Primary,
    /// Background: white in light mode, black in dark mode.
    Background,
    Clear,
    Black,
    White,
    Gray,
    Red,
    Orange,
    Yellow,
    Green,
    Mint,
    Teal,
    Cyan,
    Blue,
    Indigo,
    Purple,
    Pink,
    Rgba([u8; 4]),
}

impl Color {
    /// Resolves to concrete RGBA under `scheme`.
    pub fn resolve(self, scheme: ColorScheme) -> [u8; 4] {
        let dark = scheme == ColorScheme::Dark;
        match self {
            Self::Primary if dark => [255, 255, 255, 255],
            Self::Primary => [0, 0, 0, 255],
            Self::Background if dark => [0, 0, 0, 255],
            Self::Background => [255, 255, 255, 255],
            Self::Clear => [0, 0, 0, 0],
            Self::Black => [0, 0, 0, 255],
            Self::White => [255, 255, 255, 255],
            Self::Gray => [142, 142, 147, 255],
            Self::Red => [255, 59, 48, 255],
            Self::Orange => [255, 149, 0, 255],
            Self::Yellow => [255, 204, 0, 255],
            Self::Green => [52, 199, 89, 255],
            Self::Mint => [0, 199, 190, 255],
            Self::Teal => [48, 176, 199, 255],
            Self::Cyan => [50, 173, 230, 255],
            Self::Blue => [0, 122, 255, 255],
            Self::Indigo => [88, 86, 214, 255],
            Self::Purple => [175, 82, 222, 255],
            Self::Pink => [255, 45, 85, 255],
            Self::Rgba(rgba) => rgba,
        }
    }

    /// Same color with its alpha multiplied by `opacity`.
    pub fn with_opacity(self, opacity: f32, scheme: ColorScheme) -> Self {
        let [r, g, b, a] = self.resolve(scheme);
        let alpha = (a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self::Rgba([r, g, b, alpha])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum FontWeight {
    Light,
    #[default]
    Regular,
    Medium,
    Semibold,
    Bold,
    Heavy,
}

impl FontWeight {
    /// CSS numeric weight.
    pub fn css(self) -> u16 {
        match self {
            Self::Light => 300,
            Self::Regular => 400,
            Self::Medium => 500,
            Self::Semibold => 600,
            Self::Bold => 700,
            Self::Heavy => 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum FontDesign {
    #[default]
    Default,
    Rounded,
    Serif,
    Monospaced,
}

impl FontDesign {
    /// CSS font-family list, most specific first.
    pub fn families(self) -> &'static str {
        match self {
            Self::Default => "'Inter', 'Cantarell', 'DejaVu Sans', sans-serif",
            Self::Rounded => {
                "'SF Pro Rounded', 'Nunito', 'Varela Round', 'Comfortaa', 'DejaVu Sans', sans-serif"
            }
            Self::Serif => "'New York', 'Noto Serif', 'DejaVu Serif', serif",
            Self::Monospaced => "'SF Mono', 'JetBrains Mono', 'DejaVu Sans Mono', monospace",
        }
    }
}

/// Rounded box drawn behind text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct TextBackground {
    pub color: Color,
    #[serde(default)]
    pub corner_radius: f32,
}

/// Text node settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(default, rename_all = "camelCase")]
pub struct TextView {
    /// The text; `\n` separates lines.
    pub content: String,
    pub font_size: f32,
    pub weight: FontWeight,
    pub design: FontDesign,
    /// Text color; defaults to [`Color::Primary`].
    pub color: Option<Color>,
    /// Overrides the scheme used to resolve this node's colors.
    pub scheme: Option<ColorScheme>,
    /// Width of the text frame. Defaults to the full frame.
    pub width: Option<f32>,
    /// Maximum height of the text frame.
    pub max_height: Option<f32>,
    /// Smallest factor the font may shrink by to fit the frame.
    pub minimum_scale_factor: f32,
    /// Horizontal padding inside the background box.
    pub horizontal_padding: f32,
    pub background: Option<TextBackground>,
    /// Vertical offset of the box centre from the frame centre.
    pub offset_y: f32,
}

impl Default for TextView {
    fn default() -> Self {
        Self {
            content: String::new(),
            font_size: 64.0,
            weight: FontWeight::Regular,
            design: FontDesign::Default,
            color: None,
            scheme: None,
            width: None,
            max_height: None,
            minimum_scale_factor: 1.0,
            horizontal_padding: 0.0,
            background: None,
            offset_y: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_tagged_tree() {
        let json = br#"{
            "type": "stack",
            "children": [
                { "type": "hue", "color": "mint", "content": { "type": "icon" } },
                { "type": "text", "content": "Hi", "fontSize": 160.0, "weight": "bold" },
                { "type": "svg", "source": { "markup": "<svg/>" }, "position": "top-left" }
            ]
        }"#;
        let view = View::from_json(json).unwrap();
        assert_eq!(view.node_count(), 5);

        let View::Stack { children } = view else {
            panic!("expected a stack");
        };
        let View::Text(text) = &children[1] else {
            panic!("expected text");
        };
        assert_eq!(text.content, "Hi");
        assert_eq!(text.weight, FontWeight::Bold);
        assert_eq!(text.minimum_scale_factor, 1.0);

        let View::Svg { position, scale, .. } = &children[2] else {
            panic!("expected svg");
        };
        assert_eq!(*position, Position::TopLeft);
        assert_eq!(*scale, 0.375);
    }

    #[test]
    fn rejects_unknown_node() {
        assert!(View::from_json(br#"{ "type": "sparkle" }"#).is_err());
        assert!(View::from_json(br#""icon""#).is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let view = View::Grayscale {
            amount: 1.0,
            content: Box::new(View::Icon),
        };
        let json = view.to_json().unwrap();
        assert!(json.contains(r#""type":"grayscale""#));
        assert!(json.contains(r#""content":{"type":"icon"}"#));
    }

    #[test]
    fn semantic_colors_follow_scheme() {
        assert_eq!(Color::Primary.resolve(ColorScheme::Light), [0, 0, 0, 255]);
        assert_eq!(Color::Primary.resolve(ColorScheme::Dark), [255, 255, 255, 255]);
        assert_eq!(Color::Rgba([1, 2, 3, 4]).resolve(ColorScheme::Dark), [1, 2, 3, 4]);
        assert_eq!(
            Color::Black.with_opacity(0.5, ColorScheme::Light),
            Color::Rgba([0, 0, 0, 128])
        );
    }

    #[test]
    fn color_json_shapes() {
        let named: Color = serde_json::from_str(r#""indigo""#).unwrap();
        assert_eq!(named, Color::Indigo);
        let rgba: Color = serde_json::from_str(r#"{ "rgba": [1, 2, 3, 255] }"#).unwrap();
        assert_eq!(rgba, Color::Rgba([1, 2, 3, 255]));
    }
}
