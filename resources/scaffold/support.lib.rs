//! Types and entry points for new-icon templates.
//!
//! A template is a type implementing [`IconTemplate`] (renders over a
//! file's icon, with optional content) or [`ImageTemplate`] (renders text
//! over an image). List the types with [`export_templates!`] to make them
//! visible to `new-icon`:
//!
//! ```ignore
//! use support::prelude::*;
//!
//! struct Trash;
//!
//! impl IconTemplate for Trash {
//!     const NAME: &'static str = "Trash";
//!
//!     fn render(_input: &IconInput) -> Result<View, String> {
//!         Ok(View::icon().grayscale(1.0))
//!     }
//! }
//!
//! support::export_templates! { icon: [Trash] }
//! ```
//!
//! Views are laid out in a 1024×1024 canvas.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod prelude {
    pub use crate::{
        Color, ColorScheme, FontDesign, FontWeight, IconInput, IconTemplate, ImageData,
        ImageInput, ImageTemplate, Position, Text, View,
    };
}

// ---------------------------------------------------------------------------
// ABI, identical to the host's layout
// ---------------------------------------------------------------------------

pub const ABI_VERSION: u32 = 1;

pub mod status {
    pub const OK: u32 = 0;
    pub const TEMPLATE_ERROR: u32 = 1;
    pub const PANIC: u32 = 2;
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NiSlice {
    pub ptr: *const u8,
    pub len: usize,
}

impl NiSlice {
    /// # Safety
    ///
    /// `ptr` must be null or point to `len` bytes valid for `'a`.
    pub unsafe fn as_bytes<'a>(self) -> &'a [u8] {
        if self.ptr.is_null() || self.len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct NiBuffer {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl NiBuffer {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let mut bytes = std::mem::ManuallyDrop::new(bytes);
        Self {
            ptr: bytes.as_mut_ptr(),
            len: bytes.len(),
            cap: bytes.capacity(),
        }
    }

    /// # Safety
    ///
    /// The buffer must come from [`NiBuffer::from_vec`] in this library and
    /// be freed only once.
    pub unsafe fn free(self) {
        if !self.ptr.is_null() {
            drop(Vec::from_raw_parts(self.ptr, self.len, self.cap));
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct NiRenderInput {
    pub abi_version: u32,
    pub width: u32,
    pub height: u32,
    pub rgba: NiSlice,
    pub payload: NiSlice,
    pub has_payload: bool,
}

#[repr(C)]
#[derive(Debug)]
pub struct NiRenderOutput {
    pub status: u32,
    pub bytes: NiBuffer,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Non-premultiplied RGBA pixels, row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// What an [`IconTemplate`] renders from.
#[derive(Debug, Clone)]
pub struct IconInput {
    /// The file's icon, or the image passed with `--image`.
    pub image: ImageData,
    payload: Option<Vec<u8>>,
}

impl IconInput {
    /// Whether content was given on the command line.
    pub fn has_content(&self) -> bool {
        self.payload.is_some()
    }

    /// The content argument decoded as `T`. Content arrives as a JSON
    /// string, so `T` may be `String` or a unit-variant enum.
    pub fn content<T: DeserializeOwned>(&self) -> Result<T, String> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| "this template needs content".to_string())?;
        serde_json::from_slice(payload).map_err(|e| format!("unsupported content: {e}"))
    }
}

/// What an [`ImageTemplate`] renders from.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub image: ImageData,
    pub text: String,
}

/// A template rendered over a file's icon.
pub trait IconTemplate {
    /// Name used by `--template-type`.
    const NAME: &'static str;

    fn render(input: &IconInput) -> Result<View, String>;
}

/// A template rendering text over an image, used by `text --template`.
pub trait ImageTemplate {
    const NAME: &'static str;

    fn render(input: &ImageInput) -> Result<View, String>;
}

// ---------------------------------------------------------------------------
// View tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    Primary,
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
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::Rgba([r, g, b, a])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
    #[default]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FontDesign {
    #[default]
    Default,
    Rounded,
    Serif,
    Monospaced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SvgSpec {
    Markup(String),
    Emoji(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBackground {
    pub color: Color,
    pub corner_radius: f32,
}

/// A text node. Build with [`Text::new`] and convert into a [`View`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    content: String,
    font_size: f32,
    weight: FontWeight,
    design: FontDesign,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme: Option<ColorScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_height: Option<f32>,
    minimum_scale_factor: f32,
    horizontal_padding: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<TextBackground>,
    offset_y: f32,
}

impl Text {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
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

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn design(mut self, design: FontDesign) -> Self {
        self.design = design;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn scheme(mut self, scheme: ColorScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }

    /// Fixed frame width, and optionally a maximum height.
    pub fn frame(mut self, width: f32, max_height: Option<f32>) -> Self {
        self.width = Some(width);
        self.max_height = max_height;
        self
    }

    /// Lets the font shrink down to `factor` of its size to fit the frame.
    pub fn minimum_scale_factor(mut self, factor: f32) -> Self {
        self.minimum_scale_factor = factor;
        self
    }

    pub fn horizontal_padding(mut self, padding: f32) -> Self {
        self.horizontal_padding = padding;
        self
    }

    pub fn background(mut self, color: Color, corner_radius: f32) -> Self {
        self.background = Some(TextBackground {
            color,
            corner_radius,
        });
        self
    }

    /// Moves the text down (positive) or up from the centre.
    pub fn offset_y(mut self, offset: f32) -> Self {
        self.offset_y = offset;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum View {
    Icon,
    Fill {
        color: Color,
    },
    Stack {
        children: Vec<View>,
    },
    Svg {
        source: SvgSpec,
        position: Position,
        scale: f32,
    },
    Decal {
        source: SvgSpec,
        scale: f32,
    },
    Text(Text),
    HueRotation {
        degrees: f32,
        content: Box<View>,
    },
    Hue {
        color: Color,
        content: Box<View>,
    },
    Grayscale {
        amount: f32,
        content: Box<View>,
    },
    Opacity {
        value: f32,
        content: Box<View>,
    },
    Padding {
        amount: u32,
        content: Box<View>,
    },
}

impl View {
    /// The input image scaled to fit.
    pub fn icon() -> Self {
        Self::Icon
    }

    pub fn fill(color: Color) -> Self {
        Self::Fill { color }
    }

    /// Children drawn back to front.
    pub fn stack(children: impl IntoIterator<Item = View>) -> Self {
        Self::Stack {
            children: children.into_iter().collect(),
        }
    }

    /// SVG markup at `position`, sized to `scale` of the frame.
    pub fn svg(markup: impl Into<String>, position: Position, scale: f32) -> Self {
        Self::Svg {
            source: SvgSpec::Markup(markup.into()),
            position,
            scale,
        }
    }

    /// An emoji drawn as an SVG overlay.
    pub fn emoji(emoji: impl Into<String>, position: Position, scale: f32) -> Self {
        Self::Svg {
            source: SvgSpec::Emoji(emoji.into()),
            position,
            scale,
        }
    }

    /// A monochrome SVG tinted after the dominant color beneath it.
    pub fn decal(markup: impl Into<String>, scale: f32) -> Self {
        Self::Decal {
            source: SvgSpec::Markup(markup.into()),
            scale,
        }
    }

    pub fn hue_rotation(self, degrees: f32) -> Self {
        Self::HueRotation {
            degrees,
            content: Box::new(self),
        }
    }

    /// Gives every pixel the hue of `color`.
    pub fn hue(self, color: Color) -> Self {
        Self::Hue {
            color,
            content: Box::new(self),
        }
    }

    pub fn grayscale(self, amount: f32) -> Self {
        Self::Grayscale {
            amount,
            content: Box::new(self),
        }
    }

    pub fn opacity(self, value: f32) -> Self {
        Self::Opacity {
            value,
            content: Box::new(self),
        }
    }

    pub fn padding(self, amount: u32) -> Self {
        Self::Padding {
            amount,
            content: Box::new(self),
        }
    }

    /// Draws `other` on top of this view.
    pub fn overlay(self, other: View) -> Self {
        match self {
            Self::Stack { mut children } => {
                children.push(other);
                Self::Stack { children }
            }
            view => Self::stack([view, other]),
        }
    }
}

impl From<Text> for View {
    fn from(text: Text) -> Self {
        Self::Text(text)
    }
}

// ---------------------------------------------------------------------------
// Entry point plumbing used by `export_templates!`
// ---------------------------------------------------------------------------

#[doc(hidden)]
pub mod __private {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Serialize)]
    struct RegistryEntry<'a> {
        name: &'a str,
        kind: &'a str,
    }

    pub fn registry(icon: &[&str], image: &[&str]) -> NiBuffer {
        let entries: Vec<RegistryEntry> = icon
            .iter()
            .map(|&name| RegistryEntry { name, kind: "icon" })
            .chain(image.iter().map(|&name| RegistryEntry { name, kind: "image" }))
            .collect();
        NiBuffer::from_vec(serde_json::to_vec(&entries).unwrap_or_default())
    }

    /// # Safety
    ///
    /// `name` must satisfy [`NiSlice::as_bytes`].
    pub unsafe fn name_matches(name: NiSlice, candidates: &[&str]) -> bool {
        match std::str::from_utf8(name.as_bytes()) {
            Ok(name) => candidates.contains(&name),
            Err(_) => false,
        }
    }

    unsafe fn read_input(input: *const NiRenderInput) -> Result<(ImageData, Option<Vec<u8>>), String> {
        let input = input.as_ref().ok_or("no render input")?;
        if input.abi_version != ABI_VERSION {
            return Err(format!(
                "host ABI version {} does not match template ABI version {ABI_VERSION}",
                input.abi_version
            ));
        }
        let rgba = input.rgba.as_bytes().to_vec();
        if rgba.len() != input.width as usize * input.height as usize * 4 {
            return Err("image size does not match its dimensions".into());
        }
        let payload = input.has_payload.then(|| input.payload.as_bytes().to_vec());
        Ok((
            ImageData {
                width: input.width,
                height: input.height,
                rgba,
            },
            payload,
        ))
    }

    pub fn icon_input(image: ImageData, payload: Option<Vec<u8>>) -> IconInput {
        IconInput { image, payload }
    }

    pub fn image_input(image: ImageData, payload: Option<Vec<u8>>) -> Result<ImageInput, String> {
        let payload = payload.ok_or("this template needs text")?;
        let text = serde_json::from_slice(&payload).map_err(|e| format!("invalid text: {e}"))?;
        Ok(ImageInput { image, text })
    }

    fn output(status: u32, bytes: Vec<u8>) -> NiRenderOutput {
        NiRenderOutput {
            status,
            bytes: NiBuffer::from_vec(bytes),
        }
    }

    /// Runs `dispatch` with the decoded call, catching panics.
    ///
    /// # Safety
    ///
    /// `name` and `input` must be valid for the duration of the call.
    pub unsafe fn render(
        name: NiSlice,
        input: *const NiRenderInput,
        dispatch: impl FnOnce(&str, ImageData, Option<Vec<u8>>) -> Result<View, String>,
    ) -> NiRenderOutput {
        let result = catch_unwind(AssertUnwindSafe(|| {
            let name = std::str::from_utf8(name.as_bytes())
                .map_err(|_| "template name is not UTF-8".to_string())?;
            let (image, payload) = read_input(input)?;
            dispatch(name, image, payload)
        }));
        match result {
            Ok(Ok(view)) => match serde_json::to_vec(&view) {
                Ok(json) => output(status::OK, json),
                Err(e) => output(status::TEMPLATE_ERROR, e.to_string().into_bytes()),
            },
            Ok(Err(message)) => output(status::TEMPLATE_ERROR, message.into_bytes()),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "template panicked".to_string());
                output(status::PANIC, message.into_bytes())
            }
        }
    }
}

/// Exports the entry points `new-icon` loads, registering the listed
/// template types.
///
/// ```ignore
/// support::export_templates! {
///     icon: [NewHue, Trash],
///     image: [Caption],
/// }
/// ```
#[macro_export]
macro_rules! export_templates {
    (
        $(icon: [$($icon:ty),* $(,)?])? $(,)?
        $(image: [$($image:ty),* $(,)?])? $(,)?
    ) => {
        const __NEWICON_ICON_TEMPLATES: &[&str] = &[
            $($(<$icon as $crate::IconTemplate>::NAME,)*)?
        ];
        const __NEWICON_IMAGE_TEMPLATES: &[&str] = &[
            $($(<$image as $crate::ImageTemplate>::NAME,)*)?
        ];

        #[no_mangle]
        pub extern "C" fn newicon_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[no_mangle]
        pub extern "C" fn newicon_template_registry() -> $crate::NiBuffer {
            $crate::__private::registry(__NEWICON_ICON_TEMPLATES, __NEWICON_IMAGE_TEMPLATES)
        }

        /// # Safety
        ///
        /// `buffer` must come from this library and be freed once.
        #[no_mangle]
        pub unsafe extern "C" fn newicon_free_buffer(buffer: $crate::NiBuffer) {
            buffer.free()
        }

        /// # Safety
        ///
        /// `name` must point to valid bytes.
        #[no_mangle]
        pub unsafe extern "C" fn newicon_is_icon_template(name: $crate::NiSlice) -> bool {
            $crate::__private::name_matches(name, __NEWICON_ICON_TEMPLATES)
        }

        /// # Safety
        ///
        /// `name` must point to valid bytes.
        #[no_mangle]
        pub unsafe extern "C" fn newicon_is_image_template(name: $crate::NiSlice) -> bool {
            $crate::__private::name_matches(name, __NEWICON_IMAGE_TEMPLATES)
        }

        /// # Safety
        ///
        /// `name` and `input` must be valid for the call.
        #[no_mangle]
        pub unsafe extern "C" fn newicon_render_icon_template(
            name: $crate::NiSlice,
            input: *const $crate::NiRenderInput,
        ) -> $crate::NiRenderOutput {
            $crate::__private::render(name, input, |name, image, payload| {
                let input = $crate::__private::icon_input(image, payload);
                $($(
                    if name == <$icon as $crate::IconTemplate>::NAME {
                        return <$icon as $crate::IconTemplate>::render(&input);
                    }
                )*)?
                let _ = &input;
                Err(format!("unknown icon template {name}"))
            })
        }

        /// # Safety
        ///
        /// `name` and `input` must be valid for the call.
        #[no_mangle]
        pub unsafe extern "C" fn newicon_render_image_template(
            name: $crate::NiSlice,
            input: *const $crate::NiRenderInput,
        ) -> $crate::NiRenderOutput {
            $crate::__private::render(name, input, |name, image, payload| {
                $($(
                    if name == <$image as $crate::ImageTemplate>::NAME {
                        let input = $crate::__private::image_input(image, payload)?;
                        return <$image as $crate::ImageTemplate>::render(&input);
                    }
                )*)?
                let _ = (image, payload);
                Err(format!("unknown image template {name}"))
            })
        }
    };
}
