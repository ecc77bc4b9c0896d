//! A new-icon template.
//!
//! Apply it with:
//!
//!     new-icon template icon template.rs ~/Projects "WIP"
//!     new-icon text ~/Projects "WIP" --template template.rs
//!
//! Edit it inside a buildable package with `new-icon template edit template.rs`.

use support::prelude::*;

/// Text in a translucent box below the centre of the icon. `content` is
/// the text to show; without content the icon is left as it is.
struct Label;

impl IconTemplate for Label {
    const NAME: &'static str = "Label";

    fn render(input: &IconInput) -> Result<View, String> {
        if !input.has_content() {
            return Ok(View::icon());
        }
        let text: String = input.content()?;
        Ok(View::icon().overlay(caption(text)))
    }
}

/// The same label for `new-icon text --template`.
struct Caption;

impl ImageTemplate for Caption {
    const NAME: &'static str = "Caption";

    fn render(input: &ImageInput) -> Result<View, String> {
        Ok(View::icon().overlay(caption(input.text.clone())))
    }
}

fn caption(text: String) -> View {
    Text::new(text)
        .font_size(160.0)
        .weight(FontWeight::Bold)
        .design(FontDesign::Rounded)
        .scheme(ColorScheme::Dark)
        .frame(612.0, Some(189.0))
        .minimum_scale_factor(0.1)
        .horizontal_padding(16.0)
        .background(Color::rgba(0, 0, 0, 143), 32.0)
        .offset_y(184.0)
        .into()
}

support::export_templates! {
    icon: [Label],
    image: [Caption],
}
