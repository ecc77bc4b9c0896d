//! Gives the icon one of several hues, named by the content argument.
//!
//!     new-icon template icon demos/new_hue.rs ~/Music mint

use serde::Deserialize;
use support::prelude::*;

struct NewHue;

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum HueColor {
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
    Black,
}

impl HueColor {
    fn color(self) -> Color {
        match self {
            Self::Red => Color::Red,
            Self::Orange => Color::Orange,
            Self::Yellow => Color::Yellow,
            Self::Green => Color::Green,
            Self::Mint => Color::Mint,
            Self::Teal => Color::Teal,
            Self::Cyan => Color::Cyan,
            Self::Blue => Color::Blue,
            Self::Indigo => Color::Indigo,
            Self::Purple => Color::Purple,
            Self::Pink => Color::Pink,
            Self::Black => Color::Black,
        }
    }
}

impl IconTemplate for NewHue {
    const NAME: &'static str = "NewHue";

    fn render(input: &IconInput) -> Result<View, String> {
        // Minty previews without content.
        let hue = if input.has_content() {
            input.content::<HueColor>()?
        } else {
            HueColor::Mint
        };
        Ok(View::icon().hue(hue.color()))
    }
}

support::export_templates! { icon: [NewHue] }
