//! Grays the icon out and puts a red trash can over it.
//!
//!     new-icon template icon demos/trash.rs ~/Old

use support::prelude::*;

const TRASH: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
  <circle cx="12" cy="12" r="12" fill="#ff3b30"/>
  <path fill="#ffffff" d="M9 6.5h6l-.5-1h-5zM7 7.5h10v1.2H7zM8.2 9.5h7.6l-.7 8.2a1 1 0 0 1-1 .8H9.9a1 1 0 0 1-1-.8z"/>
</svg>"##;

struct Trash;

impl IconTemplate for Trash {
    const NAME: &'static str = "Trash";

    fn render(_input: &IconInput) -> Result<View, String> {
        Ok(View::icon()
            .grayscale(1.0)
            .overlay(View::svg(TRASH, Position::Center, 0.375)))
    }
}

support::export_templates! { icon: [Trash] }
