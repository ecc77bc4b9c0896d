//! new-icon: replace file and folder icons, optionally rendering them
//! through templates compiled from Rust source files.
//!
//! A template is a single Rust file built against a small support crate
//! into a dynamic library. The library hands back a serialized [`View`]
//! tree, which is rasterized over the file's current icon (or a supplied
//! image) and set as its custom icon or written to an image file.
//!
//! # Example
//!
//! ```
//! use newicon::{Color, IconImage, Rasterizer, View};
//! use image::RgbaImage;
//!
//! let base = IconImage::new_full_content(RgbaImage::new(64, 64), 1.0);
//! let view = View::stack([View::Icon, View::Fill { color: Color::Red.with_opacity(0.5, Default::default()) }]);
//!
//! let icon = Rasterizer::new().with_size(64).render(&view, &base).unwrap();
//! assert_eq!(icon.data.dimensions(), (64, 64));
//! ```

pub mod actions;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod icon;
pub mod icon_ops;
pub mod plugin;
pub mod process;
pub mod render;
pub mod store;
pub mod template;
pub mod view;

pub use config::{Config, IconStoreKind, Paths};
pub use error::{NewIconError, Result};
pub use icon::{IconImage, IconSet, RectPx};
pub use icon_ops::{IconRecord, Output};
pub use render::{DominantColor, Rasterizer, RenderContext};
pub use store::{GioIconStore, IconStore, SidecarIconStore};
pub use template::{Template, TemplateKind, TemplateLoader, TemplateRef};
pub use view::{Color, ColorScheme, SvgSpec, TextView, View};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
