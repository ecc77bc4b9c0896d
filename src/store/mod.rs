//! Custom icon association for files and folders.
//!
//! An [`IconStore`] reads and changes the custom icon the desktop shows for
//! a path, and provides the icon the path has without one.

mod gio;
mod sidecar;

pub use gio::GioIconStore;
pub use sidecar::SidecarIconStore;

use std::path::Path;

use tracing::debug;

use crate::config::{IconStoreKind, Paths};
use crate::error::{NewIconError, Result};
use crate::icon::{IconImage, IconSet};
use crate::render::svg::render_svg;

/// Sizes the default icons are rendered at.
pub const DEFAULT_ICON_SIZES: &[u32] = &[16, 32, 64, 128, 256, 512, 1024];

const FOLDER_SVG: &str = include_str!("../../resources/icons/folder.svg");
const DOCUMENT_SVG: &str = include_str!("../../resources/icons/document.svg");

/// Reads and writes the custom icon of a path.
pub trait IconStore {
    /// PNG bytes of the current custom icon, if one is set.
    fn custom_icon(&self, target: &Path) -> Result<Option<Vec<u8>>>;

    /// Sets `png` as the custom icon.
    fn set_custom_icon(&self, target: &Path, png: &[u8]) -> Result<()>;

    /// Removes the custom icon; a no-op when none is set.
    fn clear_custom_icon(&self, target: &Path) -> Result<()>;

    fn has_custom_icon(&self, target: &Path) -> Result<bool> {
        Ok(self.custom_icon(target)?.is_some())
    }

    /// The icon the path shows without a custom icon.
    fn default_icons(&self, target: &Path) -> Result<IconSet> {
        default_icon_set(target)
    }
}

/// Opens the store selected by configuration.
pub fn open_store(kind: IconStoreKind, paths: &Paths) -> Result<Box<dyn IconStore>> {
    let store: Box<dyn IconStore> = match kind {
        IconStoreKind::Gio => Box::new(GioIconStore::locate(paths)?),
        IconStoreKind::Sidecar => Box::new(SidecarIconStore::new(paths)),
        IconStoreKind::Auto => match GioIconStore::locate(paths) {
            Ok(store) => Box::new(store),
            Err(err) => {
                debug!("gio unavailable ({err}), using sidecar icon store");
                Box::new(SidecarIconStore::new(paths))
            }
        },
    };
    Ok(store)
}

/// Generic folder or document icon, rendered at [`DEFAULT_ICON_SIZES`].
pub fn default_icon_set(target: &Path) -> Result<IconSet> {
    if !target.exists() {
        return Err(NewIconError::IconStore(format!(
            "no such file or directory: {}",
            target.display()
        )));
    }
    let svg = if target.is_dir() { FOLDER_SVG } else { DOCUMENT_SVG };

    let mut set = IconSet::new();
    for &size in DEFAULT_ICON_SIZES {
        let image = render_svg(svg, size)?;
        set.add_image(IconImage::new_full_content(image, 1.0));
    }
    Ok(set)
}

/// Icon file name for `target` under the icons directory.
pub(crate) fn icon_file_name(target: &Path) -> String {
    format!(
        "{}.png",
        crate::fs::sha256_hex(target.to_string_lossy().as_bytes())
    )
}
