//! Acquiring the base image for a render and applying the result.
//!
//! Extracting the image a path currently shows means clearing its custom
//! icon for a moment. The [`IconRecord`] returned by [`acquire`] restores
//! the previous icon when dropped, unless the new icon was committed.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, warn};

use crate::error::{NewIconError, Result};
use crate::icon::IconImage;
use crate::render::Rasterizer;
use crate::store::IconStore;
use crate::view::View;

/// Where a rendered icon goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Set as the custom icon of the path.
    SetIcon(PathBuf),
    /// Written to an image file; the format follows the extension.
    File(PathBuf),
}

/// Puts a target's custom icon back to what it was before acquisition.
struct Restore {
    target: PathBuf,
    previous: Option<Vec<u8>>,
}

impl Restore {
    fn run(&self, store: &dyn IconStore) -> Result<()> {
        debug!(target = %self.target.display(), "restoring previous icon");
        match &self.previous {
            Some(bytes) => store.set_custom_icon(&self.target, bytes),
            None => store.clear_custom_icon(&self.target),
        }
    }

    fn run_or_warn(&self, store: &dyn IconStore) {
        if let Err(e) = self.run(store) {
            warn!(target = %self.target.display(), "failed to restore icon: {e}");
        }
    }
}

/// The base image of a render, plus the rollback of any icon change made
/// to obtain it.
///
/// Dropping an uncommitted record restores the previous icon.
pub struct IconRecord<'s> {
    store: &'s dyn IconStore,
    image: IconImage,
    restore: Option<Restore>,
}

impl<'s> IconRecord<'s> {
    pub fn image(&self) -> &IconImage {
        &self.image
    }

    /// The path the image was extracted from, if any.
    pub fn target(&self) -> Option<&Path> {
        self.restore.as_ref().map(|r| r.target.as_path())
    }

    /// Keeps the current icon state; nothing is restored.
    pub fn commit(mut self) {
        self.restore = None;
    }

    /// Restores the previous icon now, reporting failure.
    pub fn rollback(mut self) -> Result<()> {
        match self.restore.take() {
            Some(restore) => restore.run(self.store),
            None => Ok(()),
        }
    }
}

impl Drop for IconRecord<'_> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore.run_or_warn(self.store);
        }
    }
}

/// Loads the base image for a render.
///
/// With `provided`, the image file is decoded and nothing about `target`
/// changes. Otherwise the custom icon of `target` is cleared to reveal the
/// icon the path shows by default; the returned record puts it back.
pub fn acquire<'s>(
    store: &'s dyn IconStore,
    target: &Path,
    provided: Option<&Path>,
) -> Result<IconRecord<'s>> {
    if let Some(path) = provided {
        let data = image::open(path)?.to_rgba8();
        debug!(image = %path.display(), "using provided image");
        return Ok(IconRecord {
            store,
            image: IconImage::new_full_content(data, 1.0),
            restore: None,
        });
    }

    let restore = Restore {
        target: target.to_path_buf(),
        previous: store.custom_icon(target)?,
    };
    match extract(store, target, restore.previous.is_some()) {
        Ok(image) => Ok(IconRecord {
            store,
            image,
            restore: Some(restore),
        }),
        Err(e) => {
            restore.run_or_warn(store);
            Err(e)
        }
    }
}

fn extract(store: &dyn IconStore, target: &Path, has_custom_icon: bool) -> Result<IconImage> {
    if has_custom_icon {
        store.clear_custom_icon(target)?;
    }
    let icons = store.default_icons(target)?;
    let image = icons
        .best_representation()
        .cloned()
        .ok_or_else(|| NewIconError::IconStore(format!("no icon for {}", target.display())))?;
    debug!(
        target = %target.display(),
        width = image.data.width(),
        height = image.data.height(),
        has_custom_icon,
        "extracted icon"
    );
    Ok(image)
}

/// Rasterizes `view` over the record's image and delivers it to `output`.
///
/// Setting an icon commits the record. Writing a file restores the
/// target's previous icon afterwards. Any failure restores it too.
pub fn apply(record: IconRecord<'_>, view: &View, output: &Output) -> Result<()> {
    let rendered = Rasterizer::new().render(view, record.image())?;
    match output {
        Output::SetIcon(target) => {
            let png = rendered.to_png()?;
            record.store.set_custom_icon(target, &png)?;
            record.commit();
            debug!(target = %target.display(), "icon set");
        }
        Output::File(path) => {
            write_image(&rendered.data, path)?;
            record.rollback()?;
            debug!(output = %path.display(), "icon written");
        }
    }
    Ok(())
}

/// Removes the custom icon of `target`.
pub fn reset(store: &dyn IconStore, target: &Path) -> Result<()> {
    if !target.exists() {
        return Err(NewIconError::io(
            format!("cannot reset {}", target.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }
    store.clear_custom_icon(target)
}

/// Image format for an output path, PNG unless the extension names another.
pub fn output_format(path: &Path) -> ImageFormat {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => ImageFormat::Jpeg,
        Some("gif") => ImageFormat::Gif,
        Some("bmp") => ImageFormat::Bmp,
        Some("tif" | "tiff") => ImageFormat::Tiff,
        _ => ImageFormat::Png,
    }
}

fn write_image(image: &RgbaImage, path: &Path) -> Result<()> {
    let format = output_format(path);
    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    match format {
        // No alpha channel in JPEG.
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(image.clone())
            .to_rgb8()
            .write_to(&mut cursor, format)?,
        _ => image.write_to(&mut cursor, format)?,
    }
    crate::fs::atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::store::SidecarIconStore;
    use crate::view::Color;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: SidecarIconStore,
        target: PathBuf,
        out: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarIconStore::new(&Paths::new(dir.path().join("root")));
        let target = dir.path().join("Projects");
        std::fs::create_dir(&target).unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        Fixture {
            store,
            target,
            out,
            _dir: dir,
        }
    }

    fn red() -> View {
        View::Fill { color: Color::Red }
    }

    #[test]
    fn rollback_restores_previous_icon_bytes() {
        let f = fixture();
        f.store.set_custom_icon(&f.target, b"previous").unwrap();

        let record = acquire(&f.store, &f.target, None).unwrap();
        assert!(!f.store.has_custom_icon(&f.target).unwrap());
        assert_eq!(record.image().data.width(), 1024);
        drop(record);

        assert_eq!(
            f.store.custom_icon(&f.target).unwrap().as_deref(),
            Some(&b"previous"[..])
        );
    }

    #[test]
    fn rollback_without_previous_icon_leaves_none() {
        let f = fixture();
        acquire(&f.store, &f.target, None).unwrap().rollback().unwrap();
        assert!(!f.store.has_custom_icon(&f.target).unwrap());
    }

    #[test]
    fn apply_sets_icon_then_reset_clears_it() {
        let f = fixture();
        let record = acquire(&f.store, &f.target, None).unwrap();
        apply(record, &red(), &Output::SetIcon(f.target.clone())).unwrap();

        let png = f.store.custom_icon(&f.target).unwrap().unwrap();
        let icon = IconImage::decode(&png).unwrap();
        assert_eq!(icon.data.dimensions(), (1024, 1024));

        reset(&f.store, &f.target).unwrap();
        assert!(!f.store.has_custom_icon(&f.target).unwrap());
    }

    #[test]
    fn writing_a_file_leaves_the_icon_alone() {
        let f = fixture();
        f.store.set_custom_icon(&f.target, b"previous").unwrap();

        let path = f.out.join("icon.jpg");
        let record = acquire(&f.store, &f.target, None).unwrap();
        apply(record, &red(), &Output::File(path.clone())).unwrap();

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (1024, 1024));
        assert_eq!(
            f.store.custom_icon(&f.target).unwrap().as_deref(),
            Some(&b"previous"[..])
        );
    }

    #[test]
    fn provided_image_is_used_as_is() {
        let f = fixture();
        let image_path = f.out.join("base.png");
        RgbaImage::from_pixel(8, 4, image::Rgba([1, 2, 3, 255]))
            .save(&image_path)
            .unwrap();

        let record = acquire(&f.store, &f.target, Some(&image_path)).unwrap();
        assert_eq!(record.image().data.dimensions(), (8, 4));
        assert_eq!(record.target(), None);
    }

    #[test]
    fn failed_apply_restores() {
        let f = fixture();
        f.store.set_custom_icon(&f.target, b"previous").unwrap();

        let record = acquire(&f.store, &f.target, None).unwrap();
        let bad = View::Svg {
            source: crate::view::SvgSpec::Markup("not svg".into()),
            position: Default::default(),
            scale: 0.5,
        };
        assert!(apply(record, &bad, &Output::File(f.out.join("icon.png"))).is_err());
        assert_eq!(
            f.store.custom_icon(&f.target).unwrap().as_deref(),
            Some(&b"previous"[..])
        );
    }

    /// A store whose paths have no default icon.
    struct NoDefaultIcons(SidecarIconStore);

    impl IconStore for NoDefaultIcons {
        fn custom_icon(&self, target: &Path) -> Result<Option<Vec<u8>>> {
            self.0.custom_icon(target)
        }

        fn set_custom_icon(&self, target: &Path, png: &[u8]) -> Result<()> {
            self.0.set_custom_icon(target, png)
        }

        fn clear_custom_icon(&self, target: &Path) -> Result<()> {
            self.0.clear_custom_icon(target)
        }

        fn default_icons(&self, _target: &Path) -> Result<crate::icon::IconSet> {
            Ok(crate::icon::IconSet::new())
        }
    }

    #[test]
    fn failed_extraction_restores_the_cleared_icon() {
        let f = fixture();
        let store = NoDefaultIcons(f.store);
        store.set_custom_icon(&f.target, b"previous").unwrap();

        let err = acquire(&store, &f.target, None).err().unwrap();
        assert!(matches!(err, NewIconError::IconStore(_)));
        assert_eq!(
            store.custom_icon(&f.target).unwrap().as_deref(),
            Some(&b"previous"[..])
        );
    }

    #[test]
    fn formats_follow_extension() {
        assert_eq!(output_format(Path::new("a.JPG")), ImageFormat::Jpeg);
        assert_eq!(output_format(Path::new("a.tif")), ImageFormat::Tiff);
        assert_eq!(output_format(Path::new("a.gif")), ImageFormat::Gif);
        assert_eq!(output_format(Path::new("a.webp")), ImageFormat::Png);
        assert_eq!(output_format(Path::new("a")), ImageFormat::Png);
    }

    #[test]
    fn reset_requires_existing_target() {
        let f = fixture();
        assert!(reset(&f.store, &f.target.join("gone")).is_err());
    }
}
