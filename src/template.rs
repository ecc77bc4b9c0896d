//! Templates: the built-in text overlay and user templates loaded from
//! source files or installed plugins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Paths;
use crate::error::{NewIconError, Result};
use crate::plugin::loader;
use crate::plugin::{
    ArtifactBuilder, BuildArtifact, BuildCache, InstallLocation, PluginRegistry, RenderInput,
    TemplateHandle, TemplateSource,
};
use crate::view::{Color, ColorScheme, FontDesign, FontWeight, TextBackground, TextView, View};

/// Which pair of entry points a template is driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Renders over a file's icon, with optional content.
    Icon,
    /// Renders text over an image (`text -t`).
    Image,
}

impl TemplateKind {
    pub fn is_template_symbol(self) -> &'static str {
        match self {
            Self::Icon => "newicon_is_icon_template",
            Self::Image => "newicon_is_image_template",
        }
    }

    pub fn render_template_symbol(self) -> &'static str {
        match self {
            Self::Icon => "newicon_render_icon_template",
            Self::Image => "newicon_render_image_template",
        }
    }
}

/// Name reported for the built-in text overlay.
pub const TEXT_OVERLAY: &str = "TextOverlay";

enum Renderer {
    TextOverlay,
    Plugin(TemplateHandle),
}

/// A template ready to render.
///
/// Dropping it unloads the module first and then releases the build;
/// temporary builds are deleted.
pub struct Template {
    renderer: Renderer,
    _artifact: Option<BuildArtifact>,
}

impl Template {
    /// The built-in text overlay. Needs no build.
    pub fn text_overlay() -> Self {
        Self {
            renderer: Renderer::TextOverlay,
            _artifact: None,
        }
    }

    pub fn from_plugin(handle: TemplateHandle, artifact: BuildArtifact) -> Self {
        Self {
            renderer: Renderer::Plugin(handle),
            _artifact: Some(artifact),
        }
    }

    /// The template type being rendered.
    pub fn name(&self) -> &str {
        match &self.renderer {
            Renderer::TextOverlay => TEXT_OVERLAY,
            Renderer::Plugin(handle) => handle.template_type(),
        }
    }

    pub fn render(&self, input: &RenderInput) -> Result<View> {
        match &self.renderer {
            Renderer::TextOverlay => {
                let payload = input
                    .payload
                    .as_deref()
                    .ok_or_else(|| NewIconError::Render("the text template needs text".into()))?;
                let text: String = serde_json::from_slice(payload)?;
                Ok(text_overlay_view(&text))
            }
            Renderer::Plugin(handle) => handle.render(input),
        }
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template").field("name", &self.name()).finish()
    }
}

/// Text with a fixed-width translucent background below the centre of the
/// icon.
pub fn text_overlay_view(text: &str) -> View {
    View::stack([
        View::Icon,
        View::Text(TextView {
            content: text.to_string(),
            font_size: 160.0,
            weight: FontWeight::Bold,
            design: FontDesign::Rounded,
            color: None,
            scheme: Some(ColorScheme::Dark),
            width: Some(612.0),
            max_height: Some(189.0),
            minimum_scale_factor: 0.1,
            horizontal_padding: 16.0,
            background: Some(TextBackground {
                color: Color::Black.with_opacity(0.56, ColorScheme::Light),
                corner_radius: 32.0,
            }),
            offset_y: 184.0,
        }),
    ])
}

/// Where a user template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// A template source file.
    File(PathBuf),
    /// An installed plugin.
    Plugin(String),
}

impl TemplateRef {
    /// Interprets a command line argument: an existing file wins, then an
    /// installed plugin name.
    pub fn resolve(arg: &str, paths: &Paths) -> Result<Self> {
        let path = crate::fs::resolve_path(arg, false)?;
        if path.is_file() {
            return Ok(Self::File(path));
        }
        if PluginRegistry::load(paths)?.contains(arg) {
            return Ok(Self::Plugin(arg.to_string()));
        }
        Err(NewIconError::io(
            format!("no template file or installed plugin named {arg}"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ))
    }
}

/// Builds and opens user templates.
pub struct TemplateLoader<'a, B> {
    paths: &'a Paths,
    cache: BuildCache<'a, B>,
}

impl<'a, B: ArtifactBuilder> TemplateLoader<'a, B> {
    pub fn new(paths: &'a Paths, cache: BuildCache<'a, B>) -> Self {
        Self { paths, cache }
    }

    /// Builds (or reuses) the template and selects its template type.
    pub async fn load(
        &self,
        reference: &TemplateRef,
        kind: TemplateKind,
        preferred: Option<&str>,
        use_cache: bool,
    ) -> Result<Template> {
        let artifact = match reference {
            TemplateRef::File(path) => {
                let source = TemplateSource::read(path)?;
                self.cache.resolve(&source, use_cache).await?
            }
            TemplateRef::Plugin(name) => {
                let registry = PluginRegistry::load(self.paths)?;
                let entry = registry
                    .find(name)
                    .ok_or_else(|| NewIconError::Plugin(format!("plugin `{name}` is not installed")))?;
                BuildArtifact::new(entry.build.clone(), InstallLocation::plugin(self.paths, name))
            }
        };

        // On failure `artifact` drops here, removing temporary builds.
        let handle = loader::open(&artifact.dylib, kind, preferred)?;
        debug!(template = handle.template_type(), ?kind, "template ready");
        Ok(Template::from_plugin(handle, artifact))
    }

    /// Builds `path` into the plugins directory under `name`.
    pub async fn install(&self, path: &Path, name: &str) -> Result<BuildArtifact> {
        let source = TemplateSource::read(path)?;
        let location = InstallLocation::plugin(self.paths, name);
        if location.path().exists() {
            return Err(NewIconError::Plugin(format!(
                "{} already exists",
                location.path().display()
            )));
        }
        self.cache.build_into(&source, location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn symbols_per_kind() {
        assert_eq!(TemplateKind::Icon.is_template_symbol(), "newicon_is_icon_template");
        assert_eq!(TemplateKind::Image.render_template_symbol(), "newicon_render_image_template");
        let kind: TemplateKind = serde_json::from_str(r#""image""#).unwrap();
        assert_eq!(kind, TemplateKind::Image);
    }

    #[test]
    fn text_overlay_renders_payload_text() {
        let template = Template::text_overlay();
        assert_eq!(template.name(), TEXT_OVERLAY);

        let input = RenderInput::new(RgbaImage::new(4, 4)).with_payload("WIP").unwrap();
        let view = template.render(&input).unwrap();
        let View::Stack { children } = view else {
            panic!("expected a stack");
        };
        assert_eq!(children[0], View::Icon);
        let View::Text(text) = &children[1] else {
            panic!("expected text");
        };
        assert_eq!(text.content, "WIP");
        assert_eq!(text.width, Some(612.0));
        assert_eq!(text.offset_y, 184.0);
        assert_eq!(text.scheme, Some(ColorScheme::Dark));
        assert_eq!(text.background.unwrap().color, Color::Rgba([0, 0, 0, 143]));
    }

    #[test]
    fn text_overlay_requires_text() {
        let err = Template::text_overlay()
            .render(&RenderInput::new(RgbaImage::new(1, 1)))
            .unwrap_err();
        assert!(matches!(err, NewIconError::Render(_)));
    }

    #[test]
    fn resolves_files_before_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let file = dir.path().join("template.rs");
        std::fs::write(&file, "// t").unwrap();

        assert_eq!(
            TemplateRef::resolve(file.to_str().unwrap(), &paths).unwrap(),
            TemplateRef::File(file)
        );

        let mut registry = PluginRegistry::default();
        registry
            .add(crate::plugin::PluginEntry {
                name: "NewHue".into(),
                directory: paths.plugins_dir().join("NewHue"),
                build: paths.plugins_dir().join("NewHue/libtemplate.so"),
            })
            .unwrap();
        registry.save(&paths).unwrap();

        assert_eq!(
            TemplateRef::resolve("NewHue", &paths).unwrap(),
            TemplateRef::Plugin("NewHue".into())
        );
        assert!(TemplateRef::resolve("Unknown", &paths).is_err());
    }
}
