//! End-to-end operations behind the commands.
//!
//! Icon changes run build, acquire, render, apply. Build and acquisition
//! failures leave the target untouched. Render and apply failures roll the
//! target's icon back before returning.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Paths;
use crate::error::{NewIconError, Result};
use crate::fs::remove_dir_if_exists;
use crate::icon_ops::{self, Output};
use crate::plugin::registry::validate_name;
use crate::plugin::{ArtifactBuilder, PluginEntry, PluginRegistry, RenderInput};
use crate::store::IconStore;
use crate::template::{Template, TemplateKind, TemplateLoader, TemplateRef};

/// Options shared by every render.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Image to render over instead of the target's current icon.
    pub image: Option<PathBuf>,
    /// Template type to select when a module registers several.
    pub template_type: Option<String>,
    /// Rebuild into a temporary location instead of using the cache.
    pub no_use_cache: bool,
    /// Write an image file instead of setting the icon.
    pub output: Option<PathBuf>,
}

impl RenderOptions {
    fn output_for(&self, target: &Path) -> Output {
        match &self.output {
            Some(path) => Output::File(path.clone()),
            None => Output::SetIcon(target.to_path_buf()),
        }
    }
}

/// Renders `text` over the icon of `target`, with the built-in text overlay
/// or a user image template.
pub async fn apply_text<B: ArtifactBuilder>(
    loader: &TemplateLoader<'_, B>,
    store: &dyn IconStore,
    target: &Path,
    text: &str,
    template: Option<&TemplateRef>,
    options: &RenderOptions,
) -> Result<()> {
    let template = match template {
        Some(reference) => {
            loader
                .load(
                    reference,
                    TemplateKind::Image,
                    options.template_type.as_deref(),
                    !options.no_use_cache,
                )
                .await?
        }
        None => Template::text_overlay(),
    };
    render_and_apply(&template, store, target, Some(text), options)
}

/// Renders the icon template `reference` over the icon of `target`, passing
/// `content` when given.
pub async fn apply_template<B: ArtifactBuilder>(
    loader: &TemplateLoader<'_, B>,
    store: &dyn IconStore,
    reference: &TemplateRef,
    target: &Path,
    content: Option<&str>,
    options: &RenderOptions,
) -> Result<()> {
    let template = loader
        .load(
            reference,
            TemplateKind::Icon,
            options.template_type.as_deref(),
            !options.no_use_cache,
        )
        .await?;
    render_and_apply(&template, store, target, content, options)
}

fn render_and_apply(
    template: &Template,
    store: &dyn IconStore,
    target: &Path,
    payload: Option<&str>,
    options: &RenderOptions,
) -> Result<()> {
    let record = icon_ops::acquire(store, target, options.image.as_deref())?;

    let mut input = RenderInput::new(record.image().data.clone());
    if let Some(payload) = payload {
        input = input.with_payload(payload)?;
    }
    let view = template.render(&input)?;
    info!(template = template.name(), nodes = view.node_count(), "rendered");

    let output = options.output_for(target);
    icon_ops::apply(record, &view, &output)
}

/// Builds the template at `path` into the plugins directory and records it
/// under `name`.
pub async fn install_plugin<B: ArtifactBuilder>(
    loader: &TemplateLoader<'_, B>,
    paths: &Paths,
    path: &Path,
    name: &str,
) -> Result<PluginEntry> {
    validate_name(name)?;
    let mut registry = PluginRegistry::load(paths)?;
    if registry.contains(name) {
        return Err(NewIconError::Plugin(format!(
            "plugin `{name}` is already installed"
        )));
    }

    let artifact = loader.install(path, name).await?;
    let entry = PluginEntry {
        name: name.to_string(),
        directory: artifact.location.path().to_path_buf(),
        build: artifact.dylib.clone(),
    };
    registry.add(entry.clone())?;
    if let Err(err) = registry.save(paths) {
        artifact.location.cleanup_or_warn(true);
        return Err(err);
    }
    info!(plugin = name, build = %entry.build.display(), "installed plugin");
    Ok(entry)
}

/// Forgets the plugin `name` and deletes its directory.
pub fn uninstall_plugin(paths: &Paths, name: &str) -> Result<PluginEntry> {
    let mut registry = PluginRegistry::load(paths)?;
    let entry = registry.remove(name)?;
    registry.save(paths)?;
    remove_dir_if_exists(&entry.directory)?;
    info!(plugin = name, "uninstalled plugin");
    Ok(entry)
}
