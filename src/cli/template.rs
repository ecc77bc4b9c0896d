use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use super::{Context, RenderArgs, existing_path};
use crate::actions::apply_template;
use crate::fs::atomic_write;
use crate::plugin::cache;
use crate::plugin::scaffold::{self, SAMPLE_TEMPLATE};
use crate::plugin::{BuildCache, CargoBuilder, InstallLocation, ScaffoldPackage, TemplateSource};
use crate::process::{CommandSpec, OutputMode};
use crate::template::{TemplateLoader, TemplateRef};

/// How often `template edit` copies the working copy back.
const SYNC_INTERVAL: Duration = Duration::from_millis(500);

const DEFAULT_TEMPLATE_PATH: &str = "template.rs";

/// Create, edit and apply icon templates.
#[derive(Args, Debug)]
pub struct TemplateCommand {
    #[command(subcommand)]
    command: TemplateSubcommand,
}

#[derive(Subcommand, Debug)]
enum TemplateSubcommand {
    /// Write a sample template file.
    Init {
        /// Where to write it.
        #[arg(default_value = DEFAULT_TEMPLATE_PATH)]
        path: String,
    },

    /// Edit a template inside a buildable package, syncing changes back.
    Edit {
        /// Template file to edit.
        path: String,
    },

    /// Render an icon template over the icon of a file or folder.
    Icon {
        /// Template file or installed plugin name.
        template: String,

        /// File or folder whose icon changes.
        path: String,

        /// Content passed to the template.
        content: Option<String>,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Manage the template build cache.
    Cache {
        #[command(subcommand)]
        command: CacheSubcommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// Delete every cached template build.
    Clear,
}

impl TemplateCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self.command {
            TemplateSubcommand::Init { path } => init(ctx, &path),
            TemplateSubcommand::Edit { path } => edit(ctx, &path).await,
            TemplateSubcommand::Icon {
                template,
                path,
                content,
                render,
            } => icon(ctx, &template, &path, content.as_deref(), &render).await,
            TemplateSubcommand::Cache {
                command: CacheSubcommand::Clear,
            } => {
                cache::clear(&ctx.paths).context("failed to clear the template cache")?;
                println!("Cleared the template cache");
                Ok(())
            }
        }
    }
}

fn init(ctx: &Context, raw: &str) -> Result<()> {
    let path = crate::fs::resolve_path(raw, false)?;
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let sample = ctx.resources().load(SAMPLE_TEMPLATE)?;
    atomic_write(&path, sample.as_bytes())?;
    println!("Created {}", path.display());
    Ok(())
}

async fn icon(
    ctx: &Context,
    template: &str,
    raw_target: &str,
    content: Option<&str>,
    render: &RenderArgs,
) -> Result<()> {
    let reference = TemplateRef::resolve(template, &ctx.paths)?;
    let target = existing_path(raw_target)?;
    let options = render.options()?;

    let store = ctx.store()?;
    let resources = ctx.resources();
    let builder = CargoBuilder::new(&ctx.processes, &ctx.config);
    let loader = TemplateLoader::new(&ctx.paths, BuildCache::new(&ctx.paths, &resources, &builder));

    apply_template(&loader, store.as_ref(), &reference, &target, content, &options)
        .await
        .with_context(|| format!("failed to apply {template} to {}", target.display()))?;

    match &options.output {
        Some(path) => println!("Wrote {}", path.display()),
        None => println!("Updated the icon of {}", target.display()),
    }
    Ok(())
}

/// A scaffold that is removed when dropped.
struct WorkingPackage(ScaffoldPackage);

impl Drop for WorkingPackage {
    fn drop(&mut self) {
        self.0.location.cleanup_or_warn(false);
    }
}

async fn edit(ctx: &Context, raw: &str) -> Result<()> {
    let original = existing_path(raw)?;
    let source = TemplateSource::read(&original)?;
    let package = WorkingPackage(scaffold::generate(
        &source,
        InstallLocation::temporary(&ctx.paths),
        &ctx.resources(),
    )?);
    let working = package.0.source_file.clone();
    let mut synced = source.content;

    println!("Editing {}", original.display());
    println!("Working copy: {}", working.display());

    let editor = ctx
        .config
        .editor_command()
        .map(|command| editor_spec(&command, &package.0.package_dir));
    let editing = async {
        match &editor {
            Some(spec) => {
                debug!(command = %spec.display(), "launching editor");
                let output = ctx.processes.run(spec, OutputMode::Inherit).await?;
                if !output.success() {
                    warn!("editor exited with {}", output.status);
                }
                Ok(())
            }
            None => {
                println!("No editor configured; edit the working copy in any editor.");
                Ok::<_, crate::error::NewIconError>(())
            }
        }
    };
    tokio::pin!(editing);

    let mut ticker = tokio::time::interval(SYNC_INTERVAL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut editor_done = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sync_working_copy(&working, &original, &mut synced) {
                    warn!("sync failed: {e}");
                }
            }
            result = &mut editing, if !editor_done => {
                editor_done = true;
                result?;
                println!("Press return to finish editing.");
            }
            line = lines.next_line(), if editor_done => {
                line.context("failed to read from stdin")?;
                break;
            }
        }
    }

    sync_working_copy(&working, &original, &mut synced)?;
    println!("Saved {}", original.display());
    Ok(())
}

/// Command line for the configured editor, opened on `dir`.
fn editor_spec(command: &str, dir: &Path) -> CommandSpec {
    let mut parts = command.split_whitespace();
    let program = parts.next().unwrap_or_default();
    CommandSpec::new(program)
        .args(parts)
        .args([dir.to_string_lossy().into_owned()])
}

/// Copies the working copy over the original when it changed since the
/// last sync. Returns whether anything was written.
fn sync_working_copy(working: &Path, original: &Path, synced: &mut Vec<u8>) -> Result<bool> {
    let current = std::fs::read(working)
        .with_context(|| format!("failed to read {}", working.display()))?;
    if current == *synced {
        return Ok(false);
    }
    atomic_write(original, &current)?;
    debug!(original = %original.display(), bytes = current.len(), "synced working copy");
    *synced = current;
    Ok(true)
}
