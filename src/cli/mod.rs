//! Command-line interface for `new-icon`.
//!
//! - `text` renders text over a file's icon
//! - `reset` removes a custom icon
//! - `template` creates, edits and applies template source files
//! - `plugin` installs templates under a name

mod plugin;
mod reset;
mod template;
mod text;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};

use crate::actions::RenderOptions;
use crate::config::{Config, Paths};
use crate::plugin::Resources;
use crate::process::ProcessManager;
use crate::store::{IconStore, open_store};

#[derive(Parser)]
#[command(
    name = "new-icon",
    about = "Replace file and folder icons, optionally rendering them through Rust templates",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file to use instead of `<root>/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render text over the icon of a file or folder.
    Text(text::TextCommand),

    /// Remove the custom icon of a file or folder.
    Reset(reset::ResetCommand),

    /// Create, edit and apply icon templates.
    Template(template::TemplateCommand),

    /// Manage installed template plugins.
    Plugin(plugin::PluginCommand),
}

impl Cli {
    /// Log filter implied by `--verbose` and `--quiet`.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    pub async fn execute(self) -> Result<()> {
        let ctx = Context::load(self.config.as_deref())?;
        match self.command {
            Commands::Text(cmd) => cmd.execute(&ctx).await,
            Commands::Reset(cmd) => cmd.execute(&ctx),
            Commands::Template(cmd) => cmd.execute(&ctx).await,
            Commands::Plugin(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// State shared by every command of one invocation.
pub(crate) struct Context {
    pub paths: Paths,
    pub config: Config,
    pub processes: ProcessManager,
}

impl Context {
    fn load(config: Option<&Path>) -> Result<Self> {
        let paths = Paths::from_env().context("failed to locate the new-icon directory")?;
        let config = Config::load(config, &paths)?;
        Ok(Self {
            paths,
            config,
            processes: ProcessManager::new(),
        })
    }

    pub fn resources(&self) -> Resources {
        match &self.config.resources_dir {
            Some(dir) => Resources::from_dir(dir),
            None => Resources::bundled(),
        }
    }

    pub fn store(&self) -> Result<Box<dyn IconStore>> {
        Ok(open_store(self.config.icon_store, &self.paths)?)
    }
}

/// Rendering options shared by `text` and `template icon`.
#[derive(Args, Debug, Clone)]
pub(crate) struct RenderArgs {
    /// Render over this image instead of the current icon.
    #[arg(short, long, value_name = "IMAGE")]
    image: Option<String>,

    /// Template type to use when the template file defines several.
    #[arg(long, value_name = "NAME")]
    template_type: Option<String>,

    /// Build into a temporary directory instead of the template cache.
    #[arg(long)]
    no_use_cache: bool,

    /// Write the icon to an image file instead of setting it.
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,
}

impl RenderArgs {
    fn options(&self) -> Result<RenderOptions> {
        let image = self
            .image
            .as_deref()
            .map(|raw| crate::fs::resolve_path(raw, true))
            .transpose()
            .context("invalid --image")?;
        let output = self
            .output
            .as_deref()
            .map(|raw| crate::fs::resolve_path(raw, false))
            .transpose()
            .context("invalid --output")?;
        Ok(RenderOptions {
            image,
            template_type: self.template_type.clone(),
            no_use_cache: self.no_use_cache,
            output,
        })
    }
}

/// Resolves a file or folder argument that must exist.
fn existing_path(raw: &str) -> Result<PathBuf> {
    Ok(crate::fs::resolve_path(raw, true)?)
}
