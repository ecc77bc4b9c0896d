use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use super::{Context, existing_path};
use crate::actions::{install_plugin, uninstall_plugin};
use crate::plugin::{BuildCache, CargoBuilder, PluginRegistry};
use crate::template::TemplateLoader;

/// Manage installed template plugins.
#[derive(Args, Debug)]
pub struct PluginCommand {
    #[command(subcommand)]
    command: PluginSubcommand,
}

#[derive(Subcommand, Debug)]
enum PluginSubcommand {
    /// List installed plugins.
    List,

    /// Build a template file and install it under a name.
    Install {
        /// Template file to install.
        path: String,

        /// Plugin name; defaults to the file name without extension.
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove an installed plugin.
    Uninstall {
        name: String,
    },
}

impl PluginCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        match self.command {
            PluginSubcommand::List => list(ctx),
            PluginSubcommand::Install { path, name } => install(ctx, &path, name).await,
            PluginSubcommand::Uninstall { name } => {
                uninstall_plugin(&ctx.paths, &name)
                    .with_context(|| format!("failed to uninstall {name}"))?;
                println!("Uninstalled {name}");
                Ok(())
            }
        }
    }
}

fn list(ctx: &Context) -> Result<()> {
    let registry = PluginRegistry::load(&ctx.paths)?;
    if registry.data.is_empty() {
        println!("No plugins installed");
        return Ok(());
    }
    for entry in &registry.data {
        println!("{}\t{}", entry.name, entry.build.display());
    }
    Ok(())
}

async fn install(ctx: &Context, raw: &str, name: Option<String>) -> Result<()> {
    let path = existing_path(raw)?;
    let name = match name {
        Some(name) => name,
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a plugin name from {}", path.display()))?,
    };

    let resources = ctx.resources();
    let builder = CargoBuilder::new(&ctx.processes, &ctx.config);
    let loader = TemplateLoader::new(&ctx.paths, BuildCache::new(&ctx.paths, &resources, &builder));

    let entry = install_plugin(&loader, &ctx.paths, &path, &name)
        .await
        .with_context(|| format!("failed to install {}", path.display()))?;
    println!("Installed {} ({})", entry.name, entry.directory.display());
    Ok(())
}
