use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, RenderArgs, existing_path};
use crate::actions::apply_text;
use crate::plugin::{BuildCache, CargoBuilder};
use crate::template::{TemplateLoader, TemplateRef};

/// Render text over the icon of a file or folder.
#[derive(Args, Debug)]
pub struct TextCommand {
    /// File or folder whose icon changes.
    path: String,

    /// Text to render.
    text: String,

    /// Image template file or installed plugin to render the text with.
    #[arg(short, long, value_name = "TEMPLATE")]
    template: Option<String>,

    #[command(flatten)]
    render: RenderArgs,
}

impl TextCommand {
    pub async fn execute(self, ctx: &Context) -> Result<()> {
        let target = existing_path(&self.path)?;
        let options = self.render.options()?;
        let template = self
            .template
            .as_deref()
            .map(|raw| TemplateRef::resolve(raw, &ctx.paths))
            .transpose()?;

        let store = ctx.store()?;
        let resources = ctx.resources();
        let builder = CargoBuilder::new(&ctx.processes, &ctx.config);
        let loader = TemplateLoader::new(&ctx.paths, BuildCache::new(&ctx.paths, &resources, &builder));

        apply_text(&loader, store.as_ref(), &target, &self.text, template.as_ref(), &options)
            .await
            .with_context(|| format!("failed to render text onto {}", target.display()))?;

        match &options.output {
            Some(path) => println!("Wrote {}", path.display()),
            None => println!("Updated the icon of {}", target.display()),
        }
        Ok(())
    }
}
