use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, existing_path};
use crate::icon_ops;

/// Remove the custom icon of a file or folder.
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// File or folder to reset.
    path: String,
}

impl ResetCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let target = existing_path(&self.path)?;
        let store = ctx.store()?;
        icon_ops::reset(store.as_ref(), &target)
            .with_context(|| format!("failed to reset the icon of {}", target.display()))?;
        println!("Reset the icon of {}", target.display());
        Ok(())
    }
}
