//! Registry of installed template plugins.
//!
//! Stored at `<root>/plugins/metadata.json`:
//!
//! ```json
//! {
//!   "version": "1",
//!   "data": [
//!     { "name": "NewHue", "directory": "/home/me/.new-icon/plugins/NewHue", "build": "/home/me/.new-icon/plugins/NewHue/template/target/release/libtemplate.so" }
//!   ]
//! }
//! ```
//!
//! The file is read, modified and rewritten atomically; there is no lock
//! across concurrent processes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Paths;
use crate::error::{NewIconError, Result};
use crate::fs::atomic_write;

pub const REGISTRY_VERSION: &str = "1";

const METADATA_FILE: &str = "metadata.json";

/// One installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    /// Install location, removed on uninstall.
    pub directory: PathBuf,
    /// The built dynamic library.
    pub build: PathBuf,
}

/// The installed plugin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRegistry {
    pub version: String,
    pub data: Vec<PluginEntry>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION.to_string(),
            data: Vec::new(),
        }
    }
}

impl PluginRegistry {
    pub fn file(paths: &Paths) -> PathBuf {
        paths.plugins_dir().join(METADATA_FILE)
    }

    /// Loads the registry; a missing file is an empty registry.
    pub fn load(paths: &Paths) -> Result<Self> {
        let path = Self::file(paths);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no plugin registry yet");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(NewIconError::io(format!("failed to read {}", path.display()), e));
            }
        };
        let registry: Self = serde_json::from_slice(&bytes).map_err(|e| {
            NewIconError::Plugin(format!("corrupt plugin registry {}: {e}", path.display()))
        })?;
        if registry.version != REGISTRY_VERSION {
            return Err(NewIconError::Plugin(format!(
                "unsupported plugin registry version {} in {}",
                registry.version,
                path.display()
            )));
        }
        Ok(registry)
    }

    pub fn save(&self, paths: &Paths) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(&Self::file(paths), &json)
    }

    pub fn find(&self, name: &str) -> Option<&PluginEntry> {
        self.data.iter().find(|entry| entry.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Adds an entry. Names are unique.
    pub fn add(&mut self, entry: PluginEntry) -> Result<()> {
        if self.contains(&entry.name) {
            return Err(NewIconError::Plugin(format!(
                "plugin `{}` is already installed",
                entry.name
            )));
        }
        self.data.push(entry);
        Ok(())
    }

    /// Removes and returns the named entry.
    pub fn remove(&mut self, name: &str) -> Result<PluginEntry> {
        let index = self
            .data
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| NewIconError::Plugin(format!("plugin `{name}` is not installed")))?;
        Ok(self.data.remove(index))
    }
}

/// Checks that `name` is usable as a plugin directory name.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name != METADATA_FILE
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some();
    if valid {
        Ok(())
    } else {
        Err(NewIconError::Plugin(format!("invalid plugin name `{name}`")))
    }
}
