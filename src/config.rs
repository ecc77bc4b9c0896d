//! Configuration and on-disk layout.
//!
//! Everything `new-icon` persists lives under a single root directory:
//!
//! ```text
//! ~/.new-icon/               ($NEW_ICON_HOME overrides)
//! ├── config.toml            optional, see [`Config`]
//! ├── temp/<uuid>/           temporary scaffolds, deleted after use
//! ├── cache/<fingerprint>/   cached template builds
//! ├── plugins/<name>/        installed template plugins
//! │   └── metadata.json      installed plugin registry
//! └── icons/                 icon images referenced by the icon stores
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NewIconError, Result};

/// Environment variable overriding the root directory.
pub const HOME_ENV: &str = "NEW_ICON_HOME";

const DEFAULT_DIR_NAME: &str = ".new-icon";

/// Which icon store backs the custom icon association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconStoreKind {
    /// `gio` when available, otherwise the sidecar store.
    #[default]
    Auto,
    Gio,
    Sidecar,
}

/// User configuration, read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Cargo executable used to build templates.
    pub cargo: String,

    /// Extra environment variables for template builds.
    pub build_env: BTreeMap<String, String>,

    pub icon_store: IconStoreKind,

    /// Editor for `template edit`. Falls back to `$VISUAL`, then `$EDITOR`.
    pub editor: Option<String>,

    /// Directory overriding the bundled scaffold resources.
    pub resources_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cargo: "cargo".to_string(),
            build_env: BTreeMap::new(),
            icon_store: IconStoreKind::Auto,
            editor: None,
            resources_dir: None,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, `<root>/config.toml` is read
    /// when present and defaults are used otherwise.
    pub fn load(explicit: Option<&Path>, paths: &Paths) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = paths.config_file();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| NewIconError::Config {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|message| NewIconError::Config { path, message })
    }

    fn from_toml(text: &str) -> std::result::Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// The editor command, if one is configured anywhere.
    pub fn editor_command(&self) -> Option<String> {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|e| !e.trim().is_empty())
    }
}

/// Resolved directories under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Uses an explicit root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the root from `$NEW_ICON_HOME` or the home directory.
    pub fn from_env() -> Result<Self> {
        if let Some(home) = std::env::var(HOME_ENV).ok().filter(|h| !h.trim().is_empty()) {
            return Ok(Self::new(crate::fs::resolve_path(&home, false)?));
        }
        let home = dirs::home_dir().ok_or_else(|| NewIconError::Config {
            path: PathBuf::from("~"),
            message: "could not determine the home directory".into(),
        })?;
        Ok(Self::new(home.join(DEFAULT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.root.join("icons")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let config = Config::load(None, &paths).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cargo, "cargo");
    }

    #[test]
    fn parses_partial_file() {
        let config = Config::from_toml(
            r#"
            cargo = "/opt/rust/bin/cargo"
            icon-store = "sidecar"

            [build-env]
            CARGO_NET_OFFLINE = "true"
            "#,
        )
        .unwrap();
        assert_eq!(config.cargo, "/opt/rust/bin/cargo");
        assert_eq!(config.icon_store, IconStoreKind::Sidecar);
        assert_eq!(config.build_env.get("CARGO_NET_OFFLINE").unwrap(), "true");
        assert!(config.resources_dir.is_none());
    }

    #[test]
    fn keys_are_kebab_case() {
        let config = Config::from_toml(
            r#"
            editor = "vi"
            resources-dir = "/srv/new-icon/resources"
            "#,
        )
        .unwrap();
        assert_eq!(config.editor.as_deref(), Some("vi"));
        assert_eq!(
            config.resources_dir.as_deref(),
            Some(Path::new("/srv/new-icon/resources"))
        );

        // snake_case spellings are not config keys
        let config = Config::from_toml("resources_dir = \"/srv\"").unwrap();
        assert!(config.resources_dir.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        let err = Config::load(Some(&dir.path().join("nope.toml")), &paths).unwrap_err();
        assert!(matches!(err, NewIconError::Config { .. }));
    }

    #[test]
    fn unknown_store_kind_is_rejected() {
        assert!(Config::from_toml("icon-store = \"finder\"").is_err());
    }

    #[test]
    #[serial]
    fn root_from_env() {
        let dir = tempfile::tempdir().unwrap();
        // SAFETY: serialized with other tests touching the environment.
        unsafe { std::env::set_var(HOME_ENV, dir.path()) };
        let paths = Paths::from_env().unwrap();
        unsafe { std::env::remove_var(HOME_ENV) };

        assert_eq!(paths.root(), dir.path());
        assert_eq!(paths.cache_dir(), dir.path().join("cache"));
        assert_eq!(paths.plugins_dir(), dir.path().join("plugins"));
    }
}
