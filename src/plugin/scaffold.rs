//! Scaffold generation: turns a single template source file into a buildable
//! Cargo package.
//!
//! ```text
//! <install>/template/
//! ├── Cargo.toml          bundled, declares its own empty workspace
//! ├── src/lib.rs          the user's template file
//! └── support/
//!     ├── Cargo.toml      bundled support crate
//!     └── src/lib.rs
//! ```
//!
//! Every file except the user's is copied byte for byte from the bundled
//! resources. Resources are compiled in and may be overridden file by file
//! from a directory set in the configuration.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Paths;
use crate::error::{IoResultExt, NewIconError, Result};
use crate::fs::{ensure_dir, remove_dir_if_exists, sha256_hex};

pub const TEMPLATE_MANIFEST: &str = "template.Cargo.toml";
pub const SUPPORT_MANIFEST: &str = "support.Cargo.toml";
pub const SUPPORT_LIB: &str = "support.lib.rs";
pub const SAMPLE_TEMPLATE: &str = "sample_template.rs";

const BUNDLED: &[(&str, &str)] = &[
    (
        TEMPLATE_MANIFEST,
        include_str!("../../resources/scaffold/template.Cargo.toml"),
    ),
    (
        SUPPORT_MANIFEST,
        include_str!("../../resources/scaffold/support.Cargo.toml"),
    ),
    (
        SUPPORT_LIB,
        include_str!("../../resources/scaffold/support.lib.rs"),
    ),
    (
        SAMPLE_TEMPLATE,
        include_str!("../../resources/scaffold/sample_template.rs"),
    ),
];

/// Source of the fixed scaffold files.
#[derive(Debug, Clone, Default)]
pub struct Resources {
    override_dir: Option<PathBuf>,
}

impl Resources {
    /// The resources compiled into the binary.
    pub fn bundled() -> Self {
        Self { override_dir: None }
    }

    /// Resources read from `dir` instead of the bundled copies.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    /// Contents of the named resource.
    pub fn load(&self, name: &str) -> Result<Cow<'static, str>> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(name);
            let text = std::fs::read_to_string(&path)
                .io_context(|| format!("missing scaffold resource {}", path.display()))?;
            return Ok(Cow::Owned(text));
        }
        BUNDLED
            .iter()
            .find(|(bundled, _)| *bundled == name)
            .map(|(_, text)| Cow::Borrowed(*text))
            .ok_or_else(|| {
                NewIconError::io(
                    format!("missing scaffold resource {name}"),
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                )
            })
    }
}

/// A user-authored template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Absolute path of the file.
    pub path: PathBuf,
    pub content: Vec<u8>,
}

impl TemplateSource {
    /// Reads the template at `path`, made absolute against the current
    /// directory.
    pub fn read(path: &Path) -> Result<Self> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .io_context(|| "failed to read the current directory")?
                .join(path)
        };
        let content =
            std::fs::read(&path).io_context(|| format!("failed to read template {}", path.display()))?;
        Ok(Self { path, content })
    }

    /// Cache key: SHA-256 over the absolute path, the byte length and the
    /// content hash, NUL separated.
    pub fn fingerprint(&self) -> String {
        let mut key = Vec::with_capacity(self.path.as_os_str().len() + 96);
        key.extend_from_slice(self.path.to_string_lossy().as_bytes());
        key.push(0);
        key.extend_from_slice(self.content.len().to_string().as_bytes());
        key.push(0);
        key.extend_from_slice(sha256_hex(&self.content).as_bytes());
        sha256_hex(&key)
    }
}

/// Where a package is generated, which decides when it is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLocation {
    /// `<root>/temp/<uuid>`; removed as soon as the template is done.
    Temporary(PathBuf),
    /// `<root>/cache/<fingerprint>`; kept as a cache entry.
    Cached(PathBuf),
    /// `<root>/plugins/<name>`; kept until uninstalled.
    Plugin { name: String, dir: PathBuf },
}

impl InstallLocation {
    /// A fresh unique temporary location.
    pub fn temporary(paths: &Paths) -> Self {
        Self::Temporary(paths.temp_dir().join(uuid::Uuid::new_v4().to_string()))
    }

    pub fn cached(paths: &Paths, fingerprint: &str) -> Self {
        Self::Cached(paths.cache_dir().join(fingerprint))
    }

    pub fn plugin(paths: &Paths, name: &str) -> Self {
        Self::Plugin {
            name: name.to_string(),
            dir: paths.plugins_dir().join(name),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) | Self::Cached(dir) => dir,
            Self::Plugin { dir, .. } => dir,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Removes the location. Without `force` only temporary locations are
    /// removed.
    pub fn cleanup(&self, force: bool) -> Result<()> {
        if !force && !self.is_temporary() {
            return Ok(());
        }
        debug!(path = %self.path().display(), force, "removing install location");
        remove_dir_if_exists(self.path())
    }

    /// Like [`cleanup`](Self::cleanup), logging instead of failing.
    pub fn cleanup_or_warn(&self, force: bool) {
        if let Err(err) = self.cleanup(force) {
            warn!("failed to clean up {}: {err}", self.path().display());
        }
    }
}

/// A generated package on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldPackage {
    pub location: InstallLocation,
    /// `<install>/template`, where cargo runs.
    pub package_dir: PathBuf,
    /// The user's file inside the package.
    pub source_file: PathBuf,
}

/// Writes the package for `source` into `location`.
pub fn generate(
    source: &TemplateSource,
    location: InstallLocation,
    resources: &Resources,
) -> Result<ScaffoldPackage> {
    let package_dir = location.path().join("template");
    let source_file = package_dir.join("src").join("lib.rs");
    let support_dir = package_dir.join("support");

    // Resolve every resource before touching the disk.
    let files = [
        (package_dir.join("Cargo.toml"), resources.load(TEMPLATE_MANIFEST)?),
        (support_dir.join("Cargo.toml"), resources.load(SUPPORT_MANIFEST)?),
        (support_dir.join("src").join("lib.rs"), resources.load(SUPPORT_LIB)?),
    ];

    ensure_dir(&package_dir.join("src"))?;
    ensure_dir(&support_dir.join("src"))?;
    for (path, text) in &files {
        std::fs::write(path, text.as_bytes())
            .io_context(|| format!("failed to write {}", path.display()))?;
    }
    std::fs::write(&source_file, &source.content)
        .io_context(|| format!("failed to write {}", source_file.display()))?;

    debug!(
        source = %source.path.display(),
        package = %package_dir.display(),
        "generated template package"
    );
    Ok(ScaffoldPackage {
        location,
        package_dir,
        source_file,
    })
}
