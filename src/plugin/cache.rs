//! Build cache keyed by template fingerprint.
//!
//! A cache entry is a package directory `<root>/cache/<fingerprint>` holding
//! the scaffold, its cargo target directory, and `metadata.json`:
//!
//! ```json
//! { "version": 1, "source": "/abs/template.rs", "dylib": "/abs/.../libtemplate.so" }
//! ```
//!
//! An entry is used only when the metadata parses, carries
//! [`CACHE_FORMAT_VERSION`], and its dylib exists. Anything else is wiped and
//! rebuilt. Entries are not locked across processes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::build::ArtifactBuilder;
use super::scaffold::{InstallLocation, Resources, TemplateSource, generate};
use crate::config::Paths;
use crate::error::{NewIconError, Result};
use crate::fs::{atomic_write, remove_dir_if_exists};

pub const CACHE_FORMAT_VERSION: u32 = 1;

const METADATA_FILE: &str = "metadata.json";

/// The metadata record stored next to a cached build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: u32,
    pub source: PathBuf,
    pub dylib: PathBuf,
}

/// A built dynamic library and the location that owns it.
///
/// Dropping the artifact removes temporary locations.
#[derive(Debug)]
pub struct BuildArtifact {
    pub dylib: PathBuf,
    pub location: InstallLocation,
}

impl BuildArtifact {
    pub fn new(dylib: PathBuf, location: InstallLocation) -> Self {
        Self { dylib, location }
    }
}

impl Drop for BuildArtifact {
    fn drop(&mut self) {
        self.location.cleanup_or_warn(false);
    }
}

/// Resolves template sources to built artifacts, reusing cached builds.
pub struct BuildCache<'a, B> {
    paths: &'a Paths,
    resources: &'a Resources,
    builder: &'a B,
}

impl<'a, B: ArtifactBuilder> BuildCache<'a, B> {
    pub fn new(paths: &'a Paths, resources: &'a Resources, builder: &'a B) -> Self {
        Self {
            paths,
            resources,
            builder,
        }
    }

    /// Returns an artifact for `source`.
    ///
    /// Without `use_cache` the build goes to a fresh temporary location that
    /// is removed when the artifact is dropped.
    pub async fn resolve(&self, source: &TemplateSource, use_cache: bool) -> Result<BuildArtifact> {
        if !use_cache {
            return self
                .build_into(source, InstallLocation::temporary(self.paths))
                .await;
        }

        let fingerprint = source.fingerprint();
        let location = InstallLocation::cached(self.paths, &fingerprint);
        match read_entry(location.path()) {
            Ok(metadata) => {
                debug!(%fingerprint, dylib = %metadata.dylib.display(), "template cache hit");
                return Ok(BuildArtifact::new(metadata.dylib, location));
            }
            Err(NewIconError::Cache(reason)) => {
                debug!(%fingerprint, %reason, "template cache miss");
            }
            Err(err) => return Err(err),
        }

        remove_dir_if_exists(location.path())?;
        let artifact = self.build_into(source, location).await?;
        let metadata = ArtifactMetadata {
            version: CACHE_FORMAT_VERSION,
            source: source.path.clone(),
            dylib: artifact.dylib.clone(),
        };
        let record = serde_json::to_vec_pretty(&metadata)?;
        if let Err(err) = atomic_write(&artifact.location.path().join(METADATA_FILE), &record) {
            artifact.location.cleanup_or_warn(true);
            return Err(err);
        }
        Ok(artifact)
    }

    /// Scaffolds and builds into `location`. On failure the location is
    /// removed whatever its kind.
    pub async fn build_into(
        &self,
        source: &TemplateSource,
        location: InstallLocation,
    ) -> Result<BuildArtifact> {
        let package = match generate(source, location.clone(), self.resources) {
            Ok(package) => package,
            Err(err) => {
                location.cleanup_or_warn(true);
                return Err(err);
            }
        };
        match self.builder.build(&package).await {
            Ok(dylib) => Ok(BuildArtifact::new(dylib, location)),
            Err(err) => {
                location.cleanup_or_warn(true);
                Err(err)
            }
        }
    }
}

/// Reads and validates a cache entry. Every reason to rebuild is a
/// [`NewIconError::Cache`].
fn read_entry(dir: &Path) -> Result<ArtifactMetadata> {
    let path = dir.join(METADATA_FILE);
    let bytes = std::fs::read(&path)
        .map_err(|e| NewIconError::Cache(format!("{}: {e}", path.display())))?;
    let metadata: ArtifactMetadata = serde_json::from_slice(&bytes)
        .map_err(|e| NewIconError::Cache(format!("{}: {e}", path.display())))?;
    if metadata.version != CACHE_FORMAT_VERSION {
        return Err(NewIconError::Cache(format!(
            "format version {} (expected {CACHE_FORMAT_VERSION})",
            metadata.version
        )));
    }
    if !metadata.dylib.is_file() {
        return Err(NewIconError::Cache(format!(
            "missing artifact {}",
            metadata.dylib.display()
        )));
    }
    Ok(metadata)
}

/// Removes every cached build.
pub fn clear(paths: &Paths) -> Result<()> {
    debug!(dir = %paths.cache_dir().display(), "clearing template cache");
    remove_dir_if_exists(&paths.cache_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::scaffold::ScaffoldPackage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fake library next to the package instead of running cargo.
    #[derive(Default)]
    struct FakeBuilder {
        builds: AtomicUsize,
        fail: bool,
    }

    impl ArtifactBuilder for FakeBuilder {
        async fn build(&self, package: &ScaffoldPackage) -> Result<PathBuf> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NewIconError::Build {
                    command: "cargo build".into(),
                    status: "exit status: 101".into(),
                    output: "error[E0425]".into(),
                });
            }
            let dylib = package.package_dir.join("target/release/libtemplate.so");
            std::fs::create_dir_all(dylib.parent().unwrap()).unwrap();
            std::fs::write(&dylib, b"\x7fELF").unwrap();
            Ok(dylib)
        }
    }

    fn write_source(dir: &Path, content: &str) -> TemplateSource {
        let path = dir.join("template.rs");
        std::fs::write(&path, content).unwrap();
        TemplateSource::read(&path).unwrap()
    }

    #[tokio::test]
    async fn unchanged_source_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let resources = Resources::bundled();
        let builder = FakeBuilder::default();
        let cache = BuildCache::new(&paths, &resources, &builder);
        let source = write_source(dir.path(), "// v1");

        let first = cache.resolve(&source, true).await.unwrap();
        let second = cache.resolve(&source, true).await.unwrap();

        assert_eq!(first.dylib, second.dylib);
        assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
        assert!(first.location.path().join(METADATA_FILE).exists());
    }

    #[tokio::test]
    async fn changed_byte_rebuilds_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let resources = Resources::bundled();
        let builder = FakeBuilder::default();
        let cache = BuildCache::new(&paths, &resources, &builder);

        let first = cache.resolve(&write_source(dir.path(), "// v1"), true).await.unwrap();
        let second = cache.resolve(&write_source(dir.path(), "// v2"), true).await.unwrap();

        assert_ne!(first.dylib, second.dylib);
        assert_eq!(builder.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stale_entries_are_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let resources = Resources::bundled();
        let builder = FakeBuilder::default();
        let cache = BuildCache::new(&paths, &resources, &builder);
        let source = write_source(dir.path(), "// v1");

        let artifact = cache.resolve(&source, true).await.unwrap();
        let metadata_path = artifact.location.path().join(METADATA_FILE);

        // Missing dylib
        std::fs::remove_file(&artifact.dylib).unwrap();
        cache.resolve(&source, true).await.unwrap();
        assert_eq!(builder.builds.load(Ordering::SeqCst), 2);

        // Other format version
        let mut metadata: ArtifactMetadata =
            serde_json::from_slice(&std::fs::read(&metadata_path).unwrap()).unwrap();
        metadata.version = 0;
        std::fs::write(&metadata_path, serde_json::to_vec(&metadata).unwrap()).unwrap();
        cache.resolve(&source, true).await.unwrap();
        assert_eq!(builder.builds.load(Ordering::SeqCst), 3);

        // Corrupt record
        std::fs::write(&metadata_path, b"{").unwrap();
        let rebuilt = cache.resolve(&source, true).await.unwrap();
        assert_eq!(builder.builds.load(Ordering::SeqCst), 4);
        assert!(rebuilt.dylib.exists());
    }

    #[tokio::test]
    async fn uncached_builds_are_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let resources = Resources::bundled();
        let builder = FakeBuilder::default();
        let cache = BuildCache::new(&paths, &resources, &builder);
        let source = write_source(dir.path(), "// v1");

        let artifact = cache.resolve(&source, false).await.unwrap();
        let location = artifact.location.path().to_path_buf();
        assert!(location.starts_with(paths.temp_dir()));
        assert!(artifact.dylib.exists());

        drop(artifact);
        assert!(!location.exists());
        assert!(!paths.cache_dir().exists());
    }

    #[tokio::test]
    async fn failed_build_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path().join("root"));
        let resources = Resources::bundled();
        let builder = FakeBuilder {
            fail: true,
            ..FakeBuilder::default()
        };
        let cache = BuildCache::new(&paths, &resources, &builder);
        let source = write_source(dir.path(), "// broken");

        let err = cache.resolve(&source, true).await.unwrap_err();
        assert!(matches!(err, NewIconError::Build { .. }));
        assert!(!paths.cache_dir().join(source.fingerprint()).exists());
    }

    #[tokio::test]
    async fn clear_removes_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        std::fs::create_dir_all(paths.cache_dir().join("abc")).unwrap();
        std::fs::create_dir_all(paths.plugins_dir().join("Kept")).unwrap();

        clear(&paths).unwrap();
        assert!(!paths.cache_dir().exists());
        assert!(paths.plugins_dir().join("Kept").exists());
        clear(&paths).unwrap();
    }
}
