//! Compiling a scaffolded package into a dynamic library with cargo.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use super::scaffold::ScaffoldPackage;
use crate::config::Config;
use crate::error::{NewIconError, Result};
use crate::process::{CommandSpec, OutputMode, ProcessManager};

/// Library target name declared by the bundled template manifest.
pub const ARTIFACT_NAME: &str = "template";

/// File name cargo gives the template's cdylib on this platform.
pub fn artifact_file_name() -> String {
    format!("{DLL_PREFIX}{ARTIFACT_NAME}{DLL_SUFFIX}")
}

/// Turns a generated package into a loadable artifact.
pub trait ArtifactBuilder {
    /// Builds `package` and returns the path of the dynamic library.
    fn build(&self, package: &ScaffoldPackage) -> impl Future<Output = Result<PathBuf>>;
}

/// Builds packages with `cargo build --release`.
pub struct CargoBuilder<'a> {
    processes: &'a ProcessManager,
    cargo: String,
    env: Vec<(String, String)>,
}

impl<'a> CargoBuilder<'a> {
    pub fn new(processes: &'a ProcessManager, config: &Config) -> Self {
        Self {
            processes,
            cargo: config.cargo.clone(),
            env: config
                .build_env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    fn command(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.cargo)
            .current_dir(dir)
            .envs(self.env.iter().cloned())
    }

    /// Asks cargo where the package's build output goes.
    async fn target_directory(&self, dir: &Path) -> Result<PathBuf> {
        let spec = self
            .command(dir)
            .args(["metadata", "--format-version", "1", "--no-deps"]);
        let output = self.processes.run(&spec, OutputMode::Capture).await?;
        if !output.success() {
            return Err(NewIconError::Build {
                command: spec.display(),
                status: output.status.to_string(),
                output: output.stderr,
            });
        }
        parse_target_directory(&output.stdout).map_err(|message| NewIconError::Build {
            command: spec.display(),
            status: "unusable output".into(),
            output: message,
        })
    }
}

impl ArtifactBuilder for CargoBuilder<'_> {
    async fn build(&self, package: &ScaffoldPackage) -> Result<PathBuf> {
        let spec = self.command(&package.package_dir).args([
            "build",
            "--release",
            "--lib",
            "--config",
            "profile.release.strip=false",
            "--config",
            "profile.release.lto=false",
        ]);

        info!(package = %package.package_dir.display(), "building template");
        let output = self.processes.run(&spec, OutputMode::Stream).await?;
        if !output.success() {
            return Err(NewIconError::Build {
                command: spec.display(),
                status: output.status.to_string(),
                output: output.combined(),
            });
        }

        let artifact = self
            .target_directory(&package.package_dir)
            .await?
            .join("release")
            .join(artifact_file_name());
        if !artifact.is_file() {
            return Err(NewIconError::Build {
                command: spec.display(),
                status: "no artifact".into(),
                output: format!("expected {}", artifact.display()),
            });
        }

        info!(artifact = %artifact.display(), "built template");
        Ok(artifact)
    }
}

#[derive(Deserialize)]
struct CargoMetadata {
    target_directory: PathBuf,
}

/// Extracts `target_directory` from `cargo metadata` JSON.
pub fn parse_target_directory(json: &str) -> std::result::Result<PathBuf, String> {
    let metadata: CargoMetadata =
        serde_json::from_str(json).map_err(|e| format!("invalid cargo metadata: {e}"))?;
    debug!(target = %metadata.target_directory.display(), "resolved target directory");
    Ok(metadata.target_directory)
}
