//! The dynamic template plugin pipeline.
//!
//! A template source file goes through four stages:
//!
//! 1. [`scaffold`] generates a Cargo package around it.
//! 2. [`build`] compiles the package into a dynamic library, with [`cache`]
//!    reusing earlier builds of identical sources.
//! 3. [`loader`] opens the library and selects one template type from the
//!    module's registration table.
//! 4. [`invoke`] calls the template's renderer across the [`abi`] and
//!    decodes the returned view tree.
//!
//! Installed plugins ([`registry`]) are builds kept under a name.

pub mod abi;
pub mod build;
pub mod cache;
pub mod invoke;
pub mod loader;
pub mod registry;
pub mod scaffold;

pub use build::{ArtifactBuilder, CargoBuilder};
pub use cache::{BuildArtifact, BuildCache};
pub use invoke::RenderInput;
pub use loader::{TemplateHandle, TemplateTypeCandidate};
pub use registry::{PluginEntry, PluginRegistry};
pub use scaffold::{InstallLocation, Resources, ScaffoldPackage, TemplateSource};
