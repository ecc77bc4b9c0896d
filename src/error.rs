//! Error types for the template pipeline and icon operations.

use std::path::PathBuf;

/// Result alias used across the library.
pub type Result<T, E = NewIconError> = std::result::Result<T, E>;

/// Every failure the library can report.
///
/// [`NewIconError::Cache`] is never surfaced to users: the build cache
/// recovers from it by rebuilding. Everything else propagates to the
/// command line.
#[derive(Debug, thiserror::Error)]
pub enum NewIconError {
    /// Missing files or resources, unwritable paths.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The external toolchain failed.
    #[error("`{command}` failed ({status})\n{output}")]
    Build {
        command: String,
        status: String,
        output: String,
    },

    /// The dynamic module could not be loaded.
    #[error("could not load template module {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// A required entry point is absent from the module.
    #[error("template module does not export the `{symbol}` entry point")]
    MissingEntryPoint { symbol: String },

    /// Several template types qualify and none was chosen.
    #[error(
        "template contains multiple template types, choose one with --template-type. Available types: {}",
        candidates.join(", ")
    )]
    AmbiguousTemplateType { candidates: Vec<String> },

    /// The module registers no qualifying template type.
    #[error("template module does not contain a template type")]
    NoTemplateType,

    /// The type named with `--template-type` is not among the candidates.
    #[error("did not find the template type `{name}`; available types: {}", candidates.join(", "))]
    TemplateTypeNotFound {
        name: String,
        candidates: Vec<String>,
    },

    /// The renderer returned something other than a view or an error.
    #[error("template returned an unexpected result: {0}")]
    RenderContractViolation(String),

    /// The template reported a failure.
    #[error("template failed to render: {0}")]
    Render(String),

    /// Corrupt or stale cache metadata. Recovered locally.
    #[error("build cache entry is unusable: {0}")]
    Cache(String),

    /// Reading or writing the custom icon association failed.
    #[error("icon store: {0}")]
    IconStore(String),

    /// Installed plugin bookkeeping failed.
    #[error("{0}")]
    Plugin(String),

    /// Configuration file could not be read.
    #[error("invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NewIconError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Adds context to `std::io::Result` values.
pub(crate) trait IoResultExt<T> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn io_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|source| NewIconError::io(context(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_lists_every_candidate() {
        let err = NewIconError::AmbiguousTemplateType {
            candidates: vec!["NewHue".into(), "Trash".into()],
        };
        let message = err.to_string();
        assert!(message.contains("NewHue, Trash"));
        assert!(message.contains("--template-type"));
    }

    #[test]
    fn io_context_is_prefixed() {
        let result: std::io::Result<()> = Err(std::io::Error::other("boom"));
        let err = result.io_context(|| "writing metadata").unwrap_err();
        assert_eq!(err.to_string(), "writing metadata: boom");
    }
}
