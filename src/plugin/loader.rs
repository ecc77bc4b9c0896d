//! Opening built template modules and choosing a template type.

use std::path::{Path, PathBuf};

use libloading::Library;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::abi::{
    self, ABI_VERSION, AbiVersionFn, FreeBufferFn, IsTemplateFn, NiBuffer, NiRenderInput,
    NiSlice, RegistryFn, RenderFn,
};
use super::invoke::{RawRenderOutput, RenderInput};
use crate::error::{NewIconError, Result};
use crate::template::TemplateKind;

/// One entry of a module's registration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub kind: TemplateKind,
}

/// A loaded module, seen through its entry points for one template kind.
pub trait TemplateModule {
    /// Every template type the module registered.
    fn registry(&self) -> Result<Vec<RegistryEntry>>;

    /// The kind predicate: can `name` be rendered through this module's
    /// renderer for the kind it was opened with?
    fn is_template(&self, name: &str) -> bool;

    /// Calls the renderer once.
    fn render(&self, name: &str, input: &RenderInput) -> RawRenderOutput;
}

/// A template type that satisfied the predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTypeCandidate {
    pub name: String,
}

/// An opened module with its template type selected.
pub struct TemplateHandle {
    pub(crate) module: Box<dyn TemplateModule>,
    template_type: String,
}

impl TemplateHandle {
    /// The selected template type.
    pub fn template_type(&self) -> &str {
        &self.template_type
    }
}

impl std::fmt::Debug for TemplateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateHandle")
            .field("template_type", &self.template_type)
            .finish_non_exhaustive()
    }
}

/// Loads the library at `path` and selects a template type of `kind`.
pub fn open(path: &Path, kind: TemplateKind, preferred: Option<&str>) -> Result<TemplateHandle> {
    let module = DylibModule::open(path, kind)?;
    select(Box::new(module), preferred)
}

/// Filters the module's registration table through the predicate and
/// resolves one template type.
pub fn select(module: Box<dyn TemplateModule>, preferred: Option<&str>) -> Result<TemplateHandle> {
    let candidates: Vec<TemplateTypeCandidate> = module
        .registry()?
        .into_iter()
        .filter(|entry| module.is_template(&entry.name))
        .map(|entry| TemplateTypeCandidate { name: entry.name })
        .collect();
    debug!(
        candidates = ?candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        "template types found"
    );

    let template_type = select_template_type(&candidates, preferred)?.name.clone();
    Ok(TemplateHandle {
        module,
        template_type,
    })
}

/// Picks the template type: the preferred one if named, otherwise the only
/// candidate.
pub fn select_template_type<'c>(
    candidates: &'c [TemplateTypeCandidate],
    preferred: Option<&str>,
) -> Result<&'c TemplateTypeCandidate> {
    let names = || -> Vec<String> { candidates.iter().map(|c| c.name.clone()).collect() };
    match (preferred, candidates) {
        (Some(name), _) => candidates
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| NewIconError::TemplateTypeNotFound {
                name: name.to_string(),
                candidates: names(),
            }),
        (None, [only]) => Ok(only),
        (None, []) => Err(NewIconError::NoTemplateType),
        (None, _) => Err(NewIconError::AmbiguousTemplateType {
            candidates: names(),
        }),
    }
}

/// A template module in a dynamic library.
pub struct DylibModule {
    path: PathBuf,
    registry: RegistryFn,
    is_template: IsTemplateFn,
    render: RenderFn,
    free_buffer: FreeBufferFn,
    // Keeps the entry points above valid; must stay the last field.
    _library: Library,
}

impl DylibModule {
    /// Loads the library and resolves the entry points for `kind`.
    pub fn open(path: &Path, kind: TemplateKind) -> Result<Self> {
        // SAFETY: loading runs the library's initializers. Templates are
        // trusted code built from the user's own source.
        let library = unsafe { Library::new(path) }.map_err(|e| NewIconError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let abi_version: AbiVersionFn = resolve(&library, abi::symbols::ABI_VERSION)?;
        // SAFETY: the symbol has the `AbiVersionFn` signature by contract.
        let version = unsafe { abi_version() };
        if version != ABI_VERSION {
            return Err(NewIconError::Load {
                path: path.to_path_buf(),
                message: format!(
                    "template ABI version {version} does not match host version {ABI_VERSION}; rebuild the template"
                ),
            });
        }

        let module = Self {
            path: path.to_path_buf(),
            registry: resolve(&library, abi::symbols::REGISTRY)?,
            is_template: resolve(&library, kind.is_template_symbol())?,
            render: resolve(&library, kind.render_template_symbol())?,
            free_buffer: resolve(&library, abi::symbols::FREE_BUFFER)?,
            _library: library,
        };
        debug!(path = %module.path.display(), ?kind, "opened template module");
        Ok(module)
    }

    /// Copies a module-owned buffer and hands it back to the module.
    fn take_buffer(&self, buffer: NiBuffer) -> Vec<u8> {
        // SAFETY: buffers come from this module's entry points, which
        // return initialized `len` bytes, and are released exactly once.
        unsafe {
            let bytes = buffer.to_vec();
            (self.free_buffer)(buffer);
            bytes
        }
    }
}

/// Resolves a function symbol and copies the pointer out.
fn resolve<T: Copy>(library: &Library, symbol: &str) -> Result<T> {
    // SAFETY: `T` is the signature the ABI declares for `symbol`; the pointer
    // is only used while `library` is loaded.
    let found = unsafe { library.get::<T>(symbol.as_bytes()) };
    match found {
        Ok(symbol_ref) => {
            debug!(symbol, "resolved entry point");
            Ok(*symbol_ref)
        }
        Err(_) => Err(NewIconError::MissingEntryPoint {
            symbol: symbol.to_string(),
        }),
    }
}

impl TemplateModule for DylibModule {
    fn registry(&self) -> Result<Vec<RegistryEntry>> {
        // SAFETY: `RegistryFn` signature by contract.
        let buffer = unsafe { (self.registry)() };
        let bytes = self.take_buffer(buffer);
        serde_json::from_slice(&bytes).map_err(|e| NewIconError::Load {
            path: self.path.clone(),
            message: format!("invalid registration table: {e}"),
        })
    }

    fn is_template(&self, name: &str) -> bool {
        // SAFETY: the slice outlives the call.
        unsafe { (self.is_template)(NiSlice::from_bytes(name.as_bytes())) }
    }

    fn render(&self, name: &str, input: &RenderInput) -> RawRenderOutput {
        let (width, height) = input.image.dimensions();
        let payload = input.payload.as_deref();
        let ni_input = NiRenderInput {
            abi_version: ABI_VERSION,
            width,
            height,
            rgba: NiSlice::from_bytes(input.image.as_raw()),
            payload: payload.map(NiSlice::from_bytes).unwrap_or_else(NiSlice::empty),
            has_payload: payload.is_some(),
            _borrow: std::marker::PhantomData,
        };

        // SAFETY: all pointers borrow `name` and `input`, which outlive the call.
        let output = unsafe { (self.render)(NiSlice::from_bytes(name.as_bytes()), &ni_input) };
        RawRenderOutput {
            status: output.status,
            bytes: self.take_buffer(output.bytes),
        }
    }
}
