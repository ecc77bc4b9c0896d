//! C ABI between the host and a template module.
//!
//! Every type here has an identical `#[repr(C)]` twin in the bundled
//! `newicon-template-support` crate; [`ABI_VERSION`] changes whenever either
//! side's layout does.
//!
//! Ownership rules:
//! - [`NiSlice`] borrows memory owned by the caller for the duration of a
//!   call.
//! - [`NiBuffer`] is allocated by the module and must be handed back to the
//!   module's `newicon_free_buffer`.

use std::marker::PhantomData;

/// Layout version both sides must agree on.
pub const ABI_VERSION: u32 = 1;

/// Render statuses returned in [`NiRenderOutput::status`].
pub mod status {
    /// `bytes` hold the JSON view tree.
    pub const OK: u32 = 0;
    /// `bytes` hold a UTF-8 error message produced by the template.
    pub const TEMPLATE_ERROR: u32 = 1;
    /// The template panicked; `bytes` hold the panic message.
    pub const PANIC: u32 = 2;
}

/// Entry points every module exports regardless of template kind.
pub mod symbols {
    pub const ABI_VERSION: &str = "newicon_abi_version";
    pub const REGISTRY: &str = "newicon_template_registry";
    pub const FREE_BUFFER: &str = "newicon_free_buffer";
}

/// Borrowed byte slice.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NiSlice {
    pub ptr: *const u8,
    pub len: usize,
}

impl NiSlice {
    pub fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            ptr: bytes.as_ptr(),
            len: bytes.len(),
        }
    }
}

/// Byte buffer allocated by the module.
#[repr(C)]
#[derive(Debug)]
pub struct NiBuffer {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl NiBuffer {
    /// Copies the contents out.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to `len` initialized bytes.
    pub unsafe fn to_vec(&self) -> Vec<u8> {
        if self.ptr.is_null() || self.len == 0 {
            return Vec::new();
        }
        // SAFETY: guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }.to_vec()
    }
}

/// Input to a render call.
#[repr(C)]
#[derive(Debug)]
pub struct NiRenderInput<'a> {
    pub abi_version: u32,
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes of non-premultiplied RGBA.
    pub rgba: NiSlice,
    /// JSON payload; only meaningful when `has_payload` is set.
    pub payload: NiSlice,
    pub has_payload: bool,
    pub _borrow: PhantomData<&'a [u8]>,
}

/// Output of a render call.
#[repr(C)]
#[derive(Debug)]
pub struct NiRenderOutput {
    pub status: u32,
    pub bytes: NiBuffer,
}

pub type AbiVersionFn = unsafe extern "C" fn() -> u32;
pub type RegistryFn = unsafe extern "C" fn() -> NiBuffer;
pub type IsTemplateFn = unsafe extern "C" fn(NiSlice) -> bool;
pub type RenderFn = unsafe extern "C" fn(NiSlice, *const NiRenderInput<'_>) -> NiRenderOutput;
pub type FreeBufferFn = unsafe extern "C" fn(NiBuffer);
