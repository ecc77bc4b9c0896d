//! Invoking a template's renderer and decoding what it returns.

use image::RgbaImage;
use serde::Serialize;
use tracing::debug;

use super::abi::status;
use super::loader::TemplateHandle;
use crate::error::{NewIconError, Result};
use crate::view::View;

/// What a template renders from: the base image and an optional JSON
/// payload (the text or content argument).
#[derive(Debug, Clone)]
pub struct RenderInput {
    pub image: RgbaImage,
    pub payload: Option<Vec<u8>>,
}

impl RenderInput {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            payload: None,
        }
    }

    /// Attaches `value` encoded as JSON.
    pub fn with_payload<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_vec(value)?);
        Ok(self)
    }
}

/// Status and bytes returned by a renderer, copied out of module memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRenderOutput {
    pub status: u32,
    pub bytes: Vec<u8>,
}

/// Interprets a renderer's output.
pub fn decode_output(output: RawRenderOutput) -> Result<View> {
    match output.status {
        status::OK => View::from_json(&output.bytes).map_err(|e| {
            NewIconError::RenderContractViolation(format!("view tree does not decode: {e}"))
        }),
        status::TEMPLATE_ERROR => Err(NewIconError::Render(message(&output.bytes))),
        status::PANIC => Err(NewIconError::Render(format!(
            "template panicked: {}",
            message(&output.bytes)
        ))),
        other => Err(NewIconError::RenderContractViolation(format!(
            "unknown status {other}"
        ))),
    }
}

fn message(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if text.is_empty() {
        "no message".to_string()
    } else {
        text
    }
}

impl TemplateHandle {
    /// Renders the selected template type once.
    pub fn render(&self, input: &RenderInput) -> Result<View> {
        let output = self.module.render(self.template_type(), input);
        debug!(
            template = self.template_type(),
            status = output.status,
            bytes = output.bytes.len(),
            "template rendered"
        );
        decode_output(output)
    }
}
