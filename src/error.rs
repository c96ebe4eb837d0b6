//! Error types shared by the renderer and the IPC bridge.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use thiserror::Error;

use crate::pdf::RenderReport;

/// Errors that can occur while rendering a document.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to initialize PDFium: {0}")]
    BackendUnavailable(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode PDF: {0}")]
    DocumentDecodeFailed(String),

    #[error("Page {page} failed to render: {reason}")]
    PageRenderFailed { page: u32, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            RenderError::FileNotFound(_) => "FILE_NOT_FOUND",
            RenderError::OpenFailed { .. } => "OPEN_FAILED",
            RenderError::DocumentDecodeFailed(_) => "DOCUMENT_DECODE_FAILED",
            RenderError::PageRenderFailed { .. } => "PAGE_RENDER_FAILED",
            RenderError::Io(_) => "IO_ERROR",
        }
    }
}

/// Errors returned across the bridge. Every variant maps to a stable code.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Method not implemented: {0}")]
    UnsupportedMethod(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{} of {} pages failed to render", .0.failed_count(), .0.page_count)]
    PartialRender(RenderReport),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BridgeError::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            BridgeError::Render(e) => e.code(),
            BridgeError::PartialRender(_) => "PAGE_RENDER_FAILED",
            BridgeError::Internal(_) => "INTERNAL",
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            BridgeError::PartialRender(report) => {
                serde_json::to_value(report).unwrap_or(serde_json::Value::Null)
            }
            BridgeError::Render(RenderError::PageRenderFailed { page, .. }) => {
                serde_json::json!({ "page": page })
            }
            BridgeError::Render(RenderError::FileNotFound(path))
            | BridgeError::Render(RenderError::OpenFailed { path, .. }) => {
                serde_json::json!({ "path": path.to_string_lossy() })
            }
            _ => serde_json::Value::Null,
        }
    }
}

/// Serialized as `{ code, message, details }` so the frontend can branch on
/// `code` instead of parsing messages.
impl Serialize for BridgeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("BridgeError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("details", &self.details())?;
        state.end()
    }
}
