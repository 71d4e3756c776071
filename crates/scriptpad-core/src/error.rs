use std::path::PathBuf;
use thiserror::Error;

use crate::host::DocumentId;

/// Core error types for ScriptPad.
///
/// Only contract violations and I/O problems are represented here. Problems
/// inside the analyzed script (syntax errors, unresolved names, missing
/// libraries) are reported as diagnostics on a snapshot instead.
///
/// # Examples
///
/// ```
/// use scriptpad_core::error::{Result, ScriptError};
///
/// fn check_range(start: usize, len: usize, text_len: usize) -> Result<()> {
///     if start + len > text_len {
///         return Err(ScriptError::InvalidRange { start, len, text_len });
///     }
///     Ok(())
/// }
///
/// assert!(check_range(2, 10, 5).is_err());
/// ```
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("invalid range {start}+{len} for text of length {text_len}")]
    InvalidRange {
        start: usize,
        len: usize,
        text_len: usize,
    },

    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("failed to resolve reference {path}: {source}")]
    ReferenceResolution {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("script {0} has no file path")]
    UntitledScript(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, ScriptError>`.
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Reasons a background compilation ends without producing a snapshot.
///
/// Never surfaced to callers of the workspace: `Cancelled` is dropped
/// silently, `Fault` is logged and the previous snapshot stays current.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("compilation cancelled")]
    Cancelled,

    #[error("compilation fault: {0}")]
    Fault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_display() {
        let error = ScriptError::InvalidRange {
            start: 4,
            len: 3,
            text_len: 5,
        };
        assert_eq!(error.to_string(), "invalid range 4+3 for text of length 5");
    }

    #[test]
    fn test_unknown_document_display() {
        let error = ScriptError::UnknownDocument(DocumentId::new(7));
        assert_eq!(error.to_string(), "unknown document: doc#7");
    }

    #[test]
    fn test_reference_resolution_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error = ScriptError::ReferenceResolution {
            path: PathBuf::from("/libs/geometry.json"),
            source: Box::new(io_err),
        };
        let message = error.to_string();
        assert!(message.contains("/libs/geometry.json"));
        assert!(message.contains("missing"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: ScriptError = io_err.into();
        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_compile_error_display() {
        assert_eq!(CompileError::Cancelled.to_string(), "compilation cancelled");
        assert_eq!(
            CompileError::Fault("boom".into()).to_string(),
            "compilation fault: boom"
        );
    }
}
