use thiserror::Error;

/// Error types for the scriptpad-lsp server.
///
/// Handlers never return these to the client: they are logged and the
/// request degrades to an empty result.
///
/// # Examples
///
/// ```
/// use scriptpad_lsp::error::{LspError, Result};
///
/// fn check_line(line: u32, line_count: u32) -> Result<()> {
///     if line >= line_count {
///         return Err(LspError::InvalidPosition { line, character: 0 });
///     }
///     Ok(())
/// }
///
/// assert!(check_line(4, 2).is_err());
/// ```
#[derive(Error, Debug)]
pub enum LspError {
    #[error("position {line}:{character} is outside the document")]
    InvalidPosition { line: u32, character: u32 },

    #[error("document not open: {0}")]
    DocumentNotOpen(String),

    #[error(transparent)]
    Script(#[from] scriptpad_core::ScriptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, LspError>`.
pub type Result<T> = std::result::Result<T, LspError>;
