//! Versioned script text.

use crate::error::{Result, ScriptError};
use std::sync::Arc;

/// Versioned text of one script.
///
/// The text and its version only change together, through [`replace`].
/// A replacement that leaves the text unchanged is accepted but does not
/// bump the version, so idempotent edits never invalidate analysis.
///
/// # Examples
///
/// ```
/// use scriptpad_core::SourceDocument;
///
/// let mut doc = SourceDocument::new("let x = 1;");
/// assert_eq!(doc.version(), 0);
///
/// let version = doc.replace(4, 1, "count").unwrap();
/// assert_eq!(version, 1);
/// assert_eq!(doc.text(), "let count = 1;");
///
/// // Replacing a range with identical text is free
/// assert_eq!(doc.replace(0, 3, "let").unwrap(), 1);
/// ```
///
/// [`replace`]: SourceDocument::replace
#[derive(Debug, Clone)]
pub struct SourceDocument {
    text: Arc<str>,
    version: u64,
}

impl SourceDocument {
    pub const INITIAL_VERSION: u64 = 0;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
            version: Self::INITIAL_VERSION,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the current text, cheap to hand to a background compute.
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces `range_len` bytes at `range_start` with `new_text`.
    ///
    /// Returns the version after the call.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::InvalidRange` if the range runs past the end of
    /// the text or splits a UTF-8 character. The document is left untouched.
    pub fn replace(&mut self, range_start: usize, range_len: usize, new_text: &str) -> Result<u64> {
        let range_end = self.checked_range(range_start, range_len)?;

        if &self.text[range_start..range_end] == new_text {
            return Ok(self.version);
        }

        let mut updated = String::with_capacity(self.text.len() - range_len + new_text.len());
        updated.push_str(&self.text[..range_start]);
        updated.push_str(new_text);
        updated.push_str(&self.text[range_end..]);

        self.text = Arc::from(updated);
        self.version += 1;

        tracing::trace!(
            "document replaced {}+{} with {} bytes, version {}",
            range_start,
            range_len,
            new_text.len(),
            self.version
        );

        Ok(self.version)
    }

    fn checked_range(&self, range_start: usize, range_len: usize) -> Result<usize> {
        let invalid = || ScriptError::InvalidRange {
            start: range_start,
            len: range_len,
            text_len: self.text.len(),
        };

        let range_end = range_start.checked_add(range_len).ok_or_else(invalid)?;
        if range_end > self.text.len()
            || !self.text.is_char_boundary(range_start)
            || !self.text.is_char_boundary(range_end)
        {
            return Err(invalid());
        }
        Ok(range_end)
    }
}
