//! Formatting handler implementation.
//!
//! Reindents the script body and answers with the single edit that turns
//! the current text into the formatted one. The `#r` header is never
//! touched; the client applies the edit and sends it back as a change.

use crate::document::{ServerState, minimal_edit};
use scriptpad_core::format_text;
use scriptpad_core::text::LineIndex;
use std::sync::Arc;
use tower_lsp_server::ls_types::{DocumentFormattingParams, Position, Range, TextEdit};

/// Handles document formatting requests.
///
/// Returns `None` for unknown documents and an empty list when the body is
/// already formatted.
pub fn handle_formatting(
    state: Arc<ServerState>,
    params: DocumentFormattingParams,
) -> Option<Vec<TextEdit>> {
    let uri = &params.text_document.uri;
    let (body, header_lines) = {
        let Some(doc) = state.get_document(uri) else {
            tracing::warn!("formatting: document not found: {:?}", uri);
            return None;
        };
        (doc.workspace.text().to_string(), doc.header_lines())
    };

    let formatted = format_text(&body);
    let Some(edit) = minimal_edit(&body, &formatted) else {
        tracing::debug!("formatting: {:?} already formatted", uri);
        return Some(Vec::new());
    };

    let index = LineIndex::new(&body);
    let start = index.position(&body, edit.start);
    let end = index.position(&body, edit.start + edit.delete_len);
    tracing::debug!(
        "formatting: replacing lines {}..={} of {:?}",
        start.line,
        end.line,
        uri
    );

    Some(vec![TextEdit {
        range: Range::new(
            Position::new(start.line.saturating_add(header_lines), start.column),
            Position::new(end.line.saturating_add(header_lines), end.column),
        ),
        new_text: edit.insert.to_string(),
    }])
}
