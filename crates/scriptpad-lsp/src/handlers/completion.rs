//! Completion handler implementation.
//!
//! Runs the workspace completion engine against the snapshot of the text
//! the request was issued for.

use crate::config::CompletionConfig;
use crate::document::{ServerState, await_snapshot};
use scriptpad_core::text::LineIndex;
use scriptpad_core::{CompletionCategory, CompletionEngine, CompletionResult};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    CompletionItem, CompletionItemKind, CompletionList, CompletionParams, CompletionResponse,
    CompletionTextEdit, Documentation, Position, Range, TextEdit,
};

/// Handles completion requests.
///
/// Returns `None` inside the `#r` header, when the analysis was overtaken
/// by a newer edit, or when nothing matches.
pub async fn handle_completion(
    state: Arc<ServerState>,
    params: CompletionParams,
    config: &CompletionConfig,
) -> Option<CompletionResponse> {
    if !config.enabled {
        return None;
    }

    let uri = &params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;

    tracing::debug!(
        "completion request: uri={:?}, line={}, character={}",
        uri,
        position.line,
        position.character
    );

    let (caret, header_lines, receiver, key) = {
        let mut doc = match state.documents.get_mut(uri) {
            Some(d) => d,
            None => {
                tracing::warn!("completion: document not found: {:?}", uri);
                return None;
            }
        };
        let caret = doc.body_offset(position)?;
        doc.workspace.request_analysis();
        (
            caret,
            doc.header_lines(),
            doc.workspace.subscribe(),
            doc.workspace.key(),
        )
    };

    let fresh = await_snapshot(receiver, key).await?;
    if !fresh.is_exact() {
        tracing::debug!("completion: text changed while waiting, dropping request");
        return None;
    }

    let result = CompletionEngine::complete(&fresh.snapshot, caret)?;
    let range = body_range(fresh.snapshot.text(), &result, header_lines);

    let total = result.candidates.len();
    let limit = if config.max_items == 0 {
        total
    } else {
        config.max_items.min(total)
    };

    let items: Vec<CompletionItem> = result
        .candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(rank, candidate)| CompletionItem {
            kind: Some(item_kind(candidate.category)),
            detail: candidate.category.map(|c| c.tag().to_string()),
            documentation: candidate.description.map(Documentation::String),
            sort_text: Some(format!("{rank:05}")),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range,
                new_text: candidate.display_text.clone(),
            })),
            label: candidate.display_text,
            ..Default::default()
        })
        .collect();

    tracing::debug!("completion: returning {} of {} items", items.len(), total);

    Some(CompletionResponse::List(CompletionList {
        is_incomplete: limit < total,
        items,
    }))
}

/// LSP range of the replacement span, in whole-file coordinates.
fn body_range(text: &str, result: &CompletionResult, header_lines: u32) -> Range {
    let index = LineIndex::new(text);
    let start = index.position(text, result.replace_span.start);
    let end = index.position(text, result.replace_span.end);
    Range::new(
        Position::new(start.line.saturating_add(header_lines), start.column),
        Position::new(end.line.saturating_add(header_lines), end.column),
    )
}

/// Editor icon for a candidate; candidates without a category are locals.
fn item_kind(category: Option<CompletionCategory>) -> CompletionItemKind {
    match category {
        Some(CompletionCategory::Class) => CompletionItemKind::CLASS,
        Some(CompletionCategory::Constant) => CompletionItemKind::CONSTANT,
        Some(CompletionCategory::Delegate) => CompletionItemKind::FUNCTION,
        Some(CompletionCategory::Enum) => CompletionItemKind::ENUM,
        Some(CompletionCategory::EnumMember) => CompletionItemKind::ENUM_MEMBER,
        Some(CompletionCategory::Event) => CompletionItemKind::EVENT,
        Some(CompletionCategory::ExtensionMethod | CompletionCategory::Method) => {
            CompletionItemKind::METHOD
        }
        Some(CompletionCategory::Field) => CompletionItemKind::FIELD,
        Some(CompletionCategory::Interface) => CompletionItemKind::INTERFACE,
        Some(CompletionCategory::Keyword) => CompletionItemKind::KEYWORD,
        Some(CompletionCategory::Module | CompletionCategory::Namespace) => {
            CompletionItemKind::MODULE
        }
        Some(CompletionCategory::Property) => CompletionItemKind::PROPERTY,
        Some(CompletionCategory::Structure) => CompletionItemKind::STRUCT,
        None => CompletionItemKind::VARIABLE,
    }
}
