//! Diagnostics conversion and the pull-diagnostics handler.

use crate::config::DiagnosticsConfig;
use crate::document::{ServerState, await_snapshot};
use scriptpad_core::{DiagnosticMapper, DiagnosticRecord, Severity};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range, Uri,
};

const SOURCE: &str = "scriptpad";

/// Handles `textDocument/diagnostic` for an open document.
///
/// Waits for the analysis of the current text; returns nothing for unknown
/// documents or when diagnostics are disabled.
pub async fn handle_diagnostics(
    state: Arc<ServerState>,
    uri: &Uri,
    config: &DiagnosticsConfig,
) -> Vec<Diagnostic> {
    if !config.enabled {
        return vec![];
    }

    let Some((receiver, key)) = state.documents.get_mut(uri).map(|mut doc| {
        doc.workspace.request_analysis();
        (doc.workspace.subscribe(), doc.workspace.key())
    }) else {
        tracing::warn!("Document not found for diagnostics: {:?}", uri);
        return vec![];
    };

    let Some(fresh) = await_snapshot(receiver, key).await else {
        return vec![];
    };

    let Some(header_lines) = state.get_document(uri).map(|doc| doc.header_lines()) else {
        return vec![];
    };
    to_lsp_diagnostics(&DiagnosticMapper::map(&fresh.snapshot), header_lines)
}

/// Converts body records to LSP diagnostics for the whole file.
///
/// Body lines sit below the `#r` header, so every line moves down by
/// `header_lines`.
pub fn to_lsp_diagnostics(records: &[DiagnosticRecord], header_lines: u32) -> Vec<Diagnostic> {
    records
        .iter()
        .map(|record| Diagnostic {
            range: Range::new(
                Position::new(
                    record.start_line.saturating_add(header_lines),
                    record.start_column,
                ),
                Position::new(
                    record.end_line.saturating_add(header_lines),
                    record.end_column,
                ),
            ),
            severity: Some(to_lsp_severity(record.severity)),
            code: Some(NumberOrString::String(record.code.to_string())),
            source: Some(SOURCE.into()),
            message: record.message.clone(),
            ..Default::default()
        })
        .collect()
}

fn to_lsp_severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptpad_core::AnalysisOptions;

    fn record(code: &'static str, severity: Severity, line: u32) -> DiagnosticRecord {
        DiagnosticRecord {
            code,
            severity,
            message: "message".into(),
            start_line: line,
            start_column: 2,
            end_line: line,
            end_column: 5,
        }
    }

    #[test]
    fn test_to_lsp_diagnostics_shifts_header() {
        let records = vec![
            record("SP0103", Severity::Error, 0),
            record("SP0162", Severity::Warning, 3),
        ];
        let diagnostics = to_lsp_diagnostics(&records, 2);

        assert_eq!(diagnostics[0].range.start, Position::new(2, 2));
        assert_eq!(diagnostics[0].range.end, Position::new(2, 5));
        assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(
            diagnostics[0].code,
            Some(NumberOrString::String("SP0103".into()))
        );
        assert_eq!(diagnostics[1].range.start.line, 5);
        assert_eq!(diagnostics[1].severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(diagnostics[1].source.as_deref(), Some("scriptpad"));
    }

    #[test]
    fn test_shift_saturates_at_last_line() {
        let diagnostics = to_lsp_diagnostics(&[record("SP0103", Severity::Error, u32::MAX)], 3);
        assert_eq!(diagnostics[0].range.start.line, u32::MAX);
        assert_eq!(diagnostics[0].range.end.line, u32::MAX);
    }

    #[test]
    fn test_info_severity() {
        let diagnostics = to_lsp_diagnostics(&[record("SP0136", Severity::Info, 0)], 0);
        assert_eq!(
            diagnostics[0].severity,
            Some(DiagnosticSeverity::INFORMATION)
        );
    }

    #[tokio::test]
    async fn test_handle_diagnostics_missing_document() {
        let state = Arc::new(ServerState::new());
        let uri = Uri::from_file_path("/test/missing.spx").unwrap();
        let result = handle_diagnostics(state, &uri, &DiagnosticsConfig::default()).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_handle_diagnostics_below_header() {
        let state = Arc::new(ServerState::new());
        let uri = Uri::from_file_path("/test/script.spx").unwrap();
        let missing = "/test/does-not-exist.json";
        state.open_document(
            uri.clone(),
            format!("#r \"{missing}\"\nprint(nope);\n"),
            AnalysisOptions::default(),
        );

        let result = handle_diagnostics(state, &uri, &DiagnosticsConfig::default()).await;
        let codes: Vec<_> = result
            .iter()
            .filter_map(|d| match &d.code {
                Some(NumberOrString::String(code)) => Some(code.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec!["SP0006", "SP0103"]);

        let unknown = &result[1];
        assert_eq!(unknown.range.start, Position::new(1, 6));
        assert_eq!(unknown.range.end, Position::new(1, 10));
    }

    #[tokio::test]
    async fn test_handle_diagnostics_disabled() {
        let state = Arc::new(ServerState::new());
        let uri = Uri::from_file_path("/test/script.spx").unwrap();
        state.open_document(uri.clone(), "print(nope);".into(), AnalysisOptions::default());

        let config = DiagnosticsConfig { enabled: false };
        assert!(handle_diagnostics(state, &uri, &config).await.is_empty());
    }
}
