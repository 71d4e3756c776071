//! Analysis diagnostics and their mapping to line/column records.

use crate::snapshot::AnalysisSnapshot;
use crate::text::{LinePosition, TextSpan};
use serde::Serialize;

/// Stable diagnostic codes.
pub mod codes {
    pub const SYNTAX: &str = "SP0001";
    pub const UNRESOLVED_REFERENCE: &str = "SP0006";
    pub const UNKNOWN_NAME: &str = "SP0103";
    pub const MISSING_MEMBER: &str = "SP0117";
    pub const DUPLICATE_DECLARATION: &str = "SP0128";
    pub const SHADOWED_DECLARATION: &str = "SP0136";
    pub const UNREACHABLE_CODE: &str = "SP0162";
    pub const UNUSED_LOCAL: &str = "SP0219";
    pub const REFERENCE_IN_BODY: &str = "SP1001";
    pub const BAD_DIRECTIVE: &str = "SP1002";
}

/// Severity as produced by analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticSeverity {
    Hidden,
    Info,
    Warning,
    Error,
}

/// A diagnostic attached to an analysis snapshot.
///
/// `span` is `None` for problems without a source location, such as a
/// reference whose library file cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Option<TextSpan>,
}

impl Diagnostic {
    pub fn new(
        code: &'static str,
        severity: DiagnosticSeverity,
        message: String,
        span: Option<TextSpan>,
    ) -> Self {
        Self {
            code,
            severity,
            message,
            span,
        }
    }
}

/// Severity as exposed to consumers; `Hidden` never reaches this level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl From<DiagnosticSeverity> for Severity {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => Self::Error,
            DiagnosticSeverity::Warning => Self::Warning,
            DiagnosticSeverity::Info | DiagnosticSeverity::Hidden => Self::Info,
        }
    }
}

/// One consumer-facing diagnostic, 0-based with UTF-16 columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl DiagnosticRecord {
    pub fn start(&self) -> LinePosition {
        LinePosition::new(self.start_line, self.start_column)
    }

    pub fn end(&self) -> LinePosition {
        LinePosition::new(self.end_line, self.end_column)
    }
}

/// Converts snapshot diagnostics into records positioned by mapped spans.
pub struct DiagnosticMapper;

impl DiagnosticMapper {
    /// Maps every non-hidden diagnostic of `snapshot`, in snapshot order.
    ///
    /// Positions honor `#line` remapping. Diagnostics without a location
    /// are placed at the start of the document.
    pub fn map(snapshot: &AnalysisSnapshot) -> Vec<DiagnosticRecord> {
        let syntax = snapshot.syntax();
        let text = syntax.text();
        let line_index = syntax.line_index();

        snapshot
            .diagnostics()
            .iter()
            .filter(|d| d.severity != DiagnosticSeverity::Hidden)
            .map(|d| {
                let (start, end) = match d.span {
                    Some(span) => (
                        line_index.mapped_position(text, span.start),
                        line_index.mapped_position(text, span.end),
                    ),
                    None => (LinePosition::new(0, 0), LinePosition::new(0, 0)),
                };
                DiagnosticRecord {
                    code: d.code,
                    severity: d.severity.into(),
                    message: d.message.clone(),
                    start_line: start.line,
                    start_column: start.column,
                    end_line: end.line,
                    end_column: end.column,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compilation::{Compiler, ScriptLanguage};
    use crate::library::prelude;
    use crate::snapshot::SnapshotKey;
    use crate::syntax::SyntaxTree;
    use std::sync::Arc;

    fn snapshot(source: &str) -> AnalysisSnapshot {
        let compiler = ScriptLanguage;
        let syntax = Arc::new(compiler.parse(Arc::from(source)));
        let bound = compiler.bind(&syntax, &[prelude()]);
        AnalysisSnapshot::assemble(SnapshotKey::new(1, 0), syntax, bound, Vec::new())
    }

    #[test]
    fn test_severity_reduction() {
        assert_eq!(Severity::from(DiagnosticSeverity::Error), Severity::Error);
        assert_eq!(Severity::from(DiagnosticSeverity::Warning), Severity::Warning);
        assert_eq!(Severity::from(DiagnosticSeverity::Info), Severity::Info);
        assert_eq!(Severity::from(DiagnosticSeverity::Hidden), Severity::Info);
    }

    #[test]
    fn test_unresolved_identifier_maps_to_its_span() {
        let records = DiagnosticMapper::map(&snapshot("let a = 1;\nprint(a + missing);\n"));
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.severity, Severity::Error);
        assert_eq!(record.code, codes::UNKNOWN_NAME);
        assert_eq!(record.start(), LinePosition::new(1, 10));
        assert_eq!(record.end(), LinePosition::new(1, 17));
    }

    #[test]
    fn test_hidden_diagnostics_filtered() {
        let snapshot = snapshot("let unused = 1;\n");
        assert!(
            snapshot
                .diagnostics()
                .iter()
                .any(|d| d.severity == DiagnosticSeverity::Hidden)
        );
        assert!(DiagnosticMapper::map(&snapshot).is_empty());
    }

    #[test]
    fn test_line_directive_shifts_reported_line() {
        let records = DiagnosticMapper::map(&snapshot("#line 100\nnope;\n"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_line, 99);
        assert_eq!(records[0].start_column, 0);
    }

    #[test]
    fn test_out_of_range_line_directive_is_rejected() {
        let records = DiagnosticMapper::map(&snapshot("#line 4294967295\na;\nb;\nnope;\n"));
        assert!(records.iter().any(|r| r.code == codes::BAD_DIRECTIVE));
        let unknown = records
            .iter()
            .find(|r| r.code == codes::UNKNOWN_NAME && r.start_line == 3)
            .map(|r| r.start_column);
        assert_eq!(unknown, Some(0));
    }

    #[test]
    fn test_locationless_diagnostic_at_origin() {
        let compiler = ScriptLanguage;
        let syntax = Arc::new(SyntaxTree::parse(Arc::from("print(1);")));
        let bound = compiler.bind(&syntax, &[prelude()]);
        let missing = Diagnostic::new(
            codes::UNRESOLVED_REFERENCE,
            DiagnosticSeverity::Error,
            "library 'gone.json' could not be loaded".to_string(),
            None,
        );
        let snapshot =
            AnalysisSnapshot::assemble(SnapshotKey::new(1, 1), syntax, bound, vec![missing]);

        let records = DiagnosticMapper::map(&snapshot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start(), LinePosition::new(0, 0));
        assert_eq!(records[0].end(), LinePosition::new(0, 0));
    }
}
