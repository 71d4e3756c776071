//! Immutable analysis results for one `(source, references)` version pair.

use crate::binder::{BoundScript, SymbolIndex};
use crate::diagnostics::Diagnostic;
use crate::syntax::SyntaxTree;
use std::fmt;
use std::sync::Arc;

/// Version pair a snapshot was computed for.
///
/// Ordered by source version first, so a text edit always produces a newer
/// key than any reference change made before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    pub source_version: u64,
    pub reference_version: u64,
}

impl SnapshotKey {
    pub fn new(source_version: u64, reference_version: u64) -> Self {
        Self {
            source_version,
            reference_version,
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}/r{}", self.source_version, self.reference_version)
    }
}

/// Parse tree, bound symbols and diagnostics for exactly one [`SnapshotKey`].
///
/// Snapshots are never mutated. Staleness is decided by comparing
/// [`key`](Self::key) with the workspace's current versions.
#[derive(Debug)]
pub struct AnalysisSnapshot {
    key: SnapshotKey,
    syntax: Arc<SyntaxTree>,
    symbols: SymbolIndex,
    diagnostics: Vec<Diagnostic>,
}

impl AnalysisSnapshot {
    /// Combines parse, reference and binding diagnostics, ordered by location.
    ///
    /// Diagnostics without a location sort first.
    pub fn assemble(
        key: SnapshotKey,
        syntax: Arc<SyntaxTree>,
        bound: BoundScript,
        reference_diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let mut diagnostics = reference_diagnostics;
        diagnostics.extend(syntax.diagnostics().iter().cloned());
        diagnostics.extend(bound.diagnostics);
        diagnostics.sort_by_key(|d| d.span.map(|s| (s.start + 1, s.end)).unwrap_or((0, 0)));

        Self {
            key,
            syntax,
            symbols: bound.index,
            diagnostics,
        }
    }

    pub fn key(&self) -> SnapshotKey {
        self.key
    }

    pub fn source_version(&self) -> u64 {
        self.key.source_version
    }

    pub fn reference_version(&self) -> u64 {
        self.key.reference_version
    }

    pub fn text(&self) -> &str {
        self.syntax.text()
    }

    pub fn syntax(&self) -> &SyntaxTree {
        &self.syntax
    }

    /// Shared syntax tree, reused when only references change.
    pub fn shared_syntax(&self) -> Arc<SyntaxTree> {
        Arc::clone(&self.syntax)
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
