//! Incremental analysis workspace for ScriptPad scripts.
//!
//! A script is edited as a stream of range replacements while a background
//! worker keeps an immutable analysis snapshot (syntax tree, bound symbols,
//! diagnostics) in step with it. Completion and diagnostics queries read the
//! latest published snapshot and never wait for a running analysis.
//!
//! # Architecture
//!
//! - **Document**: `SourceDocument` text with a monotonic version
//! - **References**: `ReferenceSet` of external libraries, versioned separately
//! - **Compilation**: `CompilationCache` that reparses, re-binds or reuses,
//!   cancelling superseded work
//! - **Queries**: `CompletionEngine` and `DiagnosticMapper` over a snapshot
//! - **Host**: `ScriptHost` owning every open `ScriptWorkspace`
//!
//! # Examples
//!
//! ```
//! use scriptpad_core::{Reference, ScriptHost};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> scriptpad_core::Result<()> {
//! let mut host = ScriptHost::new();
//! let id = host.create_untitled("let radius = 2;\nMath.");
//!
//! let workspace = host.get_mut(id)?;
//! workspace.add_reference(Reference::from_path("libs/geometry.json"));
//! workspace.settle().await;
//!
//! let caret = workspace.text().len();
//! let result = workspace.complete(caret).unwrap();
//! assert!(result.candidates.iter().any(|c| c.display_text == "Sqrt"));
//!
//! // The missing library is reported, not raised
//! assert!(workspace.diagnostics().iter().any(|d| d.code == "SP0006"));
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod compilation;
pub mod completion;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod formatter;
pub mod host;
pub mod library;
pub mod reference;
pub mod script_file;
pub mod snapshot;
pub mod syntax;
pub mod text;
pub mod workspace;

// Re-export commonly used types
pub use compilation::{
    AnalysisOptions, CancellationToken, CompilationCache, Compiler, RebuildKind, ScriptLanguage,
};
pub use completion::{
    CompletionCandidate, CompletionCategory, CompletionEngine, CompletionResult,
    CompletionSession, TypedCharAction,
};
pub use diagnostics::{DiagnosticMapper, DiagnosticRecord, Severity};
pub use document::SourceDocument;
pub use error::{Result, ScriptError};
pub use formatter::format_text;
pub use host::{DocumentId, ScriptHost, ScriptNamer};
pub use library::{Library, LibraryCache};
pub use reference::{AddOutcome, Reference, ReferenceSet, RemoveOutcome};
pub use script_file::ScriptFile;
pub use snapshot::{AnalysisSnapshot, SnapshotKey};
pub use text::{LineIndex, LinePosition, TextSpan};
pub use workspace::{ScriptWorkspace, WorkspaceState};
