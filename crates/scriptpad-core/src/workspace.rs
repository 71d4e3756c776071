//! One interactively edited script and its analysis loop.

use crate::compilation::{
    AnalysisOptions, AnalysisRequest, CompilationCache, Compiler, RebuildKind, ScriptLanguage,
    SnapshotReceiver,
};
use crate::completion::{CompletionEngine, CompletionResult};
use crate::diagnostics::{DiagnosticMapper, DiagnosticRecord};
use crate::document::SourceDocument;
use crate::error::{Result, ScriptError};
use crate::formatter;
use crate::host::DocumentId;
use crate::library::{self, LibraryCache};
use crate::reference::{AddOutcome, Reference, ReferenceSet, RemoveOutcome};
use crate::script_file::{self, ScriptFile};
use crate::snapshot::{AnalysisSnapshot, SnapshotKey};
use crate::syntax::SyntaxTree;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Analysis freshness of a workspace.
///
/// `Dirty` (initial) moves to `Computing` when analysis is requested and to
/// `Clean` once a snapshot for the current versions is published. Any edit
/// moves back to `Dirty`, or straight to `Computing` when analysis is
/// requested again before the previous compute finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceState {
    Dirty,
    Computing,
    Clean,
}

/// Text, references and analysis state of one script.
///
/// All edits and queries go through `&mut self`/`&self`, so one owner drives
/// the workspace; analysis itself runs on a background worker and queries
/// read the most recently published snapshot without waiting.
///
/// # Examples
///
/// ```
/// use scriptpad_core::{DocumentId, ScriptWorkspace, WorkspaceState};
/// use scriptpad_core::script_file::ScriptFile;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let file = ScriptFile { references: Vec::new(), body: "let count = 1;\n".into() };
/// let mut workspace = ScriptWorkspace::new(DocumentId::new(1), "script1", file, None);
/// assert_eq!(workspace.state(), WorkspaceState::Dirty);
///
/// workspace.replace(4, 5, "total").unwrap();
/// workspace.settle().await;
///
/// assert_eq!(workspace.state(), WorkspaceState::Clean);
/// let result = workspace.complete(workspace.text().len()).unwrap();
/// assert!(result.candidates.iter().any(|c| c.display_text == "total"));
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptWorkspace {
    id: DocumentId,
    name: String,
    path: Option<PathBuf>,
    document: SourceDocument,
    references: ReferenceSet,
    cache: CompilationCache,
    options: AnalysisOptions,
    modified: bool,
}

impl ScriptWorkspace {
    pub fn new(
        id: DocumentId,
        name: impl Into<String>,
        file: ScriptFile,
        path: Option<PathBuf>,
    ) -> Self {
        Self::with_compiler(
            id,
            name,
            file,
            path,
            Arc::new(ScriptLanguage),
            LibraryCache::global(),
        )
    }

    pub fn with_compiler(
        id: DocumentId,
        name: impl Into<String>,
        file: ScriptFile,
        path: Option<PathBuf>,
        compiler: Arc<dyn Compiler>,
        libraries: Arc<LibraryCache>,
    ) -> Self {
        let name = name.into();
        tracing::info!("workspace {} created for {}", id, name);
        Self {
            id,
            name,
            path,
            document: SourceDocument::new(file.body),
            references: ReferenceSet::with_references(file.references),
            cache: CompilationCache::new(compiler, libraries),
            options: AnalysisOptions::default(),
            modified: false,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        self.document.text()
    }

    pub fn version(&self) -> u64 {
        self.document.version()
    }

    pub fn reference_version(&self) -> u64 {
        self.references.version()
    }

    /// Versions the next snapshot must match to be current.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey::new(self.document.version(), self.references.version())
    }

    pub fn options(&self) -> AnalysisOptions {
        self.options
    }

    pub fn set_options(&mut self, options: AnalysisOptions) {
        if self.options != options {
            self.options = options;
            self.references.invalidate();
        }
    }

    /// Replaces `range_len` bytes at `range_start`; see [`SourceDocument::replace`].
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::InvalidRange` for out-of-bounds ranges.
    pub fn replace(&mut self, range_start: usize, range_len: usize, new_text: &str) -> Result<u64> {
        let before = self.document.version();
        let after = self.document.replace(range_start, range_len, new_text)?;
        if after != before {
            self.modified = true;
        }
        Ok(after)
    }

    pub fn add_reference(&mut self, reference: Reference) -> AddOutcome {
        let outcome = self.references.add(reference);
        if outcome == AddOutcome::Added {
            self.modified = true;
        }
        outcome
    }

    pub fn remove_reference(&mut self, reference: &Reference) -> RemoveOutcome {
        let outcome = self.references.remove(reference);
        if outcome == RemoveOutcome::Removed {
            self.modified = true;
        }
        outcome
    }

    /// Makes the reference list match `desired`.
    ///
    /// References not in `desired` (same display name and path) are removed
    /// and new ones appended; the relative order of references that stay is
    /// kept.
    pub fn sync_references(&mut self, desired: Vec<Reference>) -> bool {
        let stale: Vec<Reference> = self
            .references
            .list()
            .iter()
            .filter(|r| !desired.contains(r))
            .cloned()
            .collect();

        let mut changed = false;
        for reference in &stale {
            changed |= self.remove_reference(reference) == RemoveOutcome::Removed;
        }
        for reference in desired {
            changed |= self.add_reference(reference) == AddOutcome::Added;
        }
        changed
    }

    pub fn references(&self) -> &[Reference] {
        self.references.list()
    }

    /// Schedules analysis of the current text and references.
    pub fn request_analysis(&mut self) -> RebuildKind {
        let request = AnalysisRequest {
            key: self.key(),
            text: self.document.shared_text(),
            references: self.references.list().to_vec(),
            base_dir: self.base_dir(),
            options: self.options,
        };
        self.cache.request(request)
    }

    /// Requests analysis and waits until it is published or abandoned.
    ///
    /// Returns the current snapshot afterwards, which is older than
    /// [`key`](Self::key) only if the compute faulted.
    pub async fn settle(&mut self) -> Option<Arc<AnalysisSnapshot>> {
        self.request_analysis();
        self.cache.settle().await
    }

    /// Receiver notified each time a newer snapshot is published.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.cache.subscribe()
    }

    pub fn current_snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.cache.current()
    }

    pub fn state(&self) -> WorkspaceState {
        let key = self.key();
        if self.cache.current().is_some_and(|s| s.key() == key) {
            WorkspaceState::Clean
        } else if self.cache.is_computing_key(key) {
            WorkspaceState::Computing
        } else {
            WorkspaceState::Dirty
        }
    }

    /// Completion against the most recent snapshot.
    ///
    /// `caret` is an offset into the snapshot text, which matches
    /// [`text`](Self::text) whenever the state is `Clean`.
    pub fn complete(&self, caret: usize) -> Option<CompletionResult> {
        let snapshot = self.cache.current()?;
        CompletionEngine::complete(&snapshot, caret)
    }

    /// Diagnostics of the most recent snapshot, Hidden ones removed.
    pub fn diagnostics(&self) -> Vec<DiagnosticRecord> {
        self.cache
            .current()
            .map(|s| DiagnosticMapper::map(&s))
            .unwrap_or_default()
    }

    /// The script as the execution sandbox consumes it.
    pub fn to_code(&self) -> String {
        script_file::materialize(self.references.list(), self.document.text())
    }

    /// Absolute paths of every reference, in list order.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the working directory is needed and unavailable.
    pub fn resolved_reference_paths(&self) -> Result<Vec<PathBuf>> {
        let base_dir = self.base_dir();
        self.references
            .list()
            .iter()
            .map(|r| library::absolute_library_path(&r.path, base_dir.as_deref()))
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Saves to the current path.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::UntitledScript` if the script was never saved,
    /// or `ScriptError::Io` if writing fails.
    pub async fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| ScriptError::UntitledScript(self.name.clone()))?;
        self.write_to(&path).await
    }

    /// Saves to `path` and adopts it as the script's path and name.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if writing fails; the path is left unchanged.
    pub async fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.write_to(&path).await?;

        let moved_dir = self.base_dir().as_deref() != path.parent();
        if let Some(file_name) = path.file_name() {
            self.name = file_name.to_string_lossy().into_owned();
        }
        self.path = Some(path);
        if moved_dir && !self.references.is_empty() {
            self.references.invalidate();
        }
        Ok(())
    }

    async fn write_to(&mut self, path: &Path) -> Result<()> {
        let file = ScriptFile {
            references: self.references.list().to_vec(),
            body: self.document.text().to_string(),
        };
        file.save(path).await?;
        self.modified = false;
        Ok(())
    }

    /// Prefixes `//` to every non-blank line touched by the selection.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::InvalidRange` for out-of-bounds selections.
    pub fn comment_lines(&mut self, start: usize, len: usize) -> Result<u64> {
        self.rewrite_lines(start, len, |line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("//{line}")
            }
        })
    }

    /// Removes the first `//` of every selected line that starts with one.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::InvalidRange` for out-of-bounds selections.
    pub fn uncomment_lines(&mut self, start: usize, len: usize) -> Result<u64> {
        self.rewrite_lines(start, len, |line| {
            let indent = line.len() - line.trim_start().len();
            if line[indent..].starts_with("//") {
                format!("{}{}", &line[..indent], &line[indent + 2..])
            } else {
                line.to_string()
            }
        })
    }

    /// Reindents the whole script as one replacement.
    ///
    /// Reuses the current snapshot's tree when it matches the text. Returns
    /// the unchanged version when the script is already formatted.
    pub fn format(&mut self) -> Result<u64> {
        let key = self.key();
        let formatted = match self.cache.current().filter(|s| s.key() == key) {
            Some(snapshot) => formatter::reindent(snapshot.syntax()),
            None => formatter::reindent(&SyntaxTree::parse(self.document.shared_text())),
        };
        if formatted == self.document.text() {
            return Ok(self.document.version());
        }
        let len = self.document.len();
        self.replace(0, len, &formatted)
    }

    fn rewrite_lines(
        &mut self,
        start: usize,
        len: usize,
        rewrite: impl Fn(&str) -> String,
    ) -> Result<u64> {
        let (region_start, region_end) = line_region(self.document.text(), start, len)?;
        let region = &self.document.text()[region_start..region_end];
        let rewritten = region
            .split('\n')
            .map(|line| rewrite(line))
            .collect::<Vec<_>>()
            .join("\n");
        self.replace(region_start, region_end - region_start, &rewritten)
    }

    fn base_dir(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
    }
}

/// Byte range of the whole lines a selection touches, without the final newline.
///
/// A selection ending exactly at the start of a line does not include it.
fn line_region(text: &str, start: usize, len: usize) -> Result<(usize, usize)> {
    let end = start
        .checked_add(len)
        .filter(|&end| end <= text.len() && text.is_char_boundary(start) && text.is_char_boundary(end))
        .ok_or(ScriptError::InvalidRange {
            start,
            len,
            text_len: text.len(),
        })?;

    let region_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let last = if len > 0 && end > region_start && text[..end].ends_with('\n') {
        end - 1
    } else {
        end
    };
    let region_end = text[last..].find('\n').map_or(text.len(), |i| last + i);
    Ok((region_start, region_end.max(region_start)))
}
