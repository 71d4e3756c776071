use crate::error::{LspError, Result};
use dashmap::DashMap;
use scriptpad_core::text::LineIndex;
use scriptpad_core::{
    AnalysisOptions, DocumentId, LinePosition, ScriptFile, ScriptNamer, ScriptWorkspace,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_lsp_server::ls_types::{Position, TextDocumentContentChangeEvent, Uri};

/// State of one open `.spx` document.
///
/// The client edits the whole file; the workspace only sees the body. The
/// `#r` header is split off into the reference set after every change and
/// positions are translated across it.
pub struct DocumentState {
    pub workspace: ScriptWorkspace,
    /// Full text as the client sees it, header included.
    content: String,
    /// Byte length of the `#r` header.
    header_len: usize,
    /// Line count of the `#r` header, observed by the diagnostics publisher.
    header_lines: watch::Sender<u32>,
}

impl std::fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentState")
            .field("id", &self.workspace.id())
            .field("name", &self.workspace.name())
            .field("content_len", &self.content.len())
            .field("header_lines", &self.header_lines())
            .field("references", &self.workspace.references().len())
            .field("key", &self.workspace.key())
            .finish()
    }
}

impl DocumentState {
    pub fn new(
        id: DocumentId,
        name: String,
        content: String,
        path: Option<PathBuf>,
        options: AnalysisOptions,
    ) -> Self {
        let file = ScriptFile::parse(&content);
        let header_len = content.len() - file.body.len();
        let header_lines = file.header_lines() as u32;
        let mut workspace = ScriptWorkspace::new(id, name, file, path);
        workspace.set_options(options);
        let (header_lines, _) = watch::channel(header_lines);
        Self {
            workspace,
            content,
            header_len,
            header_lines,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn header_lines(&self) -> u32 {
        *self.header_lines.borrow()
    }

    /// Notified when the header grows or shrinks, which moves every body
    /// line without necessarily changing the analysis.
    pub fn subscribe_header(&self) -> watch::Receiver<u32> {
        self.header_lines.subscribe()
    }

    /// Applies client edits in order, then re-splits header and body.
    ///
    /// # Errors
    ///
    /// Returns `LspError::InvalidPosition` if a change range lies outside
    /// the document; changes before it stay applied.
    pub fn apply_changes(&mut self, changes: Vec<TextDocumentContentChangeEvent>) -> Result<()> {
        let mut outcome = Ok(());
        for change in changes {
            match change.range {
                Some(range) => {
                    let index = LineIndex::new(&self.content);
                    let start = offset_of(&index, &self.content, range.start);
                    let end = offset_of(&index, &self.content, range.end);
                    match (start, end) {
                        (Ok(start), Ok(end)) if start <= end => {
                            self.content.replace_range(start..end, &change.text);
                        }
                        (Err(e), _) | (_, Err(e)) => {
                            outcome = Err(e);
                            break;
                        }
                        _ => {
                            outcome = Err(LspError::InvalidPosition {
                                line: range.start.line,
                                character: range.start.character,
                            });
                            break;
                        }
                    }
                }
                None => self.content = change.text,
            }
        }
        self.resync()?;
        outcome
    }

    /// Pushes the current content into the workspace.
    ///
    /// References follow the header; the body is forwarded as the smallest
    /// single replacement that turns the old body into the new one.
    fn resync(&mut self) -> Result<()> {
        let file = ScriptFile::parse(&self.content);
        self.header_len = self.content.len() - file.body.len();
        let lines = file.header_lines() as u32;
        self.header_lines.send_if_modified(|current| {
            let moved = *current != lines;
            *current = lines;
            moved
        });

        if self.workspace.sync_references(file.references) {
            tracing::debug!(
                "{}: header now lists {} reference(s)",
                self.workspace.name(),
                self.workspace.references().len()
            );
        }

        if let Some(edit) = minimal_edit(self.workspace.text(), &file.body) {
            self.workspace
                .replace(edit.start, edit.delete_len, edit.insert)?;
        }
        Ok(())
    }

    /// Body offset of a client position, `None` inside the header.
    pub fn body_offset(&self, position: Position) -> Option<usize> {
        let index = LineIndex::new(&self.content);
        let offset = offset_of(&index, &self.content, position).ok()?;
        offset.checked_sub(self.header_len)
    }
}

fn offset_of(index: &LineIndex, content: &str, position: Position) -> Result<usize> {
    index
        .offset(content, LinePosition::new(position.line, position.character))
        .ok_or(LspError::InvalidPosition {
            line: position.line,
            character: position.character,
        })
}

/// One replacement turning `old` into `new`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct BodyEdit<'a> {
    pub start: usize,
    pub delete_len: usize,
    pub insert: &'a str,
}

/// Smallest single replacement from `old` to `new`, `None` if equal.
///
/// The common prefix and suffix are trimmed back to character boundaries
/// and never overlap.
pub(crate) fn minimal_edit<'a>(old: &str, new: &'a str) -> Option<BodyEdit<'a>> {
    if old == new {
        return None;
    }

    let mut prefix = old
        .bytes()
        .zip(new.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(prefix) || !new.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let max_suffix = old.len().min(new.len()) - prefix;
    let mut suffix = old
        .bytes()
        .rev()
        .zip(new.bytes().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(old.len() - suffix) || !new.is_char_boundary(new.len() - suffix) {
        suffix -= 1;
    }

    Some(BodyEdit {
        start: prefix,
        delete_len: old.len() - suffix - prefix,
        insert: &new[prefix..new.len() - suffix],
    })
}

/// Global LSP server state.
pub struct ServerState {
    /// Open documents by URI
    pub documents: DashMap<Uri, DocumentState>,
    namer: Mutex<ScriptNamer>,
    next_id: AtomicU64,
    /// Diagnostics publishing task per document
    tasks: tokio::sync::RwLock<HashMap<Uri, JoinHandle<()>>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            namer: Mutex::new(ScriptNamer::new()),
            next_id: AtomicU64::new(1),
            tasks: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Opens `content` as a new workspace and returns its id.
    ///
    /// `file:` URIs are named after their file and resolve relative
    /// references against its directory; anything else gets a generated
    /// `scriptN` name.
    pub fn open_document(&self, uri: Uri, content: String, options: AnalysisOptions) -> DocumentId {
        let id = DocumentId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let path = uri.to_file_path().map(|p| p.to_path_buf());
        let name = match path.as_deref().and_then(|p| p.file_name()) {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.next_untitled_name(),
        };
        tracing::info!("opening {:?} as {} ({})", uri, id, name);
        self.documents
            .insert(uri, DocumentState::new(id, name, content, path, options));
        id
    }

    fn next_untitled_name(&self) -> String {
        match self.namer.lock() {
            Ok(mut namer) => namer.next_name(),
            Err(poisoned) => poisoned.into_inner().next_name(),
        }
    }

    pub fn get_document(
        &self,
        uri: &Uri,
    ) -> Option<dashmap::mapref::one::Ref<'_, Uri, DocumentState>> {
        self.documents.get(uri)
    }

    pub fn remove_document(&self, uri: &Uri) -> Option<(Uri, DocumentState)> {
        self.documents.remove(uri)
    }

    /// Registers the background task of a document, aborting any previous one.
    pub async fn spawn_background_task(&self, uri: Uri, task: JoinHandle<()>) {
        let mut tasks = self.tasks.write().await;

        if let Some(old_task) = tasks.remove(&uri) {
            old_task.abort();
        }

        tasks.insert(uri, task);
    }

    pub async fn cancel_background_task(&self, uri: &Uri) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.remove(uri) {
            task.abort();
        }
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp_server::ls_types::Range;

    fn change(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(
                Position::new(start.0, start.1),
                Position::new(end.0, end.1),
            )),
            range_length: None,
            text: text.to_string(),
        }
    }

    fn document(content: &str) -> DocumentState {
        DocumentState::new(
            DocumentId::new(1),
            "test.spx".into(),
            content.into(),
            None,
            AnalysisOptions::default(),
        )
    }

    #[test]
    fn test_minimal_edit() {
        assert_eq!(minimal_edit("abc", "abc"), None);
        assert_eq!(
            minimal_edit("let a = 1;", "let ab = 1;"),
            Some(BodyEdit {
                start: 5,
                delete_len: 0,
                insert: "b"
            })
        );
        assert_eq!(
            minimal_edit("aaaa", "aa"),
            Some(BodyEdit {
                start: 2,
                delete_len: 2,
                insert: ""
            })
        );
        assert_eq!(
            minimal_edit("", "x"),
            Some(BodyEdit {
                start: 0,
                delete_len: 0,
                insert: "x"
            })
        );
    }

    #[test]
    fn test_minimal_edit_respects_char_boundaries() {
        // "é" and "è" share their first UTF-8 byte
        let edit = minimal_edit("café", "cafè").unwrap();
        assert_eq!(edit.start, 3);
        assert_eq!(edit.delete_len, 2);
        assert_eq!(edit.insert, "è");
    }

    #[test]
    fn test_header_split_on_open() {
        let doc = document("#r \"a.json\"\n#r \"b.json\"\nprint(1);\n");
        assert_eq!(doc.header_lines(), 2);
        assert_eq!(doc.workspace.text(), "print(1);\n");
        assert_eq!(doc.workspace.references().len(), 2);
        assert_eq!(doc.workspace.version(), 0);
    }

    #[test]
    fn test_body_edit_is_one_replace() {
        let mut doc = document("#r \"a.json\"\nlet x = 1;\n");
        doc.apply_changes(vec![change((1, 4), (1, 5), "total")]).unwrap();
        assert_eq!(doc.content(), "#r \"a.json\"\nlet total = 1;\n");
        assert_eq!(doc.workspace.text(), "let total = 1;\n");
        assert_eq!(doc.workspace.version(), 1);
        assert_eq!(doc.workspace.reference_version(), 0);
    }

    #[test]
    fn test_header_edit_changes_references_only() {
        let mut doc = document("#r \"a.json\"\nprint(1);\n");
        doc.apply_changes(vec![change((0, 4), (0, 5), "b")]).unwrap();
        let names: Vec<_> = doc
            .workspace
            .references()
            .iter()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["b.json"]);
        assert_eq!(doc.workspace.version(), 0);
    }

    #[test]
    fn test_adding_header_line_moves_body() {
        let mut doc = document("print(1);\n");
        doc.apply_changes(vec![change((0, 0), (0, 0), "#r \"a.json\"\n")])
            .unwrap();
        assert_eq!(doc.header_lines(), 1);
        assert_eq!(doc.workspace.text(), "print(1);\n");
        assert_eq!(doc.workspace.version(), 0);
        assert_eq!(doc.workspace.references().len(), 1);
    }

    #[test]
    fn test_duplicate_header_line_notifies_without_new_key() {
        let mut doc = document("#r \"x/geometry.json\"\nprint(nope);\n");
        let mut header = doc.subscribe_header();
        let key = doc.workspace.key();

        doc.apply_changes(vec![change((0, 0), (0, 0), "#r \"x/geometry.json\"\n")])
            .unwrap();
        assert_eq!(doc.header_lines(), 2);
        assert_eq!(doc.workspace.key(), key);
        assert!(header.has_changed().unwrap());
        assert_eq!(*header.borrow_and_update(), 2);

        doc.apply_changes(vec![change((1, 6), (1, 7), "y")]).unwrap();
        assert!(!header.has_changed().unwrap());
    }

    #[test]
    fn test_full_content_change() {
        let mut doc = document("print(1);");
        doc.apply_changes(vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "print(2);".into(),
        }])
        .unwrap();
        assert_eq!(doc.workspace.text(), "print(2);");
    }

    #[test]
    fn test_invalid_change_range() {
        let mut doc = document("x;");
        let err = doc
            .apply_changes(vec![change((5, 0), (5, 1), "y")])
            .unwrap_err();
        assert!(matches!(err, LspError::InvalidPosition { line: 5, .. }));
        assert_eq!(doc.content(), "x;");
    }

    #[test]
    fn test_body_offset() {
        let doc = document("#r \"a.json\"\nMath.\n");
        assert_eq!(doc.body_offset(Position::new(1, 5)), Some(5));
        assert_eq!(doc.body_offset(Position::new(0, 3)), None);
    }

    #[test]
    fn test_untitled_names() {
        let state = ServerState::new();
        let uri: Uri = "untitled:Untitled-1".parse().unwrap();
        let id = state.open_document(uri.clone(), String::new(), AnalysisOptions::default());
        let doc = state.get_document(&uri).unwrap();
        assert_eq!(doc.workspace.id(), id);
        assert_eq!(doc.workspace.name(), "script1");
    }

    #[test]
    fn test_file_uri_names() {
        let state = ServerState::new();
        let uri = Uri::from_file_path("/scripts/demo.spx").unwrap();
        state.open_document(uri.clone(), String::new(), AnalysisOptions::default());
        assert_eq!(state.get_document(&uri).unwrap().workspace.name(), "demo.spx");
        assert_eq!(state.document_count(), 1);

        state.remove_document(&uri);
        assert_eq!(state.document_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_background_task_cancels_previous() {
        let state = ServerState::new();
        let uri = Uri::from_file_path("/test.spx").unwrap();

        let task1 = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        });
        state.spawn_background_task(uri.clone(), task1).await;

        let task2 = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        });
        state.spawn_background_task(uri.clone(), task2).await;
        state.cancel_background_task(&uri).await;
    }

    #[tokio::test]
    async fn test_cancel_background_task_nonexistent() {
        let state = ServerState::new();
        let uri = Uri::from_file_path("/test.spx").unwrap();
        state.cancel_background_task(&uri).await;
    }
}
