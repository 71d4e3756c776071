//! Registry of open script workspaces.

use crate::error::{Result, ScriptError};
use crate::script_file::ScriptFile;
use crate::workspace::ScriptWorkspace;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque handle of an open script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Hands out `script1`, `script2`, ... for scripts without a file.
#[derive(Debug, Default)]
pub struct ScriptNamer {
    next: u32,
}

impl ScriptNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&mut self) -> String {
        self.next += 1;
        format!("script{}", self.next)
    }
}

/// Owns every open workspace.
///
/// # Examples
///
/// ```
/// use scriptpad_core::ScriptHost;
///
/// let mut host = ScriptHost::new();
/// let first = host.create_untitled("print(1);");
/// let second = host.create_untitled("");
///
/// assert_eq!(host.get(first).unwrap().name(), "script1");
/// assert_eq!(host.get(second).unwrap().name(), "script2");
///
/// host.close(first).unwrap();
/// assert!(host.get(first).is_err());
/// ```
#[derive(Debug, Default)]
pub struct ScriptHost {
    workspaces: HashMap<DocumentId, ScriptWorkspace>,
    namer: ScriptNamer,
    next_id: u64,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an unsaved script with a generated name.
    pub fn create_untitled(&mut self, text: impl Into<String>) -> DocumentId {
        let name = self.namer.next_name();
        let file = ScriptFile {
            references: Vec::new(),
            body: text.into(),
        };
        self.insert(name, file, None)
    }

    /// Loads a persisted script.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the file cannot be read.
    pub async fn open(&mut self, path: impl AsRef<Path>) -> Result<DocumentId> {
        let path = path.as_ref();
        let file = ScriptFile::load(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.insert(name, file, Some(path.to_path_buf())))
    }

    /// Registers an already split script, named after its path when it has one.
    pub fn insert_file(&mut self, file: ScriptFile, path: Option<PathBuf>) -> DocumentId {
        let name = match path.as_deref().and_then(Path::file_name) {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.namer.next_name(),
        };
        self.insert(name, file, path)
    }

    /// Closes a script, cancelling any analysis it has running.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::UnknownDocument` if `id` is not open.
    pub fn close(&mut self, id: DocumentId) -> Result<ScriptWorkspace> {
        let workspace = self
            .workspaces
            .remove(&id)
            .ok_or(ScriptError::UnknownDocument(id))?;
        tracing::info!("workspace {} closed", id);
        Ok(workspace)
    }

    /// # Errors
    ///
    /// Returns `ScriptError::UnknownDocument` if `id` is not open.
    pub fn get(&self, id: DocumentId) -> Result<&ScriptWorkspace> {
        self.workspaces
            .get(&id)
            .ok_or(ScriptError::UnknownDocument(id))
    }

    /// # Errors
    ///
    /// Returns `ScriptError::UnknownDocument` if `id` is not open.
    pub fn get_mut(&mut self, id: DocumentId) -> Result<&mut ScriptWorkspace> {
        self.workspaces
            .get_mut(&id)
            .ok_or(ScriptError::UnknownDocument(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.workspaces.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    fn insert(&mut self, name: String, file: ScriptFile, path: Option<PathBuf>) -> DocumentId {
        self.next_id += 1;
        let id = DocumentId::new(self.next_id);
        self.workspaces
            .insert(id, ScriptWorkspace::new(id, name, file, path));
        id
    }
}
