//! Library metadata files and the process-wide library cache.
//!
//! A library is a JSON document describing a tree of named symbols. Scripts
//! make a library visible by referencing it; the built-in prelude is always
//! visible unless analysis is configured otherwise.

use crate::error::{Result, ScriptError};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Kind of a library symbol, serialized in kebab-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibrarySymbolKind {
    Class,
    Constant,
    Delegate,
    Enum,
    EnumMember,
    Event,
    ExtensionMethod,
    Field,
    Interface,
    Keyword,
    Method,
    Module,
    Namespace,
    Property,
    Structure,
}

impl LibrarySymbolKind {
    /// Kebab-case tag, identical to the serialized form.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Constant => "constant",
            Self::Delegate => "delegate",
            Self::Enum => "enum",
            Self::EnumMember => "enum-member",
            Self::Event => "event",
            Self::ExtensionMethod => "extension-method",
            Self::Field => "field",
            Self::Interface => "interface",
            Self::Keyword => "keyword",
            Self::Method => "method",
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Property => "property",
            Self::Structure => "structure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySymbol {
    pub name: String,
    pub kind: LibrarySymbolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<LibrarySymbol>,
}

impl LibrarySymbol {
    pub fn member(&self, name: &str) -> Option<&LibrarySymbol> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Parsed library metadata.
///
/// # Examples
///
/// ```
/// use scriptpad_core::library::Library;
///
/// let json = r#"{
///     "name": "geometry",
///     "symbols": [
///         { "name": "Geometry", "kind": "namespace",
///           "members": [ { "name": "Circle", "kind": "class" } ] }
///     ]
/// }"#;
///
/// let library = Library::from_json(json).unwrap();
/// assert_eq!(library.name, "geometry");
/// assert!(library.resolve_path(&["Geometry", "Circle"]).is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<LibrarySymbol>,
}

impl Library {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn global(&self, name: &str) -> Option<&LibrarySymbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Walks a dotted path (`["Geometry", "Circle"]`) from the library globals.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&LibrarySymbol> {
        let (first, rest) = path.split_first()?;
        let mut current = self.global(first.as_ref())?;
        for segment in rest {
            current = current.member(segment.as_ref())?;
        }
        Some(current)
    }
}

static PRELUDE: Lazy<Arc<Library>> = Lazy::new(|| {
    let library = Library::from_json(include_str!("prelude.json"))
        .expect("embedded prelude.json must be valid library metadata");
    Arc::new(library)
});

/// The built-in library visible to every script.
pub fn prelude() -> Arc<Library> {
    Arc::clone(&PRELUDE)
}

/// Resolves a reference path against the script directory.
///
/// Relative paths are joined onto `base_dir` (or the working directory when
/// the script has never been saved) and made absolute without touching the
/// filesystem.
pub fn absolute_library_path(path: &Path, base_dir: Option<&Path>) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let joined = match base_dir {
        Some(dir) => dir.join(path),
        None => path.to_path_buf(),
    };
    Ok(std::path::absolute(joined)?)
}

/// Process-wide memo of loaded libraries keyed by absolute path.
///
/// Loads are compute-if-absent; a failed load is not cached, so a library
/// that appears on disk later resolves on the next analysis.
#[derive(Debug, Default)]
pub struct LibraryCache {
    entries: DashMap<PathBuf, Arc<Library>>,
}

static GLOBAL_CACHE: Lazy<Arc<LibraryCache>> = Lazy::new(|| Arc::new(LibraryCache::new()));

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every workspace in the process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_CACHE)
    }

    /// Returns the library at `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::ReferenceResolution` if the file cannot be read
    /// or is not valid library metadata.
    pub fn resolve(&self, path: &Path) -> Result<Arc<Library>> {
        if let Some(hit) = self.entries.get(path) {
            return Ok(Arc::clone(hit.value()));
        }

        let entry = self
            .entries
            .entry(path.to_path_buf())
            .or_try_insert_with(|| {
                tracing::debug!("loading library {}", path.display());
                load_library(path).map(Arc::new)
            })?;
        Ok(Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }
}

fn load_library(path: &Path) -> Result<Library> {
    let resolution_error = |source: Box<dyn std::error::Error + Send + Sync>| {
        ScriptError::ReferenceResolution {
            path: path.to_path_buf(),
            source,
        }
    };
    let content = std::fs::read_to_string(path).map_err(|e| resolution_error(Box::new(e)))?;
    serde_json::from_str(&content).map_err(|e| resolution_error(Box::new(e)))
}
