//! External library references visible to a script.

use std::path::{Path, PathBuf};

/// One external library reference.
///
/// Identity is the display name: two references with the same display name
/// are the same reference even if their paths differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub display_name: String,
    pub path: PathBuf,
}

impl Reference {
    pub fn new(display_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            display_name: display_name.into(),
            path: path.into(),
        }
    }

    /// Builds a reference whose display name is the last path component.
    ///
    /// Both `/` and `\` separate components so references written on any
    /// platform display the same way.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptpad_core::Reference;
    ///
    /// let reference = Reference::from_path("libs\\geometry.json");
    /// assert_eq!(reference.display_name, "geometry.json");
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = path.to_string_lossy();
        let display_name = raw
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&raw)
            .to_string();
        Self {
            display_name,
            path: path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Ordered set of references, de-duplicated by display name.
///
/// Every structural change bumps [`version`](ReferenceSet::version), which is
/// independent of the source version so a reference-only change can be
/// handled by re-binding.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    entries: Vec<Reference>,
    version: u64,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_references(references: impl IntoIterator<Item = Reference>) -> Self {
        let mut set = Self::new();
        for reference in references {
            set.add(reference);
        }
        set.version = 0;
        set
    }

    pub fn add(&mut self, reference: Reference) -> AddOutcome {
        if self.contains(&reference.display_name) {
            return AddOutcome::AlreadyPresent;
        }
        tracing::debug!("reference added: {}", reference.display_name);
        self.entries.push(reference);
        self.version += 1;
        AddOutcome::Added
    }

    pub fn remove(&mut self, reference: &Reference) -> RemoveOutcome {
        self.remove_by_name(&reference.display_name)
    }

    pub fn remove_by_name(&mut self, display_name: &str) -> RemoveOutcome {
        let Some(idx) = self
            .entries
            .iter()
            .position(|r| r.display_name == display_name)
        else {
            return RemoveOutcome::NotFound;
        };
        self.entries.remove(idx);
        self.version += 1;
        tracing::debug!("reference removed: {}", display_name);
        RemoveOutcome::Removed
    }

    pub fn contains(&self, display_name: &str) -> bool {
        self.entries.iter().any(|r| r.display_name == display_name)
    }

    pub fn list(&self) -> &[Reference] {
        &self.entries
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bumps the version without a structural change, for when the way
    /// references resolve has changed (new script directory, new options).
    pub(crate) fn invalidate(&mut self) {
        self.version += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
