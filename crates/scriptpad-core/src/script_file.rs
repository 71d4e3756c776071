//! Persisted script format and materialization.
//!
//! A script file is a header of `#r "<path>"` lines followed by the body:
//!
//! ```text
//! #r "libs/geometry.json"
//! #r "/opt/shared/text.json"
//! let c: Geometry.Circle;
//! print(c.Area());
//! ```
//!
//! Only leading lines of exactly that form belong to the header; the first
//! line that does not match starts the body, which is kept byte-for-byte.
//! The same layout is handed to the execution sandbox as the materialized
//! script.

use crate::error::Result;
use crate::reference::Reference;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static REFERENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^#r "([^"]*)"\r?$"#).expect("reference line pattern is valid"));

/// A script split into its reference header and body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptFile {
    pub references: Vec<Reference>,
    pub body: String,
}

impl ScriptFile {
    /// Splits `content` into header references and body.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptpad_core::script_file::ScriptFile;
    ///
    /// let file = ScriptFile::parse("#r \"a.json\"\nprint(1);\n");
    /// assert_eq!(file.references.len(), 1);
    /// assert_eq!(file.references[0].display_name, "a.json");
    /// assert_eq!(file.body, "print(1);\n");
    /// ```
    pub fn parse(content: &str) -> Self {
        let mut references = Vec::new();
        let mut body_start = 0;

        for line in content.split_inclusive('\n') {
            let line_text = line.strip_suffix('\n').unwrap_or(line);
            let Some(caps) = REFERENCE_LINE.captures(line_text) else {
                break;
            };
            references.push(Reference::from_path(&caps[1]));
            body_start += line.len();
        }

        Self {
            references,
            body: content[body_start..].to_string(),
        }
    }

    /// Number of header lines `parse` consumed.
    pub fn header_lines(&self) -> usize {
        self.references.len()
    }

    pub fn materialize(&self) -> String {
        materialize(&self.references, &self.body)
    }

    /// Reads and splits a script file.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the file cannot be read.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::info!("loaded script {} ({} bytes)", path.display(), content.len());
        Ok(Self::parse(&content))
    }

    /// Writes the header and body to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = self.materialize();
        tokio::fs::write(path, &content).await?;
        tracing::info!("saved script {} ({} bytes)", path.display(), content.len());
        Ok(())
    }
}

/// One `#r` line per reference in list order, then the body.
pub fn materialize(references: &[Reference], body: &str) -> String {
    let mut out = String::with_capacity(body.len() + references.len() * 32);
    for reference in references {
        out.push_str("#r \"");
        out.push_str(&reference.path.to_string_lossy());
        out.push_str("\"\n");
    }
    out.push_str(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_header_and_body() {
        let content = "#r \"libs/a.json\"\n#r \"/abs/b.json\"\nlet x = 1;\n#r \"c.json\"\n";
        let file = ScriptFile::parse(content);
        let paths: Vec<_> = file
            .references
            .iter()
            .map(|r| r.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(paths, vec!["libs/a.json", "/abs/b.json"]);
        assert_eq!(file.body, "let x = 1;\n#r \"c.json\"\n");
        assert_eq!(file.header_lines(), 2);
    }

    #[test]
    fn test_header_requires_exact_form() {
        let file = ScriptFile::parse(" #r \"a.json\"\nx;");
        assert!(file.references.is_empty());
        assert_eq!(file.body, " #r \"a.json\"\nx;");

        let file = ScriptFile::parse("#r \"a.json\" // note\nx;");
        assert!(file.references.is_empty());
    }

    #[test]
    fn test_crlf_header() {
        let file = ScriptFile::parse("#r \"a.json\"\r\nprint(1);\r\n");
        assert_eq!(file.references.len(), 1);
        assert_eq!(file.body, "print(1);\r\n");
    }

    #[test]
    fn test_header_only_file() {
        let file = ScriptFile::parse("#r \"a.json\"");
        assert_eq!(file.references.len(), 1);
        assert_eq!(file.body, "");
    }

    #[test]
    fn test_materialize_order() {
        let references = vec![Reference::from_path("z.json"), Reference::from_path("a.json")];
        assert_eq!(
            materialize(&references, "print(1);"),
            "#r \"z.json\"\n#r \"a.json\"\nprint(1);"
        );
        assert_eq!(materialize(&[], "body"), "body");
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.spx");
        let original = ScriptFile {
            references: vec![
                Reference::from_path("libs/geometry.json"),
                Reference::from_path("/shared/text.json"),
            ],
            body: "let a = 1;\n\nprint(a);".to_string(),
        };

        original.save(&path).await.unwrap();
        let loaded = ScriptFile::load(&path).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ScriptFile::load(&dir.path().join("missing.spx")).await.unwrap_err();
        assert!(matches!(err, crate::error::ScriptError::Io(_)));
    }
}
