//! Completion at a caret offset.
//!
//! This module answers "what can be typed here" against a finished
//! [`AnalysisSnapshot`]. It handles:
//!
//! - Context detection - member access after `.` versus a plain name
//! - Prefix extraction - the identifier typed so far and the span it covers
//! - Ranking and de-duplication of candidates
//! - The completion window lifecycle ([`CompletionSession`])
//!
//! # Examples
//!
//! ```
//! use scriptpad_core::compilation::{Compiler, ScriptLanguage};
//! use scriptpad_core::completion::CompletionEngine;
//! use scriptpad_core::library::prelude;
//! use scriptpad_core::snapshot::{AnalysisSnapshot, SnapshotKey};
//! use std::sync::Arc;
//!
//! let source = "let total = 1;\nprint(tot";
//! let syntax = Arc::new(ScriptLanguage.parse(Arc::from(source)));
//! let bound = ScriptLanguage.bind(&syntax, &[prelude()]);
//! let snapshot = AnalysisSnapshot::assemble(SnapshotKey::new(1, 0), syntax, bound, Vec::new());
//!
//! let result = CompletionEngine::complete(&snapshot, source.len()).unwrap();
//! assert_eq!(result.prefix, "tot");
//! assert_eq!(result.candidates[0].display_text, "total");
//! ```

use crate::binder::VisibleSymbol;
use crate::snapshot::AnalysisSnapshot;
use crate::syntax::lexer::{is_ident_continue, is_ident_start};
use crate::text::TextSpan;
use serde::Serialize;
use std::collections::HashSet;

/// Icon category of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionCategory {
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

const CATEGORY_TAGS: [(&str, CompletionCategory); 15] = [
    ("class", CompletionCategory::Class),
    ("constant", CompletionCategory::Constant),
    ("delegate", CompletionCategory::Delegate),
    ("enum", CompletionCategory::Enum),
    ("enum-member", CompletionCategory::EnumMember),
    ("event", CompletionCategory::Event),
    ("extension-method", CompletionCategory::ExtensionMethod),
    ("field", CompletionCategory::Field),
    ("interface", CompletionCategory::Interface),
    ("keyword", CompletionCategory::Keyword),
    ("method", CompletionCategory::Method),
    ("module", CompletionCategory::Module),
    ("namespace", CompletionCategory::Namespace),
    ("property", CompletionCategory::Property),
    ("structure", CompletionCategory::Structure),
];

impl CompletionCategory {
    /// Looks a symbol tag up in the fixed icon table.
    ///
    /// Tags outside the table (such as `Local` or `Parameter`) have no icon.
    pub fn from_tag(tag: &str) -> Option<Self> {
        CATEGORY_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, category)| *category)
    }

    pub fn tag(self) -> &'static str {
        CATEGORY_TAGS
            .iter()
            .find(|(_, category)| *category == self)
            .map_or("", |(name, _)| *name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionCandidate {
    pub display_text: String,
    pub category: Option<CompletionCategory>,
    /// Span the candidate text replaces.
    pub insertion_span: TextSpan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionResult {
    pub candidates: Vec<CompletionCandidate>,
    pub replace_span: TextSpan,
    pub prefix: String,
    /// Dotted receiver path for member completion.
    pub receiver: Option<Vec<String>>,
}

/// Where the caret sits relative to the identifier being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CompletionContext {
    Name { prefix_start: usize },
    Member { prefix_start: usize, receiver: Vec<String> },
}

pub struct CompletionEngine;

impl CompletionEngine {
    /// Candidates for the identifier ending at `caret`.
    ///
    /// Returns `None` when the caret is not on a character boundary, sits
    /// inside a comment or string literal, follows a number, or nothing
    /// matches the prefix.
    pub fn complete(snapshot: &AnalysisSnapshot, caret: usize) -> Option<CompletionResult> {
        let text = snapshot.text();
        if caret > text.len() || !text.is_char_boundary(caret) {
            return None;
        }
        if snapshot.syntax().is_in_comment_or_string(caret) {
            return None;
        }

        let context = detect_context(text, caret)?;
        let index = snapshot.symbols();
        let (prefix_start, receiver, symbols) = match context {
            CompletionContext::Name { prefix_start } => {
                (prefix_start, None, index.visible_at(caret))
            }
            CompletionContext::Member {
                prefix_start,
                receiver,
            } => {
                let members = index.members_of(&receiver, caret);
                (prefix_start, Some(receiver), members)
            }
        };

        let prefix = &text[prefix_start..caret];
        let replace_span = TextSpan::new(prefix_start, caret);
        let candidates = rank(symbols, prefix, replace_span);
        if candidates.is_empty() {
            return None;
        }

        tracing::trace!(
            "completion at {} prefix {:?}: {} candidates",
            caret,
            prefix,
            candidates.len()
        );

        Some(CompletionResult {
            candidates,
            replace_span,
            prefix: prefix.to_string(),
            receiver,
        })
    }
}

fn rank(symbols: Vec<VisibleSymbol<'_>>, prefix: &str, span: TextSpan) -> Vec<CompletionCandidate> {
    let mut seen = HashSet::new();
    let mut kept: Vec<VisibleSymbol<'_>> = symbols
        .into_iter()
        .filter(|s| s.name.starts_with(prefix))
        .filter(|s| seen.insert(s.name))
        .collect();

    kept.sort_by(|a, b| {
        a.kind
            .rank()
            .cmp(&b.kind.rank())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(b.name))
    });

    kept.into_iter()
        .map(|s| CompletionCandidate {
            display_text: s.name.to_string(),
            category: CompletionCategory::from_tag(s.kind.tag()),
            insertion_span: span,
            description: s.doc.map(str::to_string),
        })
        .collect()
}

fn detect_context(text: &str, caret: usize) -> Option<CompletionContext> {
    let prefix_start = ident_start_before(text, caret);
    if text[prefix_start..caret]
        .chars()
        .next()
        .is_some_and(|c| !is_ident_start(c))
    {
        return None;
    }

    if !text[..prefix_start].ends_with('.') {
        return Some(CompletionContext::Name { prefix_start });
    }

    let mut receiver = Vec::new();
    let mut end = prefix_start - 1;
    loop {
        let start = ident_start_before(text, end);
        let segment = &text[start..end];
        if segment.is_empty() || !segment.starts_with(is_ident_start) {
            return None;
        }
        receiver.push(segment.to_string());
        if !text[..start].ends_with('.') {
            break;
        }
        end = start - 1;
    }
    receiver.reverse();

    Some(CompletionContext::Member {
        prefix_start,
        receiver,
    })
}

/// Start of the run of identifier characters ending at `end`.
fn ident_start_before(text: &str, end: usize) -> usize {
    text[..end]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_continue(*c))
        .last()
        .map_or(end, |(i, _)| i)
}

/// What a typed character does to the completion window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedCharAction {
    /// Ask the engine for candidates and show them if any.
    Request,
    /// Keep the window open and narrow it with the new prefix.
    Filter,
    /// Insert the selected candidate, then the typed character.
    Commit,
    /// Insert the selected candidate, then request member completion.
    CommitAndRequest,
    Ignore,
}

/// Completion window lifecycle: `Closed -> Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionSession {
    #[default]
    Closed,
    Open {
        replace_start: usize,
    },
}

impl CompletionSession {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Marks the window as showing `result`.
    pub fn show(&mut self, result: &CompletionResult) {
        *self = Self::Open {
            replace_start: result.replace_span.start,
        };
    }

    pub fn dismiss(&mut self) {
        *self = Self::Closed;
    }

    /// Text a commit at `caret` replaces: from the start of the prefix the
    /// window was opened for up to the caret. `None` while closed.
    pub fn commit_span(&self, caret: usize) -> Option<TextSpan> {
        match *self {
            Self::Open { replace_start } => {
                Some(TextSpan::new(replace_start, caret.max(replace_start)))
            }
            Self::Closed => None,
        }
    }

    pub fn on_typed_char(&mut self, c: char) -> TypedCharAction {
        match self {
            Self::Closed if is_ident_continue(c) || c == '.' => TypedCharAction::Request,
            Self::Closed => TypedCharAction::Ignore,
            Self::Open { .. } if is_ident_continue(c) => TypedCharAction::Filter,
            Self::Open { .. } if c == '.' => {
                *self = Self::Closed;
                TypedCharAction::CommitAndRequest
            }
            Self::Open { .. } => {
                *self = Self::Closed;
                TypedCharAction::Commit
            }
        }
    }
}
