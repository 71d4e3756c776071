//! Lexing and parsing of `.spx` script text into an immutable syntax tree.

pub mod ast;
pub mod lexer;
pub mod parser;

use crate::diagnostics::{Diagnostic, DiagnosticSeverity, codes};
use crate::text::{LineIndex, LineRemap};
use lexer::{OpaqueSpan, RawDirective, Token};
use std::sync::Arc;

pub use ast::Program;

/// Parse result for one version of the script text.
///
/// Owns the text it was produced from, so positions can always be resolved
/// against the exact snapshot that produced them.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    text: Arc<str>,
    program: Program,
    diagnostics: Vec<Diagnostic>,
    line_index: LineIndex,
    tokens: Vec<Token>,
    opaque: Vec<OpaqueSpan>,
}

impl SyntaxTree {
    pub fn parse(text: Arc<str>) -> Self {
        let lexed = lexer::tokenize(&text);
        let (program, parse_errors) = parser::parse(&text, &lexed.tokens);

        let mut diagnostics: Vec<Diagnostic> = lexed
            .errors
            .into_iter()
            .map(|(span, message)| {
                Diagnostic::new(codes::SYNTAX, DiagnosticSeverity::Error, message, Some(span))
            })
            .collect();
        diagnostics.extend(parse_errors.into_iter().map(|e| {
            Diagnostic::new(codes::SYNTAX, DiagnosticSeverity::Error, e.message, Some(e.span))
        }));

        let line_index = LineIndex::new(&text);
        let remaps = process_directives(&text, &line_index, &lexed.directives, &mut diagnostics);
        let line_index = line_index.with_remaps(remaps);

        Self {
            text,
            program,
            diagnostics,
            line_index,
            tokens: lexed.tokens,
            opaque: lexed.opaque,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Lexer, parser and directive diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Every token in source order, ending with `Eof`.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True if `offset` is inside a comment or string literal.
    pub fn is_in_comment_or_string(&self, offset: usize) -> bool {
        self.opaque.iter().any(|o| o.contains(offset))
    }

    /// True if `offset` lies strictly within a comment or string, so a line
    /// starting there continues a block comment from an earlier line.
    pub fn is_within_comment_or_string(&self, offset: usize) -> bool {
        self.opaque.iter().any(|o| o.span.strictly_contains(offset))
    }
}

fn process_directives(
    text: &str,
    line_index: &LineIndex,
    directives: &[RawDirective],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<LineRemap> {
    let mut remaps = Vec::new();

    for directive in directives {
        let next_line = line_index.position(text, directive.span.start).line + 1;
        match directive.name.as_str() {
            "r" => diagnostics.push(Diagnostic::new(
                codes::REFERENCE_IN_BODY,
                DiagnosticSeverity::Warning,
                "#r directives are only honored in the script header".to_string(),
                Some(directive.span),
            )),
            "line" => match parse_line_argument(&directive.argument) {
                Some(mapped_line) => remaps.push(LineRemap {
                    from_line: next_line,
                    mapped_line,
                }),
                None => diagnostics.push(Diagnostic::new(
                    codes::BAD_DIRECTIVE,
                    DiagnosticSeverity::Error,
                    format!("invalid #line directive '{}'", directive.argument),
                    Some(directive.span),
                )),
            },
            other => diagnostics.push(Diagnostic::new(
                codes::BAD_DIRECTIVE,
                DiagnosticSeverity::Error,
                format!("unknown preprocessor directive '#{other}'"),
                Some(directive.span),
            )),
        }
    }

    remaps
}

/// Largest line number a `#line` directive may name.
const MAX_LINE_DIRECTIVE: u32 = 16_707_565;

/// `Some(None)` for `default`, `Some(Some(n - 1))` for a 1-based line number.
fn parse_line_argument(argument: &str) -> Option<Option<u32>> {
    if argument == "default" {
        return Some(None);
    }
    let number = argument.split_whitespace().next()?.parse::<u32>().ok()?;
    if number == 0 || number > MAX_LINE_DIRECTIVE {
        return None;
    }
    Some(Some(number - 1))
}
