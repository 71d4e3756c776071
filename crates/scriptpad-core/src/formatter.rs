//! Script reindentation.
//!
//! Formatting only touches leading and trailing whitespace. Every line is
//! indented by its bracket depth in the token stream, four spaces per level;
//! a line that starts with closing brackets is dedented by their count.
//! Directives go to column 0, blank lines become empty, and lines that begin
//! inside a block comment are left exactly as written.

use crate::syntax::SyntaxTree;
use crate::syntax::lexer::TokenKind;

const INDENT: &str = "    ";

/// Reindents the text of `tree`.
///
/// The result is a fixed point: formatting it again changes nothing.
pub fn reindent(tree: &SyntaxTree) -> String {
    let text = tree.text();
    let tokens = tree.tokens();
    let mut out = String::with_capacity(text.len());
    let mut next_token = 0;
    let mut depth = 0usize;
    let mut line_start = 0;

    for line in text.split_inclusive('\n') {
        let (content, ending) = split_line_ending(line);
        let content_end = line_start + content.len();

        // Tokens never span lines, so those starting here end here too.
        let first = next_token;
        while tokens[next_token].kind != TokenKind::Eof
            && tokens[next_token].span.start < content_end
        {
            next_token += 1;
        }
        let on_line = &tokens[first..next_token];

        let trimmed = content.trim();
        if tree.is_within_comment_or_string(line_start) {
            out.push_str(content);
        } else if trimmed.starts_with('#') {
            out.push_str(trimmed);
        } else if !trimmed.is_empty() {
            let leading_closers = on_line.iter().take_while(|t| is_closer(t.kind)).count();
            let level = depth.saturating_sub(leading_closers);
            for _ in 0..level {
                out.push_str(INDENT);
            }
            out.push_str(trimmed);
        }
        out.push_str(ending);

        for token in on_line {
            if is_opener(token.kind) {
                depth += 1;
            } else if is_closer(token.kind) {
                depth = depth.saturating_sub(1);
            }
        }
        line_start += line.len();
    }
    out
}

/// Reindents script text that has not been parsed yet.
pub fn format_text(text: &str) -> String {
    reindent(&SyntaxTree::parse(text.into()))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn is_opener(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket
    )
}

fn is_closer(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket
    )
}
