//! Tokenizer for `.spx` scripts.
//!
//! Comments are dropped from the token stream but their spans are kept,
//! together with string literal spans, so completion can tell when the
//! caret sits inside text that is not code. Lines starting with `#` are
//! collected as directives and never tokenized.

use crate::text::TextSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Str,

    Let,
    Const,
    Fn,
    Struct,
    Enum,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    True,
    False,
    Null,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semi,
    Colon,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,

    Unknown,
    Eof,
}

/// Reserved words of the language, in the order completion offers them.
pub const KEYWORDS: &[(&str, TokenKind)] = &[
    ("break", TokenKind::Break),
    ("const", TokenKind::Const),
    ("continue", TokenKind::Continue),
    ("else", TokenKind::Else),
    ("enum", TokenKind::Enum),
    ("false", TokenKind::False),
    ("fn", TokenKind::Fn),
    ("for", TokenKind::For),
    ("if", TokenKind::If),
    ("in", TokenKind::In),
    ("let", TokenKind::Let),
    ("null", TokenKind::Null),
    ("return", TokenKind::Return),
    ("struct", TokenKind::Struct),
    ("true", TokenKind::True),
    ("while", TokenKind::While),
];

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Ident => "identifier",
            Self::Int | Self::Float => "number",
            Self::Str => "string",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Dot => "'.'",
            Self::Comma => "','",
            Self::Semi => "';'",
            Self::Colon => "':'",
            Self::Assign => "'='",
            Self::Eof => "end of file",
            Self::Unknown => "unexpected character",
            other => KEYWORDS
                .iter()
                .find(|(_, kind)| *kind == other)
                .map_or("operator", |(word, _)| *word),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextSpan,
}

/// A comment or string literal.
///
/// An open-ended span (line comment, unterminated string or comment) also
/// contains its end offset, since the caret there is still inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueSpan {
    pub span: TextSpan,
    pub open_ended: bool,
}

impl OpaqueSpan {
    pub fn contains(&self, offset: usize) -> bool {
        self.span.strictly_contains(offset) || (self.open_ended && offset == self.span.end)
    }
}

/// A `#name argument` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective {
    pub span: TextSpan,
    pub name: String,
    pub argument: String,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub opaque: Vec<OpaqueSpan>,
    pub directives: Vec<RawDirective>,
    pub errors: Vec<(TextSpan, String)>,
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn tokenize(source: &str) -> Lexed {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    at_line_start: bool,
    out: Lexed,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            at_line_start: true,
            out: Lexed::default(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn line_end(&self) -> usize {
        self.source[self.pos..]
            .find('\n')
            .map_or(self.source.len(), |i| self.pos + i)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.out.tokens.push(Token {
            kind,
            span: TextSpan::new(start, self.pos),
        });
    }

    fn run(mut self) -> Lexed {
        while let Some(c) = self.peek() {
            let start = self.pos;

            if c == '\n' {
                self.pos += 1;
                self.at_line_start = true;
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }
            if c == '#' && self.at_line_start {
                self.directive();
                continue;
            }
            self.at_line_start = false;

            if c == '/' && self.peek_second() == Some('/') {
                let end = self.line_end();
                let end = if self.source[..end].ends_with('\r') { end - 1 } else { end };
                self.pos = end;
                self.out.opaque.push(OpaqueSpan {
                    span: TextSpan::new(start, end),
                    open_ended: true,
                });
                continue;
            }
            if c == '/' && self.peek_second() == Some('*') {
                self.block_comment(start);
                continue;
            }
            if c == '"' {
                self.string(start);
                continue;
            }
            if is_ident_start(c) {
                self.eat_while(is_ident_continue);
                let word = &self.source[start..self.pos];
                let kind = KEYWORDS
                    .iter()
                    .find(|(kw, _)| *kw == word)
                    .map_or(TokenKind::Ident, |(_, kind)| *kind);
                self.push(kind, start);
                continue;
            }
            if c.is_ascii_digit() {
                self.number(start);
                continue;
            }

            self.bump();
            let kind = self.punct(c);
            if kind == TokenKind::Unknown {
                self.out.errors.push((
                    TextSpan::new(start, self.pos),
                    format!("unexpected character '{c}'"),
                ));
            }
            self.push(kind, start);
        }

        let end = self.source.len();
        self.out.tokens.push(Token {
            kind: TokenKind::Eof,
            span: TextSpan::empty(end),
        });
        self.out
    }

    fn punct(&mut self, c: char) -> TokenKind {
        let next = self.peek();
        let (kind, double) = match (c, next) {
            ('=', Some('=')) => (TokenKind::EqEq, true),
            ('!', Some('=')) => (TokenKind::NotEq, true),
            ('<', Some('=')) => (TokenKind::Le, true),
            ('>', Some('=')) => (TokenKind::Ge, true),
            ('&', Some('&')) => (TokenKind::AndAnd, true),
            ('|', Some('|')) => (TokenKind::OrOr, true),
            ('(', _) => (TokenKind::LParen, false),
            (')', _) => (TokenKind::RParen, false),
            ('{', _) => (TokenKind::LBrace, false),
            ('}', _) => (TokenKind::RBrace, false),
            ('[', _) => (TokenKind::LBracket, false),
            (']', _) => (TokenKind::RBracket, false),
            ('.', _) => (TokenKind::Dot, false),
            (',', _) => (TokenKind::Comma, false),
            (';', _) => (TokenKind::Semi, false),
            (':', _) => (TokenKind::Colon, false),
            ('=', _) => (TokenKind::Assign, false),
            ('+', _) => (TokenKind::Plus, false),
            ('-', _) => (TokenKind::Minus, false),
            ('*', _) => (TokenKind::Star, false),
            ('/', _) => (TokenKind::Slash, false),
            ('%', _) => (TokenKind::Percent, false),
            ('<', _) => (TokenKind::Lt, false),
            ('>', _) => (TokenKind::Gt, false),
            ('!', _) => (TokenKind::Bang, false),
            _ => (TokenKind::Unknown, false),
        };
        if double {
            self.bump();
        }
        kind
    }

    fn number(&mut self, start: usize) {
        self.eat_while(|c| c.is_ascii_digit());
        let mut kind = TokenKind::Int;
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
            kind = TokenKind::Float;
        }
        self.push(kind, start);
    }

    fn string(&mut self, start: usize) {
        self.bump();
        let mut terminated = false;
        while let Some(c) = self.peek() {
            match c {
                '\n' => break,
                '\\' => {
                    self.bump();
                    if self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '"' => {
                    self.bump();
                    terminated = true;
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        let mut end = self.pos;
        if !terminated {
            if self.source[..end].ends_with('\r') {
                end -= 1;
            }
            self.out.errors.push((
                TextSpan::new(start, end),
                "unterminated string literal".to_string(),
            ));
        }
        self.out.opaque.push(OpaqueSpan {
            span: TextSpan::new(start, end),
            open_ended: !terminated,
        });
        self.push(TokenKind::Str, start);
    }

    fn block_comment(&mut self, start: usize) {
        self.pos += 2;
        let (end, terminated) = match self.source[self.pos..].find("*/") {
            Some(i) => (self.pos + i + 2, true),
            None => (self.source.len(), false),
        };
        self.pos = end;
        if !terminated {
            self.out.errors.push((
                TextSpan::new(start, end),
                "unterminated block comment".to_string(),
            ));
        }
        self.out.opaque.push(OpaqueSpan {
            span: TextSpan::new(start, end),
            open_ended: !terminated,
        });
    }

    fn directive(&mut self) {
        let start = self.pos;
        let mut end = self.line_end();
        if self.source[..end].ends_with('\r') {
            end -= 1;
        }
        let body = &self.source[start + 1..end];
        let name_len = body
            .find(|c: char| !is_ident_continue(c))
            .unwrap_or(body.len());
        let (name, argument) = body.split_at(name_len);

        self.out.directives.push(RawDirective {
            span: TextSpan::new(start, end),
            name: name.to_string(),
            argument: argument.trim().to_string(),
        });
        self.pos = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = fn_name;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers_and_member_access() {
        assert_eq!(
            kinds("1.5 2 x.y 3.z"),
            vec![
                TokenKind::Float,
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Int,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e && f || !g"),
            vec![
                TokenKind::Ident,
                TokenKind::EqEq,
                TokenKind::Ident,
                TokenKind::NotEq,
                TokenKind::Ident,
                TokenKind::Le,
                TokenKind::Ident,
                TokenKind::Ge,
                TokenKind::Ident,
                TokenKind::AndAnd,
                TokenKind::Ident,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_opaque() {
        let source = "a // note\n/* block */ b";
        let lexed = tokenize(source);
        assert_eq!(lexed.tokens.len(), 3);
        assert_eq!(lexed.opaque.len(), 2);

        let line_comment = lexed.opaque[0];
        assert!(line_comment.open_ended);
        assert!(line_comment.contains(source.find('\n').unwrap()));

        let block = lexed.opaque[1];
        assert!(!block.contains(block.span.end));
        assert!(block.contains(block.span.start + 3));
    }

    #[test]
    fn test_string_with_escape() {
        let source = r#"print("a \" b");"#;
        let lexed = tokenize(source);
        let string = lexed.tokens.iter().find(|t| t.kind == TokenKind::Str).unwrap();
        assert_eq!(&source[string.span.start..string.span.end], r#""a \" b""#);
        assert!(lexed.errors.is_empty());
    }

    #[test]
    fn test_unterminated_string_reported() {
        let lexed = tokenize("let s = \"abc\nlet t = 1;");
        assert_eq!(lexed.errors.len(), 1);
        assert!(lexed.opaque[0].open_ended);
        assert!(lexed.tokens.iter().any(|t| t.kind == TokenKind::Let));
    }

    #[test]
    fn test_directives_only_at_line_start() {
        let lexed = tokenize("#line 10\n  #r \"x.json\"\nlet a = 1; # oops");
        assert_eq!(lexed.directives.len(), 2);
        assert_eq!(lexed.directives[0].name, "line");
        assert_eq!(lexed.directives[0].argument, "10");
        assert_eq!(lexed.directives[1].name, "r");
        assert_eq!(lexed.directives[1].argument, "\"x.json\"");
        assert_eq!(lexed.errors.len(), 1);
    }

    #[test]
    fn test_unicode_identifier() {
        let lexed = tokenize("let größe = 1;");
        assert_eq!(lexed.tokens[1].kind, TokenKind::Ident);
        assert_eq!(lexed.tokens[1].span.len(), "größe".len());
    }
}
