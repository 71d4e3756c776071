//! Recursive-descent parser with statement-level error recovery.
//!
//! A failed statement is replaced by `StmtKind::Error` and parsing resumes
//! after the next `;`, before the next `}`, or at the next statement keyword,
//! so one mistake does not hide errors further down.

use super::ast::{BinaryOp, Block, Expr, ExprKind, Ident, Program, Stmt, StmtKind, UnaryOp};
use super::lexer::{Token, TokenKind};
use crate::text::TextSpan;

const MAX_NESTING: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: TextSpan,
    pub message: String,
}

pub fn parse(source: &str, tokens: &[Token]) -> (Program, Vec<ParseError>) {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        errors: Vec::new(),
    };
    let program = parser.program();
    (program, parser.errors)
}

/// Marker for a statement that could not be parsed; the error is already recorded.
struct Failed;

type PResult<T> = std::result::Result<T, Failed>;

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl Parser<'_> {
    fn current(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn error_here(&mut self, expected: &str) -> Failed {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => "end of file".to_string(),
            _ => format!("'{}'", &self.source[token.span.start..token.span.end]),
        };
        self.errors.push(ParseError {
            span: token.span,
            message: format!("expected {expected}, found {found}"),
        });
        Failed
    }

    /// Enters one level of tree nesting, failing past [`MAX_NESTING`].
    ///
    /// Callers restore `depth` themselves; the tree height, not only the
    /// recursion depth, is bounded so later walks over the tree stay shallow.
    fn deepen(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let span = self.current().span;
            self.errors.push(ParseError {
                span,
                message: "expression too deeply nested".to_string(),
            });
            return Err(Failed);
        }
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let base = self.depth;
        let result = self.deepen().and_then(|()| parse(self));
        self.depth = base;
        result
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(kind.describe()))
        }
    }

    fn ident(&mut self) -> PResult<Ident> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(Ident {
            name: self.source[token.span.start..token.span.end].to_string(),
            span: token.span,
        })
    }

    fn program(&mut self) -> Program {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::RBrace) {
                let token = self.bump();
                self.errors.push(ParseError {
                    span: token.span,
                    message: "unexpected '}'".to_string(),
                });
                continue;
            }
            stmts.push(self.stmt());
        }
        Program { stmts }
    }

    fn stmt(&mut self) -> Stmt {
        let start_pos = self.pos;
        let start = self.current().span.start;
        match self.stmt_kind() {
            Ok(kind) => Stmt {
                kind,
                span: TextSpan::new(start, self.prev_end().max(start)),
            },
            Err(Failed) => {
                self.recover(start_pos);
                Stmt {
                    kind: StmtKind::Error,
                    span: TextSpan::new(start, self.prev_end().max(start)),
                }
            }
        }
    }

    fn recover(&mut self, start_pos: usize) {
        loop {
            match self.kind() {
                TokenKind::Eof | TokenKind::RBrace => break,
                TokenKind::Semi => {
                    self.bump();
                    break;
                }
                TokenKind::Let
                | TokenKind::Const
                | TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                    if self.pos > start_pos =>
                {
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn stmt_kind(&mut self) -> PResult<StmtKind> {
        match self.kind() {
            TokenKind::Let => {
                self.bump();
                let name = self.ident()?;
                let ty = if self.eat(TokenKind::Colon) {
                    Some(self.path()?)
                } else {
                    None
                };
                let init = if self.eat(TokenKind::Assign) {
                    Some(self.expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Let { name, ty, init })
            }
            TokenKind::Const => {
                self.bump();
                let name = self.ident()?;
                self.expect(TokenKind::Assign)?;
                let init = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Const { name, init })
            }
            TokenKind::Fn => {
                self.bump();
                let name = self.ident()?;
                self.expect(TokenKind::LParen)?;
                let mut params = Vec::new();
                if !self.at(TokenKind::RParen) {
                    loop {
                        params.push(self.ident()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
                let body = self.block()?;
                Ok(StmtKind::Fn { name, params, body })
            }
            TokenKind::Struct => {
                self.bump();
                let name = self.ident()?;
                let fields = self.ident_list()?;
                Ok(StmtKind::Struct { name, fields })
            }
            TokenKind::Enum => {
                self.bump();
                let name = self.ident()?;
                let variants = self.ident_list()?;
                Ok(StmtKind::Enum { name, variants })
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::While => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(StmtKind::While { cond, body })
            }
            TokenKind::For => {
                self.bump();
                let var = self.ident()?;
                self.expect(TokenKind::In)?;
                let iter = self.expr()?;
                let body = self.block()?;
                Ok(StmtKind::For { var, iter, body })
            }
            TokenKind::Return => {
                self.bump();
                let value = if self.at(TokenKind::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Return(value))
            }
            TokenKind::Break => {
                self.bump();
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Break)
            }
            TokenKind::Continue => {
                self.bump();
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Continue)
            }
            TokenKind::LBrace => Ok(StmtKind::Block(self.block()?)),
            _ => {
                let expr = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(StmtKind::Expr(expr))
            }
        }
    }

    fn if_stmt(&mut self) -> PResult<StmtKind> {
        self.expect(TokenKind::If)?;
        let cond = self.expr()?;
        let then_block = self.block()?;
        let else_branch = if self.eat(TokenKind::Else) {
            let start = self.current().span.start;
            let kind = if self.at(TokenKind::If) {
                self.nested(Self::if_stmt)?
            } else {
                StmtKind::Block(self.block()?)
            };
            Some(Box::new(Stmt {
                kind,
                span: TextSpan::new(start, self.prev_end()),
            }))
        } else {
            None
        };
        Ok(StmtKind::If {
            cond,
            then_block,
            else_branch,
        })
    }

    fn block(&mut self) -> PResult<Block> {
        if self.depth >= MAX_NESTING {
            return self.skip_block();
        }
        self.depth += 1;
        let result = self.block_body();
        self.depth -= 1;
        result
    }

    /// Consumes a block nested too deeply to parse, up to its matching `}`.
    fn skip_block(&mut self) -> PResult<Block> {
        let open = self.expect(TokenKind::LBrace)?;
        self.errors.push(ParseError {
            span: open.span,
            message: "block too deeply nested".to_string(),
        });
        let mut open_braces = 1usize;
        while open_braces > 0 && !self.at(TokenKind::Eof) {
            match self.bump().kind {
                TokenKind::LBrace => open_braces += 1,
                TokenKind::RBrace => open_braces -= 1,
                _ => {}
            }
        }
        let closed = open_braces == 0;
        let end = if closed {
            self.prev_end()
        } else {
            self.source.len()
        };
        Ok(Block {
            stmts: Vec::new(),
            span: TextSpan::new(open.span.start, end),
            closed,
        })
    }

    fn block_body(&mut self) -> PResult<Block> {
        let open = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            stmts.push(self.stmt());
        }
        if self.at(TokenKind::RBrace) {
            let close = self.bump();
            return Ok(Block {
                stmts,
                span: TextSpan::new(open.span.start, close.span.end),
                closed: true,
            });
        }
        self.error_here("'}'");
        Ok(Block {
            stmts,
            span: TextSpan::new(open.span.start, self.source.len()),
            closed: false,
        })
    }

    fn ident_list(&mut self) -> PResult<Vec<Ident>> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBrace) {
            items.push(self.ident()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(items)
    }

    fn path(&mut self) -> PResult<Vec<Ident>> {
        let mut segments = vec![self.ident()?];
        while self.eat(TokenKind::Dot) {
            segments.push(self.ident()?);
        }
        Ok(segments)
    }

    fn expr(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let target = self.binary(0)?;
        if !self.at(TokenKind::Assign) {
            return Ok(target);
        }
        let assign = self.bump();
        if !matches!(
            target.kind,
            ExprKind::Name(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            self.errors.push(ParseError {
                span: assign.span,
                message: "invalid assignment target".to_string(),
            });
        }
        let value = self.expr()?;
        Ok(Expr {
            span: target.span.cover(value.span),
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        })
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.kind() {
            TokenKind::OrOr => (BinaryOp::Or, 1),
            TokenKind::AndAnd => (BinaryOp::And, 2),
            TokenKind::EqEq => (BinaryOp::Eq, 3),
            TokenKind::NotEq => (BinaryOp::NotEq, 3),
            TokenKind::Lt => (BinaryOp::Lt, 4),
            TokenKind::Le => (BinaryOp::Le, 4),
            TokenKind::Gt => (BinaryOp::Gt, 4),
            TokenKind::Ge => (BinaryOp::Ge, 4),
            TokenKind::Plus => (BinaryOp::Add, 5),
            TokenKind::Minus => (BinaryOp::Sub, 5),
            TokenKind::Star => (BinaryOp::Mul, 6),
            TokenKind::Slash => (BinaryOp::Div, 6),
            TokenKind::Percent => (BinaryOp::Rem, 6),
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let base = self.depth;
        let result = self.binary_chain(min_prec);
        self.depth = base;
        result
    }

    /// Left-associative chain; every operator adds a level to the tree.
    fn binary_chain(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec <= min_prec {
                break;
            }
            self.deepen()?;
            self.bump();
            let rhs = self.binary(prec)?;
            lhs = Expr {
                span: lhs.span.cover(rhs.span),
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.kind() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        let token = self.bump();
        let operand = self.nested(Self::unary)?;
        Ok(Expr {
            span: token.span.cover(operand.span),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let base = self.depth;
        let result = self.postfix_chain();
        self.depth = base;
        result
    }

    fn postfix_chain(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if matches!(
                self.kind(),
                TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
            ) {
                self.deepen()?;
            }
            match self.kind() {
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect(TokenKind::RParen)?;
                    expr = Expr {
                        span: expr.span.cover(close.span),
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                    };
                }
                TokenKind::Dot => {
                    self.bump();
                    let member = self.ident()?;
                    expr = Expr {
                        span: expr.span.cover(member.span),
                        kind: ExprKind::Member {
                            receiver: Box::new(expr),
                            member,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let index = self.expr()?;
                    let close = self.expect(TokenKind::RBracket)?;
                    expr = Expr {
                        span: expr.span.cover(close.span),
                        kind: ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.current();
        let kind = match token.kind {
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null => {
                self.bump();
                ExprKind::Literal
            }
            TokenKind::Ident => ExprKind::Name(self.ident()?),
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                let close = self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    span: token.span.cover(close.span),
                    kind: ExprKind::Paren(Box::new(inner)),
                });
            }
            _ => return Err(self.error_here("expression")),
        };
        Ok(Expr {
            kind,
            span: token.span,
        })
    }
}
