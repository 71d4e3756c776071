//! Syntax tree produced by the parser.

use crate::text::TextSpan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: TextSpan,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// A `{ ... }` block.
///
/// `closed` is false when the parser hit end of input before the `}`; the
/// span then runs to the end of the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: TextSpan,
    pub closed: bool,
}

impl Block {
    /// True if `offset` is inside the braces.
    pub fn encloses(&self, offset: usize) -> bool {
        self.span.strictly_contains(offset) || (!self.closed && offset == self.span.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: Ident,
        ty: Option<Vec<Ident>>,
        init: Option<Expr>,
    },
    Const {
        name: Ident,
        init: Expr,
    },
    Fn {
        name: Ident,
        params: Vec<Ident>,
        body: Block,
    },
    Struct {
        name: Ident,
        fields: Vec<Ident>,
    },
    Enum {
        name: Ident,
        variants: Vec<Ident>,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    For {
        var: Ident,
        iter: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Block(Block),
    Expr(Expr),
    /// Tokens skipped during error recovery.
    Error,
}

impl StmtKind {
    /// Declarations visible from the start of their enclosing block.
    pub fn is_hoisted(&self) -> bool {
        matches!(self, Self::Fn { .. } | Self::Struct { .. } | Self::Enum { .. })
    }

    pub fn diverges(&self) -> bool {
        matches!(self, Self::Return(_) | Self::Break | Self::Continue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal,
    Name(Ident),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Member {
        receiver: Box<Expr>,
        member: Ident,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Paren(Box<Expr>),
    Error,
}

impl Expr {
    /// The dotted name path of `a.b.c`, or `None` for any other shape.
    pub fn as_path(&self) -> Option<Vec<&Ident>> {
        match &self.kind {
            ExprKind::Name(ident) => Some(vec![ident]),
            ExprKind::Member { receiver, member } => {
                let mut path = receiver.as_path()?;
                path.push(member);
                Some(path)
            }
            _ => None,
        }
    }
}
