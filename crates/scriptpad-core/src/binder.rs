//! Name binding: scopes, declarations, and name/member resolution.
//!
//! Binding runs in two passes over the syntax tree:
//!
//! 1. **Declare** - builds the scope tree and records every declaration with
//!    the offset it becomes visible from. `fn`, `struct` and `enum` are
//!    hoisted to the start of their block; `let` and `const` become visible
//!    after their statement; parameters and loop variables are visible in
//!    the whole body.
//! 2. **Resolve** - looks every name and member path up through the finished
//!    [`SymbolIndex`], the same way completion queries it.
//!
//! Because both passes share one lookup path, a name that binding accepts is
//! always one completion offers at the same offset.

use crate::diagnostics::{Diagnostic, DiagnosticSeverity, codes};
use crate::library::{Library, LibrarySymbol, LibrarySymbolKind};
use crate::syntax::SyntaxTree;
use crate::syntax::ast::{Block, Expr, ExprKind, Ident, Stmt, StmtKind};
use crate::syntax::lexer::KEYWORDS;
use crate::text::TextSpan;
use std::collections::HashSet;
use std::sync::Arc;

/// Type annotations may chain through other annotated locals; deeper chains are ignored.
const MAX_TYPE_DEPTH: usize = 16;

pub type ScopeId = usize;
pub type SymbolId = usize;

/// What a visible name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Local,
    Parameter,
    Constant,
    Function,
    Struct,
    Enum,
    Field,
    EnumMember,
    Keyword,
    Library(LibrarySymbolKind),
}

impl SymbolKind {
    /// Opaque category tag handed to completion consumers.
    ///
    /// Locals and parameters carry tags outside the icon table, so they are
    /// shown without an icon.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::Parameter => "Parameter",
            Self::Constant => "constant",
            Self::Function => "method",
            Self::Struct => "structure",
            Self::Enum => "enum",
            Self::Field => "field",
            Self::EnumMember => "enum-member",
            Self::Keyword => "keyword",
            Self::Library(kind) => kind.tag(),
        }
    }

    /// Completion ranking tier, lower first.
    pub fn rank(self) -> u8 {
        match self {
            Self::Local | Self::Parameter => 0,
            Self::Constant | Self::Function | Self::Struct | Self::Enum => 1,
            Self::Field | Self::EnumMember | Self::Library(_) => 2,
            Self::Keyword => 3,
        }
    }
}

/// A name as seen from some offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleSymbol<'a> {
    pub name: &'a str,
    pub kind: SymbolKind,
    /// Library documentation, when the metadata carries any.
    pub doc: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ScriptSymbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: TextSpan,
    pub visible_from: usize,
    pub scope: ScopeId,
    /// Fields of a struct or variants of an enum.
    pub members: Vec<String>,
    /// Declared type path of an annotated `let`.
    pub type_path: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
struct Scope {
    span: TextSpan,
    open_end: bool,
    parent: Option<ScopeId>,
    symbols: Vec<SymbolId>,
}

impl Scope {
    fn encloses(&self, offset: usize) -> bool {
        match self.parent {
            None => true,
            Some(_) => {
                self.span.strictly_contains(offset) || (self.open_end && offset == self.span.end)
            }
        }
    }
}

/// Something a name or member path resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Script(SymbolId),
    Library(&'a LibrarySymbol),
    /// A struct field or enum variant; nothing further is known about it.
    Leaf(SymbolKind),
}

enum MemberLookup<'a> {
    /// The receiver's members are not statically known.
    Unknown,
    Missing,
    Found(Target<'a>),
}

/// Every declaration of a script plus the libraries it can see.
#[derive(Debug, Clone)]
pub struct SymbolIndex {
    scopes: Vec<Scope>,
    symbols: Vec<ScriptSymbol>,
    libraries: Vec<Arc<Library>>,
}

impl SymbolIndex {
    pub fn symbols(&self) -> &[ScriptSymbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> &ScriptSymbol {
        &self.symbols[id]
    }

    pub fn libraries(&self) -> &[Arc<Library>] {
        &self.libraries
    }

    fn innermost_scope(&self, offset: usize) -> ScopeId {
        self.scopes
            .iter()
            .rposition(|s| s.encloses(offset))
            .unwrap_or(0)
    }

    fn scope_chain(&self, offset: usize) -> impl Iterator<Item = &Scope> {
        let mut next = Some(self.innermost_scope(offset));
        std::iter::from_fn(move || {
            let scope = &self.scopes[next?];
            next = scope.parent;
            Some(scope)
        })
    }

    /// Every name visible at `offset`, innermost declarations first, then
    /// library globals in reference order, then keywords.
    ///
    /// The same name can appear more than once when an inner declaration
    /// shadows an outer one.
    pub fn visible_at(&self, offset: usize) -> Vec<VisibleSymbol<'_>> {
        let mut visible = Vec::new();
        for scope in self.scope_chain(offset) {
            for &id in scope.symbols.iter().rev() {
                let symbol = &self.symbols[id];
                if symbol.visible_from <= offset {
                    visible.push(VisibleSymbol {
                        name: &symbol.name,
                        kind: symbol.kind,
                        doc: None,
                    });
                }
            }
        }
        for library in &self.libraries {
            visible.extend(library.symbols.iter().map(|s| VisibleSymbol {
                name: &s.name,
                kind: SymbolKind::Library(s.kind),
                doc: s.doc.as_deref(),
            }));
        }
        visible.extend(KEYWORDS.iter().map(|(word, _)| VisibleSymbol {
            name: *word,
            kind: SymbolKind::Keyword,
            doc: None,
        }));
        visible
    }

    /// Resolves a simple name as seen from `offset`.
    pub fn lookup(&self, name: &str, offset: usize) -> Option<Target<'_>> {
        for scope in self.scope_chain(offset) {
            let found = scope.symbols.iter().rev().find(|&&id| {
                let symbol = &self.symbols[id];
                symbol.name == name && symbol.visible_from <= offset
            });
            if let Some(&id) = found {
                return Some(Target::Script(id));
            }
        }
        self.libraries
            .iter()
            .find_map(|library| library.global(name))
            .map(Target::Library)
    }

    /// Resolves a dotted path such as `["IO", "File"]`.
    pub fn resolve_path<S: AsRef<str>>(&self, path: &[S], offset: usize) -> Option<Target<'_>> {
        self.resolve_path_at(path, offset, 0)
    }

    fn resolve_path_at<S: AsRef<str>>(
        &self,
        path: &[S],
        offset: usize,
        depth: usize,
    ) -> Option<Target<'_>> {
        let (first, rest) = path.split_first()?;
        let mut target = self.lookup(first.as_ref(), offset)?;
        for segment in rest {
            match self.member(target, segment.as_ref(), depth) {
                MemberLookup::Found(next) => target = next,
                MemberLookup::Unknown | MemberLookup::Missing => return None,
            }
        }
        Some(target)
    }

    /// Members of whatever `path` denotes at `offset`.
    ///
    /// Empty when the path does not resolve or its members are unknown.
    pub fn members_of<S: AsRef<str>>(&self, path: &[S], offset: usize) -> Vec<VisibleSymbol<'_>> {
        self.resolve_path(path, offset)
            .and_then(|target| self.members(target, 0))
            .unwrap_or_default()
    }

    /// Statically known members of `target`, `None` when unknown.
    fn members<'a>(&'a self, target: Target<'a>, depth: usize) -> Option<Vec<VisibleSymbol<'a>>> {
        match target {
            Target::Library(symbol) => {
                let container = matches!(
                    symbol.kind,
                    LibrarySymbolKind::Class
                        | LibrarySymbolKind::Structure
                        | LibrarySymbolKind::Enum
                        | LibrarySymbolKind::Interface
                        | LibrarySymbolKind::Module
                        | LibrarySymbolKind::Namespace
                );
                if !container && symbol.members.is_empty() {
                    return None;
                }
                Some(
                    symbol
                        .members
                        .iter()
                        .map(|m| VisibleSymbol {
                            name: &m.name,
                            kind: SymbolKind::Library(m.kind),
                            doc: m.doc.as_deref(),
                        })
                        .collect(),
                )
            }
            Target::Script(id) => {
                let symbol = &self.symbols[id];
                let member_kind = match symbol.kind {
                    SymbolKind::Struct => SymbolKind::Field,
                    SymbolKind::Enum => SymbolKind::EnumMember,
                    _ => {
                        let ty = self.declared_type(id, depth)?;
                        return self.members(ty, depth + 1);
                    }
                };
                Some(
                    symbol
                        .members
                        .iter()
                        .map(|name| VisibleSymbol {
                            name: name.as_str(),
                            kind: member_kind,
                            doc: None,
                        })
                        .collect(),
                )
            }
            Target::Leaf(_) => None,
        }
    }

    fn member<'a>(&'a self, target: Target<'a>, name: &str, depth: usize) -> MemberLookup<'a> {
        if depth > MAX_TYPE_DEPTH {
            return MemberLookup::Unknown;
        }
        match target {
            Target::Library(symbol) => match self.members(target, depth) {
                None => MemberLookup::Unknown,
                Some(_) => symbol
                    .member(name)
                    .map_or(MemberLookup::Missing, |m| MemberLookup::Found(Target::Library(m))),
            },
            Target::Script(id) => {
                let symbol = &self.symbols[id];
                match symbol.kind {
                    SymbolKind::Struct | SymbolKind::Enum => {
                        let kind = if symbol.kind == SymbolKind::Struct {
                            SymbolKind::Field
                        } else {
                            SymbolKind::EnumMember
                        };
                        if symbol.members.iter().any(|m| m == name) {
                            MemberLookup::Found(Target::Leaf(kind))
                        } else {
                            MemberLookup::Missing
                        }
                    }
                    _ => match self.declared_type(id, depth) {
                        Some(ty) => self.member(ty, name, depth + 1),
                        None => MemberLookup::Unknown,
                    },
                }
            }
            Target::Leaf(_) => MemberLookup::Unknown,
        }
    }

    /// The target a `let x: Path` annotation names, resolved where `x` is declared.
    fn declared_type(&self, id: SymbolId, depth: usize) -> Option<Target<'_>> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let symbol = &self.symbols[id];
        let path = symbol.type_path.as_ref()?;
        self.resolve_path_at(path, symbol.span.start, depth + 1)
    }
}

/// Output of binding one syntax tree against a set of libraries.
#[derive(Debug, Clone)]
pub struct BoundScript {
    pub index: SymbolIndex,
    pub diagnostics: Vec<Diagnostic>,
}

/// Binds `syntax` against `libraries`, which are searched in order.
pub fn bind(syntax: &SyntaxTree, libraries: &[Arc<Library>]) -> BoundScript {
    let root = Scope {
        span: TextSpan::new(0, syntax.text().len()),
        open_end: true,
        parent: None,
        symbols: Vec::new(),
    };
    let mut declarer = Declarer {
        index: SymbolIndex {
            scopes: vec![root],
            symbols: Vec::new(),
            libraries: libraries.to_vec(),
        },
        diagnostics: Vec::new(),
    };
    declarer.declare_stmts(&syntax.program().stmts, 0, 0);

    let Declarer {
        index,
        mut diagnostics,
    } = declarer;

    let mut resolver = Resolver {
        index: &index,
        reads: HashSet::new(),
        diagnostics: Vec::new(),
    };
    resolver.stmts(&syntax.program().stmts);
    let Resolver {
        reads,
        diagnostics: resolve_diagnostics,
        ..
    } = resolver;
    diagnostics.extend(resolve_diagnostics);

    for (id, symbol) in index.symbols.iter().enumerate() {
        if symbol.kind == SymbolKind::Local && !reads.contains(&id) {
            diagnostics.push(Diagnostic::new(
                codes::UNUSED_LOCAL,
                DiagnosticSeverity::Hidden,
                format!("The variable '{}' is declared but its value is never read", symbol.name),
                Some(symbol.span),
            ));
        }
    }

    tracing::trace!(
        "bound {} symbols in {} scopes, {} diagnostics",
        index.symbols.len(),
        index.scopes.len(),
        diagnostics.len()
    );

    BoundScript { index, diagnostics }
}

struct Declarer {
    index: SymbolIndex,
    diagnostics: Vec<Diagnostic>,
}

impl Declarer {
    fn push_scope(&mut self, block: &Block, parent: ScopeId) -> ScopeId {
        self.index.scopes.push(Scope {
            span: block.span,
            open_end: !block.closed,
            parent: Some(parent),
            symbols: Vec::new(),
        });
        self.index.scopes.len() - 1
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: &Ident,
        kind: SymbolKind,
        visible_from: usize,
        members: Vec<String>,
        type_path: Option<Vec<String>>,
    ) {
        let duplicate = self.index.scopes[scope]
            .symbols
            .iter()
            .any(|&id| self.index.symbols[id].name == name.name);
        if duplicate {
            self.diagnostics.push(Diagnostic::new(
                codes::DUPLICATE_DECLARATION,
                DiagnosticSeverity::Error,
                format!("'{}' is already declared in this scope", name.name),
                Some(name.span),
            ));
            return;
        }

        if matches!(
            kind,
            SymbolKind::Local | SymbolKind::Parameter | SymbolKind::Constant
        ) && self.shadows(scope, name)
        {
            self.diagnostics.push(Diagnostic::new(
                codes::SHADOWED_DECLARATION,
                DiagnosticSeverity::Info,
                format!("'{}' hides a declaration from an enclosing scope", name.name),
                Some(name.span),
            ));
        }

        self.index.symbols.push(ScriptSymbol {
            name: name.name.clone(),
            kind,
            span: name.span,
            visible_from,
            scope,
            members,
            type_path,
        });
        let id = self.index.symbols.len() - 1;
        self.index.scopes[scope].symbols.push(id);
    }

    fn shadows(&self, scope: ScopeId, name: &Ident) -> bool {
        let mut current = self.index.scopes[scope].parent;
        while let Some(id) = current {
            let outer = &self.index.scopes[id];
            let hit = outer.symbols.iter().any(|&sid| {
                let symbol = &self.index.symbols[sid];
                symbol.name == name.name && symbol.visible_from <= name.span.start
            });
            if hit {
                return true;
            }
            current = outer.parent;
        }
        false
    }

    fn declare_stmts(&mut self, stmts: &[Stmt], scope: ScopeId, scope_start: usize) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Fn { name, .. } => {
                    self.declare(scope, name, SymbolKind::Function, scope_start, Vec::new(), None);
                }
                StmtKind::Struct { name, fields } => {
                    let fields = fields.iter().map(|f| f.name.clone()).collect();
                    self.declare(scope, name, SymbolKind::Struct, scope_start, fields, None);
                }
                StmtKind::Enum { name, variants } => {
                    let variants = variants.iter().map(|v| v.name.clone()).collect();
                    self.declare(scope, name, SymbolKind::Enum, scope_start, variants, None);
                }
                _ => {}
            }
        }
        for stmt in stmts {
            self.declare_stmt(stmt, scope);
        }
    }

    fn declare_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match &stmt.kind {
            StmtKind::Let { name, ty, .. } => {
                let type_path = ty
                    .as_ref()
                    .map(|segments| segments.iter().map(|s| s.name.clone()).collect());
                self.declare(scope, name, SymbolKind::Local, stmt.span.end, Vec::new(), type_path);
            }
            StmtKind::Const { name, .. } => {
                self.declare(scope, name, SymbolKind::Constant, stmt.span.end, Vec::new(), None);
            }
            StmtKind::Fn { params, body, .. } => {
                let body_scope = self.push_scope(body, scope);
                for param in params {
                    self.declare(
                        body_scope,
                        param,
                        SymbolKind::Parameter,
                        body.span.start,
                        Vec::new(),
                        None,
                    );
                }
                self.declare_stmts(&body.stmts, body_scope, body.span.start);
            }
            StmtKind::If {
                then_block,
                else_branch,
                ..
            } => {
                self.declare_block(then_block, scope);
                if let Some(else_branch) = else_branch {
                    self.declare_stmt(else_branch, scope);
                }
            }
            StmtKind::While { body, .. } => self.declare_block(body, scope),
            StmtKind::For { var, body, .. } => {
                let body_scope = self.push_scope(body, scope);
                self.declare(
                    body_scope,
                    var,
                    SymbolKind::Local,
                    body.span.start,
                    Vec::new(),
                    None,
                );
                self.declare_stmts(&body.stmts, body_scope, body.span.start);
            }
            StmtKind::Block(block) => self.declare_block(block, scope),
            StmtKind::Struct { .. }
            | StmtKind::Enum { .. }
            | StmtKind::Return(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Expr(_)
            | StmtKind::Error => {}
        }
    }

    fn declare_block(&mut self, block: &Block, parent: ScopeId) {
        let scope = self.push_scope(block, parent);
        self.declare_stmts(&block.stmts, scope, block.span.start);
    }
}

struct Resolver<'a> {
    index: &'a SymbolIndex,
    reads: HashSet<SymbolId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn stmts(&mut self, stmts: &[Stmt]) {
        let mut diverged = false;
        let mut reported = false;
        for stmt in stmts {
            if diverged && !reported && !stmt.kind.is_hoisted() {
                self.diagnostics.push(Diagnostic::new(
                    codes::UNREACHABLE_CODE,
                    DiagnosticSeverity::Warning,
                    "Unreachable code detected".to_string(),
                    Some(stmt.span),
                ));
                reported = true;
            }
            self.stmt(stmt);
            diverged |= stmt.kind.diverges();
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { ty, init, .. } => {
                if let Some(ty) = ty {
                    self.path(&ty.iter().collect::<Vec<_>>(), true);
                }
                if let Some(init) = init {
                    self.expr(init);
                }
            }
            StmtKind::Const { init, .. } => self.expr(init),
            StmtKind::Fn { body, .. } => self.stmts(&body.stmts),
            StmtKind::Struct { .. } | StmtKind::Enum { .. } => {}
            StmtKind::If {
                cond,
                then_block,
                else_branch,
            } => {
                self.expr(cond);
                self.stmts(&then_block.stmts);
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.stmts(&body.stmts);
            }
            StmtKind::For { iter, body, .. } => {
                self.expr(iter);
                self.stmts(&body.stmts);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Block(block) => self.stmts(&block.stmts),
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Break | StmtKind::Continue | StmtKind::Error => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal | ExprKind::Error => {}
            ExprKind::Name(ident) => {
                self.name(ident, true);
            }
            ExprKind::Member { receiver, .. } => match expr.as_path() {
                Some(path) => self.path(&path, true),
                None => self.expr(receiver),
            },
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Assign { target, value } => {
                match &target.kind {
                    ExprKind::Name(ident) => {
                        self.name(ident, false);
                    }
                    _ => self.expr(target),
                }
                self.expr(value);
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Paren(inner) => self.expr(inner),
        }
    }

    fn name(&mut self, ident: &Ident, is_read: bool) -> Option<Target<'a>> {
        let index: &'a SymbolIndex = self.index;
        match index.lookup(&ident.name, ident.span.start) {
            Some(target) => {
                if is_read && let Target::Script(id) = target {
                    self.reads.insert(id);
                }
                Some(target)
            }
            None => {
                self.diagnostics.push(Diagnostic::new(
                    codes::UNKNOWN_NAME,
                    DiagnosticSeverity::Error,
                    format!("The name '{}' does not exist in the current context", ident.name),
                    Some(ident.span),
                ));
                None
            }
        }
    }

    /// Resolves `a.b.c`, reporting the first segment that fails.
    fn path(&mut self, path: &[&Ident], is_read: bool) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        let index: &'a SymbolIndex = self.index;
        let Some(mut target) = self.name(first, is_read) else {
            return;
        };
        let mut receiver = first.name.clone();
        for segment in rest {
            match index.member(target, &segment.name, 0) {
                MemberLookup::Found(next) => target = next,
                MemberLookup::Unknown => return,
                MemberLookup::Missing => {
                    self.diagnostics.push(Diagnostic::new(
                        codes::MISSING_MEMBER,
                        DiagnosticSeverity::Error,
                        format!(
                            "'{}' does not contain a definition for '{}'",
                            receiver, segment.name
                        ),
                        Some(segment.span),
                    ));
                    return;
                }
            }
            receiver.push('.');
            receiver.push_str(&segment.name);
        }
    }
}
