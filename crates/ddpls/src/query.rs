//! Position-anchored queries over a module.
//!
//! Every interactive feature walks the module with a [`Visitor`]. Features
//! anchored at the cursor prune every subtree whose range does not contain
//! the cursor, so a lookup costs the depth of the tree, not its size.
//! Features that need every occurrence of a declaration first resolve the
//! cursor with [`TargetFinder`] and then re-walk the whole module with
//! [`RefCollector`].

use ddp_syntax::ast::{Block, ImportStmt};
use ddp_syntax::scope::Scopes;
use ddp_syntax::{
    Decl, DeclKind, Module, Node, Position, Range, ScopeId, TypeRef, VisitResult, Visitor, origin,
    same_decl, walk,
};
use std::collections::HashSet;
use std::sync::Arc;
use tower_lsp_server::ls_types as lsp;

/// Converts a 1-based source position to a 0-based LSP position.
pub fn to_lsp_position(pos: Position) -> lsp::Position {
    lsp::Position::new(pos.line.saturating_sub(1), pos.column.saturating_sub(1))
}

pub fn to_lsp_range(range: Range) -> lsp::Range {
    lsp::Range::new(to_lsp_position(range.start), to_lsp_position(range.end))
}

/// Converts a 0-based LSP position to a 1-based source position.
pub fn from_lsp_position(pos: lsp::Position) -> Position {
    Position::new(pos.line + 1, pos.character + 1)
}

pub fn from_lsp_range(range: lsp::Range) -> Range {
    Range::new(from_lsp_position(range.start), from_lsp_position(range.end))
}

/// Current scope of a walk.
///
/// The walk does not track scopes itself. Visitors resolving names enter a
/// block's scope when visiting it and leave it in
/// [`Visitor::leave_block`].
pub struct ScopeTracker<'a> {
    scopes: &'a Scopes,
    root: ScopeId,
    stack: Vec<ScopeId>,
}

impl<'a> ScopeTracker<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self {
            scopes: &module.scopes,
            root: module.root_scope,
            stack: Vec::new(),
        }
    }

    pub fn enter(&mut self, block: &Block) {
        self.stack.push(block.scope);
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(self.root)
    }

    pub fn lookup(&self, name: &str) -> Option<&'a Arc<Decl>> {
        self.scopes.lookup(self.current(), name)
    }

    /// Declarations visible from the current scope, innermost first.
    /// Shadowed declarations are left out.
    pub fn visible(&self) -> Vec<&'a Arc<Decl>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for scope in self.scopes.chain(self.current()) {
            for decl in scope.decls() {
                if seen.insert(decl.name.as_str()) {
                    out.push(decl);
                }
            }
        }
        out
    }
}

/// What the cursor points at.
#[derive(Debug, Clone)]
pub enum Target<'a> {
    /// A declaration, referenced through the source span under the cursor.
    Decl { decl: Arc<Decl>, range: Range },
    /// The path string of an import.
    ImportPath(&'a ImportStmt),
}

impl Target<'_> {
    pub fn range(&self) -> Range {
        match self {
            Self::Decl { range, .. } => *range,
            Self::ImportPath(import) => import.path.range,
        }
    }

    pub fn decl(&self) -> Option<&Arc<Decl>> {
        match self {
            Self::Decl { decl, .. } => Some(decl),
            Self::ImportPath(_) => None,
        }
    }
}

/// Resolves the position to the declaration or import under it.
pub struct TargetFinder<'a> {
    pos: Position,
    pub found: Option<Target<'a>>,
}

impl<'a> TargetFinder<'a> {
    pub fn new(pos: Position) -> Self {
        Self { pos, found: None }
    }

    /// Runs the finder over `module`.
    pub fn find(module: &'a Module, pos: Position) -> Option<Target<'a>> {
        let mut finder = Self::new(pos);
        ddp_syntax::walk_module(module, &mut finder);
        finder.found
    }

    fn hit(&mut self, decl: &Arc<Decl>, range: Range) -> VisitResult {
        self.found = Some(Target::Decl {
            decl: Arc::clone(decl),
            range,
        });
        VisitResult::Break
    }

    fn type_ref(&mut self, ty: Option<&TypeRef>) -> Option<VisitResult> {
        let ty = ty?;
        let decl = ty.decl.as_ref()?;
        ty.name_range
            .contains(self.pos)
            .then(|| self.hit(decl, ty.name_range))
    }

    /// Parameter or field named by the alias slot under the cursor.
    fn alias_slot(&mut self, decl: &Decl, members: &[Arc<Decl>]) -> Option<VisitResult> {
        let token = decl
            .aliases()
            .iter()
            .flat_map(|alias| alias.params())
            .find(|token| token.range.contains(self.pos))?;
        let name = token.param_name()?;
        let member = members.iter().find(|m| m.name == name)?;
        Some(self.hit(member, token.name_range()))
    }
}

impl<'a> Visitor<'a> for TargetFinder<'a> {
    fn should_visit(&mut self, node: Node<'a>) -> bool {
        node.range().contains(self.pos)
    }

    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        let pos = self.pos;
        match node {
            Node::Import(import) => {
                if let Some(symbol) = import.symbols.iter().find(|s| s.range.contains(pos)) {
                    if let Some(decl) = &symbol.decl {
                        return self.hit(decl, symbol.range);
                    }
                    return VisitResult::Break;
                }
                if import.path.range.contains(pos) {
                    self.found = Some(Target::ImportPath(import));
                }
                VisitResult::Break
            }
            Node::VarDecl(var) => {
                if var.decl.name_range.contains(pos) {
                    return self.hit(&var.decl, var.decl.name_range);
                }
                self.type_ref(var.decl.value_type())
                    .unwrap_or(VisitResult::Recurse)
            }
            Node::FuncDecl(func) => {
                let decl = &func.decl;
                if decl.name_range.contains(pos) {
                    return self.hit(decl, decl.name_range);
                }
                let Some(sig) = decl.func() else {
                    return VisitResult::Recurse;
                };
                for param in &sig.params {
                    if param.name_range.contains(pos) {
                        return self.hit(param, param.name_range);
                    }
                    if let Some(result) = self.type_ref(param.value_type()) {
                        return result;
                    }
                }
                if let Some(result) = self.type_ref(sig.return_type.as_ref()) {
                    return result;
                }
                self.alias_slot(decl, &sig.params)
                    .unwrap_or(VisitResult::Recurse)
            }
            Node::StructDecl(structure) => {
                let decl = &structure.decl;
                if decl.name_range.contains(pos) {
                    return self.hit(decl, decl.name_range);
                }
                let fields = decl.structure().map_or(&[][..], |s| &s.fields[..]);
                self.alias_slot(decl, fields)
                    .unwrap_or(VisitResult::Recurse)
            }
            Node::TypeAlias(alias) => {
                if alias.decl.name_range.contains(pos) {
                    return self.hit(&alias.decl, alias.decl.name_range);
                }
                if let DeclKind::TypeAlias { underlying } = &alias.decl.kind
                    && let Some(result) = self.type_ref(Some(underlying))
                {
                    return result;
                }
                VisitResult::Break
            }
            Node::Ident(ident) => self.hit(&ident.decl, ident.range),
            Node::Call(call) => match call.word_ranges.iter().find(|r| r.contains(pos)) {
                Some(range) => self.hit(&call.func, *range),
                None => VisitResult::Recurse,
            },
            Node::StructLiteral(lit) => match lit.word_ranges.iter().find(|r| r.contains(pos)) {
                Some(range) => self.hit(&lit.decl, *range),
                None => VisitResult::Recurse,
            },
            _ => VisitResult::Recurse,
        }
    }
}

/// How a declaration is referenced at some range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// The name in the declaration itself.
    Declaration,
    Read,
    /// Target of an assignment.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub range: Range,
    pub kind: RefKind,
}

/// Collects every occurrence of one declaration in a module.
///
/// Alias slots naming a parameter or field count as occurrences of it.
/// Call words count only if `include_calls` is set; they belong to the
/// alias text and change with it, not with the declared name.
pub struct RefCollector {
    target: Arc<Decl>,
    include_calls: bool,
    pub refs: Vec<Reference>,
}

impl RefCollector {
    pub fn new(target: &Arc<Decl>, include_calls: bool) -> Self {
        Self {
            target: Arc::clone(origin(target)),
            include_calls,
            refs: Vec::new(),
        }
    }

    /// Occurrences of `target` in `module`, in source order.
    pub fn collect(module: &Module, target: &Arc<Decl>, include_calls: bool) -> Vec<Reference> {
        let mut collector = Self::new(target, include_calls);
        ddp_syntax::walk_module(module, &mut collector);
        let mut refs = collector.refs;
        refs.sort_by_key(|r| r.range);
        refs.dedup_by_key(|r| r.range);
        refs
    }

    fn matches(&self, decl: &Arc<Decl>) -> bool {
        same_decl(origin(decl), &self.target)
    }

    fn push(&mut self, range: Range, kind: RefKind) {
        self.refs.push(Reference { range, kind });
    }

    fn declaration(&mut self, decl: &Arc<Decl>) {
        if self.matches(decl) {
            self.push(decl.name_range, RefKind::Declaration);
        }
    }

    fn type_ref(&mut self, ty: Option<&TypeRef>) {
        if let Some(ty) = ty
            && let Some(decl) = &ty.decl
            && self.matches(decl)
        {
            self.push(ty.name_range, RefKind::Read);
        }
    }

    fn alias_slots(&mut self, decl: &Decl, members: &[Arc<Decl>]) {
        let Some(member) = members.iter().find(|m| self.matches(m)) else {
            return;
        };
        let slots: Vec<Range> = decl
            .aliases()
            .iter()
            .flat_map(|alias| alias.params())
            .filter(|token| token.param_name() == Some(member.name.as_str()))
            .map(|token| token.name_range())
            .collect();
        for range in slots {
            self.push(range, RefKind::Read);
        }
    }
}

impl<'a> Visitor<'a> for RefCollector {
    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        match node {
            Node::Import(import) => {
                for symbol in &import.symbols {
                    if symbol.decl.as_ref().is_some_and(|d| self.matches(d)) {
                        self.push(symbol.range, RefKind::Read);
                    }
                }
            }
            Node::VarDecl(var) => {
                self.declaration(&var.decl);
                self.type_ref(var.decl.value_type());
            }
            Node::FuncDecl(func) => {
                self.declaration(&func.decl);
                if let Some(sig) = func.decl.func() {
                    for param in &sig.params {
                        self.declaration(param);
                        self.type_ref(param.value_type());
                    }
                    self.type_ref(sig.return_type.as_ref());
                    self.alias_slots(&func.decl, &sig.params);
                }
            }
            Node::StructDecl(structure) => {
                self.declaration(&structure.decl);
                if let Some(sig) = structure.decl.structure() {
                    self.alias_slots(&structure.decl, &sig.fields);
                }
            }
            Node::TypeAlias(alias) => {
                self.declaration(&alias.decl);
                if let DeclKind::TypeAlias { underlying } = &alias.decl.kind {
                    self.type_ref(Some(underlying));
                }
            }
            Node::Assign(assign) => {
                if self.matches(&assign.target.decl) {
                    self.push(assign.target.range, RefKind::Write);
                }
                // The target is not a read, so only the value is walked.
                if walk(Node::from_expr(&assign.value), self).is_break() {
                    return VisitResult::Break;
                }
                return VisitResult::SkipChildren;
            }
            Node::Ident(ident) => {
                if self.matches(&ident.decl) {
                    self.push(ident.range, RefKind::Read);
                }
            }
            Node::Call(call) if self.include_calls && self.matches(&call.func) => {
                for range in &call.word_ranges {
                    self.push(*range, RefKind::Read);
                }
            }
            Node::StructLiteral(lit) if self.include_calls && self.matches(&lit.decl) => {
                for range in &lit.word_ranges {
                    self.push(*range, RefKind::Read);
                }
            }
            _ => {}
        }
        VisitResult::Recurse
    }
}
