//! Tree walking.
//!
//! Every node of a module is handed to a [`Visitor`] as a [`Node`] tagged
//! union. The visitor decides per node whether to descend at all
//! ([`Visitor::should_visit`]) and what to do after looking at it
//! ([`VisitResult`]). The walk never enters the statements of imported
//! modules.
//!
//! # Examples
//!
//! ```
//! use ddp_syntax::visit::{Node, VisitResult, Visitor, walk_module};
//! use ddp_syntax::{DdpParser, ModuleParser, ParseRequest};
//! use std::collections::HashMap;
//!
//! struct CountLiterals(usize);
//!
//! impl<'a> Visitor<'a> for CountLiterals {
//!     fn visit(&mut self, node: Node<'a>) -> VisitResult {
//!         if matches!(node, Node::Literal(_)) {
//!             self.0 += 1;
//!         }
//!         VisitResult::Recurse
//!     }
//! }
//!
//! let request = ParseRequest::new("/src/a.ddp", "var x = 1 + 2;", HashMap::new());
//! let module = DdpParser::new().parse(request, &mut |_| {}).unwrap();
//! let mut counter = CountLiterals(0);
//! walk_module(&module, &mut counter);
//! assert_eq!(counter.0, 2);
//! ```

use crate::ast::{
    AssignStmt, BadExpr, BadStmt, BinaryExpr, Block, Expr, ExprStmt, FuncCall, FuncDeclStmt,
    Grouping, IdentExpr, IfStmt, ImportStmt, Literal, ReturnStmt, Stmt, StructDeclStmt,
    StructLiteral, TypeAliasStmt, UnaryExpr, VarDeclStmt, WhileStmt,
};
use crate::module::Module;
use crate::position::Range;
use std::ops::ControlFlow;

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Import(&'a ImportStmt),
    VarDecl(&'a VarDeclStmt),
    FuncDecl(&'a FuncDeclStmt),
    StructDecl(&'a StructDeclStmt),
    TypeAlias(&'a TypeAliasStmt),
    Assign(&'a AssignStmt),
    ExprStmt(&'a ExprStmt),
    Block(&'a Block),
    If(&'a IfStmt),
    While(&'a WhileStmt),
    Return(&'a ReturnStmt),
    BadStmt(&'a BadStmt),
    Literal(&'a Literal),
    Ident(&'a IdentExpr),
    Unary(&'a UnaryExpr),
    Binary(&'a BinaryExpr),
    Grouping(&'a Grouping),
    Call(&'a FuncCall),
    StructLiteral(&'a StructLiteral),
    BadExpr(&'a BadExpr),
}

impl<'a> Node<'a> {
    pub fn from_stmt(stmt: &'a Stmt) -> Self {
        match stmt {
            Stmt::Import(s) => Self::Import(s),
            Stmt::Var(s) => Self::VarDecl(s),
            Stmt::Func(s) => Self::FuncDecl(s),
            Stmt::Struct(s) => Self::StructDecl(s),
            Stmt::TypeAlias(s) => Self::TypeAlias(s),
            Stmt::Assign(s) => Self::Assign(s),
            Stmt::Expr(s) => Self::ExprStmt(s),
            Stmt::Block(s) => Self::Block(s),
            Stmt::If(s) => Self::If(s),
            Stmt::While(s) => Self::While(s),
            Stmt::Return(s) => Self::Return(s),
            Stmt::Bad(s) => Self::BadStmt(s),
        }
    }

    pub fn from_expr(expr: &'a Expr) -> Self {
        match expr {
            Expr::Literal(e) => Self::Literal(e),
            Expr::Ident(e) => Self::Ident(e),
            Expr::Unary(e) => Self::Unary(e),
            Expr::Binary(e) => Self::Binary(e),
            Expr::Grouping(e) => Self::Grouping(e),
            Expr::Call(e) => Self::Call(e),
            Expr::StructLiteral(e) => Self::StructLiteral(e),
            Expr::Bad(e) => Self::BadExpr(e),
        }
    }

    pub fn range(&self) -> Range {
        match self {
            Self::Import(n) => n.range,
            Self::VarDecl(n) => n.range,
            Self::FuncDecl(n) => n.range,
            Self::StructDecl(n) => n.range,
            Self::TypeAlias(n) => n.range,
            Self::Assign(n) => n.range,
            Self::ExprStmt(n) => n.range,
            Self::Block(n) => n.range,
            Self::If(n) => n.range,
            Self::While(n) => n.range,
            Self::Return(n) => n.range,
            Self::BadStmt(n) => n.range,
            Self::Literal(n) => n.range,
            Self::Ident(n) => n.range,
            Self::Unary(n) => n.range,
            Self::Binary(n) => n.range,
            Self::Grouping(n) => n.range,
            Self::Call(n) => n.range,
            Self::StructLiteral(n) => n.range,
            Self::BadExpr(n) => n.range,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Import(_) => "ImportStmt",
            Self::VarDecl(_) => "VarDecl",
            Self::FuncDecl(_) => "FuncDecl",
            Self::StructDecl(_) => "StructDecl",
            Self::TypeAlias(_) => "TypeAliasDecl",
            Self::Assign(_) => "AssignStmt",
            Self::ExprStmt(_) => "ExprStmt",
            Self::Block(_) => "BlockStmt",
            Self::If(_) => "IfStmt",
            Self::While(_) => "WhileStmt",
            Self::Return(_) => "ReturnStmt",
            Self::BadStmt(_) => "BadStmt",
            Self::Literal(_) => "Literal",
            Self::Ident(_) => "Ident",
            Self::Unary(_) => "UnaryExpr",
            Self::Binary(_) => "BinaryExpr",
            Self::Grouping(_) => "Grouping",
            Self::Call(_) => "FuncCall",
            Self::StructLiteral(_) => "StructLiteral",
            Self::BadExpr(_) => "BadExpr",
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<Self> {
        let mut out = Vec::new();
        match *self {
            Self::Import(_)
            | Self::TypeAlias(_)
            | Self::BadStmt(_)
            | Self::Literal(_)
            | Self::Ident(_)
            | Self::BadExpr(_) => {}
            Self::VarDecl(n) => out.extend(n.init.as_ref().map(Self::from_expr)),
            Self::FuncDecl(n) => out.extend(n.body.as_ref().map(Self::Block)),
            Self::StructDecl(n) => out.extend(n.fields.iter().map(Self::VarDecl)),
            Self::Assign(n) => {
                out.push(Self::Ident(&n.target));
                out.push(Self::from_expr(&n.value));
            }
            Self::ExprStmt(n) => out.push(Self::from_expr(&n.expr)),
            Self::Block(n) => out.extend(n.stmts.iter().map(Self::from_stmt)),
            Self::If(n) => {
                out.push(Self::from_expr(&n.cond));
                out.push(Self::Block(&n.then));
                out.extend(n.otherwise.as_deref().map(Self::from_stmt));
            }
            Self::While(n) => {
                out.push(Self::from_expr(&n.cond));
                out.push(Self::Block(&n.body));
            }
            Self::Return(n) => out.extend(n.value.as_ref().map(Self::from_expr)),
            Self::Unary(n) => out.push(Self::from_expr(&n.operand)),
            Self::Binary(n) => {
                out.push(Self::from_expr(&n.lhs));
                out.push(Self::from_expr(&n.rhs));
            }
            Self::Grouping(n) => out.push(Self::from_expr(&n.inner)),
            Self::Call(n) => out.extend(n.args.iter().map(|a| Self::from_expr(&a.value))),
            Self::StructLiteral(n) => {
                out.extend(n.args.iter().map(|a| Self::from_expr(&a.value)));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Visit the children of this node.
    Recurse,
    /// Continue with the next sibling.
    SkipChildren,
    /// Stop the whole walk.
    Break,
}

pub trait Visitor<'a> {
    /// Called before [`Visitor::visit`]. Returning `false` skips the node and
    /// its whole subtree.
    fn should_visit(&mut self, _node: Node<'a>) -> bool {
        true
    }

    fn visit(&mut self, node: Node<'a>) -> VisitResult;

    /// Called after the children of a block were walked. Not called when the
    /// walk was broken off inside the block.
    fn leave_block(&mut self, _block: &'a Block) {}
}

/// Walks all top-level statements of `module`.
///
/// Returns `false` if the visitor stopped the walk with
/// [`VisitResult::Break`].
pub fn walk_module<'a, V: Visitor<'a> + ?Sized>(module: &'a Module, visitor: &mut V) -> bool {
    for stmt in &module.statements {
        if walk(Node::from_stmt(stmt), visitor).is_break() {
            return false;
        }
    }
    true
}

/// Walks `node` and its subtree.
pub fn walk<'a, V: Visitor<'a> + ?Sized>(node: Node<'a>, visitor: &mut V) -> ControlFlow<()> {
    if !visitor.should_visit(node) {
        return ControlFlow::Continue(());
    }
    match visitor.visit(node) {
        VisitResult::Break => return ControlFlow::Break(()),
        VisitResult::SkipChildren => return ControlFlow::Continue(()),
        VisitResult::Recurse => {}
    }
    for child in node.children() {
        walk(child, visitor)?;
    }
    if let Node::Block(block) = node {
        visitor.leave_block(block);
    }
    ControlFlow::Continue(())
}

/// Wraps a visitor and records the kind and range of every node it was
/// asked to visit.
pub struct Recorder<V> {
    pub inner: V,
    pub visited: Vec<(&'static str, Range)>,
}

impl<V> Recorder<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            visited: Vec::new(),
        }
    }

    /// Recorded nodes lying completely inside `range`.
    pub fn visited_within(&self, range: Range) -> usize {
        self.visited
            .iter()
            .filter(|(_, r)| range.encloses(r))
            .count()
    }
}

impl<'a, V: Visitor<'a>> Visitor<'a> for Recorder<V> {
    fn should_visit(&mut self, node: Node<'a>) -> bool {
        self.inner.should_visit(node)
    }

    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        self.visited.push((node.kind_name(), node.range()));
        self.inner.visit(node)
    }

    fn leave_block(&mut self, block: &'a Block) {
        self.inner.leave_block(block);
    }
}
