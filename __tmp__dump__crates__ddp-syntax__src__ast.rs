//! Syntax tree.
//!
//! Declarations are referenced through `Arc<Decl>`; bodies and expressions
//! are owned by the statements below.

use crate::decl::Decl;
use crate::error::ParseError;
use crate::module::Module;
use crate::position::Range;
use crate::scope::ScopeId;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub enum Stmt {
    Import(ImportStmt),
    Var(VarDeclStmt),
    Func(FuncDeclStmt),
    Struct(StructDeclStmt),
    TypeAlias(TypeAliasStmt),
    Assign(AssignStmt),
    Expr(ExprStmt),
    Block(Block),
    If(IfStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Bad(BadStmt),
}

impl Stmt {
    pub fn range(&self) -> Range {
        match self {
            Self::Import(s) => s.range,
            Self::Var(s) => s.range,
            Self::Func(s) => s.range,
            Self::Struct(s) => s.range,
            Self::TypeAlias(s) => s.range,
            Self::Assign(s) => s.range,
            Self::Expr(s) => s.range,
            Self::Block(s) => s.range,
            Self::If(s) => s.range,
            Self::While(s) => s.range,
            Self::Return(s) => s.range,
            Self::Bad(s) => s.range,
        }
    }
}

#[derive(Debug)]
pub struct ImportStmt {
    pub range: Range,
    pub path: StringLit,
    /// Explicitly imported names. Empty means every public declaration.
    pub symbols: Vec<ImportSymbol>,
    pub resolved_path: PathBuf,
    /// `None` if the file could not be loaded.
    pub module: Option<Arc<Module>>,
}

#[derive(Debug)]
pub struct ImportSymbol {
    pub name: String,
    pub range: Range,
    pub decl: Option<Arc<Decl>>,
}

#[derive(Debug, Clone)]
pub struct StringLit {
    pub value: String,
    pub range: Range,
}

#[derive(Debug)]
pub struct VarDeclStmt {
    pub decl: Arc<Decl>,
    pub init: Option<Expr>,
    pub range: Range,
}

#[derive(Debug)]
pub struct FuncDeclStmt {
    pub decl: Arc<Decl>,
    /// `None` for external functions declared with a trailing `;`.
    pub body: Option<Block>,
    pub range: Range,
}

#[derive(Debug)]
pub struct StructDeclStmt {
    pub decl: Arc<Decl>,
    /// Field declarations with their default values.
    pub fields: Vec<VarDeclStmt>,
    pub range: Range,
}

#[derive(Debug)]
pub struct TypeAliasStmt {
    pub decl: Arc<Decl>,
    pub range: Range,
}

#[derive(Debug)]
pub struct AssignStmt {
    pub target: IdentExpr,
    pub value: Expr,
    pub range: Range,
}

#[derive(Debug)]
pub struct ExprStmt {
    pub expr: Expr,
    pub range: Range,
}

#[derive(Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub scope: ScopeId,
    pub range: Range,
}

#[derive(Debug)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Block,
    /// Either a block or another `if`.
    pub otherwise: Option<Box<Stmt>>,
    pub range: Range,
}

#[derive(Debug)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub range: Range,
}

#[derive(Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub range: Range,
}

/// Placeholder for a statement that failed to parse.
#[derive(Debug)]
pub struct BadStmt {
    pub error: ParseError,
    pub range: Range,
}

#[derive(Debug)]
pub enum Expr {
    Literal(Literal),
    Ident(IdentExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Grouping(Grouping),
    Call(FuncCall),
    StructLiteral(StructLiteral),
    Bad(BadExpr),
}

impl Expr {
    pub fn range(&self) -> Range {
        match self {
            Self::Literal(e) => e.range,
            Self::Ident(e) => e.range,
            Self::Unary(e) => e.range,
            Self::Binary(e) => e.range,
            Self::Grouping(e) => e.range,
            Self::Call(e) => e.range,
            Self::StructLiteral(e) => e.range,
            Self::Bad(e) => e.range,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug)]
pub struct Literal {
    pub value: LiteralValue,
    pub range: Range,
}

/// A resolved reference to a variable, parameter or field.
#[derive(Debug)]
pub struct IdentExpr {
    pub name: String,
    pub range: Range,
    pub decl: Arc<Decl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

#[derive(Debug)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub range: Range,
}

#[derive(Debug)]
pub struct Grouping {
    pub inner: Box<Expr>,
    pub range: Range,
}

/// Argument bound to one parameter slot of an alias.
#[derive(Debug)]
pub struct CallArg {
    pub param: String,
    pub value: Expr,
}

/// A call written in alias syntax.
#[derive(Debug)]
pub struct FuncCall {
    pub func: Arc<Decl>,
    /// Index into the function's aliases.
    pub alias: usize,
    pub args: Vec<CallArg>,
    /// Source ranges of the alias words matched by this call.
    pub word_ranges: Vec<Range>,
    pub range: Range,
}

#[derive(Debug)]
pub struct StructLiteral {
    pub decl: Arc<Decl>,
    pub alias: usize,
    pub args: Vec<CallArg>,
    pub word_ranges: Vec<Range>,
    pub range: Range,
}

/// Placeholder for an expression that failed to parse or resolve.
#[derive(Debug)]
pub struct BadExpr {
    pub error: ParseError,
    pub range: Range,
}


