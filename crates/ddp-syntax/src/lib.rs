//! Syntax layer for `.ddp` source files.
//!
//! This crate turns source text into a [`Module`]: a syntax tree with a
//! symbol table, the public declarations other files can import and every
//! error found on the way. Editor tooling reads modules through the
//! [`visit`] walk and never mutates them.
//!
//! # Language
//!
//! ```text
//! import "util.ddp";                     [all public declarations]
//! import add, Point from "math.ddp";     [selected declarations]
//!
//! [Adds two numbers.]
//! public func add(a: int, b: int): int alias "add <a> and <b>" {
//!     return a + b;
//! }
//!
//! struct Point { x: int, y: int = 0 } alias "point at <x> <y>";
//! type Points = list of Point;
//!
//! var sum = add 1 and 2;
//! ```
//!
//! Functions and structs are called through their aliases: a sequence of
//! words where each `<name>` slot takes one argument. Square brackets are
//! comments; a comment right before a declaration documents it.
//!
//! # Examples
//!
//! ```
//! use ddp_syntax::{DdpParser, ModuleParser, ParseRequest};
//! use std::collections::HashMap;
//!
//! let source = r#"
//! func double(n: int): int alias "double <n>" { return n * 2; }
//! var x = double 21;
//! "#;
//! let request = ParseRequest::new("/src/main.ddp", source, HashMap::new());
//! let module = DdpParser::new().parse(request, &mut |_| {}).unwrap();
//!
//! assert!(module.errors.is_empty());
//! assert_eq!(module.root_decls().count(), 2);
//! ```

pub mod ast;
pub mod decl;
pub mod error;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod position;
pub mod scope;
pub mod token;
pub mod visit;

pub use decl::{Alias, AliasToken, AliasTokenKind, Decl, DeclKind, TypeRef, origin, same_decl};
pub use error::{ErrorCode, Level, ParseError, SyntaxError};
pub use module::{Module, ModuleId};
pub use parser::{DdpParser, ModuleParser, ParseRequest};
pub use position::{Position, Range};
pub use scope::ScopeId;
pub use visit::{Node, VisitResult, Visitor, walk, walk_module};
