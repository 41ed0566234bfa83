//! LSP request handlers.
//!
//! Each handler answers one feature request from the analysis of a single
//! document:
//!
//! - [`hover`]: declaration summaries and import targets
//! - [`completion`]: keywords, visible names, alias calls and import paths
//! - [`definition`]: jump to declarations and imported files
//! - [`rename`]: prepare-rename and rename of declarations
//! - [`highlight`]: occurrences of the declaration under the cursor
//! - [`folding`]: blocks, struct fields, alias lists and import runs
//! - [`semantic_tokens`]: full and ranged semantic highlighting
//! - [`ast`]: the `ddp/ast` tree view request
//!
//! # Handler Architecture
//!
//! Handlers are plain async functions taking the [`DocumentManager`] and the
//! request parameters. They never mutate documents:
//!
//! 1. Fetch the document and its analysis with
//!    [`DocumentManager::snapshot`], which reparses a stale document first
//! 2. Walk the module with a visitor from [`crate::query`]
//! 3. Convert 1-based source ranges to 0-based LSP ranges
//!
//! A missing document is an error (`InvalidParams` on the wire); a position
//! that resolves to nothing is `Ok(None)`.
//!
//! [`DocumentManager`]: crate::document::DocumentManager
//! [`DocumentManager::snapshot`]: crate::document::DocumentManager::snapshot

pub mod ast;
pub mod completion;
pub mod definition;
pub mod folding;
pub mod highlight;
pub mod hover;
pub mod rename;
pub mod semantic_tokens;

pub use ast::handle_ast;
pub use completion::handle_completion;
pub use definition::handle_definition;
pub use folding::handle_folding_range;
pub use highlight::handle_document_highlight;
pub use hover::handle_hover;
pub use rename::{handle_prepare_rename, handle_rename};
pub use semantic_tokens::{handle_semantic_tokens_full, handle_semantic_tokens_range};
