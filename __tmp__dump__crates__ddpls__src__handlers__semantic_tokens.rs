//! Semantic token handlers.
//!
//! Tokens are collected by one visitor, then sorted and delta-encoded as
//! the protocol requires. The ranged variant prunes every subtree that does
//! not overlap the requested range and drops tokens outside of it.

use ddp_syntax::ast::LiteralValue;
use ddp_syntax::{Decl, DeclKind, Node, Range, TypeRef, VisitResult, Visitor, walk_module};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokens,
    SemanticTokensLegend, SemanticTokensParams, SemanticTokensRangeParams,
    SemanticTokensRangeResult, SemanticTokensResult,
};

use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::from_lsp_range;

/// Token types in legend order.
const TOKEN_TYPES: [SemanticTokenType; 10] = [
    SemanticTokenType::NAMESPACE,
    SemanticTokenType::TYPE,
    SemanticTokenType::STRUCT,
    SemanticTokenType::PARAMETER,
    SemanticTokenType::VARIABLE,
    SemanticTokenType::PROPERTY,
    SemanticTokenType::FUNCTION,
    SemanticTokenType::STRING,
    SemanticTokenType::NUMBER,
    SemanticTokenType::KEYWORD,
];

const TYPE: u32 = 1;
const STRUCT: u32 = 2;
const PARAMETER: u32 = 3;
const VARIABLE: u32 = 4;
const PROPERTY: u32 = 5;
const FUNCTION: u32 = 6;
const STRING: u32 = 7;
const NUMBER: u32 = 8;
const KEYWORD: u32 = 9;

const DECLARATION: u32 = 1;

/// Legend announced in the server capabilities.
pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: vec![SemanticTokenModifier::DECLARATION],
    }
}

/// Handles `textDocument/semanticTokens/full`.
pub async fn handle_semantic_tokens_full(
    manager: &DocumentManager,
    params: SemanticTokensParams,
) -> Result<Option<SemanticTokensResult>> {
    let (_, analysis) = manager.snapshot(&params.text_document.uri).await?;

    let mut tokenizer = Tokenizer::new(None);
    walk_module(&analysis.module, &mut tokenizer);
    Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
        result_id: None,
        data: tokenizer.finish(),
    })))
}

/// Handles `textDocument/semanticTokens/range`.
pub async fn handle_semantic_tokens_range(
    manager: &DocumentManager,
    params: SemanticTokensRangeParams,
) -> Result<Option<SemanticTokensRangeResult>> {
    let (_, analysis) = manager.snapshot(&params.text_document.uri).await?;

    let mut tokenizer = Tokenizer::new(Some(from_lsp_range(params.range)));
    walk_module(&analysis.module, &mut tokenizer);
    Ok(Some(SemanticTokensRangeResult::Tokens(SemanticTokens {
        result_id: None,
        data: tokenizer.finish(),
    })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawToken {
    range: Range,
    token_type: u32,
    modifiers: u32,
}

struct Tokenizer {
    window: Option<Range>,
    tokens: Vec<RawToken>,
}

impl Tokenizer {
    fn new(window: Option<Range>) -> Self {
        Self {
            window,
            tokens: Vec::new(),
        }
    }

    fn add(&mut self, range: Range, token_type: u32, modifiers: u32) {
        if range.is_multiline() || range.end.column <= range.start.column {
            return;
        }
        if self.window.is_some_and(|w| !w.overlaps(&range)) {
            return;
        }
        self.tokens.push(RawToken {
            range,
            token_type,
            modifiers,
        });
    }

    fn declaration(&mut self, decl: &Decl) {
        self.add(decl.name_range, decl_token_type(decl), DECLARATION);
    }

    fn type_ref(&mut self, ty: Option<&TypeRef>) {
        // Built-in and inferred types carry no declaration.
        if let Some(ty) = ty
            && let Some(decl) = &ty.decl
        {
            self.add(ty.name_range, decl_token_type(decl), 0);
        }
    }

    fn value_decl(&mut self, decl: &Arc<Decl>) {
        self.declaration(decl);
        self.type_ref(decl.value_type());
    }

    fn finish(self) -> Vec<SemanticToken> {
        encode(self.tokens)
    }
}

fn decl_token_type(decl: &Decl) -> u32 {
    match decl.kind {
        DeclKind::Var { .. } => VARIABLE,
        DeclKind::Param { .. } => PARAMETER,
        DeclKind::Field { .. } => PROPERTY,
        DeclKind::Func(_) => FUNCTION,
        DeclKind::Struct(_) => STRUCT,
        DeclKind::TypeAlias { .. } => TYPE,
    }
}

impl<'a> Visitor<'a> for Tokenizer {
    fn should_visit(&mut self, node: Node<'a>) -> bool {
        self.window.is_none_or(|w| w.overlaps(&node.range()))
    }

    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        match node {
            Node::Import(import) => {
                for symbol in &import.symbols {
                    let token_type = symbol.decl.as_deref().map_or(VARIABLE, decl_token_type);
                    self.add(symbol.range, token_type, 0);
                }
                self.add(import.path.range, STRING, 0);
            }
            Node::VarDecl(var) => self.value_decl(&var.decl),
            Node::FuncDecl(func) => {
                self.declaration(&func.decl);
                if let Some(sig) = func.decl.func() {
                    for param in &sig.params {
                        self.value_decl(param);
                    }
                    self.type_ref(sig.return_type.as_ref());
                }
            }
            Node::StructDecl(structure) => self.declaration(&structure.decl),
            Node::TypeAlias(alias) => {
                self.declaration(&alias.decl);
                if let DeclKind::TypeAlias { underlying } = &alias.decl.kind {
                    self.type_ref(Some(underlying));
                }
            }
            Node::Ident(ident) => self.add(ident.range, decl_token_type(&ident.decl), 0),
            Node::Literal(lit) => {
                let token_type = match lit.value {
                    LiteralValue::Int(_) | LiteralValue::Float(_) => NUMBER,
                    LiteralValue::Text(_) => STRING,
                    LiteralValue::Bool(_) => KEYWORD,
                };
                self.add(lit.range, token_type, 0);
            }
            Node::Call(call) => {
                for range in &call.word_ranges {
                    self.add(*range, FUNCTION, 0);
                }
            }
            Node::StructLiteral(lit) => {
                for range in &lit.word_ranges {
                    self.add(*range, STRUCT, 0);
                }
            }
            _ => {}
        }
        VisitResult::Recurse
    }
}

/// Sorts tokens, drops overlapping ones and delta-encodes the rest
/// relative to the previous token.
fn encode(mut tokens: Vec<RawToken>) -> Vec<SemanticToken> {
    tokens.sort_by_key(|t| (t.range.start, t.range.end));

    let mut data = Vec::with_capacity(tokens.len());
    let (mut prev_line, mut prev_start) = (0, 0);
    let mut last_end = None;
    for token in tokens {
        if last_end.is_some_and(|end| token.range.start < end) {
            continue;
        }
        last_end = Some(token.range.end);

        let line = token.range.start.line - 1;
        let start = token.range.start.column - 1;
        let delta_line = line - prev_line;
        let delta_start = if delta_line == 0 { start - prev_start } else { start };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.range.end.column - token.range.start.column,
            token_type: token.token_type,
            token_modifiers_bitset: token.modifiers,
        });
        prev_line = line;
        prev_start = start;
    }
    data
}
