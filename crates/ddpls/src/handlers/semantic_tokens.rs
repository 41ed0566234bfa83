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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::open;
    use ddp_syntax::Position;
    use tower_lsp_server::ls_types::{self as lsp, TextDocumentIdentifier, Uri};

    /// Absolute `(line, start, length, type, modifiers)`, all 0-based.
    type Decoded = (u32, u32, u32, u32, u32);

    fn decode(data: &[SemanticToken]) -> Vec<Decoded> {
        let (mut line, mut start) = (0, 0);
        data.iter()
            .map(|t| {
                if t.delta_line == 0 {
                    start += t.delta_start;
                } else {
                    line += t.delta_line;
                    start = t.delta_start;
                }
                (line, start, t.length, t.token_type, t.token_modifiers_bitset)
            })
            .collect()
    }

    async fn full(manager: &DocumentManager, uri: &Uri) -> Vec<Decoded> {
        let params = SemanticTokensParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        match handle_semantic_tokens_full(manager, params).await.unwrap() {
            Some(SemanticTokensResult::Tokens(tokens)) => decode(&tokens.data),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    fn raw(line: u32, start: u32, end: u32, token_type: u32) -> RawToken {
        RawToken {
            range: Range::new(Position::new(line, start), Position::new(line, end)),
            token_type,
            modifiers: 0,
        }
    }

    #[test]
    fn test_legend_matches_indices() {
        let legend = legend();
        assert_eq!(legend.token_types[VARIABLE as usize], SemanticTokenType::VARIABLE);
        assert_eq!(legend.token_types[FUNCTION as usize], SemanticTokenType::FUNCTION);
        assert_eq!(legend.token_types[NUMBER as usize], SemanticTokenType::NUMBER);
        assert_eq!(legend.token_modifiers, [SemanticTokenModifier::DECLARATION]);
    }

    #[test]
    fn test_encode_sorts_and_drops_overlaps() {
        let data = encode(vec![
            raw(2, 5, 8, NUMBER),
            raw(1, 3, 6, VARIABLE),
            raw(1, 1, 2, STRING),
            raw(1, 4, 5, FUNCTION),
        ]);
        assert_eq!(
            decode(&data),
            [(0, 0, 1, STRING, 0), (0, 2, 3, VARIABLE, 0), (1, 4, 3, NUMBER, 0)]
        );
        assert_eq!(data[1].delta_start, 2);
        assert_eq!(data[2].delta_start, 4);
    }

    #[tokio::test]
    async fn test_variables_and_literals() {
        let manager = DocumentManager::default();
        let uri = open(&manager, "main.ddp", "var x = 1;\nx = x + 2;\n").await;

        assert_eq!(
            full(&manager, &uri).await,
            [
                (0, 4, 1, VARIABLE, DECLARATION),
                (0, 8, 1, NUMBER, 0),
                (1, 0, 1, VARIABLE, 0),
                (1, 4, 1, VARIABLE, 0),
                (1, 8, 1, NUMBER, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_functions_params_and_call_words() {
        let manager = DocumentManager::default();
        let src = "func add(a: int, b: int): int alias \"add <a> and <b>\" { return a + b; }\n\
                   var s = add 1 and 2;\n";
        let uri = open(&manager, "main.ddp", src).await;
        let tokens = full(&manager, &uri).await;

        assert_eq!(tokens[0], (0, 5, 3, FUNCTION, DECLARATION));
        assert_eq!(tokens[1], (0, 9, 1, PARAMETER, DECLARATION));
        assert_eq!(tokens[2], (0, 17, 1, PARAMETER, DECLARATION));
        assert!(tokens.contains(&(1, 8, 3, FUNCTION, 0)));
        assert!(tokens.contains(&(1, 14, 3, FUNCTION, 0)));
        assert!(tokens.contains(&(1, 12, 1, NUMBER, 0)));
        let params_in_body = tokens
            .iter()
            .filter(|t| t.0 == 0 && t.3 == PARAMETER && t.4 == 0)
            .count();
        assert_eq!(params_in_body, 2);
    }

    #[tokio::test]
    async fn test_struct_declarations_and_type_references() {
        let manager = DocumentManager::default();
        let src = "struct P { x: int } alias \"p <x>\";\nvar v: P = p 1;\n";
        let uri = open(&manager, "main.ddp", src).await;

        assert_eq!(
            full(&manager, &uri).await,
            [
                (0, 7, 1, STRUCT, DECLARATION),
                (0, 11, 1, PROPERTY, DECLARATION),
                (1, 4, 1, VARIABLE, DECLARATION),
                (1, 7, 1, STRUCT, 0),
                (1, 11, 1, STRUCT, 0),
                (1, 13, 1, NUMBER, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_import_path_is_a_string() {
        let manager = DocumentManager::default();
        let uri = open(&manager, "main.ddp", "import \"nowhere.ddp\";\n").await;
        assert_eq!(full(&manager, &uri).await, [(0, 7, 13, STRING, 0)]);
    }

    #[tokio::test]
    async fn test_range_only_returns_overlapping_tokens() {
        let manager = DocumentManager::default();
        let src = "var a = 1;\nvar b = 2;\nvar c = 3;\n";
        let uri = open(&manager, "main.ddp", src).await;

        let params = SemanticTokensRangeParams {
            text_document: TextDocumentIdentifier { uri },
            range: lsp::Range::new(lsp::Position::new(1, 0), lsp::Position::new(1, 10)),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        let Some(SemanticTokensRangeResult::Tokens(tokens)) =
            handle_semantic_tokens_range(&manager, params).await.unwrap()
        else {
            panic!("expected tokens");
        };
        assert_eq!(
            decode(&tokens.data),
            [(1, 4, 1, VARIABLE, DECLARATION), (1, 8, 1, NUMBER, 0)]
        );
    }
}
