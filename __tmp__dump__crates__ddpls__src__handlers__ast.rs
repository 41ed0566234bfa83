//! The `ddp/ast` custom request.
//!
//! Editors render the answer as a tree view: one item per top-level
//! statement, each with its children. A range in the request keeps only
//! statements lying completely inside it.

use ddp_syntax::ast::{BinaryOp, LiteralValue, UnaryOp};
use ddp_syntax::Node;
use serde::{Deserialize, Serialize};
use tower_lsp_server::ls_types::{Range, Uri};

use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::{from_lsp_range, to_lsp_range};

#[derive(Debug, Clone, Deserialize)]
pub struct AstParams {
    /// URI of an open document.
    pub path: Uri,
    #[serde(default)]
    pub range: Option<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeItem {
    pub label: String,
    pub description: String,
    pub children: Vec<TreeItem>,
    /// 0 for leaves, 1 for collapsed nodes.
    pub collapsible_state: u8,
    pub icon_id: String,
    pub range: Range,
}

impl TreeItem {
    fn new(node: Node<'_>) -> Self {
        let children: Vec<_> = node.children().into_iter().map(Self::new).collect();
        Self {
            label: node.kind_name().to_string(),
            description: describe(node),
            collapsible_state: u8::from(!children.is_empty()),
            children,
            icon_id: icon(node).to_string(),
            range: to_lsp_range(node.range()),
        }
    }
}

/// Handles `ddp/ast`.
pub async fn handle_ast(manager: &DocumentManager, params: AstParams) -> Result<Vec<TreeItem>> {
    let (_, analysis) = manager.snapshot(&params.path).await?;
    let window = params.range.map(from_lsp_range);

    let items = analysis
        .module
        .statements
        .iter()
        .map(Node::from_stmt)
        .filter(|node| window.is_none_or(|w| w.encloses(&node.range())))
        .map(TreeItem::new)
        .collect();
    Ok(items)
}

fn describe(node: Node<'_>) -> String {
    match node {
        Node::Import(n) => n.path.value.clone(),
        Node::VarDecl(n) => n.decl.name.clone(),
        Node::FuncDecl(n) => n.decl.name.clone(),
        Node::StructDecl(n) => n.decl.name.clone(),
        Node::TypeAlias(n) => n.decl.name.clone(),
        Node::Assign(n) => n.target.name.clone(),
        Node::Ident(n) => n.name.clone(),
        Node::Literal(n) => match &n.value {
            LiteralValue::Int(v) => v.to_string(),
            LiteralValue::Float(v) => v.to_string(),
            LiteralValue::Text(v) => format!("{v:?}"),
            LiteralValue::Bool(v) => v.to_string(),
        },
        Node::Unary(n) => unary_symbol(n.op).to_string(),
        Node::Binary(n) => binary_symbol(n.op).to_string(),
        Node::Call(n) => n.func.name.clone(),
        Node::StructLiteral(n) => n.decl.name.clone(),
        Node::BadStmt(n) => n.error.message.clone(),
        Node::BadExpr(n) => n.error.message.clone(),
        Node::ExprStmt(_)
        | Node::Block(_)
        | Node::If(_)
        | Node::While(_)
        | Node::Return(_)
        | Node::Grouping(_) => String::new(),
    }
}

fn icon(node: Node<'_>) -> &'static str {
    match node {
        Node::Import(_) => "symbol-namespace",
        Node::VarDecl(_) | Node::Ident(_) | Node::Assign(_) => "symbol-variable",
        Node::FuncDecl(_) | Node::Call(_) => "symbol-function",
        Node::StructDecl(_) | Node::StructLiteral(_) => "symbol-struct",
        Node::TypeAlias(_) => "symbol-class",
        Node::Literal(n) => match n.value {
            LiteralValue::Text(_) => "symbol-string",
            LiteralValue::Bool(_) => "symbol-boolean",
            _ => "symbol-number",
        },
        Node::Unary(_) | Node::Binary(_) | Node::Grouping(_) => "symbol-operator",
        Node::BadStmt(_) | Node::BadExpr(_) => "error",
        Node::Block(_) => "bracket",
        Node::If(_) | Node::While(_) | Node::Return(_) | Node::ExprStmt(_) => "symbol-event",
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not",
        UnaryOp::Negate => "-",
    }
}

fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Eq => "==",
        BinaryOp::NotEq => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEq => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEq => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdplsError;
    use crate::test_utils::test_helpers::{open, test_uri};
    use tower_lsp_server::ls_types::Position;

    #[tokio::test]
    async fn test_tree_of_top_level_statements() {
        let manager = DocumentManager::default();
        let src = "var x = 1 + 2;\nwhile x < 3 { x = x + 1; }\n";
        let uri = open(&manager, "main.ddp", src).await;

        let items = handle_ast(&manager, AstParams { path: uri, range: None })
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let var = &items[0];
        assert_eq!(var.label, "VarDecl");
        assert_eq!(var.description, "x");
        assert_eq!(var.collapsible_state, 1);
        assert_eq!(var.children[0].label, "BinaryExpr");
        assert_eq!(var.children[0].description, "+");
        let literals: Vec<_> = var.children[0]
            .children
            .iter()
            .map(|c| (c.label.as_str(), c.description.as_str(), c.collapsible_state))
            .collect();
        assert_eq!(literals, [("Literal", "1", 0), ("Literal", "2", 0)]);

        let body = &items[1].children[1];
        assert_eq!(items[1].label, "WhileStmt");
        assert_eq!(body.label, "BlockStmt");
        assert_eq!(body.children[0].label, "AssignStmt");
        assert_eq!(body.range.start, Position::new(1, 12));
    }

    #[tokio::test]
    async fn test_range_keeps_enclosed_statements() {
        let manager = DocumentManager::default();
        let src = "var a = 1;\nvar b = 2;\nvar c = 3;\n";
        let uri = open(&manager, "main.ddp", src).await;

        let range = Range::new(Position::new(1, 0), Position::new(2, 0));
        let items = handle_ast(&manager, AstParams { path: uri, range: Some(range) })
            .await
            .unwrap();
        let names: Vec<_> = items.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, ["b"]);
    }

    #[test]
    fn test_params_and_items_use_camel_case() {
        let params: AstParams =
            serde_json::from_value(serde_json::json!({ "path": "file:///test/main.ddp" })).unwrap();
        assert!(params.range.is_none());

        let item = TreeItem {
            label: "Ident".into(),
            description: "x".into(),
            children: Vec::new(),
            collapsible_state: 0,
            icon_id: "symbol-variable".into(),
            range: Range::default(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["collapsibleState"], 0);
        assert_eq!(json["iconId"], "symbol-variable");
    }

    #[tokio::test]
    async fn test_missing_document() {
        let manager = DocumentManager::default();
        let result = handle_ast(
            &manager,
            AstParams {
                path: test_uri("gone.ddp"),
                range: None,
            },
        )
        .await;
        assert!(matches!(result, Err(DdplsError::DocumentNotFound(_))));
    }
}


