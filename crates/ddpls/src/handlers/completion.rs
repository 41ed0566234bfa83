//! Completion handler.
//!
//! Offers, in this order: keywords and built-in types, the names visible
//! from the innermost scope around the cursor, and one item per alias of
//! the functions and structs of the root scope. Inside an import the
//! regular items are replaced by the files next to the document (in the
//! path string) or the public declarations of the imported module (in the
//! symbol list).

use ddp_syntax::ast::{Block, ImportStmt};
use ddp_syntax::token::{BUILTIN_TYPES, KEYWORDS};
use ddp_syntax::{Alias, Decl, DeclKind, Module, Node, Position, VisitResult, Visitor, walk_module};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tower_lsp_server::ls_types::{
    CompletionItem, CompletionItemKind, CompletionParams, CompletionResponse, Documentation,
    InsertTextFormat,
};

use crate::config::CompletionConfig;
use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::{ScopeTracker, from_lsp_position};

static ALIAS_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\w+)>").expect("valid alias parameter regex"));

/// An import path typed so far, up to the cursor. Also matches strings the
/// parser could not turn into an import yet.
static IMPORT_PATH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s+(?:[\w\s,]*\bfrom\s+)?"([^"]*)$"#).expect("valid import regex")
});

/// Handles completion requests.
///
/// `snippets` tells whether alias completions are sent as snippets with a
/// tab stop per parameter slot.
pub async fn handle_completion(
    manager: &DocumentManager,
    params: CompletionParams,
    config: &CompletionConfig,
    snippets: bool,
) -> Result<Option<CompletionResponse>> {
    let uri = &params.text_document_position.text_document.uri;
    let lsp_position = params.text_document_position.position;
    let position = from_lsp_position(lsp_position);

    let (doc, analysis) = manager.snapshot(uri).await?;

    if let Some(typed) = import_path_prefix(&analysis.source, lsp_position.line, lsp_position.character) {
        let items = path_completions(&doc.path, &typed).await;
        tracing::debug!("{} import path completions for {:?}", items.len(), typed);
        return Ok(Some(CompletionResponse::Array(items)));
    }

    let mut finder = CompletionScope::new(&analysis.module, position);
    walk_module(&analysis.module, &mut finder);

    if let Some(import) = finder.import {
        let items = import
            .module
            .as_ref()
            .map(|module| imported_symbols(module))
            .unwrap_or_default();
        return Ok(Some(CompletionResponse::Array(items)));
    }

    let mut items = Vec::new();
    if config.keywords {
        items.extend(KEYWORDS.iter().map(|kw| CompletionItem {
            label: (*kw).to_string(),
            kind: Some(CompletionItemKind::KEYWORD),
            ..Default::default()
        }));
        items.extend(BUILTIN_TYPES.iter().map(|ty| CompletionItem {
            label: (*ty).to_string(),
            kind: Some(CompletionItemKind::CLASS),
            ..Default::default()
        }));
    }

    for decl in &finder.visible {
        if decl.is_value() {
            items.push(CompletionItem {
                label: decl.name.clone(),
                kind: Some(CompletionItemKind::VARIABLE),
                detail: Some(decl.signature()),
                ..Default::default()
            });
        } else if decl.is_type() {
            items.push(CompletionItem {
                label: decl.name.clone(),
                kind: Some(decl_kind(decl)),
                detail: Some(decl.signature()),
                ..Default::default()
            });
        }
    }

    let root = analysis.module.scopes.get(analysis.module.root_scope);
    for decl in root.decls() {
        for alias in decl.aliases() {
            items.push(alias_item(decl, alias, snippets));
        }
    }

    Ok(Some(CompletionResponse::Array(items)))
}

/// Finds the scope around the cursor and the import it is in, if any.
struct CompletionScope<'a> {
    pos: Position,
    tracker: ScopeTracker<'a>,
    visible: Vec<Arc<Decl>>,
    import: Option<&'a ImportStmt>,
}

impl<'a> CompletionScope<'a> {
    fn new(module: &'a Module, pos: Position) -> Self {
        let tracker = ScopeTracker::new(module);
        let visible = tracker.visible().into_iter().cloned().collect();
        Self {
            pos,
            tracker,
            visible,
            import: None,
        }
    }
}

impl<'a> Visitor<'a> for CompletionScope<'a> {
    fn should_visit(&mut self, node: Node<'a>) -> bool {
        node.range().contains(self.pos)
    }

    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        match node {
            Node::Import(import) => {
                if self.pos <= import.path.range.start {
                    self.import = Some(import);
                }
                VisitResult::Break
            }
            // The end position sits after the closing brace.
            Node::Block(block) if self.pos >= block.range.end => VisitResult::SkipChildren,
            Node::Block(block) => {
                self.tracker.enter(block);
                self.visible = self.tracker.visible().into_iter().cloned().collect();
                VisitResult::Recurse
            }
            _ => VisitResult::Recurse,
        }
    }

    fn leave_block(&mut self, _block: &'a Block) {
        self.tracker.leave();
    }
}

/// Text of the import path before the cursor, if the cursor is inside an
/// import string.
fn import_path_prefix(source: &str, line: u32, character: u32) -> Option<String> {
    let text = source.lines().nth(line as usize)?;
    let mut end = text.len();
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units >= character as usize {
            end = idx;
            break;
        }
        units += ch.len_utf16();
    }
    let captures = IMPORT_PATH_PREFIX.captures(&text[..end])?;
    Some(captures[1].to_string())
}

/// `.ddp` files and directories in the directory the typed path points
/// into. Files are offered without their extension; the document itself is
/// left out.
async fn path_completions(document: &Path, typed: &str) -> Vec<CompletionItem> {
    let base = document.parent().unwrap_or_else(|| Path::new(""));
    let dir = match typed.rfind('/') {
        Some(idx) => base.join(&typed[..idx]),
        None => base.to_path_buf(),
    };

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut items = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if is_dir {
            items.push(CompletionItem {
                label: name.to_string(),
                kind: Some(CompletionItemKind::FOLDER),
                ..Default::default()
            });
        } else if let Some(stem) = name.strip_suffix(".ddp") {
            if path == document {
                continue;
            }
            items.push(CompletionItem {
                label: stem.to_string(),
                kind: Some(CompletionItemKind::FILE),
                ..Default::default()
            });
        }
    }
    items.sort_by(|a, b| a.label.cmp(&b.label));
    items
}

fn imported_symbols(module: &Module) -> Vec<CompletionItem> {
    module
        .public_decls
        .values()
        .map(|decl| CompletionItem {
            label: decl.name.clone(),
            kind: Some(decl_kind(decl)),
            detail: Some(decl.signature()),
            ..Default::default()
        })
        .collect()
}

fn decl_kind(decl: &Decl) -> CompletionItemKind {
    match decl.kind {
        DeclKind::Func(_) => CompletionItemKind::FUNCTION,
        DeclKind::Struct(_) => CompletionItemKind::STRUCT,
        DeclKind::TypeAlias { .. } => CompletionItemKind::CLASS,
        DeclKind::Field { .. } => CompletionItemKind::FIELD,
        DeclKind::Var { .. } | DeclKind::Param { .. } => CompletionItemKind::VARIABLE,
    }
}

fn alias_item(decl: &Decl, alias: &Alias, snippets: bool) -> CompletionItem {
    let (insert_text, format) = if snippets {
        (snippet(&alias.text), InsertTextFormat::SNIPPET)
    } else {
        (alias.text.clone(), InsertTextFormat::PLAIN_TEXT)
    };
    CompletionItem {
        label: alias.text.clone(),
        kind: Some(decl_kind(decl)),
        detail: Some(decl.signature()),
        documentation: decl
            .comment
            .as_ref()
            .map(|c| Documentation::String(c.trim().to_string())),
        filter_text: Some(alias.text.clone()),
        insert_text: Some(insert_text),
        insert_text_format: Some(format),
        ..Default::default()
    }
}

/// Turns every `<name>` slot into a numbered tab stop.
fn snippet(alias: &str) -> String {
    let mut index = 0;
    ALIAS_PARAM
        .replace_all(alias, |caps: &regex::Captures<'_>| {
            index += 1;
            format!("${{{index}:{}}}", &caps[1])
        })
        .into_owned()
}
