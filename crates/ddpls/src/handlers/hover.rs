//! Hover handler.

use ddp_syntax::{Decl, origin};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tower_lsp_server::ls_types::{Hover, HoverContents, HoverParams, MarkupContent, MarkupKind};

use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::{Target, TargetFinder, from_lsp_position, to_lsp_range};
use crate::resolver::ModuleResolver;

/// Handles hover requests.
///
/// Names show the declaration's signature, aliases, documentation comment
/// and location. Import paths show the resolved file.
pub async fn handle_hover(manager: &DocumentManager, params: HoverParams) -> Result<Option<Hover>> {
    let uri = &params.text_document_position_params.text_document.uri;
    let position = from_lsp_position(params.text_document_position_params.position);

    let (doc, analysis) = manager.snapshot(uri).await?;
    let Some(target) = TargetFinder::find(&analysis.module, position) else {
        return Ok(None);
    };
    let resolver = ModuleResolver::new(manager, &doc);

    let value = match &target {
        Target::Decl { decl, .. } => {
            let local = resolver.is_local(decl);
            describe_decl(decl, local, doc.path.parent())
        }
        Target::ImportPath(import) => {
            let mut value = format!("```ddp\nmodule \"{}\"\n```\n", import.resolved_path.display());
            match &import.module {
                Some(module) => {
                    let _ = write!(value, "\n{} public declarations", module.public_decls.len());
                }
                None => value.push_str("\nmodule could not be loaded"),
            }
            value
        }
    };

    Ok(Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: Some(to_lsp_range(target.range())),
    }))
}

fn describe_decl(decl: &Arc<Decl>, local: bool, dir: Option<&Path>) -> String {
    let decl = origin(decl);
    let mut out = format!("```ddp\n{}\n```\n", decl.signature());

    let aliases = decl.aliases();
    if !aliases.is_empty() {
        out.push('\n');
        for alias in aliases {
            let _ = writeln!(out, "- `\"{}\"`", alias.text);
        }
    }
    if let Some(comment) = decl.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        let _ = write!(out, "\n{comment}\n");
    }

    let start = decl.name_range.start;
    if local {
        let _ = write!(out, "\n`[line {}, col {}]`", start.line, start.column);
    } else {
        let file = display_path(&decl.module_path, dir);
        let _ = write!(out, "\n`[{file}, line {}, col {}]`", start.line, start.column);
    }
    out
}

/// Path of `file` relative to `dir` when it lies below it, otherwise its
/// file name.
fn display_path(file: &Path, dir: Option<&Path>) -> String {
    if let Some(relative) = dir.and_then(|d| file.strip_prefix(d).ok()) {
        return relative.to_string_lossy().replace('\\', "/");
    }
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DdplsError;
    use crate::test_utils::test_helpers::{find, open, position_params, test_uri};
    use tower_lsp_server::ls_types::Position;

    fn params(uri: &tower_lsp_server::ls_types::Uri, position: Position) -> HoverParams {
        HoverParams {
            text_document_position_params: position_params(uri, position),
            work_done_progress_params: Default::default(),
        }
    }

    fn markdown(hover: &Hover) -> &str {
        match &hover.contents {
            HoverContents::Markup(markup) => &markup.value,
            other => panic!("unexpected hover contents: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hover_missing_document() {
        let manager = DocumentManager::default();
        let uri = test_uri("missing.ddp");
        let result = handle_hover(&manager, params(&uri, Position::new(0, 0))).await;
        assert!(matches!(result, Err(DdplsError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn test_hover_on_call_shows_signature_aliases_and_comment() {
        let manager = DocumentManager::default();
        let src = "[Adds two numbers.]\n\
                   func add(a: int, b: int): int alias \"add <a> and <b>\" { return a + b; }\n\
                   var sum = add 1 and 2;\n";
        let uri = open(&manager, "main.ddp", src).await;

        let position = find(src, "add 1");
        let hover = handle_hover(&manager, params(&uri, position)).await.unwrap().unwrap();
        let text = markdown(&hover);

        assert!(text.contains("func add(a: int, b: int): int"));
        assert!(text.contains("\"add <a> and <b>\""));
        assert!(text.contains("Adds two numbers."));
        assert!(text.contains("[line 2, col 6]"));
        let range = hover.range.unwrap();
        assert_eq!(range.start, position);
        assert_eq!(range.end.character, position.character + 3);
    }

    #[tokio::test]
    async fn test_hover_on_identifier() {
        let manager = DocumentManager::default();
        let src = "var count: int = 1;\nvar other = count;\n";
        let uri = open(&manager, "main.ddp", src).await;

        let position = Position::new(1, 13);
        let hover = handle_hover(&manager, params(&uri, position)).await.unwrap().unwrap();
        assert!(markdown(&hover).contains("var count: int"));
    }

    #[tokio::test]
    async fn test_hover_on_foreign_declaration_names_file() {
        let manager = DocumentManager::default();
        open(&manager, "lib.ddp", "public var answer = 42;").await;
        let src = "import \"lib.ddp\";\nvar x = answer;\n";
        let uri = open(&manager, "main.ddp", src).await;

        let hover = handle_hover(&manager, params(&uri, find(src, "answer")))
            .await
            .unwrap()
            .unwrap();
        assert!(markdown(&hover).contains("[lib.ddp, line 1, col 12]"));
    }

    #[tokio::test]
    async fn test_hover_on_import_path() {
        let manager = DocumentManager::default();
        let src = "import \"nowhere.ddp\";\n";
        let uri = open(&manager, "main.ddp", src).await;

        let hover = handle_hover(&manager, params(&uri, Position::new(0, 10)))
            .await
            .unwrap()
            .unwrap();
        let text = markdown(&hover);
        assert!(text.contains("/test/nowhere.ddp"));
        assert!(text.contains("could not be loaded"));
    }

    #[tokio::test]
    async fn test_hover_on_whitespace() {
        let manager = DocumentManager::default();
        let uri = open(&manager, "main.ddp", "var x = 1;\n\nvar y = 2;\n").await;
        let hover = handle_hover(&manager, params(&uri, Position::new(1, 0))).await.unwrap();
        assert!(hover.is_none());
    }

    #[test]
    fn test_display_path() {
        let dir = Path::new("/project/src");
        assert_eq!(display_path(Path::new("/project/src/lib/a.ddp"), Some(dir)), "lib/a.ddp");
        assert_eq!(display_path(Path::new("/other/b.ddp"), Some(dir)), "b.ddp");
    }
}
