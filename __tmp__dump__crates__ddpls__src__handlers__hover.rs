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
