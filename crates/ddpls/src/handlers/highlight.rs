//! Document highlight handler.

use tower_lsp_server::ls_types::{DocumentHighlight, DocumentHighlightKind, DocumentHighlightParams};

use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::{RefCollector, RefKind, Target, TargetFinder, from_lsp_position, to_lsp_range};

/// Handles `textDocument/documentHighlight`.
///
/// Highlights every occurrence of the declaration under the cursor in the
/// current document, including the alias words of its calls. Declarations
/// and assignment targets are writes.
pub async fn handle_document_highlight(
    manager: &DocumentManager,
    params: DocumentHighlightParams,
) -> Result<Option<Vec<DocumentHighlight>>> {
    let uri = &params.text_document_position_params.text_document.uri;
    let position = from_lsp_position(params.text_document_position_params.position);

    let (_, analysis) = manager.snapshot(uri).await?;
    let Some(Target::Decl { decl, .. }) = TargetFinder::find(&analysis.module, position) else {
        return Ok(None);
    };

    let highlights = RefCollector::collect(&analysis.module, &decl, true)
        .into_iter()
        .map(|r| DocumentHighlight {
            range: to_lsp_range(r.range),
            kind: Some(match r.kind {
                RefKind::Declaration | RefKind::Write => DocumentHighlightKind::WRITE,
                RefKind::Read => DocumentHighlightKind::READ,
            }),
        })
        .collect();
    Ok(Some(highlights))
}
