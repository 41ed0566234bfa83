//! Go-to-definition handler.

use ddp_syntax::origin;
use tower_lsp_server::ls_types::{GotoDefinitionParams, GotoDefinitionResponse, Location, Range};

use crate::document::DocumentManager;
use crate::error::Result;
use crate::query::{Target, TargetFinder, from_lsp_position, to_lsp_range};
use crate::resolver::ModuleResolver;

/// Handles definition requests.
///
/// Names jump to the name of their declaration; generic instantiations to
/// the template. An import path jumps to the start of the imported file.
pub async fn handle_definition(
    manager: &DocumentManager,
    params: GotoDefinitionParams,
) -> Result<Option<GotoDefinitionResponse>> {
    let uri = &params.text_document_position_params.text_document.uri;
    let position = from_lsp_position(params.text_document_position_params.position);

    let (doc, analysis) = manager.snapshot(uri).await?;
    let Some(target) = TargetFinder::find(&analysis.module, position) else {
        return Ok(None);
    };
    let resolver = ModuleResolver::new(manager, &doc);

    let location = match target {
        Target::Decl { decl, .. } => resolver.uri_for(&decl).map(|uri| Location {
            uri,
            range: to_lsp_range(origin(&decl).name_range),
        }),
        Target::ImportPath(import) => import
            .module
            .as_ref()
            .and_then(|_| resolver.uri_for_path(&import.resolved_path))
            .map(|uri| Location {
                uri,
                range: Range::default(),
            }),
    };
    Ok(location.map(GotoDefinitionResponse::Scalar))
}
