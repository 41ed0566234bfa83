//! Prepare-rename and rename handlers.
//!
//! Both resolve the cursor to a declaration first. Rename then collects
//! every occurrence of that declaration in the current module and, for a
//! declaration of another file, in the module declaring it. Alias slots
//! naming a parameter or field are renamed with it; the words of alias
//! calls are not, they belong to the alias text.

use ddp_syntax::token::{BUILTIN_TYPES, KEYWORDS};
use ddp_syntax::{Decl, Module, origin};
use std::collections::HashMap;
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    PrepareRenameResponse, RenameParams, TextDocumentPositionParams, TextEdit, Uri, WorkspaceEdit,
};

use crate::document::{DocumentManager, path_to_uri};
use crate::error::{DdplsError, Result};
use crate::query::{RefCollector, Target, TargetFinder, from_lsp_position, to_lsp_range};
use crate::resolver::ModuleResolver;

/// Handles `textDocument/prepareRename`.
///
/// Answers with the range of the name under the cursor, or `None` when the
/// cursor is not on something rename would change.
pub async fn handle_prepare_rename(
    manager: &DocumentManager,
    params: TextDocumentPositionParams,
) -> Result<Option<PrepareRenameResponse>> {
    let position = from_lsp_position(params.position);
    let (_, analysis) = manager.snapshot(&params.text_document.uri).await?;

    let Some(Target::Decl { decl, range }) = TargetFinder::find(&analysis.module, position) else {
        return Ok(None);
    };
    let renamable = RefCollector::collect(&analysis.module, &decl, false)
        .iter()
        .any(|r| r.range == range);
    if !renamable {
        return Ok(None);
    }

    Ok(Some(PrepareRenameResponse::RangeWithPlaceholder {
        range: to_lsp_range(range),
        placeholder: decl.name.clone(),
    }))
}

/// Handles `textDocument/rename`.
pub async fn handle_rename(
    manager: &DocumentManager,
    params: RenameParams,
) -> Result<Option<WorkspaceEdit>> {
    let new_name = params.new_name;
    if !is_valid_name(&new_name) {
        return Err(DdplsError::InvalidName(new_name));
    }
    let uri = &params.text_document_position.text_document.uri;
    let position = from_lsp_position(params.text_document_position.position);

    let (doc, analysis) = manager.snapshot(uri).await?;
    let Some(decl) = TargetFinder::find(&analysis.module, position)
        .as_ref()
        .and_then(Target::decl)
        .cloned()
    else {
        return Ok(None);
    };

    let mut changes: HashMap<Uri, Vec<TextEdit>> = HashMap::new();
    changes.insert(uri.clone(), edits(&analysis.module, &decl, &new_name));

    let resolver = ModuleResolver::new(manager, &doc);
    if !resolver.is_local(&decl) {
        let declared = Arc::clone(origin(&decl));
        if let Some((owner_uri, owner)) = owning_module(manager, &analysis.module, &declared).await {
            // The owner may have been reparsed since this module imported it.
            let fresh = TargetFinder::find(&owner, declared.name_range.start)
                .as_ref()
                .and_then(Target::decl)
                .cloned()
                .unwrap_or(declared);
            changes.insert(owner_uri, edits(&owner, &fresh, &new_name));
        }
    }

    let total: usize = changes.values().map(Vec::len).sum();
    tracing::debug!("rename to {:?}: {} edits in {} files", new_name, total, changes.len());
    Ok(Some(WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }))
}

/// The module declaring `decl` and the URI to edit it under. Open
/// documents win over the copy reached through the imports.
async fn owning_module(
    manager: &DocumentManager,
    current: &Module,
    decl: &Decl,
) -> Option<(Uri, Arc<Module>)> {
    let open = manager
        .get_from_module(decl.module)
        .or_else(|| manager.find_by_path(&decl.module_path));
    if let Some(doc) = open {
        return match manager.snapshot(&doc.uri).await {
            Ok((doc, analysis)) => Some((doc.uri.clone(), Arc::clone(&analysis.module))),
            Err(e) => {
                tracing::warn!("cannot read {} for rename: {}", doc.uri.as_str(), e);
                None
            }
        };
    }
    let module = current.find_imported(&decl.module_path)?;
    let uri = path_to_uri(&decl.module_path)?;
    Some((uri, module))
}

fn edits(module: &Module, decl: &Arc<Decl>, new_name: &str) -> Vec<TextEdit> {
    RefCollector::collect(module, decl, false)
        .into_iter()
        .map(|r| TextEdit {
            range: to_lsp_range(r.range),
            new_text: new_name.to_string(),
        })
        .collect()
}

/// Whether `name` lexes as a single identifier.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
        && !BUILTIN_TYPES.contains(&name)
}
