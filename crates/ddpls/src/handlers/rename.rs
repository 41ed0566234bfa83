//! Prepare-rename and rename handlers.
//!
//! Both resolve the cursor to a declaration first. Rename then collects
//! every occurrence of that declaration in the current module and, for a
//! declaration of another file, in the module declaring it. A public
//! declaration is also renamed in every open document importing it. Alias slots
//! naming a parameter or field are renamed with it; the words of alias
//! calls are not, they belong to the alias text.

use ddp_syntax::lexer::tokenize;
use ddp_syntax::token::{BUILTIN_TYPES, TokenKind};
use ddp_syntax::{Decl, Module, origin};
use std::collections::HashMap;
use std::path::Path;
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

    let declared = Arc::clone(origin(&decl));
    let resolver = ModuleResolver::new(manager, &doc);
    if !resolver.is_local(&decl) {
        if let Some((owner_uri, owner)) = owning_module(manager, &analysis.module, &declared).await {
            // The owner may have been reparsed since this module imported it.
            let fresh = counterpart(&owner, &declared).unwrap_or_else(|| Arc::clone(&declared));
            changes.insert(owner_uri, edits(&owner, &fresh, &new_name));
        }
    }
    if declared.is_public {
        importer_edits(manager, &declared, &new_name, &mut changes).await;
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

/// Adds edits for every other open document that imports the module
/// declaring `declared` and refers to it.
async fn importer_edits(
    manager: &DocumentManager,
    declared: &Arc<Decl>,
    new_name: &str,
    changes: &mut HashMap<Uri, Vec<TextEdit>>,
) {
    for uri in manager.uris() {
        if changes.contains_key(&uri) {
            continue;
        }
        let analysis = match manager.snapshot(&uri).await {
            Ok((_, analysis)) => analysis,
            Err(e) => {
                tracing::warn!("cannot read {} for rename: {}", uri.as_str(), e);
                continue;
            }
        };
        let Some(imported) = analysis.module.find_imported(&declared.module_path) else {
            continue;
        };
        // Importers hold their own parse of the declaring module.
        let Some(seen) = counterpart(&imported, declared) else {
            continue;
        };
        let found = edits(&analysis.module, &seen, new_name);
        if !found.is_empty() {
            changes.insert(uri, found);
        }
    }
}

/// The declaration in `module` at the place `declared` names.
fn counterpart(module: &Module, declared: &Decl) -> Option<Arc<Decl>> {
    TargetFinder::find(module, declared.name_range.start)
        .as_ref()
        .and_then(Target::decl)
        .filter(|found| found.name == declared.name)
        .cloned()
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

/// Whether `name` lexes as a single identifier that is not a built-in type.
fn is_valid_name(name: &str) -> bool {
    let (tokens, errors) = tokenize(Path::new(""), name);
    let single_ident = match tokens.as_slice() {
        [ident, eof] => {
            ident.kind == TokenKind::Ident && ident.literal == name && eof.kind == TokenKind::Eof
        }
        _ => false,
    };
    errors.is_empty() && single_ident && !BUILTIN_TYPES.contains(&name)
}
