//! Mapping declarations back to client-visible document URIs.

use ddp_syntax::{Decl, ModuleId, origin};
use std::path::Path;
use std::sync::Arc;
use tower_lsp_server::ls_types::Uri;

use crate::document::{DocumentManager, DocumentState, path_to_uri};

/// Resolves where a declaration should be shown, relative to the document a
/// request was made in.
///
/// Open documents keep the URI the client used for them, so a jump into a
/// file the editor already has open lands in that editor buffer even when
/// its URI is not a plain `file://` URI.
pub struct ModuleResolver<'a> {
    manager: &'a DocumentManager,
    current: &'a DocumentState,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(manager: &'a DocumentManager, current: &'a DocumentState) -> Self {
        Self { manager, current }
    }

    /// URI of the document declaring `decl`.
    ///
    /// Generic instantiations resolve to the document of their template.
    pub fn uri_for(&self, decl: &Arc<Decl>) -> Option<Uri> {
        let decl = origin(decl);
        self.uri_for_module(decl.module, &decl.module_path)
    }

    /// URI for a module reached through an import.
    pub fn uri_for_path(&self, path: &Path) -> Option<Uri> {
        if let Some(doc) = self.manager.find_by_path(path) {
            return Some(doc.uri.clone());
        }
        path_to_uri(path)
    }

    fn uri_for_module(&self, id: ModuleId, path: &Path) -> Option<Uri> {
        if self.current.module_id() == Some(id) || self.current.path == path {
            return Some(self.current.uri.clone());
        }
        if let Some(doc) = self.manager.get_from_module(id) {
            return Some(doc.uri.clone());
        }
        self.uri_for_path(path)
    }

    /// Whether `decl` lives in the current document.
    pub fn is_local(&self, decl: &Arc<Decl>) -> bool {
        let decl = origin(decl);
        self.current.module_id() == Some(decl.module) || self.current.path == decl.module_path
    }
}
