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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::test_uri;
    use ddp_syntax::ast::{Expr, Stmt};
    use std::str::FromStr;

    #[tokio::test]
    async fn test_local_declaration_keeps_client_uri() {
        let manager = DocumentManager::default();
        let uri = Uri::from_str("untitled:/scratch/main.ddp").unwrap();
        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();

        let (doc, analysis) = manager.snapshot(&uri).await.unwrap();
        let decl = analysis.module.root_decls().next().unwrap();
        let resolver = ModuleResolver::new(&manager, &doc);
        assert_eq!(resolver.uri_for(decl), Some(uri));
        assert!(resolver.is_local(decl));
    }

    #[tokio::test]
    async fn test_generic_instantiation_resolves_to_template_document() {
        let manager = DocumentManager::default();
        let lib = test_uri("lib.ddp");
        let main = test_uri("main.ddp");
        manager
            .add_and_parse(
                lib.clone(),
                "public func id<T>(v: T): T alias \"id of <v>\" { return v; }".into(),
            )
            .await
            .unwrap();
        manager
            .add_and_parse(main.clone(), "import \"lib.ddp\";\nvar a = id of 1;".into())
            .await
            .unwrap();

        let (doc, analysis) = manager.snapshot(&main).await.unwrap();
        let Stmt::Var(var) = &analysis.module.statements[1] else {
            panic!("expected var");
        };
        let Some(Expr::Call(call)) = &var.init else {
            panic!("expected call");
        };
        assert!(call.func.template().is_some());
        assert_eq!(call.func.module, analysis.module.id);

        let resolver = ModuleResolver::new(&manager, &doc);
        assert_eq!(resolver.uri_for(&call.func), Some(lib));
        assert!(!resolver.is_local(&call.func));
    }

    #[tokio::test]
    async fn test_module_on_disk_gets_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let lib_path = dir.path().join("lib.ddp");
        std::fs::write(&lib_path, "public var answer = 42;").unwrap();

        let manager = DocumentManager::default();
        let main = Uri::from_file_path(dir.path().join("main.ddp")).unwrap();
        manager
            .add_and_parse(main.clone(), "import \"lib.ddp\";\nvar x = answer;".into())
            .await
            .unwrap();

        let (doc, analysis) = manager.snapshot(&main).await.unwrap();
        let import = analysis.module.imports().next().unwrap();
        let answer = import.module.as_ref().unwrap().public_decls["answer"].clone();

        let resolver = ModuleResolver::new(&manager, &doc);
        let uri = resolver.uri_for(&answer).unwrap();
        assert_eq!(
            uri.to_file_path().map(|p| p.to_path_buf()),
            Some(ddp_syntax::parser::normalize(&lib_path))
        );
    }
}


