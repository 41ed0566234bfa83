use dashmap::DashMap;
use ddp_syntax::parser::normalize;
use ddp_syntax::{Module, ModuleId, ModuleParser, ParseRequest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp_server::ls_types::{TextDocumentContentChangeEvent, Uri};

use super::single_flight::SingleFlight;
use super::state::{Analysis, DocumentState};
use crate::error::{DdplsError, Result, panic_message};

type Documents = Arc<DashMap<Uri, Arc<DocumentState>>>;

/// Owns every open document and serializes their reparses.
///
/// The map is only locked for lookups and inserts. Parsing happens under
/// the parse lock of the single document involved, on a blocking worker
/// thread, so documents can be queried and edited concurrently while at
/// most one reparse per document is running.
///
/// # Examples
///
/// ```
/// use ddpls::document::DocumentManager;
/// use tower_lsp_server::ls_types::Uri;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let manager = DocumentManager::default();
/// let uri = Uri::from_file_path("/project/main.ddp").unwrap();
///
/// manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();
/// let (_, analysis) = manager.snapshot(&uri).await.unwrap();
/// assert!(analysis.errors.is_empty());
/// # });
/// ```
pub struct DocumentManager {
    documents: Documents,
    parser: Arc<dyn ModuleParser>,
    flights: SingleFlight<Uri>,
}

impl Default for DocumentManager {
    fn default() -> Self {
        Self::new(Arc::new(ddp_syntax::DdpParser::new()))
    }
}

impl DocumentManager {
    pub fn new(parser: Arc<dyn ModuleParser>) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            parser,
            flights: SingleFlight::new(),
        }
    }

    /// Starts tracking a document and parses it.
    ///
    /// An already tracked document with the same URI is replaced. The
    /// document stays tracked if the parse fails; it is still stale then and
    /// the next [`DocumentManager::get`] retries.
    pub async fn add_and_parse(&self, uri: Uri, content: String) -> Result<Arc<DocumentState>> {
        let doc = Arc::new(DocumentState::new(uri.clone(), content));
        self.documents.insert(uri, Arc::clone(&doc));
        tracing::debug!("tracking {} as {}", doc.uri.as_str(), doc.path.display());

        reparse_document(
            Arc::clone(&self.documents),
            Arc::clone(&self.parser),
            Arc::clone(&doc),
            false,
        )
        .await?;
        Ok(doc)
    }

    /// Parses the document again, whether or not it is stale.
    pub async fn reparse(&self, uri: &Uri) -> Result<()> {
        let doc = self.lookup(uri)?;
        reparse_document(
            Arc::clone(&self.documents),
            Arc::clone(&self.parser),
            doc,
            false,
        )
        .await
    }

    /// Returns the document, reparsing it first if it is stale.
    ///
    /// Concurrent callers that find the same document stale share a single
    /// reparse.
    pub async fn get(&self, uri: &Uri) -> Result<Arc<DocumentState>> {
        let doc = self.lookup(uri)?;
        if !doc.needs_reparse() {
            return Ok(doc);
        }

        let documents = Arc::clone(&self.documents);
        let parser = Arc::clone(&self.parser);
        let target = Arc::clone(&doc);
        self.flights
            .run(uri.clone(), move || async move {
                reparse_document(documents, parser, target, true)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await
            .map_err(|reason| DdplsError::Reparse {
                uri: uri.to_string(),
                reason,
            })?;
        Ok(doc)
    }

    /// Like [`DocumentManager::get`], also returning the analysis.
    pub async fn snapshot(&self, uri: &Uri) -> Result<(Arc<DocumentState>, Arc<Analysis>)> {
        let doc = self.get(uri).await?;
        let analysis = doc.analysis().ok_or_else(|| DdplsError::Reparse {
            uri: uri.to_string(),
            reason: "document was never parsed".into(),
        })?;
        Ok((doc, analysis))
    }

    /// Document without triggering a reparse.
    pub fn peek(&self, uri: &Uri) -> Option<Arc<DocumentState>> {
        self.documents.get(uri).map(|doc| Arc::clone(doc.value()))
    }

    /// Open document whose current module has the given id.
    pub fn get_from_module(&self, id: ModuleId) -> Option<Arc<DocumentState>> {
        self.documents
            .iter()
            .find(|entry| entry.value().module_id() == Some(id))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Open document parsed as the given file.
    pub fn find_by_path(&self, path: &Path) -> Option<Arc<DocumentState>> {
        let path = normalize(path);
        self.documents
            .iter()
            .find(|entry| entry.value().path == path)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Applies client edits and marks the document stale.
    pub fn apply_changes(
        &self,
        uri: &Uri,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<Arc<DocumentState>> {
        let doc = self.lookup(uri)?;
        doc.apply_changes(changes);
        Ok(doc)
    }

    /// Stops tracking a document.
    pub fn delete(&self, uri: &Uri) -> Option<Arc<DocumentState>> {
        self.documents.remove(uri).map(|(_, doc)| doc)
    }

    pub fn uris(&self) -> Vec<Uri> {
        self.documents.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn lookup(&self, uri: &Uri) -> Result<Arc<DocumentState>> {
        self.peek(uri)
            .ok_or_else(|| DdplsError::document_not_found(&uri.as_str()))
    }
}

/// Modules of every other parsed document, by file path.
fn import_context(documents: &Documents, doc: &DocumentState) -> HashMap<PathBuf, Arc<Module>> {
    documents
        .iter()
        .filter(|entry| entry.value().uri != doc.uri)
        .filter_map(|entry| {
            let other = entry.value();
            other
                .analysis()
                .map(|analysis| (other.path.clone(), Arc::clone(&analysis.module)))
        })
        .collect()
}

async fn reparse_document(
    documents: Documents,
    parser: Arc<dyn ModuleParser>,
    doc: Arc<DocumentState>,
    only_if_stale: bool,
) -> Result<()> {
    let _guard = doc.parse_lock.lock().await;
    if only_if_stale && !doc.needs_reparse() {
        return Ok(());
    }

    let modules = import_context(&documents, &doc);
    let source = doc.begin_reparse();
    let request = ParseRequest::new(doc.path.clone(), Arc::clone(&source), modules);

    let started = std::time::Instant::now();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut errors = Vec::new();
        parser
            .parse(request, &mut |error| errors.push(error))
            .map(|module| (module, errors))
    })
    .await;

    match outcome {
        Ok(Ok((module, errors))) => {
            tracing::debug!(
                "parsed {} in {:?} ({} errors)",
                doc.uri.as_str(),
                started.elapsed(),
                errors.len()
            );
            doc.install(Analysis {
                module: Arc::new(module),
                errors,
                source,
            });
            Ok(())
        }
        Ok(Err(error)) => {
            doc.mark_stale();
            tracing::warn!("failed to parse {}: {}", doc.uri.as_str(), error);
            Err(error.into())
        }
        Err(join_error) => {
            doc.mark_stale();
            let reason = if join_error.is_panic() {
                panic_message(join_error.into_panic().as_ref())
            } else {
                join_error.to_string()
            };
            tracing::error!("parser failed on {}: {}", doc.uri.as_str(), reason);
            Err(DdplsError::Reparse {
                uri: doc.uri.to_string(),
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{CountingParser, PanickingParser, full_change, test_uri};
    use ddp_syntax::ErrorCode;
    use std::time::Duration;

    #[tokio::test]
    async fn test_content_follows_open_change_close() {
        let manager = DocumentManager::default();
        let uri = test_uri("main.ddp");

        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();
        manager
            .apply_changes(&uri, vec![full_change("var x = 2;")])
            .unwrap();
        manager
            .apply_changes(&uri, vec![full_change("var x = 3;")])
            .unwrap();

        let (doc, analysis) = manager.snapshot(&uri).await.unwrap();
        assert_eq!(doc.content(), "var x = 3;");
        assert_eq!(&*analysis.source, "var x = 3;");
        assert!(!doc.needs_reparse());

        assert!(manager.delete(&uri).is_some());
        assert!(matches!(
            manager.get(&uri).await,
            Err(DdplsError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reparse_is_idempotent() {
        let manager = DocumentManager::default();
        let uri = test_uri("main.ddp");
        let source = "var x = y;\nvar z: int = 1\n";

        manager.add_and_parse(uri.clone(), source.into()).await.unwrap();
        let (_, first) = manager.snapshot(&uri).await.unwrap();
        manager.reparse(&uri).await.unwrap();
        let (_, second) = manager.snapshot(&uri).await.unwrap();

        assert_ne!(first.module.id, second.module.id);
        assert!(!first.errors.is_empty());
        assert_eq!(first.errors, second.errors);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gets_parse_once() {
        let parser = Arc::new(CountingParser::new(Duration::from_millis(50)));
        let manager = Arc::new(DocumentManager::new(parser.clone()));
        let uri = test_uri("main.ddp");

        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();
        assert_eq!(parser.calls(), 1);

        manager
            .apply_changes(&uri, vec![full_change("var x = 2;")])
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            let uri = uri.clone();
            handles.push(tokio::spawn(async move { manager.get(&uri).await }));
        }
        for handle in handles {
            let doc = handle.await.unwrap().unwrap();
            assert_eq!(&*doc.analysis().unwrap().source, "var x = 2;");
        }

        assert_eq!(parser.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_edit_during_parse_keeps_document_stale() {
        let parser = Arc::new(CountingParser::new(Duration::from_millis(100)));
        let manager = Arc::new(DocumentManager::new(parser.clone()));
        let uri = test_uri("main.ddp");

        let open = {
            let manager = Arc::clone(&manager);
            let uri = uri.clone();
            tokio::spawn(async move { manager.add_and_parse(uri, "var x = 1;".into()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        manager
            .apply_changes(&uri, vec![full_change("var x = 2;")])
            .unwrap();
        let doc = open.await.unwrap().unwrap();

        assert!(doc.needs_reparse());
        assert_eq!(&*doc.analysis().unwrap().source, "var x = 1;");

        let (_, analysis) = manager.snapshot(&uri).await.unwrap();
        assert_eq!(&*analysis.source, "var x = 2;");
        assert_eq!(parser.calls(), 2);
    }

    #[tokio::test]
    async fn test_open_documents_form_import_context() {
        let manager = DocumentManager::default();
        let lib = test_uri("lib.ddp");
        let main = test_uri("main.ddp");

        manager
            .add_and_parse(lib.clone(), "public var answer = 42;".into())
            .await
            .unwrap();
        manager
            .add_and_parse(main.clone(), "import \"lib.ddp\";\nvar x = answer;".into())
            .await
            .unwrap();

        let (_, analysis) = manager.snapshot(&main).await.unwrap();
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);

        let lib_module = manager.peek(&lib).unwrap().module_id().unwrap();
        let import = analysis.module.imports().next().unwrap();
        assert_eq!(import.module.as_ref().unwrap().id, lib_module);
    }

    #[tokio::test]
    async fn test_missing_import_is_a_parse_error() {
        let manager = DocumentManager::default();
        let uri = test_uri("main.ddp");

        manager
            .add_and_parse(uri.clone(), "import \"nowhere.ddp\";".into())
            .await
            .unwrap();
        let (_, analysis) = manager.snapshot(&uri).await.unwrap();
        let codes: Vec<_> = analysis.errors.iter().map(|e| e.code).collect();
        assert_eq!(codes, [ErrorCode::IMPORT_NOT_FOUND]);
    }

    #[tokio::test]
    async fn test_parser_panic_is_reported_and_document_stays_stale() {
        let manager = DocumentManager::new(Arc::new(PanickingParser));
        let uri = test_uri("main.ddp");

        let result = manager.add_and_parse(uri.clone(), "var x = 1;".into()).await;
        match result {
            Err(DdplsError::Reparse { reason, .. }) => assert!(reason.contains("parser exploded")),
            other => panic!("expected reparse error, got {other:?}"),
        }

        let doc = manager.peek(&uri).unwrap();
        assert!(doc.needs_reparse());
        assert!(manager.get(&uri).await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_by_module_and_path() {
        let manager = DocumentManager::default();
        let uri = test_uri("dir/main.ddp");
        let doc = manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();

        let id = doc.module_id().unwrap();
        assert_eq!(manager.get_from_module(id).unwrap().uri, uri);
        assert_eq!(
            manager.find_by_path(&doc.path.join("../main.ddp")).unwrap().uri,
            uri
        );
        assert!(manager.find_by_path(Path::new("/elsewhere.ddp")).is_none());
        assert_eq!(manager.len(), 1);
    }
}


