use crate::config::ServerConfig;
use crate::diagnostics::{DiagnosticsScheduler, DiagnosticsSink};
use crate::document::DocumentManager;
use crate::error::{DdplsError, panic_message};
use crate::handlers::ast::{AstParams, TreeItem};
use crate::handlers::{self, semantic_tokens};
use ddp_syntax::ModuleParser;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tower_lsp_server::ls_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentHighlight, DocumentHighlightParams, FoldingRange, FoldingRangeParams,
    FoldingRangeProviderCapability, GotoDefinitionParams, GotoDefinitionResponse, Hover,
    HoverParams, HoverProviderCapability, InitializeParams, InitializeResult, InitializedParams,
    MessageType, OneOf, PrepareRenameResponse, RenameOptions, RenameParams,
    SemanticTokensFullOptions, SemanticTokensOptions, SemanticTokensParams,
    SemanticTokensRangeParams, SemanticTokensRangeResult, SemanticTokensResult,
    SemanticTokensServerCapabilities, ServerCapabilities, ServerInfo, TextDocumentPositionParams,
    TextDocumentSyncCapability, TextDocumentSyncKind, Uri, WorkspaceEdit,
};
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result};

/// Name of the custom request serving the syntax tree view.
pub const AST_METHOD: &str = "ddp/ast";

pub struct Backend {
    pub(crate) client: Client,
    documents: Arc<DocumentManager>,
    diagnostics: DiagnosticsScheduler,
    config: Arc<RwLock<ServerConfig>>,
    snippet_support: AtomicBool,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_manager(client, Arc::new(DocumentManager::default()))
    }

    /// Creates a backend parsing documents with `parser`.
    pub fn with_parser(client: Client, parser: Arc<dyn ModuleParser>) -> Self {
        Self::with_manager(client, Arc::new(DocumentManager::new(parser)))
    }

    fn with_manager(client: Client, documents: Arc<DocumentManager>) -> Self {
        let config = ServerConfig::default();
        let sink: Arc<dyn DiagnosticsSink> = Arc::new(client.clone());
        let diagnostics =
            DiagnosticsScheduler::spawn(Arc::clone(&documents), sink, config.diagnostics.debounce());
        Self {
            client,
            documents,
            diagnostics,
            config: Arc::new(RwLock::new(config)),
            snippet_support: AtomicBool::new(false),
        }
    }

    /// Get a reference to the LSP client (primarily for testing/benchmarking).
    #[doc(hidden)]
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn documents(&self) -> &Arc<DocumentManager> {
        &self.documents
    }

    /// Handles the `ddp/ast` request.
    pub async fn ast(&self, params: AstParams) -> Result<Vec<TreeItem>> {
        guarded(AST_METHOD, handlers::handle_ast(&self.documents, params)).await
    }

    async fn schedule_diagnostics(&self, uri: Uri, delay: bool) {
        if self.config.read().await.diagnostics.enabled {
            self.diagnostics.schedule(uri, delay);
        }
    }

    fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::INCREMENTAL,
            )),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec!["\"".into(), "/".into()]),
                resolve_provider: Some(false),
                ..Default::default()
            }),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            definition_provider: Some(OneOf::Left(true)),
            rename_provider: Some(OneOf::Right(RenameOptions {
                prepare_provider: Some(true),
                work_done_progress_options: Default::default(),
            })),
            document_highlight_provider: Some(OneOf::Left(true)),
            folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
            semantic_tokens_provider: Some(
                SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
                    legend: semantic_tokens::legend(),
                    full: Some(SemanticTokensFullOptions::Bool(true)),
                    range: Some(true),
                    ..Default::default()
                }),
            ),
            ..Default::default()
        }
    }
}

/// Runs a request handler, turning a panic into an internal error of that
/// request.
async fn guarded<T>(
    method: &str,
    handler: impl Future<Output = crate::error::Result<T>>,
) -> Result<T> {
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::debug!("{} failed: {}", method, e);
            Err(e.into())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("{} handler panicked: {}", method, message);
            Err(DdplsError::Panic(message).into())
        }
    }
}

fn client_supports_snippets(params: &InitializeParams) -> bool {
    params
        .capabilities
        .text_document
        .as_ref()
        .and_then(|t| t.completion.as_ref())
        .and_then(|c| c.completion_item.as_ref())
        .and_then(|i| i.snippet_support)
        .unwrap_or(false)
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing ddpls server");

        self.snippet_support
            .store(client_supports_snippets(&params), Ordering::Relaxed);

        if let Some(init_options) = params.initialization_options {
            match serde_json::from_value::<ServerConfig>(init_options) {
                Ok(config) => {
                    tracing::debug!("loaded configuration: {:?}", config);
                    self.diagnostics.set_debounce(config.diagnostics.debounce());
                    *self.config.write().await = config;
                }
                Err(e) => tracing::warn!("ignoring invalid initialization options: {}", e),
            }
        }

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "ddpls".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("ddpls server initialized");
        self.client.log_message(MessageType::INFO, "ddpls ready").await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down ddpls server");
        self.diagnostics.shutdown();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document opened: {}", uri.as_str());

        if let Err(e) = self
            .documents
            .add_and_parse(uri.clone(), params.text_document.text)
            .await
        {
            tracing::error!("failed to parse {}: {}", uri.as_str(), e);
            self.client
                .log_message(MessageType::ERROR, format!("Parse error: {}", e))
                .await;
        }
        self.schedule_diagnostics(uri, false).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Err(e) = self.documents.apply_changes(&uri, params.content_changes) {
            tracing::warn!("dropping change: {}", e);
            return;
        }
        self.schedule_diagnostics(uri, true).await;
    }

    async fn did_save(&self, _: DidSaveTextDocumentParams) {}

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {}", uri.as_str());

        self.documents.delete(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        // Clone config before the handler runs to release the lock early
        let completion_config = { self.config.read().await.completion.clone() };
        let snippets =
            completion_config.snippets_enabled(self.snippet_support.load(Ordering::Relaxed));

        guarded(
            "completion",
            handlers::handle_completion(&self.documents, params, &completion_config, snippets),
        )
        .await
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        guarded("hover", handlers::handle_hover(&self.documents, params)).await
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        guarded("definition", handlers::handle_definition(&self.documents, params)).await
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        guarded(
            "prepareRename",
            handlers::handle_prepare_rename(&self.documents, params),
        )
        .await
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        guarded("rename", handlers::handle_rename(&self.documents, params)).await
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        guarded(
            "documentHighlight",
            handlers::handle_document_highlight(&self.documents, params),
        )
        .await
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        guarded(
            "foldingRange",
            handlers::handle_folding_range(&self.documents, params),
        )
        .await
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        guarded(
            "semanticTokens/full",
            handlers::handle_semantic_tokens_full(&self.documents, params),
        )
        .await
    }

    async fn semantic_tokens_range(
        &self,
        params: SemanticTokensRangeParams,
    ) -> Result<Option<SemanticTokensRangeResult>> {
        guarded(
            "semanticTokens/range",
            handlers::handle_semantic_tokens_range(&self.documents, params),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{PanickingParser, find, full_change, position_params, test_uri};
    use std::time::Duration;
    use tower_lsp_server::LspService;
    use tower_lsp_server::jsonrpc::ErrorCode;
    use tower_lsp_server::ls_types::{
        ClientCapabilities, CompletionClientCapabilities, CompletionItemCapability,
        HoverContents, TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentItem,
        VersionedTextDocumentIdentifier,
    };

    fn open_params(name: &str, text: &str) -> DidOpenTextDocumentParams {
        DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: test_uri(name),
                language_id: "ddp".into(),
                version: 1,
                text: text.into(),
            },
        }
    }

    #[test]
    fn test_server_capabilities() {
        let caps = Backend::server_capabilities();

        assert!(caps.completion_provider.is_some());
        assert!(caps.hover_provider.is_some());
        assert_eq!(caps.definition_provider, Some(OneOf::Left(true)));
        assert_eq!(caps.document_highlight_provider, Some(OneOf::Left(true)));
        assert!(caps.folding_range_provider.is_some());

        match caps.rename_provider {
            Some(OneOf::Right(options)) => assert_eq!(options.prepare_provider, Some(true)),
            other => panic!("Expected rename options, got {other:?}"),
        }
    }

    #[test]
    fn test_server_capabilities_text_document_sync() {
        let caps = Backend::server_capabilities();

        match caps.text_document_sync {
            Some(TextDocumentSyncCapability::Kind(kind)) => {
                assert_eq!(kind, TextDocumentSyncKind::INCREMENTAL);
            }
            _ => panic!("Expected text document sync kind to be INCREMENTAL"),
        }
    }

    #[test]
    fn test_server_capabilities_completion_triggers() {
        let caps = Backend::server_capabilities();

        let completion = caps
            .completion_provider
            .expect("completion provider should exist");
        let triggers = completion
            .trigger_characters
            .expect("trigger characters should exist");

        assert_eq!(triggers, ["\"", "/"]);
        assert!(!completion.resolve_provider.unwrap());
    }

    #[test]
    fn test_server_capabilities_semantic_tokens() {
        let caps = Backend::server_capabilities();

        match caps.semantic_tokens_provider {
            Some(SemanticTokensServerCapabilities::SemanticTokensOptions(opts)) => {
                assert_eq!(opts.legend, semantic_tokens::legend());
                assert_eq!(opts.full, Some(SemanticTokensFullOptions::Bool(true)));
                assert_eq!(opts.range, Some(true));
            }
            _ => panic!("Expected semantic tokens options"),
        }
    }

    #[test]
    fn test_snippet_support_detection() {
        let mut params = InitializeParams::default();
        assert!(!client_supports_snippets(&params));

        params.capabilities = ClientCapabilities {
            text_document: Some(TextDocumentClientCapabilities {
                completion: Some(CompletionClientCapabilities {
                    completion_item: Some(CompletionItemCapability {
                        snippet_support: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(client_supports_snippets(&params));
    }

    #[tokio::test]
    async fn test_backend_state_initialization() {
        let (service, _socket) = LspService::build(Backend::new).finish();
        let backend = service.inner();

        assert!(backend.documents().is_empty());
        assert!(backend.diagnostics.is_running());
        assert!(backend.config.read().await.diagnostics.enabled);
    }

    #[tokio::test]
    async fn test_initialize_reads_options() {
        let (service, _socket) = LspService::build(Backend::new).finish();
        let backend = service.inner();

        let params = InitializeParams {
            initialization_options: Some(serde_json::json!({
                "diagnostics": { "debounce_ms": 50 },
                "completion": { "keywords": false }
            })),
            ..Default::default()
        };
        let result = backend.initialize(params).await.unwrap();

        assert_eq!(result.server_info.unwrap().name, "ddpls");
        assert_eq!(backend.diagnostics.debounce(), Duration::from_millis(50));
        assert!(!backend.config.read().await.completion.keywords);
    }

    #[tokio::test]
    async fn test_initialize_ignores_invalid_options() {
        let (service, _socket) = LspService::build(Backend::new).finish();
        let backend = service.inner();

        let params = InitializeParams {
            initialization_options: Some(serde_json::json!({ "diagnostics": 3 })),
            ..Default::default()
        };
        assert!(backend.initialize(params).await.is_ok());
        assert_eq!(backend.diagnostics.debounce(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let (service, _socket) = LspService::build(Backend::new).finish();
        let backend = service.inner();
        let src = "var answer = 42;\n";
        let uri = test_uri("main.ddp");

        backend.did_open(open_params("main.ddp", src)).await;
        assert_eq!(backend.documents().len(), 1);

        let hover = backend
            .hover(HoverParams {
                text_document_position_params: position_params(&uri, find(src, "answer")),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap()
            .unwrap();
        let HoverContents::Markup(markup) = hover.contents else {
            panic!("expected markdown hover");
        };
        assert!(markup.value.contains("var answer: int"));

        backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version: 2,
                },
                content_changes: vec![full_change("var renamed = 1;\n")],
            })
            .await;
        let doc = backend.documents().get(&uri).await.unwrap();
        assert_eq!(doc.content(), "var renamed = 1;\n");

        backend
            .did_close(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
            })
            .await;
        assert!(backend.documents().is_empty());

        let error = backend
            .ast(AstParams { path: uri, range: None })
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn test_change_to_unknown_document_is_dropped() {
        let (service, _socket) = LspService::build(Backend::new).finish();
        let backend = service.inner();

        backend
            .did_change(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: test_uri("nowhere.ddp"),
                    version: 2,
                },
                content_changes: vec![full_change("var x = 1;")],
            })
            .await;
        assert!(backend.documents().is_empty());
    }

    #[tokio::test]
    async fn test_failing_parse_becomes_request_error() {
        let (service, _socket) = LspService::build(|client| {
            Backend::with_parser(client, Arc::new(PanickingParser))
        })
        .finish();
        let backend = service.inner();

        backend.did_open(open_params("main.ddp", "var x = 1;")).await;
        let error = backend
            .hover(HoverParams {
                text_document_position_params: position_params(
                    &test_uri("main.ddp"),
                    Default::default(),
                ),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::InternalError);
    }

    async fn explode() -> crate::error::Result<()> {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_guarded_converts_panics() {
        let error = guarded("test", explode()).await.unwrap_err();
        assert_eq!(error.code, ErrorCode::InternalError);
        assert!(error.message.contains("handler exploded"));

        let result = guarded("test", async { Ok::<_, DdplsError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}


