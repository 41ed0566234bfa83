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
            offset_encoding: None,
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
