//! Test utilities: parsers with side effects, a recording diagnostics sink
//! and shortcuts for building LSP parameters.

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::diagnostics::DiagnosticsSink;
    use crate::document::DocumentManager;
    use crate::server::Backend;
    use async_trait::async_trait;
    use ddp_syntax::{DdpParser, Module, ModuleParser, ParseError, ParseRequest, SyntaxError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower_lsp_server::Client;
    use tower_lsp_server::ls_types::{
        Diagnostic, Position, TextDocumentContentChangeEvent, TextDocumentIdentifier,
        TextDocumentPositionParams, Uri,
    };

    /// Creates a client handle for handler tests. Nothing is listening on
    /// the other end.
    pub fn create_test_client() -> Client {
        let (service, _socket) = tower_lsp_server::LspService::build(Backend::new).finish();
        service.inner().client().clone()
    }

    /// Document URI under `/test`.
    pub fn test_uri(relative: &str) -> Uri {
        Uri::from_file_path(format!("/test/{relative}")).unwrap()
    }

    pub fn full_change(text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.into(),
        }
    }

    /// Opens `source` as `/test/<name>` and returns its URI.
    pub async fn open(manager: &DocumentManager, name: &str, source: &str) -> Uri {
        let uri = test_uri(name);
        manager
            .add_and_parse(uri.clone(), source.into())
            .await
            .unwrap();
        uri
    }

    /// 0-based LSP position of the `nth` occurrence of `needle` in `source`,
    /// shifted by `offset` characters.
    pub fn find_nth(source: &str, needle: &str, nth: usize, offset: u32) -> Position {
        let byte = source
            .match_indices(needle)
            .nth(nth)
            .map(|(i, _)| i)
            .unwrap_or_else(|| panic!("{needle:?} occurs less than {} times", nth + 1));
        let before = &source[..byte];
        let line = before.matches('\n').count() as u32;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let character = source[line_start..byte].encode_utf16().count() as u32;
        Position::new(line, character + offset)
    }

    /// Position of the first occurrence of `needle`.
    pub fn find(source: &str, needle: &str) -> Position {
        find_nth(source, needle, 0, 0)
    }

    pub fn position_params(uri: &Uri, position: Position) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position,
        }
    }

    /// Delegates to [`DdpParser`] after sleeping, counting invocations.
    pub struct CountingParser {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingParser {
        pub fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModuleParser for CountingParser {
        fn parse(
            &self,
            request: ParseRequest,
            errors: &mut dyn FnMut(ParseError),
        ) -> Result<Module, SyntaxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            DdpParser::new().parse(request, errors)
        }
    }

    /// Parser that always panics.
    pub struct PanickingParser;

    impl ModuleParser for PanickingParser {
        fn parse(
            &self,
            _request: ParseRequest,
            _errors: &mut dyn FnMut(ParseError),
        ) -> Result<Module, SyntaxError> {
            panic!("parser exploded");
        }
    }

    /// Sink remembering every publish in order.
    #[derive(Default)]
    pub struct RecordingSink {
        published: parking_lot::Mutex<Vec<(Uri, Vec<Diagnostic>)>>,
    }

    impl RecordingSink {
        pub fn published(&self) -> Vec<(Uri, Vec<Diagnostic>)> {
            self.published.lock().clone()
        }

        /// Waits until at least `count` publishes happened or `timeout`
        /// passed, and returns what was published.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<(Uri, Vec<Diagnostic>)> {
            let deadline = tokio::time::Instant::now() + timeout;
            while self.published.lock().len() < count && tokio::time::Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.published()
        }
    }

    #[async_trait]
    impl DiagnosticsSink for RecordingSink {
        async fn publish(&self, uri: Uri, diagnostics: Vec<Diagnostic>) {
            self.published.lock().push((uri, diagnostics));
        }
    }
}
