//! Debounced publication of parse errors.
//!
//! Edits push [`DiagnosticEvent`]s into the [`DiagnosticsScheduler`], which
//! coalesces bursts per document and publishes through a
//! [`DiagnosticsSink`]. A publish for one document also publishes the
//! documents it imports when those contain errors.

mod flush;
mod scheduler;

pub use flush::{collect, flush};
pub use scheduler::DiagnosticsScheduler;

use async_trait::async_trait;
use tower_lsp_server::Client;
use tower_lsp_server::ls_types::{Diagnostic, Uri};

/// Request to publish diagnostics for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub uri: Uri,
    /// Wait for the debounce window before publishing.
    pub delay: bool,
}

/// Destination of published diagnostics.
#[async_trait]
pub trait DiagnosticsSink: Send + Sync {
    async fn publish(&self, uri: Uri, diagnostics: Vec<Diagnostic>);
}

#[async_trait]
impl DiagnosticsSink for Client {
    async fn publish(&self, uri: Uri, diagnostics: Vec<Diagnostic>) {
        self.publish_diagnostics(uri, diagnostics, None).await;
    }
}
