use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::Uri;

use super::{DiagnosticEvent, DiagnosticsSink, flush};
use crate::document::DocumentManager;
use crate::error::panic_message;

/// Handle to the diagnostics actor.
///
/// The actor is a single task holding at most one pending document and a
/// one-shot timer. A delayed event makes its document pending and restarts
/// the timer, so a burst of edits to one document is published once, after
/// the last edit. An event for another document first publishes the pending
/// one, and an undelayed event is published right away.
///
/// Dropping every handle, or calling [`DiagnosticsScheduler::shutdown`],
/// stops the actor. A pending document is not published then.
#[derive(Clone)]
pub struct DiagnosticsScheduler {
    tx: mpsc::UnboundedSender<DiagnosticEvent>,
    cancel: CancellationToken,
    debounce_ms: Arc<AtomicU64>,
}

impl DiagnosticsScheduler {
    /// Starts the actor on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn spawn(
        manager: Arc<DocumentManager>,
        sink: Arc<dyn DiagnosticsSink>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let debounce_ms = Arc::new(AtomicU64::new(debounce.as_millis() as u64));

        let actor = Actor {
            manager,
            sink,
            debounce_ms: Arc::clone(&debounce_ms),
        };
        tokio::spawn(actor.run(rx, cancel.clone()));

        Self {
            tx,
            cancel,
            debounce_ms,
        }
    }

    /// Queues a publish for `uri`, after the debounce window if `delay`.
    pub fn schedule(&self, uri: Uri, delay: bool) {
        if self.tx.send(DiagnosticEvent { uri, delay }).is_err() {
            tracing::debug!("diagnostics scheduler is stopped, dropping event");
        }
    }

    /// Changes the debounce window for events queued from now on.
    pub fn set_debounce(&self, debounce: Duration) {
        self.debounce_ms
            .store(debounce.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.load(Ordering::Relaxed))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }
}

struct Actor {
    manager: Arc<DocumentManager>,
    sink: Arc<dyn DiagnosticsSink>,
    debounce_ms: Arc<AtomicU64>,
}

impl Actor {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<DiagnosticEvent>,
        cancel: CancellationToken,
    ) {
        let mut pending: Option<Uri> = None;
        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);
        let mut armed = false;

        tracing::debug!("diagnostics scheduler started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    if let Some(previous) = pending.take_if(|p| *p != event.uri) {
                        self.publish(previous).await;
                    }
                    if event.delay {
                        pending = Some(event.uri);
                        let window = self.debounce_ms.load(Ordering::Relaxed);
                        timer
                            .as_mut()
                            .reset(Instant::now() + Duration::from_millis(window));
                        armed = true;
                    } else {
                        pending = None;
                        armed = false;
                        self.publish(event.uri).await;
                    }
                }
                () = &mut timer, if armed => {
                    armed = false;
                    if let Some(uri) = pending.take() {
                        self.publish(uri).await;
                    }
                }
            }
        }
        tracing::debug!("diagnostics scheduler stopped");
    }

    /// Runs one publish cycle. A panic drops the cycle.
    async fn publish(&self, uri: Uri) {
        let cycle = flush(&self.manager, self.sink.as_ref(), &uri);
        if let Err(payload) = AssertUnwindSafe(cycle).catch_unwind().await {
            tracing::error!(
                "diagnostics for {} dropped after panic: {}",
                uri.as_str(),
                panic_message(payload.as_ref())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{RecordingSink, full_change, test_uri};
    use tower_lsp_server::ls_types::Diagnostic;

    async fn setup(
        debounce: Duration,
    ) -> (Arc<DocumentManager>, Arc<RecordingSink>, DiagnosticsScheduler) {
        let manager = Arc::new(DocumentManager::default());
        let sink = Arc::new(RecordingSink::default());
        let scheduler = DiagnosticsScheduler::spawn(Arc::clone(&manager), sink.clone(), debounce);
        (manager, sink, scheduler)
    }

    #[tokio::test]
    async fn test_burst_of_edits_publishes_once_with_latest_content() {
        let (manager, sink, scheduler) = setup(Duration::from_millis(100)).await;
        let uri = test_uri("main.ddp");
        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();

        scheduler.schedule(uri.clone(), true);
        manager
            .apply_changes(&uri, vec![full_change("var x = y;")])
            .unwrap();
        scheduler.schedule(uri.clone(), true);

        let published = sink.wait_for(1, Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(sink.published().len(), 1);
        let (published_uri, diagnostics) = &published[0];
        assert_eq!(published_uri, &uri);
        assert_eq!(diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_event_for_other_document_flushes_pending_first() {
        let (manager, sink, scheduler) = setup(Duration::from_secs(5)).await;
        let a = test_uri("a.ddp");
        let b = test_uri("b.ddp");
        manager.add_and_parse(a.clone(), "var a = 1;".into()).await.unwrap();
        manager.add_and_parse(b.clone(), "var b = 2;".into()).await.unwrap();

        scheduler.schedule(a.clone(), true);
        scheduler.schedule(b.clone(), false);

        let published = sink.wait_for(2, Duration::from_secs(2)).await;
        let uris: Vec<Uri> = published.into_iter().map(|(uri, _)| uri).collect();
        assert_eq!(uris, [a, b]);
    }

    #[tokio::test]
    async fn test_undelayed_event_replaces_pending_for_same_document() {
        let (manager, sink, scheduler) = setup(Duration::from_millis(100)).await;
        let uri = test_uri("main.ddp");
        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();

        scheduler.schedule(uri.clone(), true);
        scheduler.schedule(uri.clone(), false);

        sink.wait_for(1, Duration::from_secs(2)).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_publishing() {
        let (manager, sink, scheduler) = setup(Duration::from_millis(10)).await;
        let uri = test_uri("main.ddp");
        manager.add_and_parse(uri.clone(), "var x = 1;".into()).await.unwrap();

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.schedule(uri, false);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!scheduler.is_running());
        assert!(sink.published().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_flush_keeps_actor_alive() {
        struct PanicOnce {
            inner: RecordingSink,
            armed: std::sync::atomic::AtomicBool,
        }

        #[async_trait::async_trait]
        impl DiagnosticsSink for PanicOnce {
            async fn publish(&self, uri: Uri, diagnostics: Vec<Diagnostic>) {
                if self.armed.swap(false, Ordering::SeqCst) {
                    panic!("sink failure");
                }
                self.inner.publish(uri, diagnostics).await;
            }
        }

        let manager = Arc::new(DocumentManager::default());
        let sink = Arc::new(PanicOnce {
            inner: RecordingSink::default(),
            armed: std::sync::atomic::AtomicBool::new(true),
        });
        let scheduler = DiagnosticsScheduler::spawn(
            Arc::clone(&manager),
            sink.clone(),
            Duration::from_millis(10),
        );
        let a = test_uri("a.ddp");
        let b = test_uri("b.ddp");
        manager.add_and_parse(a.clone(), "var a = 1;".into()).await.unwrap();
        manager.add_and_parse(b.clone(), "var b = 1;".into()).await.unwrap();

        scheduler.schedule(a, false);
        scheduler.schedule(b.clone(), false);

        let published = sink.inner.wait_for(1, Duration::from_secs(2)).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, b);
        assert!(scheduler.is_running());
    }

    #[tokio::test]
    async fn test_debounce_can_be_changed() {
        let (_manager, _sink, scheduler) = setup(Duration::from_millis(500)).await;
        assert_eq!(scheduler.debounce(), Duration::from_millis(500));
        scheduler.set_debounce(Duration::from_millis(20));
        assert_eq!(scheduler.debounce(), Duration::from_millis(20));
    }
}
