use arc_swap::ArcSwapOption;
use ddp_syntax::parser::normalize;
use ddp_syntax::{Module, ModuleId, ParseError};
use ropey::Rope;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_lsp_server::ls_types::{TextDocumentContentChangeEvent, Uri};

use super::text::apply_change;

/// Result of one parse of a document.
#[derive(Debug)]
pub struct Analysis {
    pub module: Arc<Module>,
    /// Errors reported by the parser, including those of imported files.
    pub errors: Vec<ParseError>,
    /// Text the module was parsed from.
    pub source: Arc<str>,
}

/// State of a single open document.
///
/// The text is edited in place on every change and the document is marked
/// stale. The analysis is replaced wholesale after a reparse, so a reader
/// holding an `Arc<Analysis>` never sees a half-updated tree, only a
/// possibly outdated one.
#[derive(Debug)]
pub struct DocumentState {
    /// Client-facing identifier, kept verbatim.
    pub uri: Uri,
    /// File system path the document is parsed as.
    pub path: PathBuf,
    content: parking_lot::RwLock<Rope>,
    analysis: ArcSwapOption<Analysis>,
    need_reparse: AtomicBool,
    /// Held for the duration of a reparse.
    pub(crate) parse_lock: tokio::sync::Mutex<()>,
}

impl DocumentState {
    pub fn new(uri: Uri, content: String) -> Self {
        let path = normalize(&uri_to_path(&uri));
        Self {
            uri,
            path,
            content: parking_lot::RwLock::new(Rope::from_str(&content)),
            analysis: ArcSwapOption::empty(),
            need_reparse: AtomicBool::new(true),
            parse_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Current text.
    pub fn content(&self) -> String {
        self.content.read().to_string()
    }

    pub fn apply_changes(&self, changes: Vec<TextDocumentContentChangeEvent>) {
        {
            let mut content = self.content.write();
            for change in changes {
                apply_change(&mut content, change);
            }
        }
        self.mark_stale();
    }

    /// Latest analysis, which may lag behind [`DocumentState::content`].
    pub fn analysis(&self) -> Option<Arc<Analysis>> {
        self.analysis.load_full()
    }

    pub fn module_id(&self) -> Option<ModuleId> {
        self.analysis.load().as_ref().map(|a| a.module.id)
    }

    pub fn needs_reparse(&self) -> bool {
        self.need_reparse.load(Ordering::Acquire)
    }

    pub fn mark_stale(&self) {
        self.need_reparse.store(true, Ordering::Release);
    }

    /// Clears the stale flag. Returns the text to parse; an edit arriving
    /// after this call marks the document stale again.
    pub(crate) fn begin_reparse(&self) -> Arc<str> {
        self.need_reparse.store(false, Ordering::Release);
        Arc::from(self.content.read().to_string())
    }

    pub(crate) fn install(&self, analysis: Analysis) {
        self.analysis.store(Some(Arc::new(analysis)));
    }
}

/// File system path for a document URI.
///
/// URIs without a file path (e.g. unsaved buffers) use their path
/// component, so imports resolve relative to it.
pub fn uri_to_path(uri: &Uri) -> PathBuf {
    uri.to_file_path()
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(uri.path().as_str()))
}

/// URI for a file system path.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    Uri::from_file_path(path)
}
