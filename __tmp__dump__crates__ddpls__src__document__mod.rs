//! Open documents and their analyses.
//!
//! - [`DocumentState`] holds the text of one document and its latest parse
//! - [`DocumentManager`] tracks all open documents and reparses them lazily
//! - [`SingleFlight`] collapses concurrent reparses of one document

mod manager;
mod single_flight;
mod state;
mod text;

pub use manager::DocumentManager;
pub use single_flight::SingleFlight;
pub use state::{Analysis, DocumentState, path_to_uri, uri_to_path};
pub use text::{apply_change, offset_at};


