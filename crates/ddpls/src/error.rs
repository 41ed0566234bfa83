use std::any::Any;
use thiserror::Error;
use tower_lsp_server::jsonrpc;

/// Error types for the ddpls server.
///
/// Problems in the analysed source are never represented here: they are
/// parse errors and travel as data inside the document analysis. This enum
/// covers failures to answer a request at all.
///
/// # Examples
///
/// ```
/// use ddpls::error::{DdplsError, Result};
///
/// fn lookup(uri: &str, open: bool) -> Result<()> {
///     if !open {
///         return Err(DdplsError::DocumentNotFound(uri.into()));
///     }
///     Ok(())
/// }
///
/// assert!(lookup("file:///a.ddp", false).is_err());
/// ```
#[derive(Error, Debug)]
pub enum DdplsError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("failed to reparse {uri}: {reason}")]
    Reparse { uri: String, reason: String },

    #[error("invalid document URI: {0}")]
    InvalidUri(String),

    #[error("{0:?} is not a valid name")]
    InvalidName(String),

    #[error("syntax error: {0}")]
    Syntax(#[from] ddp_syntax::SyntaxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request handler panicked: {0}")]
    Panic(String),
}

impl DdplsError {
    pub fn document_not_found(uri: &impl ToString) -> Self {
        Self::DocumentNotFound(uri.to_string())
    }
}

/// Convenience type alias for `Result<T, DdplsError>`.
///
/// # Examples
///
/// ```
/// use ddpls::error::Result;
///
/// fn debounce_ms(raw: &str) -> Result<u64> {
///     Ok(serde_json::from_str(raw)?)
/// }
///
/// assert_eq!(debounce_ms("250").unwrap(), 250);
/// ```
pub type Result<T> = std::result::Result<T, DdplsError>;

impl From<DdplsError> for jsonrpc::Error {
    fn from(error: DdplsError) -> Self {
        match error {
            DdplsError::DocumentNotFound(_)
            | DdplsError::InvalidUri(_)
            | DdplsError::InvalidName(_) => {
                Self::invalid_params(error.to_string())
            }
            other => Self {
                code: jsonrpc::ErrorCode::InternalError,
                message: other.to_string().into(),
                data: None,
            },
        }
    }
}

/// Extracts the message of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
