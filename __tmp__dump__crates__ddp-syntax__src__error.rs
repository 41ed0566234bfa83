use crate::position::Range;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Numeric error code attached to every [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    // Syntax errors
    pub const UNEXPECTED_TOKEN: Self = Self(1000);
    pub const UNTERMINATED_STRING: Self = Self(1001);
    pub const UNTERMINATED_COMMENT: Self = Self(1002);
    pub const ILLEGAL_CHARACTER: Self = Self(1003);
    pub const EXPECTED_EXPRESSION: Self = Self(1004);
    pub const MALFORMED_ALIAS: Self = Self(1005);
    pub const INVALID_NUMBER: Self = Self(1006);

    // Semantic errors
    pub const UNDECLARED_NAME: Self = Self(2000);
    pub const ALREADY_DECLARED: Self = Self(2001);
    pub const UNKNOWN_TYPE: Self = Self(2002);
    pub const NOT_PUBLIC: Self = Self(2003);
    pub const NOT_A_VARIABLE: Self = Self(2004);
    pub const MISPLACED_DECLARATION: Self = Self(2005);
    pub const RETURN_OUTSIDE_FUNCTION: Self = Self(2006);

    // Warnings
    pub const UNREACHABLE_CODE: Self = Self(3000);

    // Module errors
    pub const MISC_INCLUDE_ERROR: Self = Self(4000);
    pub const IMPORT_NOT_FOUND: Self = Self(4001);
    pub const IMPORT_CYCLE: Self = Self(4002);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Error,
    Warning,
}

/// A problem found while lexing, parsing or resolving a module.
///
/// Parse errors are data: they are collected alongside the (possibly
/// partial) module and never abort a parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// File the error was found in.
    pub file: PathBuf,
    pub range: Range,
    pub code: ErrorCode,
    pub level: Level,
    pub message: String,
    /// Errors this one wraps, e.g. the errors of an imported module.
    pub related: Vec<ParseError>,
}

impl ParseError {
    pub fn new(file: &Path, range: Range, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            range,
            code,
            level: Level::Error,
            message: message.into(),
            related: Vec::new(),
        }
    }

    pub fn warning(file: &Path, range: Range, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            ..Self::new(file, range, code, message)
        }
    }

    #[must_use]
    pub fn with_related(mut self, related: Vec<Self>) -> Self {
        self.related = related;
        self
    }

    pub fn is_warning(&self) -> bool {
        self.level == Level::Warning
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ({})",
            self.file.display(),
            self.range.start,
            self.message,
            self.code
        )
    }
}

/// Failures that prevent a module from being produced at all.
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("module has no file name")]
    MissingFileName,
}

pub type Result<T> = std::result::Result<T, SyntaxError>;
