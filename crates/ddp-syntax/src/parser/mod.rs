//! Module parsing.
//!
//! [`ModuleParser`] is the seam consumers depend on. [`DdpParser`] is the
//! reference implementation for the language described in the crate docs.

mod alias;
mod expr;
mod stmt;

use crate::error::{ErrorCode, ParseError, Result, SyntaxError};
use crate::module::Module;
use crate::position::Range;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub(crate) use stmt::Parser;

/// Input of a single parse.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub file_name: PathBuf,
    pub source: Arc<str>,
    /// Already parsed modules by file path. Imports of these paths reuse the
    /// given module instead of reading the file from disk.
    pub modules: HashMap<PathBuf, Arc<Module>>,
}

impl ParseRequest {
    pub fn new(
        file_name: impl Into<PathBuf>,
        source: impl Into<Arc<str>>,
        modules: HashMap<PathBuf, Arc<Module>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
            modules,
        }
    }
}

/// Turns source text into a [`Module`].
///
/// Problems in the source are reported through `errors` and never make the
/// parse fail; the returned module then contains placeholder nodes where
/// parsing failed. An `Err` means no module could be produced at all.
///
/// # Examples
///
/// ```
/// use ddp_syntax::{DdpParser, ModuleParser, ParseRequest};
/// use std::collections::HashMap;
///
/// let mut errors = Vec::new();
/// let request = ParseRequest::new("/src/main.ddp", "var x = y;", HashMap::new());
/// let module = DdpParser::new()
///     .parse(request, &mut |e| errors.push(e))
///     .unwrap();
///
/// assert_eq!(module.statements.len(), 1);
/// assert_eq!(errors.len(), 1);
/// ```
pub trait ModuleParser: Send + Sync {
    fn parse(&self, request: ParseRequest, errors: &mut dyn FnMut(ParseError)) -> Result<Module>;
}

/// Reference parser for `.ddp` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DdpParser;

impl DdpParser {
    pub const fn new() -> Self {
        Self
    }
}

impl ModuleParser for DdpParser {
    fn parse(&self, request: ParseRequest, errors: &mut dyn FnMut(ParseError)) -> Result<Module> {
        if request.file_name.as_os_str().is_empty() {
            return Err(SyntaxError::MissingFileName);
        }
        let file_name = normalize(&request.file_name);
        let mut session = Session {
            context: &request.modules,
            loaded: HashMap::new(),
            in_progress: Vec::new(),
            sink: errors,
        };
        Ok(session.parse_file(&file_name, &request.source))
    }
}

/// State shared by the parse of a file and all files it imports.
pub(crate) struct Session<'a> {
    context: &'a HashMap<PathBuf, Arc<Module>>,
    /// Modules read from disk during this session.
    loaded: HashMap<PathBuf, Arc<Module>>,
    in_progress: Vec<PathBuf>,
    sink: &'a mut dyn FnMut(ParseError),
}

impl Session<'_> {
    pub(crate) fn parse_file(&mut self, file: &Path, source: &str) -> Module {
        self.in_progress.push(file.to_path_buf());
        let module = Parser::new(self, file, source).parse_module();
        self.in_progress.pop();
        module
    }

    pub(crate) fn report(&mut self, error: ParseError) {
        (self.sink)(error);
    }

    /// Resolves an import of `path`, reached from `from` at `range`.
    ///
    /// Errors of a module taken from the context are reported again, so a
    /// parse always reports every error of everything it imports.
    pub(crate) fn import(
        &mut self,
        from: &Path,
        path: &Path,
        range: Range,
    ) -> std::result::Result<Arc<Module>, ParseError> {
        if let Some(module) = self.context.get(path) {
            for error in &module.errors {
                self.report(error.clone());
            }
            return Ok(Arc::clone(module));
        }
        if let Some(module) = self.loaded.get(path) {
            return Ok(Arc::clone(module));
        }
        if self.in_progress.iter().any(|p| p == path) {
            return Err(ParseError::new(
                from,
                range,
                ErrorCode::IMPORT_CYCLE,
                format!("import of '{}' forms a cycle", path.display()),
            ));
        }

        let source = read_source(path).map_err(|e| {
            ParseError::new(from, range, ErrorCode::IMPORT_NOT_FOUND, e.to_string())
        })?;
        tracing::debug!("parsing imported module {}", path.display());
        let module = Arc::new(self.parse_file(path, &source));
        self.loaded.insert(path.to_path_buf(), Arc::clone(&module));
        Ok(module)
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| SyntaxError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves an import path against the directory of the importing file.
/// A missing extension defaults to `.ddp`.
pub fn resolve_import_path(dir: &Path, raw: &str) -> PathBuf {
    let mut path = PathBuf::from(raw);
    if path.extension().is_none() {
        path.set_extension("ddp");
    }
    normalize(&dir.join(path))
}

/// Lexically removes `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
