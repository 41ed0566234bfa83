//! One publish cycle: turning the errors of a document and everything it
//! imports into LSP diagnostics.

use ddp_syntax::ast::ImportStmt;
use ddp_syntax::{ErrorCode, Level, Module, Node, ParseError, Range, VisitResult, Visitor};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp_server::ls_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, NumberOrString, Uri,
};

use super::DiagnosticsSink;
use crate::document::{DocumentManager, path_to_uri};
use crate::error::DdplsError;
use crate::query::to_lsp_range;

const SOURCE: &str = "ddp";

/// Diagnostics of one file plus the imported files that contain errors.
#[derive(Debug, Default)]
pub struct Collected {
    pub diagnostics: Vec<Diagnostic>,
    /// Errors of imported files, by file.
    pub foreign: BTreeMap<PathBuf, Vec<ParseError>>,
}

/// A file waiting to be published.
struct Pending {
    uri: Uri,
    /// Parsed module and errors of a file that is not open.
    imported: Option<(Option<Arc<Module>>, Vec<ParseError>)>,
}

/// Publishes diagnostics for `uri` and, recursively, for every imported
/// file that contains errors.
///
/// Each file is published at most once per cycle, which also ends the
/// recursion on import cycles. A document closed before the cycle ran is
/// skipped.
pub async fn flush(manager: &DocumentManager, sink: &dyn DiagnosticsSink, uri: &Uri) {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([Pending {
        uri: uri.clone(),
        imported: None,
    }]);

    while let Some(next) = queue.pop_front() {
        if !visited.insert(next.uri.clone()) {
            continue;
        }

        let (module, errors) = match next.imported {
            Some(imported) => imported,
            None => match manager.snapshot(&next.uri).await {
                Ok((_, analysis)) => (Some(Arc::clone(&analysis.module)), analysis.errors.clone()),
                Err(DdplsError::DocumentNotFound(_)) => {
                    tracing::debug!(
                        "{} was closed before its diagnostics were published",
                        next.uri.as_str()
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!("skipping diagnostics for {}: {}", next.uri.as_str(), e);
                    continue;
                }
            },
        };

        let file = match &module {
            Some(module) => module.file_name.clone(),
            None => match errors.first() {
                Some(error) => error.file.clone(),
                None => continue,
            },
        };
        let collected = collect(manager, module.as_deref(), &file, &errors);

        for (path, foreign_errors) in collected.foreign {
            let pending = match manager.find_by_path(&path) {
                Some(doc) => Pending {
                    uri: doc.uri.clone(),
                    imported: None,
                },
                None => {
                    let Some(uri) = path_to_uri(&path) else {
                        continue;
                    };
                    let imported = module.as_ref().and_then(|m| m.find_imported(&path));
                    let errors = match &imported {
                        Some(imported) => imported.errors.clone(),
                        None => foreign_errors,
                    };
                    Pending {
                        uri,
                        imported: Some((imported, errors)),
                    }
                }
            };
            queue.push_back(pending);
        }

        tracing::debug!(
            "publishing {} diagnostics for {}",
            collected.diagnostics.len(),
            next.uri.as_str()
        );
        sink.publish(next.uri, collected.diagnostics).await;
    }
}

/// Builds the diagnostics of `file` from the errors reported while parsing
/// it and the error nodes of its tree.
///
/// Errors of imported files are not shown at their own position. They are
/// summarized by one diagnostic on the import through which they are
/// reached, and returned in [`Collected::foreign`].
pub fn collect(
    manager: &DocumentManager,
    module: Option<&Module>,
    file: &Path,
    errors: &[ParseError],
) -> Collected {
    let mut all: Vec<ParseError> = errors.to_vec();
    if let Some(module) = module {
        let mut bad = BadNodes::default();
        ddp_syntax::walk_module(module, &mut bad);
        all.extend(bad.errors);
    }

    let mut seen = HashSet::new();
    all.retain(|e| seen.insert((e.file.clone(), e.range, e.code)));

    let mut collected = Collected::default();
    let mut per_import: BTreeMap<usize, Vec<ParseError>> = BTreeMap::new();
    let imports: Vec<&ImportStmt> = module.map(|m| m.imports().collect()).unwrap_or_default();

    for error in all {
        if error.file == file {
            collected.diagnostics.push(to_diagnostic(manager, &error));
            continue;
        }
        match imports.iter().position(|import| reaches(import, &error.file)) {
            Some(index) => per_import.entry(index).or_default().push(error.clone()),
            None => tracing::debug!(
                "no import of {} reaches {}",
                file.display(),
                error.file.display()
            ),
        }
        collected
            .foreign
            .entry(error.file.clone())
            .or_default()
            .push(error);
    }

    for (index, errors) in per_import {
        let import = imports[index];
        collected
            .diagnostics
            .push(import_diagnostic(manager, import, &errors));
    }
    collected
}

fn reaches(import: &ImportStmt, file: &Path) -> bool {
    import.resolved_path == file || import.module.as_ref().is_some_and(|m| m.reaches(file))
}

fn severity(level: Level) -> DiagnosticSeverity {
    match level {
        Level::Error => DiagnosticSeverity::ERROR,
        Level::Warning => DiagnosticSeverity::WARNING,
    }
}

fn location(manager: &DocumentManager, file: &Path, range: Range) -> Option<Location> {
    let uri = match manager.find_by_path(file) {
        Some(doc) => doc.uri.clone(),
        None => path_to_uri(file)?,
    };
    Some(Location::new(uri, to_lsp_range(range)))
}

fn related(
    manager: &DocumentManager,
    errors: &[ParseError],
) -> Option<Vec<DiagnosticRelatedInformation>> {
    let info: Vec<_> = errors
        .iter()
        .filter_map(|e| {
            Some(DiagnosticRelatedInformation {
                location: location(manager, &e.file, e.range)?,
                message: format!("{} ({})", e.message, e.code),
            })
        })
        .collect();
    (!info.is_empty()).then_some(info)
}

fn to_diagnostic(manager: &DocumentManager, error: &ParseError) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(error.range),
        severity: Some(severity(error.level)),
        code: Some(NumberOrString::Number(error.code.0 as i32)),
        source: Some(SOURCE.into()),
        message: format!("{} ({})", error.message, error.code),
        related_information: related(manager, &error.related),
        ..Default::default()
    }
}

fn import_diagnostic(
    manager: &DocumentManager,
    import: &ImportStmt,
    errors: &[ParseError],
) -> Diagnostic {
    let level = if errors.iter().all(ParseError::is_warning) {
        Level::Warning
    } else {
        Level::Error
    };
    Diagnostic {
        range: to_lsp_range(import.range),
        severity: Some(severity(level)),
        code: Some(NumberOrString::Number(ErrorCode::MISC_INCLUDE_ERROR.0 as i32)),
        source: Some(SOURCE.into()),
        message: format!(
            "imported module \"{}\" contains errors ({})",
            import.path.value,
            ErrorCode::MISC_INCLUDE_ERROR
        ),
        related_information: related(manager, errors),
        ..Default::default()
    }
}

/// Errors carried by placeholder nodes.
#[derive(Default)]
struct BadNodes {
    errors: Vec<ParseError>,
}

impl<'a> Visitor<'a> for BadNodes {
    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        match node {
            Node::BadStmt(bad) => self.errors.push(bad.error.clone()),
            Node::BadExpr(bad) => self.errors.push(bad.error.clone()),
            _ => {}
        }
        VisitResult::Recurse
    }
}
