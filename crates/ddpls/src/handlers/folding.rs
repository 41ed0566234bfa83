//! Folding range handler.

use ddp_syntax::{Alias, Node, Range, VisitResult, Visitor, walk_module};
use tower_lsp_server::ls_types::{FoldingRange, FoldingRangeKind, FoldingRangeParams};

use crate::document::DocumentManager;
use crate::error::Result;

/// Handles `textDocument/foldingRange`.
///
/// Folds multi-line blocks, struct field lists, alias lists spanning
/// several lines and runs of consecutive imports.
pub async fn handle_folding_range(
    manager: &DocumentManager,
    params: FoldingRangeParams,
) -> Result<Option<Vec<FoldingRange>>> {
    let (_, analysis) = manager.snapshot(&params.text_document.uri).await?;

    let mut collector = FoldingCollector::default();
    walk_module(&analysis.module, &mut collector);
    Ok(Some(collector.finish()))
}

#[derive(Default)]
struct FoldingCollector {
    ranges: Vec<FoldingRange>,
    imports: Vec<Range>,
}

impl FoldingCollector {
    /// Adds a fold over the 1-based lines `start..=end`.
    fn fold(&mut self, start: u32, end: u32, kind: Option<FoldingRangeKind>) {
        if end <= start {
            return;
        }
        self.ranges.push(FoldingRange {
            start_line: start - 1,
            end_line: end - 1,
            kind,
            ..Default::default()
        });
    }

    fn aliases(&mut self, aliases: &[Alias]) {
        if let (Some(first), Some(last)) = (aliases.first(), aliases.last()) {
            self.fold(first.range.start.line, last.range.end.line, None);
        }
    }

    fn finish(mut self) -> Vec<FoldingRange> {
        let mut run: Option<(u32, u32)> = None;
        let imports = std::mem::take(&mut self.imports);
        for range in imports {
            run = match run {
                Some((start, end)) if range.start.line <= end + 1 => Some((start, range.end.line)),
                Some((start, end)) => {
                    self.fold(start, end, Some(FoldingRangeKind::Imports));
                    Some((range.start.line, range.end.line))
                }
                None => Some((range.start.line, range.end.line)),
            };
        }
        if let Some((start, end)) = run {
            self.fold(start, end, Some(FoldingRangeKind::Imports));
        }
        self.ranges
            .sort_by_key(|r| (r.start_line, std::cmp::Reverse(r.end_line)));
        self.ranges
    }
}

impl<'a> Visitor<'a> for FoldingCollector {
    fn visit(&mut self, node: Node<'a>) -> VisitResult {
        match node {
            Node::Import(import) => self.imports.push(import.range),
            Node::Block(block) => self.fold(block.range.start.line, block.range.end.line, None),
            Node::FuncDecl(func) => self.aliases(func.decl.aliases()),
            Node::StructDecl(structure) => {
                if let Some(last) = structure.fields.last() {
                    self.fold(structure.range.start.line, last.range.end.line, None);
                }
                self.aliases(structure.decl.aliases());
            }
            _ => {}
        }
        VisitResult::Recurse
    }
}
