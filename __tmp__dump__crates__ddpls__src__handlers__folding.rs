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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::open;
    use tower_lsp_server::ls_types::TextDocumentIdentifier;

    async fn folds(src: &str) -> Vec<(u32, u32, Option<FoldingRangeKind>)> {
        let manager = DocumentManager::default();
        let uri = open(&manager, "main.ddp", src).await;
        let params = FoldingRangeParams {
            text_document: TextDocumentIdentifier { uri },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        };
        handle_folding_range(&manager, params)
            .await
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|r| (r.start_line, r.end_line, r.kind))
            .collect()
    }

    #[tokio::test]
    async fn test_multiline_blocks_fold() {
        let src = "var x = 1;\n\
                   if x > 0 {\n\
                   \x20 x = 2;\n\
                   } else {\n\
                   \x20 x = 3;\n\
                   }\n\
                   while x < 0 { x = x + 1; }\n";
        assert_eq!(folds(src).await, [(1, 3, None), (3, 5, None)]);
    }

    #[tokio::test]
    async fn test_struct_fields_and_alias_lists_fold() {
        let src = "struct Point {\n\
                   \x20 x: int,\n\
                   \x20 y: int\n\
                   } alias \"point <x> <y>\";\n\
                   func f(n: int): int alias\n\
                   \x20 \"f <n>\",\n\
                   \x20 \"eff <n>\";\n";
        assert_eq!(folds(src).await, [(0, 2, None), (5, 6, None)]);
    }

    #[tokio::test]
    async fn test_consecutive_imports_fold_together() {
        let src = "import \"a.ddp\";\n\
                   import \"b.ddp\";\n\
                   import \"c.ddp\";\n\
                   \n\
                   \n\
                   import \"d.ddp\";\n\
                   var x = 1;\n";
        assert_eq!(folds(src).await, [(0, 2, Some(FoldingRangeKind::Imports))]);
    }
}


