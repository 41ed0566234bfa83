//! Applying client edits to document text.
//!
//! LSP positions are 0-based lines and UTF-16 columns. Positions past the
//! end of a line clamp to the line end, positions past the last line clamp
//! to the end of the text.

use tower_lsp_server::ls_types::{Position, TextDocumentContentChangeEvent};

/// Byte offset of `pos` in `text`.
pub fn offset_at(text: &str, pos: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..pos.line {
        match text[line_start..].find('\n') {
            Some(newline) => line_start += newline + 1,
            None => return text.len(),
        }
    }

    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);
    let line = text[line_start..line_end].trim_end_matches('\r');

    let mut units = 0;
    for (index, ch) in line.char_indices() {
        if units >= pos.character as usize {
            return line_start + index;
        }
        units += ch.len_utf16();
    }
    line_start + line.len()
}

/// Applies a single content change in place.
pub fn apply_change(text: &mut String, change: TextDocumentContentChangeEvent) {
    match change.range {
        Some(range) => {
            let start = offset_at(text, range.start);
            let end = offset_at(text, range.end).max(start);
            text.replace_range(start..end, &change.text);
        }
        None => *text = change.text,
    }
}
