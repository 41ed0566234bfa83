//! Applying client edits to document text.
//!
//! LSP positions are 0-based lines and UTF-16 columns. Positions past the
//! end of a line clamp to the line end, positions past the last line clamp
//! to the end of the text.

use ropey::Rope;
use tower_lsp_server::ls_types::{Position, TextDocumentContentChangeEvent};

/// Char index of `pos` in `text`.
pub fn char_at(text: &Rope, pos: Position) -> usize {
    let line_idx = pos.line as usize;
    if line_idx >= text.len_lines() {
        return text.len_chars();
    }
    let line = text.line(line_idx);

    let mut content_len = line.len_chars();
    while content_len > 0 && matches!(line.char(content_len - 1), '\n' | '\r') {
        content_len -= 1;
    }
    let units = (pos.character as usize).min(line.char_to_utf16_cu(content_len));
    text.line_to_char(line_idx) + line.utf16_cu_to_char(units)
}

/// Applies a single content change in place.
pub fn apply_change(text: &mut Rope, change: TextDocumentContentChangeEvent) {
    match change.range {
        Some(range) => {
            let start = char_at(text, range.start);
            let end = char_at(text, range.end).max(start);
            text.remove(start..end);
            text.insert(start, &change.text);
        }
        None => *text = Rope::from_str(&change.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp_server::ls_types::Range;

    fn ranged(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(sl, sc), Position::new(el, ec))),
            range_length: None,
            text: text.into(),
        }
    }

    #[test]
    fn test_char_at() {
        let text = Rope::from_str("var x = 1;\nvar y = 2;\n");
        assert_eq!(char_at(&text, Position::new(0, 0)), 0);
        assert_eq!(char_at(&text, Position::new(0, 4)), 4);
        assert_eq!(char_at(&text, Position::new(1, 0)), 11);
        assert_eq!(char_at(&text, Position::new(1, 100)), 21);
        assert_eq!(char_at(&text, Position::new(9, 0)), text.len_chars());
    }

    #[test]
    fn test_columns_count_utf16_units() {
        // 'ä' is one UTF-16 unit, '𝄞' is two
        let text = Rope::from_str("ä𝄞x");
        assert_eq!(char_at(&text, Position::new(0, 1)), 1);
        assert_eq!(char_at(&text, Position::new(0, 3)), 2);
    }

    #[test]
    fn test_full_change_replaces_text() {
        let mut text = Rope::from_str("old");
        apply_change(
            &mut text,
            TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "new".into(),
            },
        );
        assert_eq!(text.to_string(), "new");
    }

    #[test]
    fn test_ranged_changes() {
        let mut text = Rope::from_str("var x = 1;\nvar y = 2;");
        apply_change(&mut text, ranged(0, 4, 0, 5, "count"));
        assert_eq!(text.to_string(), "var count = 1;\nvar y = 2;");

        apply_change(&mut text, ranged(1, 0, 1, 0, "[note] "));
        assert_eq!(text.to_string(), "var count = 1;\n[note] var y = 2;");

        apply_change(&mut text, ranged(0, 14, 1, 7, ""));
        assert_eq!(text.to_string(), "var count = 1;var y = 2;");
    }

    #[test]
    fn test_edit_after_multibyte_text() {
        let mut text = Rope::from_str("var größe = \"😀\";\nvar y = 2;");
        apply_change(&mut text, ranged(0, 4, 0, 9, "size"));
        apply_change(&mut text, ranged(0, 14, 0, 14, "!"));
        assert_eq!(text.to_string(), "var size = \"😀!\";\nvar y = 2;");
    }

    #[test]
    fn test_crlf_line_end_is_not_a_column() {
        let mut text = Rope::from_str("ab\r\ncd");
        apply_change(&mut text, ranged(0, 5, 0, 5, "!"));
        assert_eq!(text.to_string(), "ab!\r\ncd");
    }
}
