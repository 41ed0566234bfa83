//! Source positions and ranges.
//!
//! Lines and columns are 1-based. Columns count UTF-16 code units so that a
//! position converts to an LSP position by subtracting one from both fields.

use std::fmt;

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range. `end` points just past the last character.
///
/// # Examples
///
/// ```
/// use ddp_syntax::position::{Position, Range};
///
/// let range = Range::new(Position::new(2, 5), Position::new(2, 9));
/// assert!(range.contains(Position::new(2, 5)));
/// assert!(range.contains(Position::new(2, 9)));
/// assert!(!range.contains(Position::new(3, 1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Range spanning from the start of `first` to the end of `last`.
    pub fn cover(first: Self, last: Self) -> Self {
        Self::new(first.start, last.end)
    }

    /// Inclusive containment check.
    ///
    /// Both ends count as inside so that a cursor placed directly after an
    /// identifier still resolves to it.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos <= self.end
    }

    /// True if the two ranges share at least one position.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True if `other` lies completely inside `self`.
    pub fn encloses(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn is_multiline(&self) -> bool {
        self.end.line > self.start.line
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn test_contains_is_inclusive() {
        let r = range(3, 1, 7, 2);
        assert!(r.contains(Position::new(3, 1)));
        assert!(r.contains(Position::new(5, 80)));
        assert!(r.contains(Position::new(7, 2)));
        assert!(!r.contains(Position::new(7, 3)));
        assert!(!r.contains(Position::new(9, 1)));
        assert!(!r.contains(Position::new(2, 40)));
    }

    #[test]
    fn test_overlaps() {
        let a = range(1, 1, 2, 5);
        assert!(a.overlaps(&range(2, 5, 3, 1)));
        assert!(a.overlaps(&range(1, 3, 1, 4)));
        assert!(!a.overlaps(&range(2, 6, 4, 1)));
    }

    #[test]
    fn test_encloses() {
        let outer = range(1, 1, 10, 1);
        assert!(outer.encloses(&range(2, 1, 3, 1)));
        assert!(!outer.encloses(&range(2, 1, 11, 1)));
    }

    #[test]
    fn test_cover_and_multiline() {
        let r = Range::cover(range(1, 4, 1, 8), range(3, 1, 3, 2));
        assert_eq!(r, range(1, 4, 3, 2));
        assert!(r.is_multiline());
        assert!(!range(1, 1, 1, 9).is_multiline());
    }

    #[test]
    fn test_display() {
        assert_eq!(range(1, 2, 3, 4).to_string(), "1:2-3:4");
    }
}
