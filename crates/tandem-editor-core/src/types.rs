//! Core editor types: selection, association bias and line spans.
//!
//! These types are framework-agnostic and can be used with any text buffer implementation.

use std::ops::Range;

/// Which side of an offset a position sticks to when text is inserted
/// exactly there.
///
/// `Before` keeps the position in front of the inserted text, `After` moves
/// it past the inserted text. Numerically `-1` and `1`.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, Default)]
pub enum Assoc {
    #[default]
    Before,
    After,
}

impl Assoc {
    /// The signed form (`-1` / `1`).
    pub fn as_i8(self) -> i8 {
        match self {
            Assoc::Before => -1,
            Assoc::After => 1,
        }
    }

    /// Parse the signed form. Anything non-negative is `After`.
    pub fn from_i8(value: i8) -> Self {
        if value < 0 { Assoc::Before } else { Assoc::After }
    }
}

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the cursor is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where cursor is now
    pub head: usize,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (cursor position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Check if the selection is collapsed (empty, cursor only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Check if an offset is within the selection.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start() && offset < self.end()
    }

    /// Get the selection length.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Check if empty (same as is_collapsed).
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Check if the selection is backwards (head before anchor).
    pub fn is_backwards(&self) -> bool {
        self.head < self.anchor
    }

    /// Clamp both ends to a buffer of `len` chars.
    pub fn clamp(&self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

/// A single line of the buffer.
///
/// `number` is 1-based; `to` is the offset of the line break (or the buffer
/// end), so the line text is `from..to`.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub from: usize,
    pub to: usize,
}

impl Line {
    /// Length in chars, excluding the line break.
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bounds() {
        // Forward selection
        let sel = Selection::new(5, 10);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert!(!sel.is_backwards());

        // Backward selection
        let sel = Selection::new(10, 5);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert!(sel.is_backwards());
    }

    #[test]
    fn test_selection_collapsed() {
        let sel = Selection::collapsed(7);
        assert!(sel.is_collapsed());
        assert!(sel.is_empty());
        assert_eq!(sel.len(), 0);
        assert_eq!(sel.start(), 7);
        assert_eq!(sel.end(), 7);
    }

    #[test]
    fn test_selection_contains() {
        let sel = Selection::new(5, 10);
        assert!(!sel.contains(4));
        assert!(sel.contains(5));
        assert!(sel.contains(9));
        assert!(!sel.contains(10)); // end is exclusive
    }

    #[test]
    fn test_selection_clamp() {
        assert_eq!(Selection::new(3, 12).clamp(8), Selection::new(3, 8));
    }

    #[test]
    fn test_assoc_sign() {
        assert_eq!(Assoc::Before.as_i8(), -1);
        assert_eq!(Assoc::After.as_i8(), 1);
        assert_eq!(Assoc::from_i8(-1), Assoc::Before);
        assert_eq!(Assoc::from_i8(0), Assoc::After);
    }
}
