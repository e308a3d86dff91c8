//! Text buffer abstraction for editor storage.
//!
//! The `TextBuffer` trait is the buffer half of a collaborative binding: the
//! sync engine only ever talks to the local text through it, so any storage
//! that can answer char-offset and line queries can be kept in step with the
//! replicated document.

use smol_str::{SmolStr, ToSmolStr};
use std::ops::Range;

use crate::types::Line;

/// A text buffer that supports efficient editing and offset conversion.
///
/// All offsets are in Unicode scalar values (chars), not bytes or UTF-16.
pub trait TextBuffer {
    /// Total length in bytes (UTF-8).
    fn len_bytes(&self) -> usize;

    /// Total length in chars (Unicode scalar values).
    fn len_chars(&self) -> usize;

    /// Check if empty.
    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Insert text at char offset.
    fn insert(&mut self, char_offset: usize, text: &str);

    /// Delete char range.
    fn delete(&mut self, char_range: Range<usize>);

    /// Replace char range with text.
    fn replace(&mut self, char_range: Range<usize>, text: &str) {
        self.delete(char_range.clone());
        self.insert(char_range.start, text);
    }

    /// Get a slice as SmolStr. Returns None if range is invalid.
    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr>;

    /// Get character at offset. Returns None if out of bounds.
    fn char_at(&self, char_offset: usize) -> Option<char>;

    /// Convert entire buffer to String.
    fn to_string(&self) -> String;

    /// Number of lines. An empty buffer has one (empty) line.
    fn line_count(&self) -> usize;

    /// The line containing `char_offset` (clamped to the buffer end).
    fn line_at(&self, char_offset: usize) -> Line;

    /// Line by 1-based number. Returns None past the last line.
    fn line(&self, number: usize) -> Option<Line>;
}

/// Ropey-backed text buffer for local editing.
///
/// Provides O(log n) editing operations, offset conversions and line lookups.
#[derive(Clone, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
}

impl EditorRope {
    /// Create a new empty rope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(s),
        }
    }

    /// Get a reference to the underlying rope (for advanced operations).
    pub fn rope(&self) -> &ropey::Rope {
        &self.rope
    }

    /// Convert char offset to byte offset.
    pub fn char_to_byte(&self, char_offset: usize) -> usize {
        self.rope.char_to_byte(char_offset)
    }

    /// Convert byte offset to char offset.
    pub fn byte_to_char(&self, byte_offset: usize) -> usize {
        self.rope.byte_to_char(byte_offset)
    }
}

impl TextBuffer for EditorRope {
    fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn insert(&mut self, char_offset: usize, text: &str) {
        self.rope.insert(char_offset, text);
    }

    fn delete(&mut self, char_range: Range<usize>) {
        self.rope.remove(char_range);
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        if char_range.start > char_range.end || char_range.end > self.len_chars() {
            return None;
        }
        Some(self.rope.slice(char_range).to_smolstr())
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        if char_offset >= self.len_chars() {
            return None;
        }
        Some(self.rope.char(char_offset))
    }

    fn to_string(&self) -> String {
        self.rope.to_string()
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn line_at(&self, char_offset: usize) -> Line {
        let offset = char_offset.min(self.rope.len_chars());
        self.line_by_index(self.rope.char_to_line(offset))
    }

    fn line(&self, number: usize) -> Option<Line> {
        if number == 0 || number > self.rope.len_lines() {
            return None;
        }
        Some(self.line_by_index(number - 1))
    }
}

impl EditorRope {
    // Built without ropey's `cr_lines`/`unicode_lines`, so every line but
    // the last ends in exactly one '\n'.
    fn line_by_index(&self, index: usize) -> Line {
        let from = self.rope.line_to_char(index);
        let to = if index + 1 < self.rope.len_lines() {
            self.rope.line_to_char(index + 1) - 1
        } else {
            self.rope.len_chars()
        };
        Line {
            number: index + 1,
            from,
            to,
        }
    }
}

impl From<&str> for EditorRope {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for EditorRope {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}
