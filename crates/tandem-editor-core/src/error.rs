//! Error types for buffer edits.

use thiserror::Error;

/// A transaction that cannot be applied to the buffer.
///
/// These are contract violations by whoever built the transaction; the
/// buffer is left untouched when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
    /// An edit reaches past the end of the buffer.
    #[error("edit {from}..{to} is outside a buffer of {len} chars")]
    OutOfBounds { from: usize, to: usize, len: usize },

    /// An edit whose end comes before its start.
    #[error("edit range {from}..{to} is reversed")]
    Reversed { from: usize, to: usize },

    /// Two edits in one batch touch the same text.
    #[error("edit starting at {next_from} overlaps the previous edit ending at {prev_to}")]
    Overlapping { prev_to: usize, next_from: usize },

    /// An explicit selection that does not fit the post-edit buffer.
    #[error("selection {anchor}..{head} is outside a buffer of {len} chars")]
    InvalidSelection {
        anchor: usize,
        head: usize,
        len: usize,
    },
}
