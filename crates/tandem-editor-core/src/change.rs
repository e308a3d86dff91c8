//! Batched buffer edits.
//!
//! A batch of [`BufferEdit`]s is always expressed against the buffer as it
//! was *before* the batch: two edits at offsets 0 and 5 both refer to the
//! original text, regardless of how the first one changes its length.
//! [`ChangeSet`] validates such a batch and records, for every edit, where it
//! lands in both the old (`*_a`) and the new (`*_b`) coordinate space.

use smol_str::SmolStr;

use crate::error::EditError;
use crate::text::TextBuffer;
use crate::types::Assoc;

/// Replace `from..to` with `insert`, in pre-batch offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferEdit {
    pub from: usize,
    pub to: usize,
    pub insert: SmolStr,
}

impl BufferEdit {
    pub fn new(from: usize, to: usize, insert: impl Into<SmolStr>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    /// Zero-width insertion at `pos`.
    pub fn insert(pos: usize, text: impl Into<SmolStr>) -> Self {
        Self::new(pos, pos, text)
    }

    /// Deletion of `from..to`.
    pub fn delete(from: usize, to: usize) -> Self {
        Self::new(from, to, SmolStr::default())
    }

    /// True if applying this edit changes nothing.
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.insert.is_empty()
    }
}

/// One applied edit, located in both coordinate spaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRange {
    /// Start in the pre-batch buffer.
    pub from_a: usize,
    /// End of the replaced text in the pre-batch buffer.
    pub to_a: usize,
    /// Start in the post-batch buffer.
    pub from_b: usize,
    /// End of the inserted text in the post-batch buffer.
    pub to_b: usize,
    pub inserted: SmolStr,
}

impl ChangeRange {
    pub fn deleted_len(&self) -> usize {
        self.to_a - self.from_a
    }

    pub fn inserted_len(&self) -> usize {
        self.to_b - self.from_b
    }
}

/// A validated, ordered batch of changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<ChangeRange>,
    len_before: usize,
    len_after: usize,
}

impl ChangeSet {
    /// A batch that changes nothing in a buffer of `len` chars.
    pub fn empty(len: usize) -> Self {
        Self {
            changes: Vec::new(),
            len_before: len,
            len_after: len,
        }
    }

    /// Validate `edits` against a buffer of `len_before` chars.
    ///
    /// Edits are ordered by `from` (edits with equal `from` keep their input
    /// order, so an insertion may directly precede a deletion at the same
    /// offset). No-op edits are dropped. Edits must not overlap.
    pub fn from_edits(edits: &[BufferEdit], len_before: usize) -> Result<Self, EditError> {
        let mut sorted: Vec<&BufferEdit> = edits.iter().filter(|e| !e.is_noop()).collect();
        sorted.sort_by_key(|e| e.from);

        let mut changes = Vec::with_capacity(sorted.len());
        let mut prev_to: Option<usize> = None;
        let mut len_after = len_before;

        for edit in sorted {
            if edit.to < edit.from {
                return Err(EditError::Reversed {
                    from: edit.from,
                    to: edit.to,
                });
            }
            if edit.to > len_before {
                return Err(EditError::OutOfBounds {
                    from: edit.from,
                    to: edit.to,
                    len: len_before,
                });
            }
            if let Some(prev_to) = prev_to {
                if edit.from < prev_to {
                    return Err(EditError::Overlapping {
                        prev_to,
                        next_from: edit.from,
                    });
                }
            }
            prev_to = Some(edit.to);

            let inserted_len = edit.insert.chars().count();
            // len_after so far is exactly the shift every later from_a needs
            let from_b = edit.from + len_after - len_before;
            changes.push(ChangeRange {
                from_a: edit.from,
                to_a: edit.to,
                from_b,
                to_b: from_b + inserted_len,
                inserted: edit.insert.clone(),
            });
            len_after = len_after + inserted_len - (edit.to - edit.from);
        }

        Ok(Self {
            changes,
            len_before,
            len_after,
        })
    }

    /// Changes in ascending `from_a` order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len_before(&self) -> usize {
        self.len_before
    }

    pub fn len_after(&self) -> usize {
        self.len_after
    }

    /// Apply the batch to a buffer holding the pre-batch text.
    ///
    /// Changes are applied back to front so the pre-batch offsets of the
    /// remaining ones stay valid.
    pub fn apply<B: TextBuffer + ?Sized>(&self, buffer: &mut B) {
        for change in self.changes.iter().rev() {
            if change.to_a > change.from_a {
                buffer.delete(change.from_a..change.to_a);
            }
            if !change.inserted.is_empty() {
                buffer.insert(change.from_a, &change.inserted);
            }
        }
    }

    /// Map a pre-batch offset into the post-batch buffer.
    ///
    /// A position touching an insertion, or inside replaced text, goes to
    /// the start of the new text for `Assoc::Before` and to its end for
    /// `Assoc::After`.
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        let mut mapped = pos;
        for change in &self.changes {
            if pos < change.from_a {
                break;
            }
            let past = pos > change.to_a || (pos == change.to_a && change.from_a < change.to_a);
            if past {
                mapped = mapped + change.inserted_len() - change.deleted_len();
                continue;
            }
            return match assoc {
                Assoc::Before => change.from_b,
                Assoc::After => change.to_b,
            };
        }
        mapped
    }
}
