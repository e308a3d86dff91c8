//! Transactions dispatched against the buffer and the updates they produce.

use std::fmt;
use std::ops::Range;

use smol_str::SmolStr;

use crate::change::{BufferEdit, ChangeSet};
use crate::types::{Assoc, Selection};

/// Identity attached to a transaction to say who produced it.
///
/// Compared by value. A sync engine tags everything it writes (on both the
/// buffer and the document side) with its own origin so it can recognise
/// and drop the echo.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin(SmolStr);

impl Origin {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A batch of edits plus an optional new selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Edits in pre-transaction offsets.
    pub edits: Vec<BufferEdit>,
    /// Selection after the transaction. `None` maps the current selection
    /// through the edits.
    pub selection: Option<Selection>,
    pub origin: Option<Origin>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edits(edits: Vec<BufferEdit>) -> Self {
        Self {
            edits,
            ..Self::default()
        }
    }

    pub fn insert(pos: usize, text: impl Into<SmolStr>) -> Self {
        Self::from_edits(vec![BufferEdit::insert(pos, text)])
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::from_edits(vec![BufferEdit::delete(range.start, range.end)])
    }

    pub fn replace(range: Range<usize>, text: impl Into<SmolStr>) -> Self {
        Self::from_edits(vec![BufferEdit::new(range.start, range.end, text)])
    }

    /// Selection-only transaction.
    pub fn select(selection: Selection) -> Self {
        Self {
            selection: Some(selection),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_selection_only(&self) -> bool {
        self.edits.iter().all(BufferEdit::is_noop)
    }

    /// Rebase a transaction built against an older buffer over `changes`
    /// that were applied to that buffer since.
    pub fn map_through(mut self, changes: &ChangeSet) -> Self {
        if changes.is_empty() {
            return self;
        }
        for edit in &mut self.edits {
            let from = changes.map_pos(edit.from, Assoc::After);
            let to = changes.map_pos(edit.to, Assoc::Before);
            edit.from = from;
            edit.to = to.max(from);
        }
        if let Some(sel) = self.selection.as_mut() {
            sel.anchor = changes.map_pos(sel.anchor, Assoc::Before);
            sel.head = changes.map_pos(sel.head, Assoc::Before);
        }
        self
    }
}

/// What a dispatched transaction did to the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferUpdate {
    pub changes: ChangeSet,
    pub selection_before: Selection,
    pub selection_after: Selection,
    pub origin: Option<Origin>,
    /// Whether the editor had focus when the update was produced.
    pub focused: bool,
}

impl BufferUpdate {
    pub fn doc_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn selection_changed(&self) -> bool {
        self.selection_before != self.selection_after
    }

    /// True if the producing transaction was tagged with `origin`.
    pub fn is_from(&self, origin: &Origin) -> bool {
        self.origin.as_ref() == Some(origin)
    }
}
