//! Editor state: the local buffer, its selection and focus.
//!
//! `EditorState` plays the part of the editing widget in a collaborative
//! binding. Every change to the buffer goes through [`EditorState::apply`],
//! which reports a [`BufferUpdate`] for the binding's hooks to react to.

use smol_str::SmolStr;

use crate::change::ChangeSet;
use crate::error::EditError;
use crate::text::{EditorRope, TextBuffer};
use crate::transaction::{BufferUpdate, Transaction};
use crate::types::{Assoc, Line, Selection};

/// Buffer plus selection.
#[derive(Clone)]
pub struct EditorState<B = EditorRope> {
    buffer: B,
    selection: Selection,
    focused: bool,
}

impl EditorState<EditorRope> {
    /// Create a rope-backed state holding `text`, cursor at the start.
    pub fn from_text(text: &str) -> Self {
        Self::new(EditorRope::from_str(text))
    }
}

impl<B: TextBuffer> EditorState<B> {
    /// Wrap a buffer. The editor starts focused with the cursor at 0.
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            selection: Selection::collapsed(0),
            focused: true,
        }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    pub fn text(&self) -> String {
        self.buffer.to_string()
    }

    pub fn slice(&self, from: usize, to: usize) -> Option<SmolStr> {
        self.buffer.slice(from..to)
    }

    pub fn line_at(&self, offset: usize) -> Line {
        self.buffer.line_at(offset)
    }

    pub fn line(&self, number: usize) -> Option<Line> {
        self.buffer.line(number)
    }

    /// Apply a transaction.
    ///
    /// The buffer and selection are only touched once the whole batch has
    /// been validated.
    pub fn apply(&mut self, tx: Transaction) -> Result<BufferUpdate, EditError> {
        let changes = ChangeSet::from_edits(&tx.edits, self.buffer.len_chars())?;
        let selection_before = self.selection;

        let selection_after = match tx.selection {
            Some(sel) => {
                let len = changes.len_after();
                if sel.anchor > len || sel.head > len {
                    return Err(EditError::InvalidSelection {
                        anchor: sel.anchor,
                        head: sel.head,
                        len,
                    });
                }
                sel
            }
            None => Selection::new(
                changes.map_pos(selection_before.anchor, Assoc::Before),
                changes.map_pos(selection_before.head, Assoc::Before),
            ),
        };

        changes.apply(&mut self.buffer);
        self.selection = selection_after;

        tracing::trace!(
            changes = changes.len(),
            len = changes.len_after(),
            origin = tx.origin.as_ref().map(|o| o.as_str()),
            "applied transaction"
        );

        Ok(BufferUpdate {
            changes,
            selection_before,
            selection_after,
            origin: tx.origin,
            focused: self.focused,
        })
    }

    /// Build the transaction for typing `text` over the current selection.
    ///
    /// The cursor ends up collapsed after the inserted text.
    pub fn replace_selection(&self, text: &str) -> Transaction {
        let range = self.selection.to_range();
        let caret = range.start + text.chars().count();
        Transaction::replace(range, text).with_selection(Selection::collapsed(caret))
    }

    /// Change focus, reported as a selection-only update.
    pub fn set_focused(&mut self, focused: bool) -> BufferUpdate {
        self.focused = focused;
        BufferUpdate {
            changes: ChangeSet::empty(self.buffer.len_chars()),
            selection_before: self.selection,
            selection_after: self.selection,
            origin: None,
            focused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::BufferEdit;
    use crate::transaction::Origin;

    #[test]
    fn test_typing_moves_cursor() {
        let mut state = EditorState::from_text("0123456789");
        state.apply(Transaction::select(Selection::collapsed(2))).unwrap();

        let update = state.apply(state.replace_selection("hello")).unwrap();
        assert_eq!(state.text(), "01hello23456789");
        assert_eq!(update.selection_before, Selection::collapsed(2));
        assert_eq!(update.selection_after, Selection::collapsed(7));
        assert!(update.doc_changed());
    }

    #[test]
    fn test_typing_replaces_selection() {
        let mut state = EditorState::from_text("hello world");
        state.apply(Transaction::select(Selection::new(11, 6))).unwrap();
        state.apply(state.replace_selection("rust")).unwrap();
        assert_eq!(state.text(), "hello rust");
        assert_eq!(state.selection(), Selection::collapsed(10));
    }

    #[test]
    fn test_selection_mapped_through_edits() {
        let mut state = EditorState::from_text("abcdef");
        state.apply(Transaction::select(Selection::new(1, 4))).unwrap();

        let tx = Transaction::from_edits(vec![BufferEdit::insert(0, "XX")])
            .with_origin(Origin::new("remote"));
        let update = state.apply(tx).unwrap();
        assert_eq!(update.selection_after, Selection::new(3, 6));
        assert!(update.is_from(&Origin::new("remote")));
    }

    #[test]
    fn test_invalid_transaction_leaves_state_untouched() {
        let mut state = EditorState::from_text("abc");
        let err = state.apply(Transaction::delete(1..9)).unwrap_err();
        assert!(matches!(err, EditError::OutOfBounds { .. }));
        assert_eq!(state.text(), "abc");

        let err = state
            .apply(Transaction::insert(0, "x").with_selection(Selection::collapsed(10)))
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidSelection { .. }));
        assert_eq!(state.text(), "abc");
    }

    #[test]
    fn test_focus_update_is_selection_only() {
        let mut state = EditorState::from_text("abc");
        let update = state.set_focused(false);
        assert!(!update.doc_changed());
        assert!(!update.focused);
        assert!(!state.is_focused());
    }
}
