//! One editor bound to one shared text.
//!
//! [`CollabBinding`] owns the buffer side of the pairing and wires the sync
//! engine, the undo coordinator and the remote selection renderer into the
//! buffer's update path. Every buffer change goes through
//! [`CollabBinding::dispatch`] (local edits) or [`CollabBinding::refresh`]
//! (remote edits), which run the hooks in a fixed order: undo capture, then
//! sync, then remote selections.

use tandem_editor_core::{
    Assoc, BufferUpdate, Decoration, DecorationClass, DecorationSet, EditorRope, EditorState,
    Origin, TextBuffer, Transaction, Widget,
};

use crate::CrdtError;
use crate::config::{CollabConfig, UndoSetting};
use crate::delta::{AttributionKind, AttributionRange};
use crate::document::SharedText;
use crate::palette::UserPalette;
use crate::position::PositionCodec;
use crate::remote::RemoteSelections;
use crate::sync::{RemoteApply, SyncEngine};
use crate::undo::{HistoryCommand, UndoCoordinator};

pub struct CollabBinding<B: TextBuffer = EditorRope> {
    shared: SharedText,
    editor: EditorState<B>,
    sync: SyncEngine,
    undo: Option<UndoCoordinator>,
    remote: Option<RemoteSelections>,
    palette: UserPalette,
    attributions: DecorationSet,
    /// Attribution decorations held back until the next refresh.
    deferred: DecorationSet,
    destroyed: bool,
}

impl<B: TextBuffer> CollabBinding<B> {
    /// Bind `editor` to `shared`.
    ///
    /// The document wins: if the buffer does not already hold the shared
    /// text it is replaced with it.
    ///
    /// With undo enabled this fails with [`CrdtError::HistoryInUse`] when
    /// another binding on the same document already records history.
    pub fn new(
        shared: SharedText,
        editor: EditorState<B>,
        config: CollabConfig,
    ) -> Result<Self, CrdtError> {
        let sync = SyncEngine::new(&shared);
        let codec = PositionCodec::new(&shared);

        let undo = match &config.undo {
            UndoSetting::Enabled(undo_config) => Some(UndoCoordinator::new(
                &shared,
                codec.clone(),
                sync.origin().clone(),
                undo_config,
            )?),
            UndoSetting::Disabled => None,
        };
        let remote = config
            .awareness
            .map(|awareness| RemoteSelections::new(awareness, codec, config.remote_defaults));

        let mut binding = Self {
            shared,
            editor,
            sync,
            undo,
            remote,
            palette: config.palette,
            attributions: DecorationSet::new(),
            deferred: DecorationSet::new(),
            destroyed: false,
        };
        binding.adopt_document_text()?;

        tracing::debug!(
            origin = %binding.sync.origin(),
            undo = binding.undo.is_some(),
            awareness = binding.remote.is_some(),
            "collab binding created"
        );
        Ok(binding)
    }

    fn adopt_document_text(&mut self) -> Result<(), CrdtError> {
        let text = self.shared.to_string();
        if self.editor.text() == text {
            return Ok(());
        }
        let tx = Transaction::replace(0..self.editor.len_chars(), text)
            .with_origin(self.sync.origin().clone());
        let update = self.editor.apply(tx)?;
        self.run_hooks(&update, false)
    }

    pub fn editor(&self) -> &EditorState<B> {
        &self.editor
    }

    pub fn shared_text(&self) -> &SharedText {
        &self.shared
    }

    /// Origin tagging everything the binding's sync engine writes.
    pub fn sync_origin(&self) -> &Origin {
        self.sync.origin()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_alive(&self) -> Result<(), CrdtError> {
        if self.destroyed {
            return Err(CrdtError::Destroyed);
        }
        Ok(())
    }

    /// Apply a buffer transaction.
    ///
    /// Remote changes waiting in the queue are applied first, and `tx` is
    /// rebased over them.
    pub fn dispatch(&mut self, tx: Transaction) -> Result<BufferUpdate, CrdtError> {
        self.ensure_alive()?;

        let applied = self.sync.flush(&mut self.editor)?;
        let tx = applied
            .iter()
            .fold(tx, |tx, apply| tx.map_through(&apply.update.changes));
        self.absorb_remote(applied, false)?;

        let update = self.editor.apply(tx)?;
        self.run_hooks(&update, true)?;
        Ok(update)
    }

    /// One turn of the update loop.
    ///
    /// Adds attribution decorations held back by the previous turn, applies
    /// queued document changes and redraws remote selections if awareness
    /// changed. Returns true if anything visible changed.
    pub fn refresh(&mut self) -> Result<bool, CrdtError> {
        self.ensure_alive()?;
        let mut changed = false;

        if !self.deferred.is_empty() {
            let deferred = std::mem::take(&mut self.deferred);
            self.attributions = self.attributions.union(&deferred);
            changed = true;
        }

        let applied = self.sync.flush(&mut self.editor)?;
        changed |= !applied.is_empty();
        self.absorb_remote(applied, false)?;

        if let Some(remote) = self.remote.as_mut() {
            changed |= remote.refresh(&self.editor);
        }
        Ok(changed)
    }

    /// Import a document update from another participant and apply it.
    pub fn import_update(&mut self, data: &[u8]) -> Result<bool, CrdtError> {
        self.ensure_alive()?;
        self.shared.import(data)?;
        self.refresh()
    }

    pub fn undo(&mut self) -> Result<bool, CrdtError> {
        self.history(HistoryCommand::Undo)
    }

    pub fn redo(&mut self) -> Result<bool, CrdtError> {
        self.history(HistoryCommand::Redo)
    }

    /// Run a history command, e.g. from a `historyUndo` input event.
    ///
    /// Returns false without doing anything if undo is disabled.
    pub fn run_history_command(&mut self, command: HistoryCommand) -> Result<bool, CrdtError> {
        self.history(command)
    }

    pub fn can_undo(&self) -> bool {
        self.undo.as_ref().is_some_and(UndoCoordinator::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.undo.as_ref().is_some_and(UndoCoordinator::can_redo)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.as_ref().map_or(0, UndoCoordinator::undo_depth)
    }

    pub fn redo_depth(&self) -> usize {
        self.undo.as_ref().map_or(0, UndoCoordinator::redo_depth)
    }

    fn history(&mut self, command: HistoryCommand) -> Result<bool, CrdtError> {
        self.ensure_alive()?;
        let applied = self.sync.flush(&mut self.editor)?;
        self.absorb_remote(applied, false)?;

        let Some(undo) = self.undo.as_mut() else {
            return Ok(false);
        };
        let done = match command {
            HistoryCommand::Undo => undo.undo(&mut self.editor, &mut self.sync)?,
            HistoryCommand::Redo => undo.redo(&mut self.editor, &mut self.sync)?,
        };
        let restored = undo.take_restored();
        self.absorb_remote(restored, true)?;
        Ok(done)
    }

    /// Focus or blur the editor. Blurring withdraws the published cursor.
    pub fn set_focused(&mut self, focused: bool) -> Result<BufferUpdate, CrdtError> {
        self.ensure_alive()?;
        let update = self.editor.set_focused(focused);
        self.run_hooks(&update, true)?;
        Ok(update)
    }

    /// Remote selections plus attribution highlights.
    pub fn decorations(&self) -> DecorationSet {
        match self.remote.as_ref() {
            Some(remote) => remote.decorations().union(&self.attributions),
            None => self.attributions.clone(),
        }
    }

    /// Highlights for text other participants inserted or deleted.
    pub fn attributions(&self) -> &DecorationSet {
        &self.attributions
    }

    // `restoring` marks updates made by an undo or redo step: the undo
    // coordinator already captured after them, and their attribution
    // decorations wait for the next refresh.
    fn absorb_remote(
        &mut self,
        applied: Vec<RemoteApply>,
        restoring: bool,
    ) -> Result<(), CrdtError> {
        for apply in applied {
            self.run_hooks(&apply.update, !restoring)?;
            if apply.attributions.is_empty() {
                continue;
            }
            let decorations = attribution_decorations(&apply.attributions, &self.palette);
            if restoring {
                self.deferred = self.deferred.union(&decorations);
            } else {
                self.attributions = self.attributions.union(&decorations);
            }
        }
        Ok(())
    }

    fn run_hooks(&mut self, update: &BufferUpdate, capture: bool) -> Result<(), CrdtError> {
        if capture {
            if let Some(undo) = self.undo.as_mut() {
                undo.before_change(&self.editor, update);
            }
        }

        self.sync.on_buffer_update(update)?;

        if update.doc_changed() {
            self.attributions = self.attributions.map(&update.changes);
            self.deferred = self.deferred.map(&update.changes);
        }

        if let Some(remote) = self.remote.as_mut() {
            remote.update(&self.editor, update)?;
        }
        Ok(())
    }

    /// Tear down the sync subscription, the undo hooks and the awareness
    /// observer. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.sync.destroy();
        if let Some(undo) = self.undo.as_mut() {
            undo.destroy();
        }
        if let Some(remote) = self.remote.as_mut() {
            remote.destroy();
        }
        self.attributions = DecorationSet::new();
        self.deferred = DecorationSet::new();
        self.destroyed = true;
        tracing::debug!(origin = %self.sync.origin(), "collab binding destroyed");
    }
}

impl CollabBinding<EditorRope> {
    /// Bind a fresh rope buffer holding the shared text.
    pub fn open(shared: SharedText, config: CollabConfig) -> Result<Self, CrdtError> {
        let editor = EditorState::from_text(&shared.to_string());
        Self::new(shared, editor, config)
    }
}

impl<B: TextBuffer> Drop for CollabBinding<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Decorations for attributed spans.
///
/// Inserted text gets a translucent mark in the author's colour, deleted
/// text a zero-width marker.
pub fn attribution_decorations(
    ranges: &[AttributionRange],
    palette: &UserPalette,
) -> DecorationSet {
    ranges
        .iter()
        .filter_map(|range| {
            let user = range.attribution.primary()?;
            let color = palette.color_for(user);
            let decoration = match range.kind {
                AttributionKind::Inserted if range.from < range.to => Decoration::Mark {
                    from: range.from,
                    to: range.to,
                    class: DecorationClass::Inserted,
                    background: color.light.into(),
                },
                AttributionKind::Inserted => return None,
                AttributionKind::Deleted => Decoration::Widget {
                    pos: range.from,
                    side: Assoc::Before,
                    widget: Widget::Deletion {
                        color: color.color.into(),
                    },
                },
            };
            Some(decoration)
        })
        .collect()
}
