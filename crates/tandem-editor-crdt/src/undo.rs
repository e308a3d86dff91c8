//! Undo and redo of local edits, with selection restore.
//!
//! History is kept by Loro's [`UndoManager`], which tracks every local
//! commit to the document and transforms it over anything imported since.
//! Each stack item carries the encoded selection that was current when it
//! was recorded; popping the item puts that selection back.
//!
//! Only commits made by the bound sync engine belong in the history. A
//! document therefore takes at most one coordinator, and other local writers
//! should commit under one of [`UndoConfig::excluded_origin_prefixes`]. An
//! untagged local commit from anyone else clears the history rather than
//! leave it where an undo could revert it.
//!
//! The manager's push and pop hooks are `Send + Sync` and run inside Loro,
//! so they only touch the lock-guarded [`UndoHooks`] state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loro::{LoroValue, PeerID, UndoItemMeta, UndoManager};
use smol_str::SmolStr;
use tandem_editor_core::{BufferUpdate, EditorState, Origin, Selection, TextBuffer, Transaction};

use crate::CrdtError;
use crate::document::SharedText;
use crate::position::{PositionCodec, RelativeRange};
use crate::sync::{RemoteApply, SyncEngine};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoConfig {
    /// Oldest items are dropped past this depth.
    pub max_undo_steps: usize,
    /// Commits closer together than this are merged into one item. Zero
    /// keeps every commit separate.
    pub merge_interval_ms: i64,
    /// Commits whose origin starts with one of these are not recorded and
    /// leave the history alone.
    pub excluded_origin_prefixes: Vec<SmolStr>,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_undo_steps: 100,
            merge_interval_ms: 0,
            excluded_origin_prefixes: Vec::new(),
        }
    }
}

/// A history command as named by editor input events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

impl HistoryCommand {
    /// Map a `beforeinput` input type to a history command.
    pub fn from_input_type(input_type: &str) -> Option<Self> {
        match input_type {
            "historyUndo" => Some(Self::Undo),
            "historyRedo" => Some(Self::Redo),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaptureState {
    Idle,
    Restoring,
}

/// State shared with the manager's hooks.
#[derive(Default)]
struct UndoHooks {
    /// Encoded selection to attach to the next pushed item.
    stash: Mutex<Option<Vec<u8>>>,
    /// Value carried by the item most recently popped.
    popped: Mutex<Option<LoroValue>>,
    /// Set while this coordinator is undoing or redoing.
    stepping: AtomicBool,
    /// A local commit under another origin was pushed.
    foreign: AtomicBool,
}

/// Peers of the documents that have a coordinator.
static BOUND_PEERS: Mutex<BTreeSet<PeerID>> = Mutex::new(BTreeSet::new());

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct UndoCoordinator {
    manager: Option<UndoManager>,
    peer: PeerID,
    codec: PositionCodec,
    sync_origin: Origin,
    hooks: Arc<UndoHooks>,
    state: CaptureState,
    restored: Vec<RemoteApply>,
}

impl UndoCoordinator {
    /// Start recording local changes to `shared`.
    ///
    /// `sync_origin` is the origin of the sync engine bound to the same
    /// buffer; updates carrying it are remote changes already in the
    /// document, and document commits carrying it are the ones recorded.
    ///
    /// Fails with [`CrdtError::HistoryInUse`] if the document already has a
    /// coordinator.
    pub fn new(
        shared: &SharedText,
        codec: PositionCodec,
        sync_origin: Origin,
        config: &UndoConfig,
    ) -> Result<Self, CrdtError> {
        let peer = shared.doc().peer_id();
        if !lock(&BOUND_PEERS).insert(peer) {
            return Err(CrdtError::HistoryInUse);
        }

        let mut manager = UndoManager::new(shared.doc());
        manager.set_max_undo_steps(config.max_undo_steps);
        manager.set_merge_interval(config.merge_interval_ms);
        for prefix in &config.excluded_origin_prefixes {
            manager.add_exclude_origin_prefix(prefix);
        }

        let hooks = Arc::new(UndoHooks::default());

        let push_hooks = hooks.clone();
        let own_origin = sync_origin.as_str().to_owned();
        manager.set_on_push(Some(Box::new(move |_kind, _span, event| {
            let mut meta = UndoItemMeta::new();
            let foreign = event.as_ref().is_some_and(|event| event.origin != own_origin);
            if foreign && !push_hooks.stepping.load(Ordering::Acquire) {
                push_hooks.foreign.store(true, Ordering::Release);
                return meta;
            }
            if let Some(bytes) = lock(&push_hooks.stash).clone() {
                meta.value = LoroValue::from(bytes);
            }
            meta
        })));

        let pop_hooks = hooks.clone();
        manager.set_on_pop(Some(Box::new(move |_kind, _span, meta| {
            *lock(&pop_hooks.popped) = Some(meta.value);
        })));

        tracing::debug!(
            max_undo_steps = config.max_undo_steps,
            merge_interval_ms = config.merge_interval_ms,
            "undo coordinator bound"
        );

        Ok(Self {
            manager: Some(manager),
            peer,
            codec,
            sync_origin,
            hooks,
            state: CaptureState::Idle,
            restored: Vec::new(),
        })
    }

    /// Record the selection to restore if the change in `update` is undone.
    ///
    /// Must run before the update reaches the document. For local updates
    /// that is the selection before the change; remote updates are already
    /// in the document, so their resulting selection is recorded instead.
    pub fn before_change<B: TextBuffer>(
        &mut self,
        state: &EditorState<B>,
        update: &BufferUpdate,
    ) {
        if self.manager.is_none() || self.state == CaptureState::Restoring {
            return;
        }
        self.discard_foreign_history();
        let selection = if update.is_from(&self.sync_origin) {
            update.selection_after
        } else {
            update.selection_before
        };
        self.stash(selection.clamp(state.len_chars()));
    }

    /// Record the current selection.
    pub fn capture<B: TextBuffer>(&mut self, state: &EditorState<B>) {
        if self.manager.is_none() || self.state == CaptureState::Restoring {
            return;
        }
        self.stash(state.selection());
    }

    fn stash(&self, selection: Selection) {
        let encoded = self
            .codec
            .encode_selection(selection)
            .and_then(|range| serde_json::to_vec(&range).map_err(CrdtError::from));
        match encoded {
            Ok(bytes) => *lock(&self.hooks.stash) = Some(bytes),
            Err(e) => tracing::debug!(error = %e, "could not capture selection"),
        }
    }

    /// Clear the history once a commit from another local writer is on it.
    fn discard_foreign_history(&mut self) {
        if !self.hooks.foreign.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(manager) = self.manager.as_mut() {
            manager.clear();
            tracing::debug!("local commit from another origin, undo history cleared");
        }
    }

    /// The history as it will be once a pending foreign commit clears it.
    fn live_manager(&self) -> Option<&UndoManager> {
        if self.hooks.foreign.load(Ordering::Acquire) {
            return None;
        }
        self.manager.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.live_manager().is_some_and(UndoManager::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.live_manager().is_some_and(UndoManager::can_redo)
    }

    /// Number of items on the undo stack.
    pub fn undo_depth(&self) -> usize {
        self.live_manager().map_or(0, UndoManager::undo_count)
    }

    /// Number of items on the redo stack.
    pub fn redo_depth(&self) -> usize {
        self.live_manager().map_or(0, UndoManager::redo_count)
    }

    /// Close the current stack item so the next change starts a new one.
    pub fn record_checkpoint(&mut self) -> Result<(), CrdtError> {
        let manager = self.manager.as_mut().ok_or(CrdtError::Destroyed)?;
        manager.record_new_checkpoint()?;
        Ok(())
    }

    /// Undo the most recent local change.
    ///
    /// The reverted text reaches the buffer through `engine`, then the
    /// selection recorded with the item is restored. Returns false if there
    /// was nothing to undo.
    pub fn undo<B: TextBuffer>(
        &mut self,
        state: &mut EditorState<B>,
        engine: &mut SyncEngine,
    ) -> Result<bool, CrdtError> {
        self.step(HistoryCommand::Undo, state, engine)
    }

    /// Redo the most recently undone change.
    pub fn redo<B: TextBuffer>(
        &mut self,
        state: &mut EditorState<B>,
        engine: &mut SyncEngine,
    ) -> Result<bool, CrdtError> {
        self.step(HistoryCommand::Redo, state, engine)
    }

    /// Buffer updates made by the last undo or redo.
    pub fn take_restored(&mut self) -> Vec<RemoteApply> {
        std::mem::take(&mut self.restored)
    }

    fn step<B: TextBuffer>(
        &mut self,
        command: HistoryCommand,
        state: &mut EditorState<B>,
        engine: &mut SyncEngine,
    ) -> Result<bool, CrdtError> {
        if self.manager.is_none() {
            return Err(CrdtError::Destroyed);
        }
        self.discard_foreign_history();
        // The inverse item pushed by this step takes the current selection.
        self.capture(state);
        lock(&self.hooks.popped).take();

        let manager = self.manager.as_mut().ok_or(CrdtError::Destroyed)?;
        self.hooks.stepping.store(true, Ordering::Release);
        let done = match command {
            HistoryCommand::Undo => manager.undo(),
            HistoryCommand::Redo => manager.redo(),
        };
        self.hooks.stepping.store(false, Ordering::Release);
        if !done? {
            return Ok(false);
        }

        self.state = CaptureState::Restoring;
        let result = self.restore(state, engine);
        self.state = CaptureState::Idle;
        self.restored = result?;

        self.capture(state);
        tracing::trace!(?command, "history step applied");
        Ok(true)
    }

    fn restore<B: TextBuffer>(
        &mut self,
        state: &mut EditorState<B>,
        engine: &mut SyncEngine,
    ) -> Result<Vec<RemoteApply>, CrdtError> {
        let mut applied = engine.flush(state)?;

        let Some(LoroValue::Binary(bytes)) = lock(&self.hooks.popped).take() else {
            return Ok(applied);
        };
        let decoded = serde_json::from_slice::<RelativeRange>(&bytes[..])
            .map_err(CrdtError::from)
            .and_then(|range| self.codec.decode_range(&range));

        match decoded {
            Ok(decoded) => {
                let selection = decoded.to_selection().clamp(state.len_chars());
                let tx = Transaction::select(selection).with_origin(engine.origin().clone());
                applied.push(RemoteApply {
                    update: state.apply(tx)?,
                    attributions: Vec::new(),
                });
            }
            Err(e) => tracing::warn!(error = %e, "could not decode undo selection"),
        }
        Ok(applied)
    }

    /// Drop the manager and its hooks. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if let Some(mut manager) = self.manager.take() {
            manager.set_on_push(None);
            manager.set_on_pop(None);
            lock(&BOUND_PEERS).remove(&self.peer);
            lock(&self.hooks.popped).take();
            lock(&self.hooks.stash).take();
            self.restored.clear();
            tracing::debug!("undo coordinator destroyed");
        }
    }
}

impl Drop for UndoCoordinator {
    fn drop(&mut self) {
        self.destroy();
    }
}
