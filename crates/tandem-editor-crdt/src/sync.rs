//! Bidirectional sync between an [`EditorState`] and a Loro text container.
//!
//! Both directions are tagged with the engine's [`Origin`]: document commits
//! made for local edits carry it as their commit origin, and buffer
//! transactions made for remote changes carry it as their transaction
//! origin. Each side drops anything carrying the tag, which is what keeps
//! the engine from feeding its own writes back to itself.
//!
//! Loro delivers change events through a `Send + Sync` callback, so the
//! callback only queues an owned copy of each change. [`SyncEngine::flush`]
//! drains the queue into the buffer on the editor's thread.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use loro::Subscription;
use loro::event::{Diff, DiffEvent};
use smol_str::SmolStr;
use tandem_editor_core::{BufferUpdate, EditorState, Origin, TextBuffer, Transaction};
use tokio::sync::mpsc;

use crate::CrdtError;
use crate::delta::{AttributionRange, DeltaSegment, to_buffer_edits, to_doc_ops};
use crate::document::SharedText;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Where the engine is in its dispatch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    /// Writing to the buffer or the document. Buffer updates arriving now
    /// are ignored.
    Applying,
    Destroyed,
}

/// A document change as queued by the subscription callback.
#[derive(Clone, Debug)]
struct DocChange {
    origin: SmolStr,
    segments: Vec<DeltaSegment>,
}

/// A remote change that was applied to the buffer.
#[derive(Clone, Debug)]
pub struct RemoteApply {
    pub update: BufferUpdate,
    pub attributions: Vec<AttributionRange>,
}

pub struct SyncEngine {
    shared: SharedText,
    origin: Origin,
    state: EngineState,
    rx: mpsc::UnboundedReceiver<DocChange>,
    pending: VecDeque<DocChange>,
    subscription: Option<Subscription>,
}

impl SyncEngine {
    /// Bind to `shared` and start listening for document changes.
    pub fn new(shared: &SharedText) -> Self {
        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        let origin = Origin::new(format!("tandem-sync:{id}"));

        let (tx, rx) = mpsc::unbounded_channel::<DocChange>();
        let container = shared.container_id();
        let target = container.clone();
        let subscription = shared.doc().subscribe(
            &container,
            Arc::new(move |event: DiffEvent<'_>| {
                for diff in event.events.iter() {
                    if *diff.target != target {
                        continue;
                    }
                    let Diff::Text(deltas) = &diff.diff else {
                        continue;
                    };
                    let change = DocChange {
                        origin: SmolStr::new(event.origin),
                        segments: deltas.iter().map(DeltaSegment::from_loro).collect(),
                    };
                    if tx.send(change).is_err() {
                        tracing::trace!("sync engine gone, dropping document change");
                    }
                }
            }),
        );

        tracing::debug!(%origin, "sync engine bound");

        Self {
            shared: shared.clone(),
            origin,
            state: EngineState::Idle,
            rx,
            pending: VecDeque::new(),
            subscription: Some(subscription),
        }
    }

    /// Tag carried by everything this engine writes.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn shared(&self) -> &SharedText {
        &self.shared
    }

    fn pull(&mut self) {
        while let Ok(change) = self.rx.try_recv() {
            self.pending.push_back(change);
        }
    }

    /// True if document changes from other origins are waiting to be
    /// flushed into the buffer.
    pub fn has_pending(&mut self) -> bool {
        if self.state == EngineState::Destroyed {
            return false;
        }
        self.pull();
        self.pending
            .iter()
            .any(|change| change.origin != self.origin.as_str())
    }

    /// Apply queued document changes to the buffer.
    ///
    /// Echoes of this engine's own commits are dropped, as are changes that
    /// only retain text. Every other change becomes one buffer transaction
    /// tagged with the engine's origin.
    pub fn flush<B: TextBuffer>(
        &mut self,
        state: &mut EditorState<B>,
    ) -> Result<Vec<RemoteApply>, CrdtError> {
        if self.state == EngineState::Destroyed {
            return Err(CrdtError::Destroyed);
        }
        self.pull();

        let mut applied = Vec::new();
        while let Some(change) = self.pending.pop_front() {
            if change.origin == self.origin.as_str() {
                tracing::trace!(origin = %self.origin, "dropping echo of own commit");
                continue;
            }

            let translated = to_buffer_edits(&change.segments, state.len_chars())?;
            if translated.edits.is_empty() {
                tracing::trace!(origin = %change.origin, "document change retains only");
                continue;
            }

            let tx = Transaction::from_edits(translated.edits).with_origin(self.origin.clone());
            self.state = EngineState::Applying;
            let result = state.apply(tx);
            self.state = EngineState::Idle;

            let update = result?;
            tracing::trace!(
                origin = %change.origin,
                changes = update.changes.len(),
                "applied remote change to buffer"
            );
            applied.push(RemoteApply {
                update,
                attributions: translated.attributions,
            });
        }

        Ok(applied)
    }

    /// Push a buffer update to the document.
    ///
    /// Returns true if a document commit was made. Updates carrying this
    /// engine's origin, selection-only updates, and updates arriving while
    /// the engine is applying are ignored.
    pub fn on_buffer_update(&mut self, update: &BufferUpdate) -> Result<bool, CrdtError> {
        match self.state {
            EngineState::Destroyed => return Err(CrdtError::Destroyed),
            EngineState::Applying => return Ok(false),
            EngineState::Idle => {}
        }
        if update.is_from(&self.origin) {
            tracing::trace!(origin = %self.origin, "ignoring own buffer dispatch");
            return Ok(false);
        }
        if !update.doc_changed() {
            return Ok(false);
        }

        let ops = to_doc_ops(&update.changes);
        self.state = EngineState::Applying;
        let result = self.shared.apply_ops(&ops, &self.origin);
        self.state = EngineState::Idle;
        result?;

        tracing::trace!(ops = ops.len(), "committed local change");
        Ok(true)
    }

    /// Stop listening and refuse further work. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.state == EngineState::Destroyed {
            return;
        }
        self.subscription.take();
        self.rx.close();
        self.pending.clear();
        self.state = EngineState::Destroyed;
        tracing::debug!(origin = %self.origin, "sync engine destroyed");
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}
