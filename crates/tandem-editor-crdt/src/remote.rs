//! Remote selections: other participants' cursors drawn over the buffer.
//!
//! Each buffer update publishes the local selection into awareness and then
//! rebuilds the decorations for every remote participant from scratch.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;
use smol_str::{SmolStr, format_smolstr};
use tandem_editor_core::{
    Assoc, BufferUpdate, Decoration, DecorationClass, DecorationSet, EditorState, Selection,
    TextBuffer, Widget,
};

use crate::CrdtError;
use crate::awareness::{
    CURSOR_FIELD, ClientId, ObserverId, SharedAwareness, UserInfo, cursor_from_state,
};
use crate::position::PositionCodec;

/// Fallbacks for participants that do not publish a name or colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUserDefaults {
    pub color: SmolStr,
    pub name: SmolStr,
}

impl Default for RemoteUserDefaults {
    fn default() -> Self {
        Self {
            color: SmolStr::new_static("#30bced"),
            name: SmolStr::new_static("Anonymous"),
        }
    }
}

pub struct RemoteSelections {
    awareness: SharedAwareness,
    codec: PositionCodec,
    defaults: RemoteUserDefaults,
    decorations: DecorationSet,
    dirty: Rc<Cell<bool>>,
    observer: Option<ObserverId>,
}

impl RemoteSelections {
    pub fn new(
        awareness: SharedAwareness,
        codec: PositionCodec,
        defaults: RemoteUserDefaults,
    ) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let observer = {
            let mut aw = awareness.borrow_mut();
            let local = aw.client_id();
            let flag = dirty.clone();
            aw.on_change(move |change| {
                if change.clients().any(|id| id != local) {
                    flag.set(true);
                }
            })
        };

        Self {
            awareness,
            codec,
            defaults,
            decorations: DecorationSet::new(),
            dirty,
            observer: Some(observer),
        }
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    /// True if a remote participant changed since the last rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Publish the local selection and rebuild remote decorations.
    pub fn update<B: TextBuffer>(
        &mut self,
        state: &EditorState<B>,
        update: &BufferUpdate,
    ) -> Result<(), CrdtError> {
        if self.observer.is_none() {
            return Err(CrdtError::Destroyed);
        }
        let selection = update.focused.then_some(update.selection_after);
        self.publish_local(selection)?;
        self.rebuild(state);
        Ok(())
    }

    /// Rebuild if a remote participant changed. Returns true if it did.
    pub fn refresh<B: TextBuffer>(&mut self, state: &EditorState<B>) -> bool {
        if self.observer.is_none() || !self.dirty.get() {
            return false;
        }
        self.rebuild(state);
        true
    }

    // `None` clears the published cursor.
    fn publish_local(&self, selection: Option<Selection>) -> Result<(), CrdtError> {
        let mut awareness = self.awareness.borrow_mut();
        let Some(local) = awareness.get_local_state() else {
            return Ok(());
        };
        let published = local.get(CURSOR_FIELD).filter(|c| !c.is_null());

        match selection {
            Some(selection) => {
                let range = self.codec.encode_selection(selection)?;
                let unchanged = published
                    .and_then(|_| cursor_from_state(local).ok().flatten())
                    .is_some_and(|current| current == range);
                if !unchanged {
                    let value = range.to_json()?;
                    awareness.set_local_state_field(CURSOR_FIELD, value);
                }
            }
            None if published.is_some() => {
                awareness.set_local_state_field(CURSOR_FIELD, Value::Null);
            }
            None => {}
        }
        Ok(())
    }

    fn rebuild<B: TextBuffer>(&mut self, state: &EditorState<B>) {
        let awareness = self.awareness.borrow();
        let local = awareness.client_id();
        let len = state.len_chars();
        let mut decorations = Vec::new();

        for (&client, entry) in awareness.get_states() {
            if client == local {
                continue;
            }
            let Some((anchor, head)) = self.resolve_cursor(client, entry) else {
                continue;
            };
            let anchor = anchor.min(len);
            let head = head.min(len);

            let user = UserInfo::from_state(entry);
            let color = user.color.unwrap_or_else(|| self.defaults.color.clone());
            let name = user.name.unwrap_or_else(|| self.defaults.name.clone());
            let light = user
                .color_light
                .unwrap_or_else(|| format_smolstr!("{color}33"));

            push_selection(&mut decorations, state, anchor, head, &light);
            decorations.push(Decoration::Widget {
                pos: head,
                // keep the local cursor outside the remote selection
                side: if head > anchor {
                    Assoc::Before
                } else {
                    Assoc::After
                },
                widget: Widget::Caret { color, name },
            });
        }

        self.decorations = DecorationSet::from_vec(decorations);
        self.dirty.set(false);
    }

    fn resolve_cursor(&self, client: ClientId, entry: &Value) -> Option<(usize, usize)> {
        let range = match cursor_from_state(entry) {
            Ok(Some(range)) => range,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(client, error = %e, "unreadable remote cursor");
                return None;
            }
        };
        match (self.codec.decode(&range.anchor), self.codec.decode(&range.head)) {
            (Ok(anchor), Ok(head)) => Some((anchor.offset, head.offset)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(client, error = %e, "skipping remote selection");
                None
            }
        }
    }

    /// Remove the awareness observer. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        let Some(id) = self.observer.take() else {
            return;
        };
        match self.awareness.try_borrow_mut() {
            Ok(mut awareness) => {
                awareness.off_change(id);
            }
            Err(_) => tracing::warn!("awareness busy, remote selection observer left registered"),
        }
        self.decorations = DecorationSet::new();
    }
}

impl Drop for RemoteSelections {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Selection highlight for `anchor..head`, split per line when it spans
/// several: the tail of the first line, whole-line markers for the lines in
/// between, and the head of the last line.
fn push_selection<B: TextBuffer>(
    out: &mut Vec<Decoration>,
    state: &EditorState<B>,
    anchor: usize,
    head: usize,
    background: &SmolStr,
) {
    let start = anchor.min(head);
    let end = anchor.max(head);
    if start == end {
        return;
    }

    let mark = |from: usize, to: usize| Decoration::Mark {
        from,
        to,
        class: DecorationClass::Selection,
        background: background.clone(),
    };

    let start_line = state.line_at(start);
    let end_line = state.line_at(end);
    if start_line.number == end_line.number {
        out.push(mark(start, end));
        return;
    }

    if start < start_line.to {
        out.push(mark(start, start_line.to));
    }
    if end_line.from < end {
        out.push(mark(end_line.from, end));
    }
    for number in start_line.number + 1..end_line.number {
        if let Some(line) = state.line(number) {
            out.push(Decoration::LineMarker {
                line_from: line.from,
                class: DecorationClass::LineSelection,
                background: background.clone(),
            });
        }
    }
}
