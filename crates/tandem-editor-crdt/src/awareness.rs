//! Awareness: ephemeral per-participant state.
//!
//! Each participant publishes a JSON object (who they are, where their
//! cursor is). Nothing here is persisted; entries expire when a participant
//! stops updating them. Every client's entry carries its own increasing
//! clock, and an incoming update only replaces an entry if its clock is
//! newer.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use web_time::Instant;

use crate::CrdtError;
use crate::position::RelativeRange;

pub type ClientId = u64;

/// Awareness shared between the binding and whatever transports it.
pub type SharedAwareness = Rc<RefCell<Awareness>>;

/// Entries not renewed within this window are considered gone.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Field holding [`UserInfo`].
pub const USER_FIELD: &str = "user";
/// Field holding the participant's selection as a [`RelativeRange`].
pub const CURSOR_FIELD: &str = "cursor";

/// Update message for one client's state. `state: None` means the client left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwarenessUpdate {
    pub client_id: ClientId,
    pub state: Option<Value>,
    pub clock: u64,
}

/// Which clients an update added, changed or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwarenessChange {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

impl AwarenessChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Every client the change touched.
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.added
            .iter()
            .chain(&self.updated)
            .chain(&self.removed)
            .copied()
    }

    fn record(&mut self, client_id: ClientId, prev: Option<&Value>, next: Option<&Value>) {
        match (prev, next) {
            (None, Some(_)) => self.added.push(client_id),
            (Some(_), None) => self.removed.push(client_id),
            (Some(a), Some(b)) if a != b => self.updated.push(client_id),
            _ => {}
        }
    }
}

pub type ObserverId = u64;

type ChangeObserver = Box<dyn Fn(&AwarenessChange)>;

#[derive(Debug, Clone, Copy)]
struct ClientMeta {
    clock: u64,
    last_updated: Instant,
}

/// Awareness manager tracking all client states.
pub struct Awareness {
    client_id: ClientId,
    states: BTreeMap<ClientId, Value>,
    // Kept after a client leaves so late updates with old clocks are refused.
    meta: HashMap<ClientId, ClientMeta>,
    observers: Vec<(ObserverId, ChangeObserver)>,
    next_observer: ObserverId,
}

impl Awareness {
    /// Create an awareness instance whose local state is an empty object.
    pub fn new(client_id: ClientId) -> Self {
        let mut states = BTreeMap::new();
        states.insert(client_id, Value::Object(Map::new()));
        let mut meta = HashMap::new();
        meta.insert(
            client_id,
            ClientMeta {
                clock: 0,
                last_updated: Instant::now(),
            },
        );
        Self {
            client_id,
            states,
            meta,
            observers: Vec::new(),
            next_observer: 1,
        }
    }

    /// Wrap in the shared handle a binding expects.
    pub fn shared(client_id: ClientId) -> SharedAwareness {
        Rc::new(RefCell::new(Self::new(client_id)))
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// All present clients, ordered by id.
    pub fn get_states(&self) -> &BTreeMap<ClientId, Value> {
        &self.states
    }

    pub fn get_state(&self, client_id: ClientId) -> Option<&Value> {
        self.states.get(&client_id)
    }

    pub fn get_local_state(&self) -> Option<&Value> {
        self.get_state(self.client_id)
    }

    pub fn clock(&self, client_id: ClientId) -> Option<u64> {
        self.meta.get(&client_id).map(|m| m.clock)
    }

    /// Replace the local state. `None` marks this client as gone.
    pub fn set_local_state(&mut self, state: Option<Value>) -> AwarenessUpdate {
        let clock = self.clock(self.client_id).map_or(0, |c| c + 1);
        let prev = match &state {
            Some(value) => self.states.insert(self.client_id, value.clone()),
            None => self.states.remove(&self.client_id),
        };
        self.meta.insert(
            self.client_id,
            ClientMeta {
                clock,
                last_updated: Instant::now(),
            },
        );

        let mut change = AwarenessChange::default();
        change.record(self.client_id, prev.as_ref(), state.as_ref());
        self.emit(&change);

        AwarenessUpdate {
            client_id: self.client_id,
            state,
            clock,
        }
    }

    /// Set one field of the local state.
    ///
    /// Does nothing and returns `None` when there is no local state.
    pub fn set_local_state_field(&mut self, key: &str, value: Value) -> Option<AwarenessUpdate> {
        let Some(Value::Object(fields)) = self.get_local_state() else {
            return None;
        };
        let mut fields = fields.clone();
        fields.insert(key.to_string(), value);
        Some(self.set_local_state(Some(Value::Object(fields))))
    }

    /// Apply a remote update.
    pub fn apply_update(&mut self, update: AwarenessUpdate) -> AwarenessChange {
        let mut change = AwarenessChange::default();
        let id = update.client_id;
        let current_clock = self.clock(id).unwrap_or(0);
        let present = self.states.contains_key(&id);

        let newer = current_clock < update.clock
            || (current_clock == update.clock && update.state.is_none() && present);
        if !newer && self.meta.contains_key(&id) {
            tracing::trace!(client = id, clock = update.clock, "stale awareness update");
            return change;
        }

        let mut clock = update.clock;
        match update.state {
            None if id == self.client_id && present => {
                // Someone announced us as gone while we are still here.
                clock += 1;
            }
            None => {
                let prev = self.states.remove(&id);
                change.record(id, prev.as_ref(), None);
            }
            Some(state) => {
                let prev = self.states.insert(id, state);
                change.record(id, prev.as_ref(), self.states.get(&id));
            }
        }
        self.meta.insert(
            id,
            ClientMeta {
                clock,
                last_updated: Instant::now(),
            },
        );

        self.emit(&change);
        change
    }

    /// Updates describing the current state of `clients`.
    pub fn updates_for(&self, clients: &[ClientId]) -> Vec<AwarenessUpdate> {
        clients
            .iter()
            .filter_map(|id| {
                self.meta.get(id).map(|meta| AwarenessUpdate {
                    client_id: *id,
                    state: self.states.get(id).cloned(),
                    clock: meta.clock,
                })
            })
            .collect()
    }

    /// Serialize the state of `clients` for sending.
    pub fn encode_update(&self, clients: &[ClientId]) -> Result<Vec<u8>, CrdtError> {
        Ok(serde_json::to_vec(&self.updates_for(clients))?)
    }

    /// Apply a message produced by [`Awareness::encode_update`].
    pub fn apply_encoded_update(&mut self, data: &[u8]) -> Result<AwarenessChange, CrdtError> {
        let updates: Vec<AwarenessUpdate> = serde_json::from_slice(data)?;
        let mut total = AwarenessChange::default();
        for update in updates {
            let change = self.apply_update(update);
            total.added.extend(change.added);
            total.updated.extend(change.updated);
            total.removed.extend(change.removed);
        }
        Ok(total)
    }

    /// Update to broadcast when the local client leaves.
    pub fn create_leave_update(&self) -> AwarenessUpdate {
        AwarenessUpdate {
            client_id: self.client_id,
            state: None,
            clock: self.clock(self.client_id).map_or(0, |c| c + 1),
        }
    }

    /// Remove remote clients that have not updated within `timeout`.
    ///
    /// Returns the removed client ids.
    pub fn remove_stale_clients(&mut self, timeout: Duration) -> Vec<ClientId> {
        let now = Instant::now();
        let stale: Vec<ClientId> = self
            .states
            .keys()
            .copied()
            .filter(|id| *id != self.client_id)
            .filter(|id| {
                self.meta
                    .get(id)
                    .is_some_and(|m| now.duration_since(m.last_updated) >= timeout)
            })
            .collect();

        let mut change = AwarenessChange::default();
        for id in &stale {
            self.states.remove(id);
            change.removed.push(*id);
        }
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "removed stale awareness clients");
        }
        self.emit(&change);
        stale
    }

    /// Number of present clients, including this one.
    pub fn client_count(&self) -> usize {
        self.states.len()
    }

    /// Register `observer` to run after every change.
    ///
    /// Observers run while the awareness is borrowed and must not touch it.
    pub fn on_change(&mut self, observer: impl Fn(&AwarenessChange) + 'static) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn off_change(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn emit(&self, change: &AwarenessChange) {
        if change.is_empty() {
            return;
        }
        for (_, observer) in &self.observers {
            observer(change);
        }
    }
}

impl fmt::Debug for Awareness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awareness")
            .field("client_id", &self.client_id)
            .field("states", &self.states)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Display info a participant publishes under `user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<SmolStr>,
    #[serde(
        default,
        rename = "colorLight",
        skip_serializing_if = "Option::is_none"
    )]
    pub color_light: Option<SmolStr>,
}

impl UserInfo {
    /// Read the `user` field of a state. Missing or malformed entries read
    /// as empty.
    pub fn from_state(state: &Value) -> Self {
        state
            .get(USER_FIELD)
            .and_then(|user| Self::deserialize(user).ok())
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> Result<Value, CrdtError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Read the `cursor` field of a state.
///
/// `Ok(None)` when the participant has no cursor.
pub fn cursor_from_state(state: &Value) -> Result<Option<RelativeRange>, CrdtError> {
    match state.get(CURSOR_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(cursor) => RelativeRange::from_json(cursor).map(Some),
    }
}
