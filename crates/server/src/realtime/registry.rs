//! Connection registry: user identity -> live connection handles.
//!
//! All access goes through a single mutex, never held across an `.await`.

use crate::models::ServerEvent;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Unique id of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// One live bidirectional channel to a client session.
///
/// Cloning is cheap and clones compare equal (identity is the connection id).
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: Option<String>,
    tx: EventSender,
}

impl ConnectionHandle {
    /// Create a handle together with the receiving end of its outbound queue.
    pub fn new(user_id: Option<String>) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::new(),
            user_id,
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Queue an event for this connection.
    ///
    /// Returns false if the connection's receiving side is gone. Never blocks.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Result of [`ConnectionRegistry::broadcast_presence`]
#[derive(Debug, Default)]
pub struct PresenceBroadcast {
    /// Users in the announced set
    pub online: usize,
    pub connections: usize,
    /// Pushes accepted
    pub delivered: usize,
    /// Connections whose receiving side was already gone
    pub closed: Vec<ConnectionId>,
}

#[derive(Default)]
struct RegistryState {
    /// Invariant: no entry holds an empty vec
    by_user: HashMap<String, Vec<ConnectionHandle>>,
    /// Connections whose handshake carried no identity
    anonymous: Vec<ConnectionHandle>,
}

/// Thread-safe bookkeeping of user -> connections
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute `handle` to `user_id`. Registering the same handle twice is a no-op.
    pub fn register(&self, user_id: &str, handle: ConnectionHandle) {
        let mut state = self.state.lock();
        let entry = state.by_user.entry(user_id.to_string()).or_default();
        if !entry.contains(&handle) {
            entry.push(handle);
        }
        debug!(
            "[Registry] {} now has {} connection(s)",
            user_id,
            entry.len()
        );
    }

    /// Track a connection that has no user identity. It only receives broadcasts.
    pub fn register_anonymous(&self, handle: ConnectionHandle) {
        let mut state = self.state.lock();
        if !state.anonymous.contains(&handle) {
            state.anonymous.push(handle);
        }
    }

    /// Remove `handle` from whichever entry holds it.
    ///
    /// Returns the user whose entry held it, if any. Unknown handles are a no-op.
    pub fn unregister(&self, handle: &ConnectionHandle) -> Option<String> {
        let mut state = self.state.lock();
        state.anonymous.retain(|h| h != handle);

        let mut owner = None;
        state.by_user.retain(|user_id, handles| {
            let before = handles.len();
            handles.retain(|h| h != handle);
            if handles.len() != before {
                owner = Some(user_id.clone());
            }
            !handles.is_empty()
        });
        owner
    }

    /// Snapshot of the live handles for `user_id`, in registration order.
    ///
    /// An empty vec means the user is offline.
    pub fn connections_for(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.state
            .lock()
            .by_user
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn online_user_ids(&self) -> BTreeSet<String> {
        self.state.lock().by_user.keys().cloned().collect()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.state.lock().by_user.contains_key(user_id)
    }

    /// Snapshot of every known connection, identified and anonymous
    pub fn all_connections(&self) -> Vec<ConnectionHandle> {
        let state = self.state.lock();
        state
            .by_user
            .values()
            .flatten()
            .chain(state.anonymous.iter())
            .cloned()
            .collect()
    }

    /// Push the current online set to every connection.
    ///
    /// The set is read and pushed under one lock acquisition: the last
    /// snapshot any connection receives matches the registry state.
    pub fn broadcast_presence(&self) -> PresenceBroadcast {
        let state = self.state.lock();
        let online_user_ids: BTreeSet<String> = state.by_user.keys().cloned().collect();
        let online = online_user_ids.len();
        let event = ServerEvent::PresenceSnapshot { online_user_ids };

        let mut outcome = PresenceBroadcast {
            online,
            ..Default::default()
        };
        for conn in state.by_user.values().flatten().chain(state.anonymous.iter()) {
            outcome.connections += 1;
            if conn.push(event.clone()) {
                outcome.delivered += 1;
            } else {
                outcome.closed.push(conn.id());
            }
        }
        outcome
    }

    pub fn connection_count(&self) -> usize {
        let state = self.state.lock();
        state.by_user.values().map(Vec::len).sum::<usize>() + state.anonymous.len()
    }
}
