//! Live connections and their pairing state
//!
//! The registry is the only place clients are created or destroyed. Peers
//! refer to each other by [`ClientId`], never by handle, so removing one side
//! can't leave the other holding a dangling connection.

use crate::error::SignalingError;
use roulette_protocol::{ClientId, ServerEvent};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Where a client is in the pairing flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Connected, neither queued nor paired
    Idle,
    /// Queued in the waiting pool
    Waiting,
    /// In a session with the contained peer
    Paired(ClientId),
}

/// Events a connection may have queued before further sends are dropped
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound side of a transport connection
///
/// Sends never block the core. A connection whose writer falls behind by
/// more than its queue capacity loses the excess events.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver the transport drains
    pub fn channel() -> (Self, mpsc::Receiver<ServerEvent>) {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Whether the transport is still reading from this handle
    pub fn is_writable(&self) -> bool {
        !self.sender.is_closed()
    }

    fn try_send(&self, event: ServerEvent) -> Result<(), TrySendError<ServerEvent>> {
        self.sender.try_send(event)
    }
}

/// One connected participant
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    handle: ConnectionHandle,
    pub(crate) state: ClientState,
}

impl Client {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The current partner, present iff the client is paired
    pub fn peer_id(&self) -> Option<ClientId> {
        match self.state {
            ClientState::Paired(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.handle.is_writable()
    }

    /// Queue an event for this client.
    ///
    /// Fails when the connection is no longer writable or its queue is full;
    /// either way the event is dropped.
    pub fn send(&self, event: ServerEvent) -> Result<(), SignalingError> {
        match self.handle.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(client_id = %self.id, "send queue full, dropping event");
                Err(SignalingError::QueueFull(self.id))
            }
            Err(TrySendError::Closed(_)) => Err(SignalingError::SendError(self.id)),
        }
    }
}

/// Every live client, by id
#[derive(Debug)]
pub struct ConnectionRegistry {
    clients: HashMap<ClientId, Client>,
    next_id: u64,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a new `Idle` client under the next id.
    ///
    /// Ids are never reused within the life of the registry.
    pub fn register(&mut self, handle: ConnectionHandle) -> &Client {
        let id = ClientId(self.next_id);
        self.next_id += 1;
        self.clients.entry(id).or_insert(Client {
            id,
            handle,
            state: ClientState::Idle,
        })
    }

    /// Drop a client. Returns whether it was present.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }
}
