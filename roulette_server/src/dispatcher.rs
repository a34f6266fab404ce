//! The single serialization point for all connection events
//!
//! Connections never touch [`SignalingCore`] directly. They send
//! [`CoreEvent`]s down one bounded channel, and one task applies them in
//! arrival order, each to completion. Events from a single connection keep
//! their order because each connection sends from one task. When the core
//! falls behind, senders wait, which stops their sockets being read.

use crate::error::SignalingError;
use crate::lifecycle::SignalingCore;
use crate::registry::ConnectionHandle;
use roulette_protocol::{ClientId, ClientRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Events that may be queued for the core before connections wait
pub const EVENT_CAPACITY: usize = 1024;

/// Something that happened on a connection
#[derive(Debug)]
pub enum CoreEvent {
    /// A transport connection was established
    Connect {
        handle: ConnectionHandle,
        reply: oneshot::Sender<ClientId>,
    },
    /// A decoded request arrived
    Message {
        client_id: ClientId,
        request: ClientRequest,
    },
    /// The connection closed cleanly
    Close { client_id: ClientId },
    /// The connection failed
    Error { client_id: ClientId, cause: String },
}

/// Cloneable sender side of the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    events: mpsc::Sender<CoreEvent>,
}

impl DispatcherHandle {
    /// Register a connection and wait for its id
    pub async fn connect(&self, handle: ConnectionHandle) -> Result<ClientId, SignalingError> {
        let (reply, id) = oneshot::channel();
        self.send(CoreEvent::Connect { handle, reply }).await?;
        id.await.map_err(|_| SignalingError::CoreStopped)
    }

    pub async fn message(
        &self,
        client_id: ClientId,
        request: ClientRequest,
    ) -> Result<(), SignalingError> {
        self.send(CoreEvent::Message { client_id, request }).await
    }

    pub async fn close(&self, client_id: ClientId) -> Result<(), SignalingError> {
        self.send(CoreEvent::Close { client_id }).await
    }

    pub async fn error(
        &self,
        client_id: ClientId,
        cause: impl Into<String>,
    ) -> Result<(), SignalingError> {
        let cause = cause.into();
        self.send(CoreEvent::Error { client_id, cause }).await
    }

    /// Queue an event, waiting for room if the core is behind
    async fn send(&self, event: CoreEvent) -> Result<(), SignalingError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SignalingError::CoreStopped)
    }
}

/// Owns the core and applies events to it
pub struct Dispatcher {
    core: SignalingCore,
    events: mpsc::Receiver<CoreEvent>,
}

impl Dispatcher {
    pub fn new(core: SignalingCore) -> (Self, DispatcherHandle) {
        Self::with_capacity(core, EVENT_CAPACITY)
    }

    pub fn with_capacity(core: SignalingCore, capacity: usize) -> (Self, DispatcherHandle) {
        let (sender, events) = mpsc::channel(capacity);
        (Self { core, events }, DispatcherHandle { events: sender })
    }

    /// Run on a new task. The task returns the core once every handle is dropped.
    pub fn spawn(core: SignalingCore) -> (DispatcherHandle, JoinHandle<SignalingCore>) {
        let (dispatcher, handle) = Self::new(core);
        (handle, tokio::spawn(dispatcher.run()))
    }

    pub async fn run(mut self) -> SignalingCore {
        while let Some(event) = self.events.recv().await {
            self.apply(event);
        }
        debug!("all dispatcher handles dropped; stopping");
        self.core
    }

    fn apply(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Connect { handle, reply } => {
                let client_id = self.core.on_connect(handle);
                if reply.send(client_id).is_err() {
                    // connection task gave up before learning its id
                    self.core.on_close(client_id);
                }
            }
            CoreEvent::Message { client_id, request } => self.core.on_message(client_id, request),
            CoreEvent::Close { client_id } => self.core.on_close(client_id),
            CoreEvent::Error { client_id, cause } => self.core.on_error(client_id, &cause),
        }

        if cfg!(debug_assertions) {
            if let Err(violation) = self.core.engine().verify_invariants() {
                error!(%violation, "pairing invariant violated");
            }
        }
    }
}
