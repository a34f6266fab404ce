//! Session creation and teardown
//!
//! A session is never stored on its own: it is the pair of clients whose
//! [`ClientState::Paired`] entries name each other. Every transition that
//! sets or clears those entries lives here, so both sides always change
//! together.

use crate::error::{InvariantViolation, SignalingError};
use crate::pool::WaitingPool;
use crate::registry::{Client, ClientState, ConnectionHandle, ConnectionRegistry};
use roulette_protocol::{ClientId, ServerEvent};
use tracing::{debug, error, info, warn};

/// Result of [`PairingEngine::seek_peer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Matched with the contained client
    Paired(ClientId),
    /// Queued in the waiting pool
    Waiting,
}

/// Owns the registry and the waiting pool, and all pairing transitions
#[derive(Debug, Default)]
pub struct PairingEngine {
    registry: ConnectionRegistry,
    pool: WaitingPool,
}

impl PairingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WaitingPool {
        &self.pool
    }

    /// Register a new connection as an idle client
    pub fn register(&mut self, handle: ConnectionHandle) -> ClientId {
        self.registry.register(handle).id()
    }

    /// End any session `client_id` is in and forget it.
    ///
    /// Returns false if the client was already gone.
    pub fn unregister(&mut self, client_id: ClientId) -> bool {
        if !self.registry.contains(client_id) {
            return false;
        }
        self.end_session(client_id);
        self.registry.remove(client_id)
    }

    /// Find a partner for `client_id`, or queue it.
    ///
    /// A paired client first leaves its current session. A client that is
    /// already waiting keeps its place and is told again that it is waiting.
    pub fn seek_peer(&mut self, client_id: ClientId) -> Result<SeekOutcome, SignalingError> {
        let state = self
            .registry
            .get(client_id)
            .map(Client::state)
            .ok_or(SignalingError::UnknownClient(client_id))?;

        match state {
            ClientState::Idle => {}
            ClientState::Paired(_) => self.end_session(client_id),
            ClientState::Waiting => {
                debug!(%client_id, "client is already waiting");
                self.notify(client_id, ServerEvent::Waiting);
                return Ok(SeekOutcome::Waiting);
            }
        }

        while let Some(candidate) = self.pool.dequeue_oldest() {
            if candidate == client_id {
                continue;
            }
            match self.registry.get(candidate).map(Client::state) {
                Some(ClientState::Waiting | ClientState::Idle) => {
                    self.pair(candidate, client_id);
                    return Ok(SeekOutcome::Paired(candidate));
                }
                Some(ClientState::Paired(peer_id)) => {
                    warn!(client_id = %candidate, %peer_id, "discarding paired client found in pool");
                }
                None => {
                    debug!(client_id = %candidate, "discarding stale pool entry");
                }
            }
        }

        self.set_state(client_id, ClientState::Waiting);
        self.pool.enqueue(client_id);
        info!(%client_id, waiting = self.pool.len(), "client waiting for a peer");
        self.notify(client_id, ServerEvent::Waiting);
        Ok(SeekOutcome::Waiting)
    }

    /// Return `client_id` to `Idle`.
    ///
    /// A paired client's partner is told the call ended and is returned to
    /// `Idle` too; a waiting client leaves the pool. Idle and unknown clients
    /// are left alone.
    pub fn end_session(&mut self, client_id: ClientId) {
        let Some(state) = self.registry.get(client_id).map(Client::state) else {
            return;
        };
        match state {
            ClientState::Idle => {}
            ClientState::Waiting => {
                self.pool.remove_if_present(client_id);
                self.set_state(client_id, ClientState::Idle);
                debug!(%client_id, "client left the waiting pool");
            }
            ClientState::Paired(peer_id) => {
                self.set_state(client_id, ClientState::Idle);
                match self.registry.get(peer_id).map(Client::state) {
                    Some(ClientState::Paired(back)) if back == client_id => {
                        self.set_state(peer_id, ClientState::Idle);
                        info!(%client_id, %peer_id, "session ended");
                        self.notify(peer_id, ServerEvent::CallEnded);
                    }
                    Some(other) => {
                        error!(%client_id, %peer_id, peer_state = ?other, "peer was not paired back");
                    }
                    None => {
                        debug!(%client_id, %peer_id, "peer already disconnected");
                    }
                }
            }
        }
    }

    /// Check the pairing invariants over the whole registry and pool
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        for client in self.registry.iter() {
            let id = client.id();
            match client.state() {
                ClientState::Paired(peer) if peer == id => {
                    return Err(InvariantViolation::SelfPaired(id));
                }
                ClientState::Paired(peer) => match self.registry.get(peer).map(Client::state) {
                    None => return Err(InvariantViolation::UnknownPeer { client: id, peer }),
                    Some(ClientState::Paired(back)) if back == id => {}
                    Some(_) => return Err(InvariantViolation::Asymmetric { client: id, peer }),
                },
                ClientState::Waiting if !self.pool.contains(id) => {
                    return Err(InvariantViolation::WaitingNotQueued(id));
                }
                _ => {}
            }
        }
        for id in self.pool.iter() {
            if self.registry.get(id).map(Client::state) != Some(ClientState::Waiting) {
                return Err(InvariantViolation::QueuedNotWaiting(id));
            }
        }
        Ok(())
    }

    fn pair(&mut self, waiting: ClientId, seeker: ClientId) {
        self.set_state(waiting, ClientState::Paired(seeker));
        self.set_state(seeker, ClientState::Paired(waiting));
        info!(client_id = %seeker, peer_id = %waiting, "paired clients");

        self.notify(
            waiting,
            ServerEvent::StartCall {
                own_id: waiting,
                peer_id: seeker,
            },
        );
        self.notify(
            seeker,
            ServerEvent::StartCall {
                own_id: seeker,
                peer_id: waiting,
            },
        );
    }

    pub(crate) fn set_state(&mut self, client_id: ClientId, state: ClientState) {
        if let Some(client) = self.registry.get_mut(client_id) {
            client.state = state;
        }
    }

    pub(crate) fn notify(&self, client_id: ClientId, event: ServerEvent) {
        let Some(client) = self.registry.get(client_id) else {
            return;
        };
        if let Err(e) = client.send(event) {
            debug!(%client_id, error = %e, "dropped outbound event");
        }
    }
}
