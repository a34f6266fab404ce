//! Per-connection lifecycle: connect, message, close, error
//!
//! [`SignalingCore`] is the single owner of all pairing state. Every method
//! takes `&mut self`, so events from all connections have to pass through
//! one owner (see [`crate::dispatcher`]).

use crate::moderation::{LogModeration, ModerationSink};
use crate::pairing::PairingEngine;
use crate::registry::ConnectionHandle;
use crate::router::SessionRouter;
use roulette_protocol::{ClientId, ClientRequest};
use tracing::{debug, info, warn};

pub struct SignalingCore {
    engine: PairingEngine,
    router: SessionRouter,
}

impl Default for SignalingCore {
    fn default() -> Self {
        Self::new(LogModeration)
    }
}

impl SignalingCore {
    pub fn new(moderation: impl ModerationSink + 'static) -> Self {
        Self {
            engine: PairingEngine::new(),
            router: SessionRouter::new(moderation),
        }
    }

    pub fn engine(&self) -> &PairingEngine {
        &self.engine
    }

    #[cfg(test)]
    pub(crate) fn engine_mut(&mut self) -> &mut PairingEngine {
        &mut self.engine
    }

    /// Register a new connection and immediately look for a peer for it
    pub fn on_connect(&mut self, handle: ConnectionHandle) -> ClientId {
        let client_id = self.engine.register(handle);
        info!(%client_id, clients = self.engine.registry().len(), "client connected");
        if let Err(e) = self.engine.seek_peer(client_id) {
            warn!(%client_id, error = %e, "initial pairing failed");
        }
        client_id
    }

    pub fn on_message(&mut self, client_id: ClientId, request: ClientRequest) {
        self.router.route(&mut self.engine, client_id, request);
    }

    /// Tear down the client's session and forget it. Safe to call twice.
    pub fn on_close(&mut self, client_id: ClientId) {
        if self.engine.unregister(client_id) {
            info!(
                %client_id,
                clients = self.engine.registry().len(),
                "client disconnected"
            );
        } else {
            debug!(%client_id, "close for unknown client");
        }
    }

    pub fn on_error(&mut self, client_id: ClientId, cause: &str) {
        warn!(%client_id, cause, "connection error");
        self.on_close(client_id);
    }
}
