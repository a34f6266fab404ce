//! Dispatch of decoded client requests
//!
//! `Seek` and `Report` change or record pairing state; everything else is a
//! relay and goes to the sender's current peer only. Nothing here fails the
//! connection: undeliverable requests are logged and dropped.

use crate::moderation::{ModerationReport, ModerationSink};
use crate::pairing::PairingEngine;
use roulette_protocol::{ClientId, ClientRequest, Payload, Report, ServerEvent};
use tracing::{debug, warn};

pub struct SessionRouter {
    moderation: Box<dyn ModerationSink>,
}

impl SessionRouter {
    pub fn new(moderation: impl ModerationSink + 'static) -> Self {
        Self {
            moderation: Box::new(moderation),
        }
    }

    /// Handle one request from `sender`
    pub fn route(&mut self, engine: &mut PairingEngine, sender: ClientId, request: ClientRequest) {
        if !engine.registry().contains(sender) {
            debug!(client_id = %sender, kind = request.kind(), "request from unknown client");
            return;
        }
        match request {
            ClientRequest::Seek => {
                debug!(client_id = %sender, "client requested a new peer");
                if let Err(e) = engine.seek_peer(sender) {
                    warn!(client_id = %sender, error = %e, "seek failed");
                }
            }
            ClientRequest::Report(report) => self.report(engine, sender, report),
            ClientRequest::Relay(payload) => relay(engine, sender, payload),
        }
    }

    fn report(&mut self, engine: &PairingEngine, sender: ClientId, report: Report) {
        let current_peer = engine.registry().get(sender).and_then(|c| c.peer_id());
        if let Some(reported) = report.reported_peer_id {
            if Some(reported) != current_peer {
                warn!(
                    client_id = %sender,
                    reported = %reported,
                    "report names a client that is not the current peer"
                );
            }
        }
        self.moderation.record(ModerationReport {
            reporter: sender,
            current_peer,
            report,
        });
        if let Some(peer_id) = current_peer {
            engine.notify(peer_id, ServerEvent::ReportReceived);
        }
    }
}

fn relay(engine: &PairingEngine, sender: ClientId, payload: Payload) {
    let kind = payload
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("relay");
    let Some(peer_id) = engine.registry().get(sender).and_then(|c| c.peer_id()) else {
        debug!(client_id = %sender, kind, "no peer connected; message not delivered");
        return;
    };
    let Some(peer) = engine.registry().get(peer_id).filter(|p| p.is_writable()) else {
        debug!(client_id = %sender, %peer_id, kind, "peer not writable; message not delivered");
        return;
    };
    let kind = kind.to_string();
    match peer.send(ServerEvent::Relay { sender, payload }) {
        Ok(()) => debug!(client_id = %sender, %peer_id, kind = %kind, "relayed message"),
        Err(e) => debug!(client_id = %sender, %peer_id, kind = %kind, error = %e, "relay failed"),
    }
}
