//! Error types for the signaling server

use roulette_protocol::{ClientId, ProtocolError};
use thiserror::Error;

/// Errors that can occur during signaling
#[derive(Error, Debug)]
pub enum SignalingError {
    /// The connection's writer has gone away
    #[error("Failed to send message to client {0}")]
    SendError(ClientId),

    /// The connection's outbound queue is full
    #[error("Send queue full for client {0}")]
    QueueFull(ClientId),

    /// No live client with this id
    #[error("Unknown client {0}")]
    UnknownClient(ClientId),

    /// The dispatcher task has stopped
    #[error("Signaling core is not running")]
    CoreStopped,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    /// Socket error outside the WebSocket layer
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from client requests
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Connection was closed
    #[error("Connection closed")]
    Close,

    /// Frame could not be decoded
    #[error("Malformed message: {0}")]
    Protocol(#[from] ProtocolError),

    /// Unsupported message type
    #[error("Unsupported message type")]
    UnsupportedType,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
}

/// A broken pairing invariant, reported by
/// [`PairingEngine::verify_invariants`](crate::pairing::PairingEngine::verify_invariants)
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A client is paired with itself
    #[error("Client {0} is paired with itself")]
    SelfPaired(ClientId),

    /// A client points at a peer that is not registered
    #[error("Client {client} is paired with unknown client {peer}")]
    UnknownPeer { client: ClientId, peer: ClientId },

    /// A client points at a peer that does not point back
    #[error("Client {client} is paired with {peer}, which is not paired back")]
    Asymmetric { client: ClientId, peer: ClientId },

    /// A pool entry is not a live waiting client
    #[error("Client {0} is queued but not waiting")]
    QueuedNotWaiting(ClientId),

    /// A waiting client is missing from the pool
    #[error("Client {0} is waiting but not queued")]
    WaitingNotQueued(ClientId),
}
