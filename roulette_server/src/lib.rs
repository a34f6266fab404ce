//! Signaling relay for anonymous peer-to-peer video chat
//!
//! Clients connect over WebSocket and are paired two at a time, oldest
//! waiting client first. The server forwards only the negotiation messages
//! (offers, answers, candidates) partners need to open a direct media
//! channel; media never passes through it.
//!
//! # Architecture
//!
//! - [`registry`] - live clients and their pairing state
//! - [`pool`] - FIFO queue of clients waiting for a partner
//! - [`pairing`] - every session create/teardown transition
//! - [`router`] - classify client requests and relay to the current peer
//! - [`lifecycle`] - connect/message/close/error handling
//! - [`dispatcher`] - the one task that owns all of the above
//! - [`handler`] - axum routes: WebSocket sessions, health and info replies
//!
//! # Example
//!
//! ```bash
//! roulette-signaling --port 8080
//!
//! # health check
//! curl http://127.0.0.1:8080/health
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod moderation;
pub mod pairing;
pub mod pool;
pub mod registry;
pub mod router;

pub use config::{Cli, ServerConfig};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::SignalingError;
pub use handler::{build_router, serve};
pub use lifecycle::SignalingCore;
pub use moderation::{LogModeration, ModerationSink};
