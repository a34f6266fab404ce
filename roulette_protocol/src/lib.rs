//! Message vocabulary for the roulette signaling server
//!
//! Clients and the server exchange JSON text frames. Every frame is a JSON
//! object carrying a `type` field.
//!
//! ## Client → server
//!
//! - `{"type": "request_new_peer"}` - end the current call (if any) and look for a new partner
//! - `{"type": "report_user", "reportedPeerId": 7, "reason": "..."}` - flag the current partner
//! - anything else (`offer`, `answer`, `candidate`, ...) - relayed verbatim to the current partner
//!
//! ## Server → client
//!
//! - `{"type": "start_call", "ownId": 2, "peerId": 1}` - you have been paired
//! - `{"type": "waiting"}` - no partner available yet
//! - `{"type": "call_ended"}` - your partner left or asked for someone else
//! - `{"type": "report_received"}` - your partner reported you
//! - relayed frames, unchanged except for an added `senderId`

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// `type` of a request for a new partner
pub const SEEK_TYPE: &str = "request_new_peer";
const SEEK_ALIAS: &str = "seek";

/// `type` of a moderation report
pub const REPORT_TYPE: &str = "report_user";
const REPORT_ALIAS: &str = "report";

const START_CALL_TYPE: &str = "start_call";
const WAITING_TYPE: &str = "waiting";
const CALL_ENDED_TYPE: &str = "call_ended";
const REPORT_RECEIVED_TYPE: &str = "report_received";

/// Field added to relayed frames naming the client that sent them
pub const SENDER_FIELD: &str = "senderId";

/// A JSON object forwarded between partners
pub type Payload = Map<String, Value>;

/// Identifier the server assigns to each connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl From<u64> for ClientId {
    fn from(id: u64) -> Self {
        ClientId(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors decoding a frame
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON, or a known message has ill-typed fields
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// Relayed frame without a `senderId`
    #[error("Relayed frame has no sender")]
    MissingSender,
}

/// A moderation report filed against the reporter's partner
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(
        rename = "reportedPeerId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reported_peer_id: Option<ClientId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Requests a client can send to the server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// Look for a (new) partner
    Seek,
    /// Report the current partner
    Report(Report),
    /// Negotiation payload for the current partner
    Relay(Payload),
}

fn frame_type(payload: &Payload) -> Option<&str> {
    payload.get("type").and_then(Value::as_str)
}

fn parse_object(s: &str) -> Result<Payload, ProtocolError> {
    match serde_json::from_str(s)? {
        Value::Object(map) => Ok(map),
        _ => Err(ProtocolError::NotAnObject),
    }
}

impl ClientRequest {
    /// Classify an already-parsed JSON object.
    ///
    /// Unknown or missing `type`s are relays, so new negotiation messages pass
    /// through without a server upgrade.
    pub fn from_payload(payload: Payload) -> Result<Self, ProtocolError> {
        match frame_type(&payload) {
            Some(SEEK_TYPE | SEEK_ALIAS) => Ok(ClientRequest::Seek),
            Some(REPORT_TYPE | REPORT_ALIAS) => {
                let report = serde_json::from_value(Value::Object(payload))?;
                Ok(ClientRequest::Report(report))
            }
            _ => Ok(ClientRequest::Relay(payload)),
        }
    }

    /// Name used in logs
    pub fn kind(&self) -> &str {
        match self {
            ClientRequest::Seek => SEEK_TYPE,
            ClientRequest::Report(_) => REPORT_TYPE,
            ClientRequest::Relay(payload) => frame_type(payload).unwrap_or("relay"),
        }
    }
}

impl FromStr for ClientRequest {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_payload(parse_object(s)?)
    }
}

/// Events the server sends to a client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The client was paired with `peer_id`
    StartCall { own_id: ClientId, peer_id: ClientId },
    /// The client is queued until another client shows up
    Waiting,
    /// The partner left or moved on
    CallEnded,
    /// The partner filed a report against this client
    ReportReceived,
    /// A negotiation payload from the partner
    Relay { sender: ClientId, payload: Payload },
}

#[derive(Deserialize)]
struct StartCallFields {
    #[serde(rename = "ownId")]
    own_id: ClientId,
    #[serde(rename = "peerId")]
    peer_id: ClientId,
}

impl ServerEvent {
    fn to_json(&self) -> Value {
        match self {
            ServerEvent::StartCall { own_id, peer_id } => json!({
                "type": START_CALL_TYPE,
                "ownId": own_id,
                "peerId": peer_id,
            }),
            ServerEvent::Waiting => json!({ "type": WAITING_TYPE }),
            ServerEvent::CallEnded => json!({ "type": CALL_ENDED_TYPE }),
            ServerEvent::ReportReceived => json!({ "type": REPORT_RECEIVED_TYPE }),
            ServerEvent::Relay { sender, payload } => {
                let mut payload = payload.clone();
                payload.insert(SENDER_FIELD.to_string(), json!(sender));
                Value::Object(payload)
            }
        }
    }
}

impl FromStr for ServerEvent {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut payload = parse_object(s)?;
        match frame_type(&payload) {
            Some(START_CALL_TYPE) => {
                let fields: StartCallFields = serde_json::from_value(Value::Object(payload))?;
                Ok(ServerEvent::StartCall {
                    own_id: fields.own_id,
                    peer_id: fields.peer_id,
                })
            }
            Some(WAITING_TYPE) => Ok(ServerEvent::Waiting),
            Some(CALL_ENDED_TYPE) => Ok(ServerEvent::CallEnded),
            Some(REPORT_RECEIVED_TYPE) => Ok(ServerEvent::ReportReceived),
            _ => {
                let sender = payload
                    .remove(SENDER_FIELD)
                    .ok_or(ProtocolError::MissingSender)?;
                let sender = serde_json::from_value(sender)?;
                Ok(ServerEvent::Relay { sender, payload })
            }
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
