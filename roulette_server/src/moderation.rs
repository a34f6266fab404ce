//! Where user reports go

use roulette_protocol::{ClientId, Report};
use tracing::warn;

/// A report as filed, with the reporter filled in by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationReport {
    pub reporter: ClientId,
    /// The reporter's partner when the report arrived
    pub current_peer: Option<ClientId>,
    pub report: Report,
}

/// Receives moderation reports
///
/// Implementations must not block; they run on the signaling core's task.
pub trait ModerationSink: Send {
    fn record(&mut self, report: ModerationReport);
}

/// Writes every report to the log at `warn` level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogModeration;

impl ModerationSink for LogModeration {
    fn record(&mut self, report: ModerationReport) {
        let reported = report
            .report
            .reported_peer_id
            .map_or_else(|| "unknown".to_string(), |id| id.to_string());
        warn!(
            reporter = %report.reporter,
            reported = %reported,
            current_peer = ?report.current_peer.map(|id| id.0),
            reason = report.report.reason.as_deref().unwrap_or("unspecified"),
            "user report received"
        );
    }
}
