use serde::Serialize;

use crate::entry::{ReceivedEntry, SentCommand};

/// Occupancy and uptime at the moment of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryStatus {
    /// Whole seconds since the telemetry log was created.
    pub uptime: u64,
    /// Sent entries held before the clear.
    pub sent_buf: usize,
    /// Received entries held before the clear.
    pub recv_buf: usize,
    /// Capacity of the sent ring.
    pub sent_max: usize,
    /// Capacity of the received ring.
    pub recv_max: usize,
}

/// Drained view of the telemetry history.
///
/// Serializes to the status payload served to pollers:
///
/// ```text
/// {"status":{"uptime":..,"sent_buf":..,"recv_buf":..,"sent_max":..,"recv_max":..},
///  "sent":[{"cmd":"..","confirmed":true,"time":".."}],
///  "received":[{"data":"..","time":".."}]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub status: TelemetryStatus,
    pub sent: Vec<SentCommand>,
    pub received: Vec<ReceivedEntry>,
}

impl TelemetrySnapshot {
    /// Compact JSON rendering. String fields are escaped by `serde_json`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// True when nothing was buffered.
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
            && self.received.is_empty()
            && self.status.sent_buf == 0
            && self.status.recv_buf == 0
    }
}
