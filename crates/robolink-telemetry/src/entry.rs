use std::time::Duration;

use serde::{Serialize, Serializer};

/// A command forwarded from the TCP client to the robot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentCommand {
    #[serde(rename = "cmd")]
    pub text: String,
    /// The UART accepted every byte and drained within its bound.
    pub confirmed: bool,
    #[serde(rename = "time", serialize_with = "seconds")]
    pub timestamp: Duration,
}

/// Data the robot sent back, with non-printable bytes masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceivedEntry {
    #[serde(rename = "data")]
    pub text: String,
    #[serde(rename = "time", serialize_with = "seconds")]
    pub timestamp: Duration,
}

/// One captured diagnostic line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub text: String,
    #[serde(rename = "time", serialize_with = "seconds")]
    pub timestamp: Duration,
}

/// Replace every byte outside printable ASCII (0x20..=0x7E) with `.`.
pub fn sanitize(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Seconds since start as a string with millisecond precision.
pub fn format_seconds(elapsed: Duration) -> String {
    format!("{}.{:03}", elapsed.as_secs(), elapsed.subsec_millis())
}

fn seconds<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_seconds(*elapsed))
}
