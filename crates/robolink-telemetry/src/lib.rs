//! Bounded, snapshot-and-clear telemetry history.
//!
//! Three fixed-capacity rings (commands sent to the robot, data received from
//! it, diagnostic log lines) sit behind one mutex. Every operation waits at
//! most a few milliseconds for that mutex and degrades to a no-op or an empty
//! result instead of blocking the bridge.
//!
//! - [`TelemetryLog`]: the shared history; create once, share as `Arc`
//! - [`TelemetrySnapshot`]: the drained view, serializable to the status JSON
//! - [`TelemetryLayer`]: `tracing` layer that copies log events into the log ring

pub mod entry;
pub mod layer;
pub mod log;
pub mod ring;
pub mod snapshot;

pub use entry::{format_seconds, sanitize, LogEntry, ReceivedEntry, SentCommand};
pub use layer::TelemetryLayer;
pub use log::{
    TelemetryConfig, TelemetryCounts, TelemetryLog, DEFAULT_CAPACITY, DEFAULT_LOCK_TIMEOUT,
    FORWARD_TARGET,
};
pub use ring::RingBuffer;
pub use snapshot::{TelemetrySnapshot, TelemetryStatus};
