//! Wi-Fi/TCP to UART command bridge for serial robot controllers.
//!
//! A host-side client connects over TCP and exchanges brace-delimited
//! messages with the robot's controller on a serial line. The bridge answers
//! factory-test probes locally, keeps the client alive with heartbeats, and
//! sends a stop command to the robot whenever the link drops.
//!
//! # Crate Structure
//!
//! - [`transport`]: UART abstraction (serial port, in-memory) and TCP link
//! - [`frame`]: `{`…`}` message framing and the well-known literals
//! - [`telemetry`]: bounded command/response history with JSON snapshots
//! - [`bridge`]: routing, heartbeat, accept loop (behind `bridge` feature)

/// Re-export transport types.
pub mod transport {
    pub use robolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use robolink_frame::*;
}

/// Re-export telemetry types.
pub mod telemetry {
    pub use robolink_telemetry::*;
}

/// Re-export bridge types (requires `bridge` feature).
#[cfg(feature = "bridge")]
pub mod bridge {
    pub use robolink_bridge::*;
}
