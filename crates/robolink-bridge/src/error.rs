/// Errors that can occur in bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] robolink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] robolink_frame::FrameError),

    /// Failed to start a worker thread.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    /// A MAC address string could not be parsed.
    #[error("invalid MAC address {0:?} (expected 12 hex digits, optionally ':'-separated)")]
    InvalidMac(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
