/// Errors that can occur while reading framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading from the stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream reached EOF.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
