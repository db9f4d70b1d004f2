use std::time::Duration;

use bytes::Bytes;
use robolink_frame::{FrameConfig, DEFAULT_MAX_FRAME_SIZE, STOP_COMMAND};

use crate::heartbeat::DEFAULT_HEARTBEAT_THRESHOLD;

/// Behaviour knobs for the bridge, the accept loop, and the UART poller.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Sleep between polling cycles. Default: 10 ms.
    pub poll_interval: Duration,
    /// Period of `{Heartbeat}` probes. Default: 1 s.
    pub heartbeat_interval: Duration,
    /// Unacknowledged probes tolerated; one more closes the link. Default: 3.
    pub heartbeat_threshold: u32,
    /// Maximum message size on both sides, braces included. Default: 256.
    pub max_frame_size: usize,
    /// Drop spaces inside socket-side frames before routing. Default: off.
    pub strip_socket_spaces: bool,
    /// Written to the UART once whenever a link closes.
    pub stop_command: Bytes,
    /// Bytes read from the socket per cycle. Default: 512.
    pub socket_read_chunk: usize,
    /// Bytes read from the UART per cycle. Default: 256.
    pub uart_read_chunk: usize,
    /// Bound on a single socket send. Default: 1 s.
    pub send_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            heartbeat_interval: Duration::from_millis(1000),
            heartbeat_threshold: DEFAULT_HEARTBEAT_THRESHOLD,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            strip_socket_spaces: false,
            stop_command: Bytes::from_static(STOP_COMMAND),
            socket_read_chunk: 512,
            uart_read_chunk: 256,
            send_timeout: Duration::from_millis(1000),
        }
    }
}

impl BridgeConfig {
    pub fn socket_frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            strip_spaces: self.strip_socket_spaces,
        }
    }

    pub fn uart_frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            strip_spaces: false,
        }
    }
}
