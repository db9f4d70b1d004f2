//! Brace-delimited message framing for robot controller links.
//!
//! The controller protocol has no length prefix. A message is every byte from
//! a `{` up to and including the next `}`:
//!
//! ```text
//! noise { N : 3 , D1 : 100 } noise {Heartbeat}
//!       └──── one message ───┘       └─ one ──┘
//! ```
//!
//! There is no nesting awareness: the first `}` ends the frame. Frames longer
//! than the configured maximum are discarded without being emitted.

pub mod error;
pub mod extractor;
pub mod message;
pub mod reader;

pub use error::{FrameError, Result};
pub use extractor::{Extract, FrameConfig, FrameExtractor, DEFAULT_MAX_FRAME_SIZE};
pub use message::{
    Message, BT_DETECTION, BT_OK, CLOSE_BRACE, HEARTBEAT, OPEN_BRACE, STOP_COMMAND, WA_DETECTION,
};
pub use reader::MessageReader;
