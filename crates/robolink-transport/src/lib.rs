//! UART and TCP transport abstraction for the robot link bridge.
//!
//! Two byte pipes meet in the bridge:
//! - the serial link to the robot controller ([`UartTransport`], shared as a [`UartHandle`])
//! - the TCP link to the host-side controller ([`LinkListener`] / [`LinkStream`])
//!
//! This is the lowest layer of robolink. Framing, routing, and telemetry all
//! build on the types provided here.

pub mod error;
pub mod memory;
pub mod serial;
pub mod tcp;
pub mod traits;
pub mod uart;

pub use error::{Result, TransportError};
pub use memory::MemoryUart;
pub use serial::{SerialUart, UartConfig, DEFAULT_BAUD_RATE};
pub use tcp::{LinkListener, LinkStream, RecvOutcome, DEFAULT_PORT};
pub use traits::UartTransport;
pub use uart::{UartHandle, WriteOutcome, DEFAULT_TX_DONE_TIMEOUT};
