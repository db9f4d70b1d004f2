//! TCP-to-UART command bridge for a serial robot controller.
//!
//! One host-side client at a time drives the robot over TCP. Messages in both
//! directions are brace-framed, routed, and logged to telemetry; a heartbeat
//! detects a vanished client and a fail-safe stop command halts the robot
//! whenever the link goes away.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod identity;
pub mod link;
pub mod listener;
pub mod poller;
pub mod router;

pub use bridge::{BridgeContext, BridgeReport, CloseReason, LinkState, SocketBridge};
pub use config::BridgeConfig;
pub use dispatch::{Dispatched, Dispatcher};
pub use error::{BridgeError, Result};
pub use heartbeat::{HeartbeatState, HeartbeatStatus, DEFAULT_HEARTBEAT_THRESHOLD};
pub use identity::{wa_reply, NetworkIdentity, StaticIdentity};
pub use link::{ActiveGuard, ActiveLink, IdleGuard};
pub use listener::BridgeListener;
pub use poller::UartPoller;
pub use router::{AutoReply, MessageRouter, Origin, RouteAction};
