use std::sync::Arc;

use bytes::Bytes;
use robolink_frame::{Message, BT_DETECTION, BT_OK, HEARTBEAT, WA_DETECTION};

use crate::identity::{wa_reply, NetworkIdentity, StaticIdentity};

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Robot controller, over the serial line.
    Uart,
    /// Host client, over TCP.
    Socket,
}

/// Which factory-test probe an automatic reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoReply {
    BtDetection,
    WaDetection,
}

/// What to do with one framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Answer the controller directly; nothing is forwarded or recorded.
    ReplyUart { probe: AutoReply, reply: Bytes },
    /// The client acknowledged a heartbeat.
    AbsorbHeartbeat,
    /// Forward a client command to the controller.
    ForwardToUart(Message),
    /// Forward controller output to the client.
    ForwardToSocket(Message),
}

/// Classifies messages by content and origin. Exactly one action per message.
#[derive(Clone)]
pub struct MessageRouter {
    identity: Arc<dyn NetworkIdentity>,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(Arc::new(StaticIdentity::default()))
    }
}

impl MessageRouter {
    pub fn new(identity: Arc<dyn NetworkIdentity>) -> Self {
        Self { identity }
    }

    pub fn route(&self, message: &Message, origin: Origin) -> RouteAction {
        // Factory probes are answered on the UART whichever side they came from.
        if message.is(BT_DETECTION) {
            return RouteAction::ReplyUart {
                probe: AutoReply::BtDetection,
                reply: Bytes::from_static(BT_OK),
            };
        }
        if message.is(WA_DETECTION) {
            return RouteAction::ReplyUart {
                probe: AutoReply::WaDetection,
                reply: wa_reply(self.identity.as_ref()),
            };
        }

        match origin {
            Origin::Socket if message.is(HEARTBEAT) => RouteAction::AbsorbHeartbeat,
            Origin::Socket => RouteAction::ForwardToUart(message.clone()),
            Origin::Uart => RouteAction::ForwardToSocket(message.clone()),
        }
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("ssid", &self.identity.station_ssid())
            .finish()
    }
}
