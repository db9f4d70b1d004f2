use std::sync::Arc;

use robolink_telemetry::TelemetryLog;
use robolink_transport::{LinkStream, TransportError, UartHandle, WriteOutcome};
use tracing::{debug, info, warn};

use crate::heartbeat::HeartbeatState;
use crate::router::RouteAction;

/// What applying a [`RouteAction`] did.
#[derive(Debug)]
pub enum Dispatched {
    /// Factory-test reply written to the UART, possibly truncated.
    Replied(WriteOutcome),
    /// Client heartbeat acknowledged.
    HeartbeatAcked,
    /// Command written to the UART.
    ToUart(WriteOutcome),
    /// Command could not be written to the UART at all.
    UartFailed,
    /// Controller output sent to the client.
    ToSocket,
    /// Controller output recorded, but no client is connected.
    NoClient,
    /// Sending to the client failed; the link should close.
    SocketFailed(TransportError),
}

/// Carries out routing decisions against the UART, the client socket, and
/// telemetry. Each action performs at most one UART write and at most one
/// telemetry record.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    uart: UartHandle,
    telemetry: Arc<TelemetryLog>,
}

impl Dispatcher {
    pub fn new(uart: UartHandle, telemetry: Arc<TelemetryLog>) -> Self {
        Self { uart, telemetry }
    }

    pub fn apply(
        &self,
        action: RouteAction,
        socket: Option<&mut LinkStream>,
        heartbeat: Option<&mut HeartbeatState>,
    ) -> Dispatched {
        match action {
            RouteAction::ReplyUart { probe, reply } => match self.uart.write_message(&reply) {
                Ok(outcome) if outcome.is_complete() => {
                    info!(?probe, reply = %String::from_utf8_lossy(&reply), "answered factory probe");
                    Dispatched::Replied(outcome)
                }
                Ok(outcome) => {
                    warn!(
                        ?probe,
                        written = outcome.written,
                        expected = reply.len(),
                        "factory probe reply truncated"
                    );
                    Dispatched::Replied(outcome)
                }
                Err(err) => {
                    warn!(?probe, error = %err, "factory probe reply failed");
                    Dispatched::UartFailed
                }
            },
            RouteAction::AbsorbHeartbeat => {
                if let Some(hb) = heartbeat {
                    hb.ack();
                }
                debug!("heartbeat acknowledged");
                Dispatched::HeartbeatAcked
            }
            RouteAction::ForwardToUart(message) => match self.uart.write_message(message.as_bytes()) {
                Ok(outcome) => {
                    self.telemetry.record_sent(&message, outcome.is_confirmed());
                    Dispatched::ToUart(outcome)
                }
                Err(err) => {
                    warn!(error = %err, command = %message, "uart write failed");
                    self.telemetry.record_sent(&message, false);
                    Dispatched::UartFailed
                }
            },
            RouteAction::ForwardToSocket(message) => {
                self.telemetry.record_received(&message);
                match socket {
                    Some(stream) => match stream.send_all(message.as_bytes()) {
                        Ok(()) => Dispatched::ToSocket,
                        Err(err) => Dispatched::SocketFailed(err),
                    },
                    None => Dispatched::NoClient,
                }
            }
        }
    }
}
