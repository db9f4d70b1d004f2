use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use robolink_frame::{FrameExtractor, Message, HEARTBEAT};
use robolink_telemetry::TelemetryLog;
use robolink_transport::{LinkStream, RecvOutcome, UartHandle};
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::dispatch::{Dispatched, Dispatcher};
use crate::heartbeat::{HeartbeatState, HeartbeatStatus};
use crate::identity::NetworkIdentity;
use crate::router::{MessageRouter, Origin};

/// Why a link closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its end.
    PeerClosed,
    /// Reading from or writing to the client failed.
    SocketError(String),
    /// Too many heartbeats went unanswered.
    HeartbeatTimeout { missed: u32 },
    /// The process is shutting down.
    Shutdown,
    /// The bridge was dropped while still connected.
    Dropped,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::SocketError(err) => write!(f, "socket error: {err}"),
            Self::HeartbeatTimeout { missed } => write!(f, "heartbeat timeout ({missed} missed)"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

/// Lifecycle of one client link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Closing(CloseReason),
    Closed(CloseReason),
}

impl LinkState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

/// Summary returned when a bridge finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    pub id: u64,
    pub reason: CloseReason,
    pub from_socket: u64,
    pub from_uart: u64,
    pub heartbeats_sent: u64,
    pub stop_sent: bool,
    pub duration: Duration,
}

/// Everything a bridge or the idle poller shares with the rest of the process.
#[derive(Debug, Clone)]
pub struct BridgeContext {
    pub uart: UartHandle,
    pub telemetry: Arc<TelemetryLog>,
    pub router: MessageRouter,
    pub config: BridgeConfig,
    pub shutdown: Arc<AtomicBool>,
}

impl BridgeContext {
    pub fn new(uart: UartHandle, telemetry: Arc<TelemetryLog>) -> Self {
        Self {
            uart,
            telemetry,
            router: MessageRouter::default(),
            config: BridgeConfig::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn NetworkIdentity>) -> Self {
        self.router = MessageRouter::new(identity);
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.uart.clone(), self.telemetry.clone())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Ask every loop sharing this context to stop.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Relays messages between one TCP client and the UART.
///
/// Each cycle drains the socket, then the UART, then runs the heartbeat.
/// Whenever the link leaves [`LinkState::Connected`] the stop command is written
/// to the UART exactly once before the socket is released.
pub struct SocketBridge {
    id: u64,
    stream: LinkStream,
    ctx: BridgeContext,
    dispatcher: Dispatcher,
    heartbeat: HeartbeatState,
    socket_frames: FrameExtractor,
    uart_frames: FrameExtractor,
    socket_buf: Vec<u8>,
    uart_buf: Vec<u8>,
    state: LinkState,
    started: Instant,
    from_socket: u64,
    from_uart: u64,
    heartbeats_sent: u64,
    stop_sent: bool,
}

impl SocketBridge {
    pub fn new(id: u64, mut stream: LinkStream, ctx: BridgeContext) -> Self {
        let now = Instant::now();
        let config = &ctx.config;
        stream.set_send_timeout(config.send_timeout);

        info!(bridge = id, peer = ?stream.peer_addr(), "client connected");
        Self {
            id,
            dispatcher: ctx.dispatcher(),
            heartbeat: HeartbeatState::new(
                config.heartbeat_threshold,
                config.heartbeat_interval,
                now,
            ),
            socket_frames: FrameExtractor::new(config.socket_frame_config()),
            uart_frames: FrameExtractor::new(config.uart_frame_config()),
            socket_buf: vec![0u8; config.socket_read_chunk.max(1)],
            uart_buf: vec![0u8; config.uart_read_chunk.max(1)],
            state: LinkState::Connected,
            started: now,
            from_socket: 0,
            from_uart: 0,
            heartbeats_sent: 0,
            stop_sent: false,
            stream,
            ctx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn heartbeat(&self) -> &HeartbeatState {
        &self.heartbeat
    }

    /// Run cycles until the link closes.
    pub fn run(mut self) -> BridgeReport {
        while !self.step(Instant::now()).is_closed() {
            std::thread::sleep(self.ctx.config.poll_interval);
        }
        self.report()
    }

    /// Run one polling cycle.
    pub fn step(&mut self, now: Instant) -> &LinkState {
        if self.state != LinkState::Connected {
            return &self.state;
        }

        if self.ctx.is_shutting_down() {
            self.close(CloseReason::Shutdown);
            return &self.state;
        }

        if let Some(reason) = self
            .pump_socket()
            .or_else(|| self.pump_uart())
            .or_else(|| self.pump_heartbeat(now))
        {
            self.close(reason);
        }
        &self.state
    }

    fn pump_socket(&mut self) -> Option<CloseReason> {
        let n = match self.stream.recv(&mut self.socket_buf) {
            Ok(RecvOutcome::Data(n)) => n,
            Ok(RecvOutcome::Empty) => return None,
            Ok(RecvOutcome::Closed) => return Some(CloseReason::PeerClosed),
            Err(err) => return Some(CloseReason::SocketError(err.to_string())),
        };

        let messages: Vec<Message> = self.socket_frames.extract(&self.socket_buf[..n]).collect();
        for message in messages {
            self.from_socket += 1;
            debug!(bridge = self.id, %message, "from client");
            let action = self.ctx.router.route(&message, Origin::Socket);
            self.dispatcher
                .apply(action, Some(&mut self.stream), Some(&mut self.heartbeat));
        }
        None
    }

    fn pump_uart(&mut self) -> Option<CloseReason> {
        let n = match self.ctx.uart.read_available(&mut self.uart_buf) {
            Ok(0) => return None,
            Ok(n) => n,
            Err(err) => {
                warn!(bridge = self.id, error = %err, "uart read failed");
                return None;
            }
        };

        let messages: Vec<Message> = self.uart_frames.extract(&self.uart_buf[..n]).collect();
        for message in messages {
            self.from_uart += 1;
            debug!(bridge = self.id, %message, "from controller");
            let action = self.ctx.router.route(&message, Origin::Uart);
            if let Dispatched::SocketFailed(err) =
                self.dispatcher
                    .apply(action, Some(&mut self.stream), Some(&mut self.heartbeat))
            {
                return Some(CloseReason::SocketError(err.to_string()));
            }
        }
        None
    }

    fn pump_heartbeat(&mut self, now: Instant) -> Option<CloseReason> {
        if !self.heartbeat.is_due(now) {
            return None;
        }

        if let Err(err) = self.stream.send_all(HEARTBEAT) {
            return Some(CloseReason::SocketError(err.to_string()));
        }
        self.heartbeats_sent += 1;

        match self.heartbeat.on_beat_sent(now) {
            HeartbeatStatus::Alive { missed } => {
                if missed > 1 {
                    debug!(bridge = self.id, missed, "heartbeat unanswered");
                }
                None
            }
            HeartbeatStatus::Expired { missed } => Some(CloseReason::HeartbeatTimeout { missed }),
        }
    }

    fn close(&mut self, reason: CloseReason) {
        if self.state.is_closed() {
            return;
        }
        self.state = LinkState::Closing(reason.clone());
        info!(bridge = self.id, %reason, "closing link");

        if !self.stop_sent {
            self.stop_sent = true;
            let stop = self.ctx.config.stop_command.clone();
            match self.ctx.uart.write_message(&stop) {
                Ok(outcome) if outcome.is_complete() => {
                    warn!(bridge = self.id, command = %String::from_utf8_lossy(&stop), "stop command sent");
                }
                Ok(outcome) => {
                    error!(bridge = self.id, written = outcome.written, "stop command truncated");
                }
                Err(err) => error!(bridge = self.id, error = %err, "stop command failed"),
            }
        }

        self.stream.shutdown();
        self.state = LinkState::Closed(reason);
    }

    fn report(&self) -> BridgeReport {
        let reason = match &self.state {
            LinkState::Closed(reason) | LinkState::Closing(reason) => reason.clone(),
            LinkState::Connected => CloseReason::Dropped,
        };
        BridgeReport {
            id: self.id,
            reason,
            from_socket: self.from_socket,
            from_uart: self.from_uart,
            heartbeats_sent: self.heartbeats_sent,
            stop_sent: self.stop_sent,
            duration: self.started.elapsed(),
        }
    }
}

impl Drop for SocketBridge {
    fn drop(&mut self) {
        if !self.state.is_closed() {
            self.close(CloseReason::Dropped);
        }
    }
}

impl std::fmt::Debug for SocketBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketBridge")
            .field("id", &self.id)
            .field("peer", &self.stream.peer_addr())
            .field("state", &self.state)
            .field("missed", &self.heartbeat.missed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    use robolink_frame::STOP_COMMAND;
    use robolink_transport::MemoryUart;

    use super::*;

    fn pair() -> (LinkStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("loopback should bind");
        let addr = listener.local_addr().expect("listener should have address");
        let client = TcpStream::connect(addr).expect("client should connect");
        let (server, _) = listener.accept().expect("listener should accept");
        (
            LinkStream::from_tcp(server).expect("stream should wrap"),
            client,
        )
    }

    fn bridge_with(uart: &MemoryUart, config: BridgeConfig) -> (SocketBridge, TcpStream) {
        let (server, client) = pair();
        let ctx = BridgeContext::new(
            UartHandle::new(uart.clone()).with_tx_done_timeout(Duration::from_millis(20)),
            Arc::new(TelemetryLog::default()),
        )
        .with_config(config);
        (SocketBridge::new(1, server, ctx), client)
    }

    /// Step until `done` or a deadline, with real time advancing.
    fn step_until(bridge: &mut SocketBridge, mut done: impl FnMut(&SocketBridge) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !done(bridge) && Instant::now() < deadline {
            bridge.step(Instant::now());
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn client_command_reaches_uart() {
        let uart = MemoryUart::new();
        let (mut bridge, mut client) = bridge_with(&uart, BridgeConfig::default());

        client.write_all(b"{\"N\":1}").expect("client write should succeed");
        step_until(&mut bridge, |_| uart.count_writes(b"{\"N\":1}") == 1);

        assert_eq!(uart.writes(), vec![b"{\"N\":1}".to_vec()]);
        assert_eq!(bridge.state(), &LinkState::Connected);
    }

    #[test]
    fn peer_close_sends_stop_once() {
        let uart = MemoryUart::new();
        let (mut bridge, client) = bridge_with(&uart, BridgeConfig::default());
        drop(client);

        step_until(&mut bridge, |b| b.state().is_closed());
        assert_eq!(bridge.state(), &LinkState::Closed(CloseReason::PeerClosed));

        bridge.step(Instant::now());
        drop(bridge);
        assert_eq!(uart.count_writes(STOP_COMMAND), 1);
    }

    #[test]
    fn shutdown_flag_closes_with_stop() {
        let uart = MemoryUart::new();
        let (mut bridge, _client) = bridge_with(&uart, BridgeConfig::default());
        bridge.ctx.request_shutdown();

        assert_eq!(
            bridge.step(Instant::now()),
            &LinkState::Closed(CloseReason::Shutdown)
        );
        assert_eq!(uart.count_writes(STOP_COMMAND), 1);
    }

    #[test]
    fn dropping_connected_bridge_sends_stop() {
        let uart = MemoryUart::new();
        let (bridge, _client) = bridge_with(&uart, BridgeConfig::default());
        drop(bridge);
        assert_eq!(uart.count_writes(STOP_COMMAND), 1);
    }

    #[test]
    fn silent_client_times_out_after_threshold_plus_one() {
        let uart = MemoryUart::new();
        let config = BridgeConfig {
            heartbeat_interval: Duration::from_millis(1000),
            ..BridgeConfig::default()
        };
        let (mut bridge, mut client) = bridge_with(&uart, config);
        let t0 = bridge.started;

        for i in 1..=3u32 {
            assert_eq!(
                bridge.step(t0 + Duration::from_millis(1000) * i),
                &LinkState::Connected
            );
            assert_eq!(bridge.heartbeat().missed(), i);
        }
        assert_eq!(
            bridge.step(t0 + Duration::from_millis(4000)),
            &LinkState::Closed(CloseReason::HeartbeatTimeout { missed: 4 })
        );
        assert_eq!(uart.count_writes(STOP_COMMAND), 1);

        client
            .set_read_timeout(Some(Duration::from_secs(1)))
            .expect("timeout should apply");
        let mut seen = Vec::new();
        let _ = client.read_to_end(&mut seen);
        assert_eq!(seen, HEARTBEAT.repeat(4));
    }

    #[test]
    fn heartbeat_ack_resets_missed_count() {
        let uart = MemoryUart::new();
        let (mut bridge, mut client) = bridge_with(&uart, BridgeConfig::default());
        let t0 = bridge.started;

        bridge.step(t0 + Duration::from_secs(1));
        bridge.step(t0 + Duration::from_secs(2));
        assert_eq!(bridge.heartbeat().missed(), 2);

        client.write_all(HEARTBEAT).expect("client write should succeed");
        let deadline = Instant::now() + Duration::from_secs(3);
        while bridge.heartbeat().missed() != 0 && Instant::now() < deadline {
            bridge.step(t0 + Duration::from_millis(2500));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(bridge.heartbeat().missed(), 0);
        assert!(uart.writes().is_empty());
    }

    #[test]
    fn controller_output_reaches_client_and_telemetry() {
        let uart = MemoryUart::new();
        let (mut bridge, mut client) = bridge_with(&uart, BridgeConfig::default());
        uart.inject(b"noise{ok}{\"v\":7.4}");

        step_until(&mut bridge, |b| b.from_uart == 2);

        client
            .set_read_timeout(Some(Duration::from_secs(1)))
            .expect("timeout should apply");
        let mut buf = [0u8; 64];
        let mut seen = Vec::new();
        while seen.len() < b"{ok}{\"v\":7.4}".len() {
            let n = client.read(&mut buf).expect("client read should succeed");
            assert!(n > 0, "bridge closed early");
            seen.extend_from_slice(&buf[..n]);
        }
        assert_eq!(seen, b"{ok}{\"v\":7.4}".to_vec());

        let snap = bridge.ctx.telemetry.snapshot_and_clear(10, 10);
        let texts: Vec<_> = snap.received.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["{ok}", "{\"v\":7.4}"]);
    }

    #[test]
    fn bt_probe_is_answered_locally() {
        let uart = MemoryUart::new();
        let (mut bridge, _client) = bridge_with(&uart, BridgeConfig::default());
        uart.inject(b"{BT_detection}");

        step_until(&mut bridge, |_| !uart.writes().is_empty());
        assert_eq!(uart.writes(), vec![b"{BT_OK}".to_vec()]);
        assert_eq!(
            bridge.ctx.telemetry.counts().map(|c| (c.sent, c.received)),
            Some((0, 0))
        );
    }
}
