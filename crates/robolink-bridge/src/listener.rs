use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use robolink_telemetry::TelemetryLog;
use robolink_transport::{LinkListener, LinkStream, UartHandle};
use tracing::{debug, info, warn};

use crate::bridge::{BridgeContext, BridgeReport, SocketBridge};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::identity::NetworkIdentity;
use crate::link::ActiveLink;
use crate::poller::UartPoller;

/// Accepts host clients and runs one [`SocketBridge`] at a time.
///
/// A client that connects while another is live is held until the previous
/// bridge has closed and sent its stop command.
pub struct BridgeListener {
    listener: LinkListener,
    ctx: BridgeContext,
    active: ActiveLink,
    next_bridge_id: AtomicU64,
}

impl BridgeListener {
    /// Bind the TCP endpoint, e.g. `0.0.0.0:100`.
    pub fn bind(addr: &str, uart: UartHandle, telemetry: Arc<TelemetryLog>) -> Result<Self> {
        let listener = LinkListener::bind(addr)?;
        Ok(Self {
            listener,
            ctx: BridgeContext::new(uart, telemetry),
            active: ActiveLink::new(),
            next_bridge_id: AtomicU64::new(1),
        })
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.ctx = self.ctx.with_config(config);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn NetworkIdentity>) -> Self {
        self.ctx = self.ctx.with_identity(identity);
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<std::sync::atomic::AtomicBool>) -> Self {
        self.ctx = self.ctx.with_shutdown(flag);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn context(&self) -> &BridgeContext {
        &self.ctx
    }

    pub fn active_link(&self) -> ActiveLink {
        self.active.clone()
    }

    /// An idle-time UART poller sharing this listener's context and link flag.
    pub fn poller(&self) -> UartPoller {
        UartPoller::new(self.ctx.clone(), self.active.clone())
    }

    /// Block for the next client and wrap it in a bridge.
    pub fn accept(&self) -> Result<SocketBridge> {
        let stream = self.listener.accept()?;
        Ok(self.make_bridge(stream))
    }

    /// Accept clients until shutdown is requested.
    ///
    /// Returns the reports of every bridge that ran.
    pub fn serve(&self) -> Result<Vec<BridgeReport>> {
        self.listener.set_nonblocking(true)?;
        info!(addr = %self.local_addr(), uart = self.ctx.uart.transport_name(), "bridge listening");

        let mut reports = Vec::new();
        let mut current: Option<JoinHandle<BridgeReport>> = None;

        while !self.ctx.is_shutting_down() {
            match self.listener.try_accept() {
                Ok(Some(stream)) => {
                    if let Some(previous) = current.take() {
                        debug!("waiting for previous link to close");
                        reports.extend(join_bridge(previous));
                    }
                    current = Some(self.spawn_bridge(stream)?);
                    continue;
                }
                Ok(None) => {}
                Err(err) => warn!(error = %err, "accept failed"),
            }

            if current.as_ref().is_some_and(JoinHandle::is_finished) {
                if let Some(finished) = current.take() {
                    reports.extend(join_bridge(finished));
                }
            }
            std::thread::sleep(self.ctx.config.poll_interval);
        }

        if let Some(last) = current.take() {
            reports.extend(join_bridge(last));
        }
        info!(links = reports.len(), "bridge listener stopped");
        Ok(reports)
    }

    fn make_bridge(&self, stream: LinkStream) -> SocketBridge {
        let id = self.next_bridge_id.fetch_add(1, Ordering::Relaxed);
        SocketBridge::new(id, stream, self.ctx.clone())
    }

    fn spawn_bridge(&self, stream: LinkStream) -> Result<JoinHandle<BridgeReport>> {
        let guard = self.active.claim();
        let bridge = self.make_bridge(stream);
        let name = format!("bridge-{}", bridge.id());
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = guard;
                bridge.run()
            })
            .map_err(|source| BridgeError::Spawn { name, source })
    }
}

fn join_bridge(handle: JoinHandle<BridgeReport>) -> Option<BridgeReport> {
    match handle.join() {
        Ok(report) => {
            info!(
                bridge = report.id,
                reason = %report.reason,
                from_socket = report.from_socket,
                from_uart = report.from_uart,
                heartbeats = report.heartbeats_sent,
                "link closed"
            );
            Some(report)
        }
        Err(_) => {
            warn!("bridge thread panicked");
            None
        }
    }
}

impl std::fmt::Debug for BridgeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeListener")
            .field("addr", &self.local_addr())
            .field("active", &self.active.is_active())
            .finish()
    }
}
