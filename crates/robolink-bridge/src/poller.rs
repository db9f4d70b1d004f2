use std::thread::JoinHandle;

use robolink_frame::{FrameExtractor, Message};
use tracing::{debug, trace, warn};

use crate::bridge::BridgeContext;
use crate::dispatch::Dispatcher;
use crate::error::{BridgeError, Result};
use crate::link::ActiveLink;
use crate::router::Origin;

/// Reads the UART while no client is connected.
///
/// Factory-test probes are answered and controller output is recorded to
/// telemetry. Each cycle holds the [`ActiveLink`] idle from read to dispatch,
/// so a bridge never shares the UART with an in-flight cycle. While a bridge
/// holds the link the poller leaves the UART alone and discards any half-read
/// frame.
#[derive(Debug)]
pub struct UartPoller {
    ctx: BridgeContext,
    active: ActiveLink,
    dispatcher: Dispatcher,
    frames: FrameExtractor,
    buf: Vec<u8>,
}

impl UartPoller {
    pub fn new(ctx: BridgeContext, active: ActiveLink) -> Self {
        Self {
            dispatcher: ctx.dispatcher(),
            frames: FrameExtractor::new(ctx.config.uart_frame_config()),
            buf: vec![0u8; ctx.config.uart_read_chunk.max(1)],
            ctx,
            active,
        }
    }

    /// Run one cycle. Returns the number of messages handled.
    pub fn poll_once(&mut self) -> usize {
        let Some(_idle) = self.active.hold_idle() else {
            if !self.frames.is_idle() {
                trace!("discarding partial frame on handover");
                self.frames.reset();
            }
            return 0;
        };

        let n = match self.ctx.uart.read_available(&mut self.buf) {
            Ok(0) => return 0,
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "uart read failed");
                return 0;
            }
        };

        let messages: Vec<Message> = self.frames.extract(&self.buf[..n]).collect();
        for message in &messages {
            debug!(%message, "from controller (no client)");
            let action = self.ctx.router.route(message, Origin::Uart);
            self.dispatcher.apply(action, None, None);
        }
        messages.len()
    }

    /// Poll until shutdown is requested.
    pub fn run(mut self) {
        debug!("uart poller started");
        while !self.ctx.is_shutting_down() {
            self.poll_once();
            std::thread::sleep(self.ctx.config.poll_interval);
        }
        debug!("uart poller stopped");
    }

    /// Run on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("uart-poller".to_string())
            .spawn(move || self.run())
            .map_err(|source| BridgeError::Spawn {
                name: "uart-poller".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use robolink_telemetry::TelemetryLog;
    use robolink_transport::{MemoryUart, UartHandle, UartTransport};

    use super::*;
    use crate::identity::StaticIdentity;

    fn poller(uart: &MemoryUart, active: &ActiveLink) -> UartPoller {
        let ctx = BridgeContext::new(
            UartHandle::new(uart.clone()).with_tx_done_timeout(Duration::from_millis(20)),
            Arc::new(TelemetryLog::default()),
        )
        .with_identity(Arc::new(StaticIdentity::new(
            Some("workshop".to_string()),
            [0; 6],
        )));
        UartPoller::new(ctx, active.clone())
    }

    #[test]
    fn answers_probes_while_idle() {
        let uart = MemoryUart::new();
        let active = ActiveLink::new();
        let mut poller = poller(&uart, &active);

        uart.inject(b"{BT_detection}{WA_detection}");
        assert_eq!(poller.poll_once(), 2);
        assert_eq!(
            uart.writes(),
            vec![b"{BT_OK}".to_vec(), b"{workshop}".to_vec()]
        );
    }

    #[test]
    fn records_output_without_client() {
        let uart = MemoryUart::new();
        let active = ActiveLink::new();
        let mut poller = poller(&uart, &active);

        uart.inject(b"{boot}");
        assert_eq!(poller.poll_once(), 1);
        let snap = poller.ctx.telemetry.snapshot_and_clear(10, 10);
        assert_eq!(snap.received.len(), 1);
        assert_eq!(snap.received[0].text, "{boot}");
    }

    #[test]
    fn stays_off_uart_while_link_active() {
        let uart = MemoryUart::new();
        let active = ActiveLink::new();
        let mut poller = poller(&uart, &active);

        uart.inject(b"{BT_detection}");
        let guard = active.claim();
        assert_eq!(poller.poll_once(), 0);
        assert_eq!(uart.pending_rx(), b"{BT_detection}".len());
        assert!(uart.writes().is_empty());

        drop(guard);
        assert_eq!(poller.poll_once(), 1);
    }

    #[test]
    fn partial_frame_is_dropped_on_handover() {
        let uart = MemoryUart::new();
        let active = ActiveLink::new();
        let mut poller = poller(&uart, &active);

        uart.inject(b"{BT_det");
        assert_eq!(poller.poll_once(), 0);

        let guard = active.claim();
        poller.poll_once();
        drop(guard);

        uart.inject(b"ection}");
        assert_eq!(poller.poll_once(), 0);
        assert!(uart.writes().is_empty());
    }

    /// Delivers `{boot}` once, slowly, then stays silent.
    struct SlowUart {
        reads: Arc<AtomicUsize>,
        started: Arc<AtomicBool>,
    }

    impl UartTransport for SlowUart {
        fn read_nonblocking(&mut self, buf: &mut [u8]) -> robolink_transport::Result<usize> {
            let first = self.reads.fetch_add(1, Ordering::SeqCst) == 0;
            self.started.store(true, Ordering::SeqCst);
            if !first {
                return Ok(0);
            }
            thread::sleep(Duration::from_millis(100));
            buf[..6].copy_from_slice(b"{boot}");
            Ok(6)
        }

        fn write(&mut self, data: &[u8]) -> robolink_transport::Result<usize> {
            Ok(data.len())
        }

        fn flush(&mut self) -> robolink_transport::Result<()> {
            Ok(())
        }

        fn wait_tx_done(&mut self, _timeout: Duration) -> robolink_transport::Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn claim_waits_for_in_flight_cycle() {
        let reads = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicBool::new(false));
        let telemetry = Arc::new(TelemetryLog::default());
        let ctx = BridgeContext::new(
            UartHandle::new(SlowUart {
                reads: reads.clone(),
                started: started.clone(),
            }),
            telemetry.clone(),
        );
        let active = ActiveLink::new();
        let mut poller = UartPoller::new(ctx, active.clone());

        let cycle = thread::spawn(move || {
            let handled = poller.poll_once();
            (poller, handled)
        });
        while !started.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));

        let _guard = active.claim();
        // The cycle that was mid-read finished before the claim was granted.
        let counts = telemetry.counts().expect("counts should be readable");
        assert_eq!(counts.received, 1);

        let (mut poller, handled) = cycle.join().unwrap();
        assert_eq!(handled, 1);
        assert_eq!(poller.poll_once(), 0);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }
}
