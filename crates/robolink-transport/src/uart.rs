use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::Result;
use crate::traits::UartTransport;

/// Default bound on waiting for the transmit queue to drain.
pub const DEFAULT_TX_DONE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Result of one message write to the UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Bytes handed to the transport.
    pub requested: usize,
    /// Bytes the transport accepted.
    pub written: usize,
    /// Whether the transmit queue drained within the bound.
    pub drained: bool,
}

impl WriteOutcome {
    /// All requested bytes were accepted.
    pub fn is_complete(&self) -> bool {
        self.written == self.requested
    }

    /// Accepted in full and drained in time.
    pub fn is_confirmed(&self) -> bool {
        self.is_complete() && self.drained
    }
}

/// Shared handle to the controller UART.
///
/// The bridge and the idle poller both hold a clone. Each call takes the
/// inner lock for its whole duration, so a single message write is never
/// interleaved with another writer's bytes. Partial writes are reported in the
/// returned [`WriteOutcome`] and are not retried.
#[derive(Clone)]
pub struct UartHandle {
    inner: Arc<Mutex<Box<dyn UartTransport>>>,
    tx_done_timeout: Duration,
}

impl UartHandle {
    pub fn new(transport: impl UartTransport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    pub fn from_boxed(transport: Box<dyn UartTransport>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(transport)),
            tx_done_timeout: DEFAULT_TX_DONE_TIMEOUT,
        }
    }

    /// Override the transmit-drain bound.
    pub fn with_tx_done_timeout(mut self, timeout: Duration) -> Self {
        self.tx_done_timeout = timeout;
        self
    }

    /// Read pending bytes without waiting.
    pub fn read_available(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.lock().read_nonblocking(buf)
    }

    /// Write one message, flush it, and wait (bounded) for it to leave.
    pub fn write_message(&self, payload: &[u8]) -> Result<WriteOutcome> {
        let mut uart = self.inner.lock();
        let written = uart.write(payload)?;
        uart.flush()?;

        let drained = if written == payload.len() {
            uart.wait_tx_done(self.tx_done_timeout)?
        } else {
            false
        };
        drop(uart);

        let outcome = WriteOutcome {
            requested: payload.len(),
            written,
            drained,
        };
        if !outcome.is_complete() {
            warn!(
                requested = outcome.requested,
                written = outcome.written,
                "partial uart write"
            );
        } else if !outcome.drained {
            warn!(timeout = ?self.tx_done_timeout, "uart transmit did not drain in time");
        } else {
            trace!(size = written, "uart write confirmed");
        }
        Ok(outcome)
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        self.inner.lock().transport_name()
    }
}

impl std::fmt::Debug for UartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartHandle")
            .field("tx_done_timeout", &self.tx_done_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUart;

    #[test]
    fn complete_write_is_confirmed() {
        let mem = MemoryUart::new();
        let uart = UartHandle::new(mem.clone());

        let outcome = uart.write_message(b"{\"N\":1}").unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(mem.written(), b"{\"N\":1}");
    }

    #[test]
    fn partial_write_is_not_retried() {
        let mem = MemoryUart::new();
        mem.set_write_limit(Some(3));
        let uart = UartHandle::new(mem.clone());

        let outcome = uart.write_message(b"{BT_OK}").unwrap();
        assert_eq!(outcome.written, 3);
        assert!(!outcome.is_complete());
        assert!(!outcome.is_confirmed());
        assert_eq!(mem.writes().len(), 1);
    }

    #[test]
    fn stalled_drain_is_not_confirmed() {
        let mem = MemoryUart::new();
        mem.set_tx_stalled(true);
        let uart = UartHandle::new(mem.clone()).with_tx_done_timeout(Duration::from_millis(5));

        let outcome = uart.write_message(b"{x}").unwrap();
        assert!(outcome.is_complete());
        assert!(!outcome.is_confirmed());
    }

    #[test]
    fn clones_share_the_transport() {
        let mem = MemoryUart::new();
        let a = UartHandle::new(mem.clone());
        let b = a.clone();
        mem.inject(b"{hi}");

        let mut buf = [0u8; 8];
        assert_eq!(b.read_available(&mut buf).unwrap(), 4);
        assert_eq!(a.read_available(&mut buf).unwrap(), 0);
        assert_eq!(a.transport_name(), "memory");
    }
}
