//! In-process UART double.
//!
//! Clones share the same buffers, so a test can keep one handle to inject
//! controller output and inspect what the bridge wrote while the bridge owns
//! another.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::traits::UartTransport;

#[derive(Clone, Default)]
pub struct MemoryUart {
    inner: Arc<Mutex<MemoryUartInner>>,
}

#[derive(Default)]
struct MemoryUartInner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    writes: Vec<Vec<u8>>,
    write_limit: Option<usize>,
    fail_writes: bool,
    tx_stalled: bool,
}

impl MemoryUart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the controller had sent them.
    pub fn inject(&self, data: &[u8]) {
        self.inner.lock().rx.extend(data.iter().copied());
    }

    /// Everything written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().tx.clone()
    }

    /// Each `write` call's accepted bytes, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().writes.clone()
    }

    /// Number of writes whose accepted bytes equal `payload`.
    pub fn count_writes(&self, payload: &[u8]) -> usize {
        self.inner
            .lock()
            .writes
            .iter()
            .filter(|w| w.as_slice() == payload)
            .count()
    }

    /// Drop the write history.
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock();
        inner.tx.clear();
        inner.writes.clear();
    }

    /// Accept at most `limit` bytes per write, simulating a full TX FIFO.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.inner.lock().write_limit = limit;
    }

    /// Make every write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Make `wait_tx_done` report a timeout.
    pub fn set_tx_stalled(&self, stalled: bool) {
        self.inner.lock().tx_stalled = stalled;
    }

    /// Bytes injected but not yet read.
    pub fn pending_rx(&self) -> usize {
        self.inner.lock().rx.len()
    }
}

impl UartTransport for MemoryUart {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let n = inner.rx.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(inner.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "memory uart write failure",
            )));
        }
        let n = inner.write_limit.map_or(data.len(), |l| l.min(data.len()));
        inner.tx.extend_from_slice(&data[..n]);
        inner.writes.push(data[..n].to_vec());
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_tx_done(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(!self.inner.lock().tx_stalled)
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryUart")
            .field("pending_rx", &inner.rx.len())
            .field("written", &inner.tx.len())
            .finish()
    }
}
