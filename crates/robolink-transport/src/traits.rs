use std::time::Duration;

use crate::error::Result;

/// Byte-level access to the serial link with the robot controller.
///
/// Payloads are opaque; framing happens one layer up.
pub trait UartTransport: Send {
    /// Read whatever is already buffered, without waiting.
    ///
    /// Returns `Ok(0)` when nothing is pending.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Queue bytes for transmission, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Push queued bytes to the driver.
    fn flush(&mut self) -> Result<()>;

    /// Wait until the transmit queue has drained.
    ///
    /// Returns `Ok(false)` if `timeout` elapsed first.
    fn wait_tx_done(&mut self, timeout: Duration) -> Result<bool>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "uart"
    }
}

impl<T: UartTransport + ?Sized> UartTransport for Box<T> {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn wait_tx_done(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_tx_done(timeout)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
