use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::UartTransport;

/// Default controller baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const TX_DRAIN_POLL: Duration = Duration::from_millis(1);

/// Serial line settings for [`SerialUart`].
#[derive(Debug, Clone)]
pub struct UartConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub device: String,
    /// Line speed. Default: 9600.
    pub baud_rate: u32,
    /// Driver-level read timeout. Kept tiny so reads never stall the poll loop.
    pub read_timeout: Duration,
}

impl UartConfig {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(1),
        }
    }
}

/// UART backed by a host serial device (8N1, no flow control).
pub struct SerialUart {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialUart {
    /// Open the device described by `config`.
    pub fn open(config: &UartConfig) -> Result<Self> {
        let port = serialport::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::SerialOpen {
                device: config.device.clone(),
                source,
            })?;

        info!(
            device = %config.device,
            baud = config.baud_rate,
            "opened serial device"
        );

        Ok(Self {
            port,
            device: config.device.clone(),
        })
    }
}

impl UartTransport for SerialUart {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.port.write(data) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn wait_tx_done(&mut self, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.port.bytes_to_write()? == 0 {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                debug!(device = %self.device, ?timeout, "serial transmit drain timed out");
                return Ok(false);
            }
            std::thread::sleep(TX_DRAIN_POLL);
        }
    }

    fn transport_name(&self) -> &'static str {
        "serial"
    }
}

impl std::fmt::Debug for SerialUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialUart")
            .field("device", &self.device)
            .finish()
    }
}
