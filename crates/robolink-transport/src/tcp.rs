use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Port the robot firmware has always listened on.
pub const DEFAULT_PORT: u16 = 100;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1000);

/// What a single non-blocking receive produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvOutcome {
    /// `n` bytes were placed at the start of the buffer.
    Data(usize),
    /// Nothing pending right now.
    Empty,
    /// The peer closed its side (recv returned 0).
    Closed,
}

/// TCP listener for host-side controller connections.
pub struct LinkListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl LinkListener {
    /// Bind and listen on `addr` (e.g. `0.0.0.0:100`).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening for controller connections");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        LinkStream::from_tcp(stream)
    }

    /// Accept if a connection is already waiting.
    ///
    /// Only meaningful after [`set_nonblocking(true)`](Self::set_nonblocking).
    pub fn try_accept(&self) -> Result<Option<LinkStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                LinkStream::from_tcp(stream).map(Some)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Switch accept between blocking and polling mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

/// A connected, non-blocking TCP stream.
pub struct LinkStream {
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    send_timeout: Duration,
}

impl LinkStream {
    /// Wrap an accepted stream and switch it to non-blocking mode.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer_addr,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        })
    }

    /// Connect to a bridge (blocking connect, non-blocking afterwards).
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let stream =
            TcpStream::connect(addr).map_err(|e| TransportError::Connect { addr, source: e })?;
        debug!(%addr, "connected to bridge");
        Self::from_tcp(stream)
    }

    /// Bound on how long [`send_all`](Self::send_all) keeps retrying a full socket.
    pub fn set_send_timeout(&mut self, timeout: Duration) {
        self.send_timeout = timeout;
    }

    /// Receive whatever is pending without waiting.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome> {
        match self.stream.read(buf) {
            Ok(0) => Ok(RecvOutcome::Closed),
            Ok(n) => Ok(RecvOutcome::Data(n)),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(RecvOutcome::Empty),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(RecvOutcome::Empty),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Send every byte of `data`.
    ///
    /// Retries on `WouldBlock`/`Interrupted` until the send timeout elapses.
    pub fn send_all(&mut self, data: &[u8]) -> Result<()> {
        let start = Instant::now();
        let mut offset = 0usize;
        while offset < data.len() {
            match self.stream.write(&data[offset..]) {
                Ok(0) => {
                    return Err(TransportError::Io(std::io::Error::from(
                        ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.send_timeout {
                        return Err(TransportError::Io(std::io::Error::new(
                            ErrorKind::TimedOut,
                            format!("send stalled after {offset} of {} bytes", data.len()),
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        Ok(())
    }

    /// Remote address, if the OS reported one.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Close both directions. Errors are ignored; the peer may already be gone.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
