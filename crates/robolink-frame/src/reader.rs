use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::error::{FrameError, Result};
use crate::extractor::{FrameConfig, FrameExtractor};
use crate::message::Message;

const READ_CHUNK_SIZE: usize = 512;

/// Pulls complete messages out of any `Read` stream.
///
/// Works with blocking and non-blocking streams alike: `WouldBlock` and
/// `Interrupted` simply yield no messages for this poll.
pub struct MessageReader<T> {
    inner: T,
    extractor: FrameExtractor,
    pending: VecDeque<Message>,
    chunk: Box<[u8]>,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default framing.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit framing configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            extractor: FrameExtractor::new(config),
            pending: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Perform one read and return every message completed so far.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and no
    /// completed messages remain.
    pub fn poll(&mut self) -> Result<Vec<Message>> {
        match self.fill() {
            Ok(()) => {}
            Err(FrameError::ConnectionClosed) if !self.pending.is_empty() => {}
            Err(err) => return Err(err),
        }
        Ok(self.pending.drain(..).collect())
    }

    /// Read until one message is complete (blocking streams).
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(msg);
            }
            self.fill()?;
        }
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// The extractor holding any partial frame.
    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    fn fill(&mut self) -> Result<()> {
        let read = match self.inner.read(&mut self.chunk) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(FrameError::Io(err)),
        };
        self.pending
            .extend(self.extractor.extract(&self.chunk[..read]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct WouldBlockThenData {
        blocked: bool,
        bytes: Cursor<Vec<u8>>,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.blocked {
                self.blocked = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.bytes.read(buf)
        }
    }

    #[test]
    fn read_multiple_messages() {
        let mut reader = MessageReader::new(Cursor::new(b"{one}{two}junk{three}".to_vec()));

        assert!(reader.read_message().unwrap().is(b"{one}"));
        assert!(reader.read_message().unwrap().is(b"{two}"));
        assert!(reader.read_message().unwrap().is(b"{three}"));
        assert!(matches!(
            reader.read_message(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_read_handling() {
        let mut reader = MessageReader::new(ByteByByteReader {
            bytes: b"{slow}".to_vec(),
            pos: 0,
        });
        assert!(reader.read_message().unwrap().is(b"{slow}"));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = MessageReader::new(Cursor::new(b"{only-part".to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reader.extractor().pending_len(), 10);
    }

    #[test]
    fn poll_would_block_yields_nothing() {
        let mut reader = MessageReader::new(WouldBlockThenData {
            blocked: false,
            bytes: Cursor::new(b"{ok}".to_vec()),
        });
        assert!(reader.poll().unwrap().is_empty());
        let msgs = reader.poll().unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].is(b"{ok}"));
    }

    #[test]
    fn poll_returns_buffered_messages_before_eof() {
        let mut reader = MessageReader::new(Cursor::new(b"{a}{b}".to_vec()));
        let msgs = reader.poll().unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(reader.poll(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn writes_through_get_mut_are_read_back() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        reader.get_mut().get_mut().extend_from_slice(b"{late}");
        let msg = reader.read_message().unwrap();
        assert!(msg.is(b"{late}"));
    }
}
