use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::message::{Message, CLOSE_BRACE, OPEN_BRACE};

/// Default maximum message size, braces included.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256;

/// Smallest usable frame size: `{}`.
const MIN_FRAME_SIZE: usize = 2;

/// Configuration for a [`FrameExtractor`].
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message size in bytes, braces included. Default: 256.
    pub max_frame_size: usize,
    /// Drop space bytes inside a frame instead of accumulating them.
    pub strip_spaces: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            strip_spaces: false,
        }
    }
}

/// Incremental `{`…`}` framer.
///
/// Feed it bytes as they arrive, across any read boundaries. A message is only
/// ever produced once its closing brace has been seen; a frame that grows past
/// `max_frame_size` is thrown away and the extractor goes back to idle.
#[derive(Debug)]
pub struct FrameExtractor {
    buf: BytesMut,
    accumulating: bool,
    config: FrameConfig,
    overflows: u64,
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl FrameExtractor {
    /// `max_frame_size` is raised to 2 if configured smaller.
    pub fn new(mut config: FrameConfig) -> Self {
        config.max_frame_size = config.max_frame_size.max(MIN_FRAME_SIZE);
        Self {
            buf: BytesMut::with_capacity(config.max_frame_size),
            accumulating: false,
            config,
            overflows: 0,
        }
    }

    /// Feed a single byte.
    pub fn push(&mut self, byte: u8) -> Option<Message> {
        if !self.accumulating {
            if byte == OPEN_BRACE {
                self.buf.put_u8(byte);
                self.accumulating = true;
            }
            return None;
        }

        if self.config.strip_spaces && byte == b' ' {
            return None;
        }

        if self.buf.len() + 1 > self.config.max_frame_size {
            self.overflow();
            return None;
        }

        self.buf.put_u8(byte);
        if byte != CLOSE_BRACE {
            return None;
        }

        self.accumulating = false;
        let frame = self.buf.split().freeze();
        self.buf.reserve(self.config.max_frame_size);
        Some(Message::from_frame(frame))
    }

    /// Lazily extract the messages completed by `chunk`.
    ///
    /// Bytes are consumed only as the iterator advances; drain it to keep the
    /// extractor in step with the stream.
    pub fn extract<'a>(&'a mut self, chunk: &'a [u8]) -> Extract<'a> {
        Extract {
            extractor: self,
            input: chunk.iter(),
        }
    }

    /// True when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        !self.accumulating
    }

    /// Bytes of the partial frame buffered so far.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Frames discarded for exceeding `max_frame_size` since construction.
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.accumulating = false;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn overflow(&mut self) {
        self.overflows = self.overflows.saturating_add(1);
        warn!(
            discarded = self.buf.len(),
            max = self.config.max_frame_size,
            "frame exceeded maximum size, discarding partial frame"
        );
        self.reset();
    }
}

/// Iterator returned by [`FrameExtractor::extract`].
pub struct Extract<'a> {
    extractor: &'a mut FrameExtractor,
    input: std::slice::Iter<'a, u8>,
}

impl Extract<'_> {
    /// Input bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.input.len()
    }
}

impl Iterator for Extract<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        for &byte in self.input.by_ref() {
            if let Some(msg) = self.extractor.push(byte) {
                return Some(msg);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.input.len() / MIN_FRAME_SIZE + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::BT_DETECTION;

    fn collect(ex: &mut FrameExtractor, input: &[u8]) -> Vec<Vec<u8>> {
        ex.extract(input).map(|m| m.as_bytes().to_vec()).collect()
    }

    fn small(max: usize) -> FrameExtractor {
        FrameExtractor::new(FrameConfig {
            max_frame_size: max,
            ..FrameConfig::default()
        })
    }

    #[test]
    fn single_message() {
        let mut ex = FrameExtractor::default();
        let out = collect(&mut ex, BT_DETECTION);
        assert_eq!(out, vec![BT_DETECTION.to_vec()]);
        assert!(ex.is_idle());
    }

    #[test]
    fn noise_outside_frames_is_dropped() {
        let mut ex = FrameExtractor::default();
        let out = collect(&mut ex, b"xx}{a}  yy{b}z");
        assert_eq!(out, vec![b"{a}".to_vec(), b"{b}".to_vec()]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut ex = FrameExtractor::default();
        assert!(collect(&mut ex, b"{\"N\":").is_empty());
        assert!(!ex.is_idle());
        assert_eq!(ex.pending_len(), 5);
        assert!(collect(&mut ex, b"3,\"D1\"").is_empty());
        let out = collect(&mut ex, b":1}{x");
        assert_eq!(out, vec![b"{\"N\":3,\"D1\":1}".to_vec()]);
        assert_eq!(ex.pending_len(), 2);
    }

    #[test]
    fn byte_at_a_time() {
        let mut ex = FrameExtractor::default();
        let mut out = Vec::new();
        for &b in b"{Heartbeat}{BT_OK}" {
            if let Some(m) = ex.push(b) {
                out.push(m);
            }
        }
        assert_eq!(out.len(), 2);
        assert!(out[0].is(b"{Heartbeat}"));
        assert!(out[1].is(b"{BT_OK}"));
    }

    #[test]
    fn nested_open_brace_is_content() {
        let mut ex = FrameExtractor::default();
        let out = collect(&mut ex, b"{a{b}c}");
        assert_eq!(out, vec![b"{a{b}".to_vec()]);
        assert!(ex.is_idle());
    }

    #[test]
    fn overflow_discards_and_returns_to_idle() {
        let mut ex = small(4);
        assert!(collect(&mut ex, b"{abcdef").is_empty());
        assert!(ex.is_idle());
        assert_eq!(ex.pending_len(), 0);
        assert_eq!(ex.overflow_count(), 1);

        // The tail after the overflow is idle noise until the next `{`.
        let out = collect(&mut ex, b"gh}{ab}");
        assert_eq!(out, vec![b"{ab}".to_vec()]);
    }

    #[test]
    fn frame_of_exactly_max_size_is_emitted() {
        let mut ex = small(5);
        assert_eq!(collect(&mut ex, b"{abc}"), vec![b"{abc}".to_vec()]);
        assert!(collect(&mut ex, b"{abcd}").is_empty());
        assert_eq!(ex.overflow_count(), 1);
    }

    #[test]
    fn closing_brace_that_would_overflow_is_dropped() {
        let mut ex = small(4);
        assert!(collect(&mut ex, b"{abc}").is_empty());
        assert!(ex.is_idle());
    }

    #[test]
    fn tiny_max_is_clamped() {
        let mut ex = small(0);
        assert_eq!(ex.config().max_frame_size, 2);
        assert_eq!(collect(&mut ex, b"{}"), vec![b"{}".to_vec()]);
    }

    #[test]
    fn strip_spaces_drops_spaces_inside_frames() {
        let mut ex = FrameExtractor::new(FrameConfig {
            strip_spaces: true,
            ..FrameConfig::default()
        });
        let out = collect(&mut ex, b"  { \"N\" : 1 }");
        assert_eq!(out, vec![b"{\"N\":1}".to_vec()]);
    }

    #[test]
    fn reset_matches_fresh_state() {
        let mut ex = FrameExtractor::default();
        let _ = collect(&mut ex, b"{partial");
        ex.reset();
        assert!(ex.is_idle());
        assert_eq!(ex.pending_len(), 0);
        assert!(collect(&mut ex, b"tail}").is_empty());
    }

    #[test]
    fn partially_consumed_iterator_leaves_rest_unread() {
        let mut ex = FrameExtractor::default();
        let input = b"{a}{b}{c}";
        let mut it = ex.extract(input);
        assert!(it.next().unwrap().is(b"{a}"));
        assert_eq!(it.remaining(), 6);
    }

    #[test]
    fn emitted_messages_are_always_delimited_and_bounded() {
        // Deterministic pseudo-random streams biased toward braces.
        let alphabet = b"{}{}ab \x00\xff";
        let mut seed = 0x2545_f491_u32;
        for max in [2usize, 3, 8, 17, 64] {
            let mut ex = small(max);
            let mut stream = Vec::with_capacity(4096);
            for _ in 0..4096 {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                stream.push(alphabet[(seed as usize) % alphabet.len()]);
            }
            for chunk in stream.chunks(7) {
                for msg in ex.extract(chunk) {
                    let bytes = msg.as_bytes();
                    assert_eq!(bytes.first(), Some(&b'{'));
                    assert_eq!(bytes.last(), Some(&b'}'));
                    assert!(bytes.len() <= max, "len {} > max {max}", bytes.len());
                    assert_eq!(bytes.iter().filter(|&&b| b == b'}').count(), 1);
                }
            }
        }
    }
}
