use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;

/// Frame start delimiter.
pub const OPEN_BRACE: u8 = b'{';
/// Frame end delimiter.
pub const CLOSE_BRACE: u8 = b'}';

/// Liveness probe; the bridge sends it and the client echoes it back.
pub const HEARTBEAT: &[u8] = b"{Heartbeat}";
/// Factory test: controller asks whether the radio module is present.
pub const BT_DETECTION: &[u8] = b"{BT_detection}";
/// Reply to [`BT_DETECTION`].
pub const BT_OK: &[u8] = b"{BT_OK}";
/// Factory test: controller asks which network the module is on.
pub const WA_DETECTION: &[u8] = b"{WA_detection}";
/// Default fail-safe command: halts all motion on the controller.
pub const STOP_COMMAND: &[u8] = br#"{"N":100}"#;

/// One complete, brace-delimited protocol unit.
///
/// Always starts with `{` and ends with `}`. The content in between is opaque
/// and need not be valid JSON.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Message(Bytes);

impl Message {
    /// Wrap `bytes` if they form a single delimited message.
    pub fn parse(bytes: impl Into<Bytes>) -> Option<Self> {
        let bytes = bytes.into();
        let delimited = bytes.len() >= 2
            && bytes.first() == Some(&OPEN_BRACE)
            && bytes.last() == Some(&CLOSE_BRACE);
        delimited.then_some(Self(bytes))
    }

    pub(crate) fn from_frame(bytes: Bytes) -> Self {
        debug_assert!(bytes.first() == Some(&OPEN_BRACE) && bytes.last() == Some(&CLOSE_BRACE));
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Byte-exact comparison with a literal such as [`HEARTBEAT`].
    pub fn is(&self, literal: &[u8]) -> bool {
        self.0.as_ref() == literal
    }

    /// The bytes between the braces.
    pub fn body(&self) -> &[u8] {
        &self.0[1..self.0.len() - 1]
    }

    /// Text view for logs; invalid UTF-8 is replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Message").field(&self.text()).finish()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_requires_both_delimiters() {
        assert!(Message::parse(Bytes::from_static(b"{}")).is_some());
        assert!(Message::parse(Bytes::from_static(b"{a}")).is_some());
        assert!(Message::parse(Bytes::from_static(b"{a")).is_none());
        assert!(Message::parse(Bytes::from_static(b"a}")).is_none());
        assert!(Message::parse(Bytes::from_static(b"}")).is_none());
        assert!(Message::parse(Bytes::new()).is_none());
    }

    #[test]
    fn literals_are_messages() {
        for literal in [HEARTBEAT, BT_DETECTION, BT_OK, WA_DETECTION, STOP_COMMAND] {
            let msg = Message::parse(Bytes::from_static(literal)).expect("literal should parse");
            assert!(msg.is(literal));
        }
    }

    #[test]
    fn body_strips_braces() {
        let msg = Message::parse(Bytes::from_static(b"{N:3}")).unwrap();
        assert_eq!(msg.body(), b"N:3");
        assert_eq!(msg.to_string(), "{N:3}");
        assert_eq!(msg.len(), 5);
    }
}
