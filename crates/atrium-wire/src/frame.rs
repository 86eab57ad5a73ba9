//! Decoded inbound frame.

use crate::encoding::decode_b64;

/// Width of the message id at the front of most payloads.
const MESSAGE_ID_LEN: usize = 2;

/// One complete inbound protocol unit.
///
/// A `Frame` only exists once its whole payload has been buffered; the codec
/// never emits partial frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The leading type tag byte.
    pub tag: u8,
    /// Payload decoded with the single-byte charset.
    pub payload: String,
}

impl Frame {
    /// Create a frame from its parts.
    pub fn new(tag: u8, payload: impl Into<String>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// The B64 message id carried in the first two payload characters, if any.
    pub fn message_id(&self) -> Option<u32> {
        let head = self.payload.as_bytes().get(..MESSAGE_ID_LEN)?;
        decode_b64(head).ok()
    }

    /// The payload after the message id. Empty when there is no valid id.
    pub fn body(&self) -> &str {
        match self.message_id() {
            Some(_) => self.payload.get(MESSAGE_ID_LEN..).unwrap_or(""),
            None => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_and_body() {
        let frame = Frame::new(b'@', "CDhello");
        assert_eq!(frame.message_id(), Some(3 * 64 + 4));
        assert_eq!(frame.body(), "hello");
    }

    #[test]
    fn test_short_payload_has_no_id() {
        let frame = Frame::new(b'@', "C");
        assert_eq!(frame.message_id(), None);
        assert_eq!(frame.body(), "");
    }

    #[test]
    fn test_non_numeral_prefix_has_no_id() {
        let frame = Frame::new(b'@', "\u{e9}xyz");
        assert_eq!(frame.message_id(), None);
    }
}
