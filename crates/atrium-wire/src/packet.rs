//! Outbound packet assembly.
//!
//! [`PacketBuilder`] accumulates typed segments into one body string in the
//! exact order they are appended. Nothing is escaped or reordered; the codec
//! adds the terminator when the packet is written.

use std::fmt::{self, Write as _};

use crate::encoding::{b64_max, encode_b64, encode_vl64};

/// Default field delimiter (ASCII 2).
pub const DELIMITER: char = '\u{2}';

const LENGTH_WIDTH: usize = 2;
const TRUE_CHAR: char = 'A';
const FALSE_CHAR: char = 'H';

/// A finished outbound packet body, without terminator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundPacket {
    body: String,
}

impl OutboundPacket {
    /// The body as it will be written (before the terminator).
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the packet, returning its body.
    pub fn into_body(self) -> String {
        self.body
    }
}

impl From<String> for OutboundPacket {
    fn from(body: String) -> Self {
        Self { body }
    }
}

impl From<&str> for OutboundPacket {
    fn from(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

impl fmt::Display for OutboundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)
    }
}

/// Fluent builder for an [`OutboundPacket`] body.
///
/// Single-writer: a builder is not shared between tasks.
///
/// ```
/// use atrium_wire::PacketBuilder;
///
/// let packet = PacketBuilder::for_message(139)
///     .append_delimited("Hotel closing")
///     .append_bool(true)
///     .build();
/// assert_eq!(packet.body(), "BKHotel closing\u{2}A");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketBuilder {
    body: String,
}

impl PacketBuilder {
    /// An empty builder with no header.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder seeded with `header`.
    pub fn with_header(header: &str) -> Self {
        Self {
            body: header.to_string(),
        }
    }

    /// A builder seeded with the two-character B64 encoding of `message_id`.
    pub fn for_message(message_id: u16) -> Self {
        Self {
            body: encode_b64(u32::from(message_id), LENGTH_WIDTH),
        }
    }

    /// Append `value` verbatim.
    pub fn append_raw(&mut self, value: &str) -> &mut Self {
        self.body.push_str(value);
        self
    }

    /// Append `value` as a VL64 numeral.
    pub fn append_var_int(&mut self, value: i32) -> &mut Self {
        self.body.push_str(&encode_vl64(value));
        self
    }

    /// Append the B64 length of `value` followed by `value`. `None` is written
    /// as an empty string.
    ///
    /// Strings longer than a two-character length can express are cut to fit.
    pub fn append_length_prefixed<'a>(&mut self, value: impl Into<Option<&'a str>>) -> &mut Self {
        let value = value.into().unwrap_or("");
        let max = b64_max(LENGTH_WIDTH) as usize;
        let value = match value.char_indices().nth(max) {
            Some((cut, _)) => &value[..cut],
            None => value,
        };
        let length = value.chars().count() as u32;
        self.body.push_str(&encode_b64(length, LENGTH_WIDTH));
        self.body.push_str(value);
        self
    }

    /// Append `value` followed by the default [`DELIMITER`].
    pub fn append_delimited(&mut self, value: impl fmt::Display) -> &mut Self {
        self.append_delimited_with(value, DELIMITER)
    }

    /// Append `value` followed by `delimiter`.
    pub fn append_delimited_with(&mut self, value: impl fmt::Display, delimiter: char) -> &mut Self {
        // Writing into a String cannot fail.
        let _ = write!(self.body, "{value}");
        self.body.push(delimiter);
        self
    }

    /// Append the plain decimal text of `value`.
    pub fn append_int(&mut self, value: i64) -> &mut Self {
        let _ = write!(self.body, "{value}");
        self
    }

    /// Append a single character.
    pub fn append_char(&mut self, value: char) -> &mut Self {
        self.body.push(value);
        self
    }

    /// Append `A` for true, `H` for false.
    pub fn append_bool(&mut self, value: bool) -> &mut Self {
        self.body.push(if value { TRUE_CHAR } else { FALSE_CHAR });
        self
    }

    /// Append only the default [`DELIMITER`].
    pub fn append_delimiter(&mut self) -> &mut Self {
        self.body.push(DELIMITER);
        self
    }

    /// The accumulated body so far.
    pub fn as_str(&self) -> &str {
        &self.body
    }

    /// Whether nothing has been appended (including no header).
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Snapshot the accumulated body as a packet. The builder keeps its contents.
    pub fn build(&self) -> OutboundPacket {
        OutboundPacket {
            body: self.body.clone(),
        }
    }

    /// Consume the builder into a packet without copying.
    pub fn into_packet(self) -> OutboundPacket {
        OutboundPacket { body: self.body }
    }

    /// Reset for reuse.
    pub fn clear(&mut self) -> &mut Self {
        self.body.clear();
        self
    }
}
