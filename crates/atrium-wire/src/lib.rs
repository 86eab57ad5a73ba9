//! Wire protocol for the game-facing transport.
//!
//! Inbound frames are length-prefixed (`[tag][B64 length][payload]`) and decoded
//! by the resumable [`GameCodec`]. Outbound packets are assembled with
//! [`PacketBuilder`] and terminated by a single `0x01` byte; there is no
//! outbound length prefix.

pub mod charset;
pub mod codec;
pub mod encoding;
pub mod frame;
pub mod outgoing;
pub mod packet;

pub use codec::{GameCodec, HEADER_LEN, PACKET_TERMINATOR};
pub use encoding::{EncodingError, decode_b64, decode_vl64, encode_b64, encode_vl64};
pub use frame::Frame;
pub use packet::{DELIMITER, OutboundPacket, PacketBuilder};
