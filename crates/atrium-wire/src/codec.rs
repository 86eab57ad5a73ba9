//! Streaming codec for the game-facing connection.
//!
//! Inbound frames are length-prefixed:
//!
//! ```text
//! +-----------+----------------------+--------------------+
//! | tag (1 B) | length (2 B, B64)    | payload (length B) |
//! +-----------+----------------------+--------------------+
//! ```
//!
//! Outbound packets carry no length; the body is followed by a single
//! [`PACKET_TERMINATOR`] byte and the client frames on that.
//!
//! The decoder is resumable: it only consumes bytes once a whole frame is
//! buffered, so the emitted frame sequence does not depend on how reads are
//! chunked. A length field that is not a valid B64 numeral is treated as line
//! noise: one byte is skipped and decoding resumes at the next byte.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::charset;
use crate::encoding::decode_b64;
use crate::frame::Frame;
use crate::packet::OutboundPacket;

/// Tag byte plus the two-character length numeral.
pub const HEADER_LEN: usize = 3;

/// Byte terminating every outbound packet.
pub const PACKET_TERMINATOR: u8 = 0x01;

/// Codec for game connections: decodes [`Frame`]s, encodes [`OutboundPacket`]s.
#[derive(Debug, Default)]
pub struct GameCodec {
    skipped: u64,
}

impl GameCodec {
    /// Create a codec with a zeroed noise counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes discarded so far while resynchronising after corrupt headers.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }
}

impl Decoder for GameCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let length = match decode_b64(&src[1..HEADER_LEN]) {
                Ok(length) => length as usize,
                Err(err) => {
                    tracing::trace!(error = %err, "corrupt frame header, skipping one byte");
                    src.advance(1);
                    self.skipped += 1;
                    continue;
                }
            };

            let frame_len = HEADER_LEN + length;
            if src.len() < frame_len {
                // Nothing consumed yet; wait for the rest of the payload.
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            let raw = src.split_to(frame_len);
            return Ok(Some(Frame {
                tag: raw[0],
                payload: charset::decode(&raw[HEADER_LEN..]),
            }));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            tracing::debug!(bytes = buf.len(), "discarding partial frame at end of stream");
            buf.clear();
        }
        Ok(None)
    }
}

impl Encoder<OutboundPacket> for GameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, packet: OutboundPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = charset::encode(packet.body());
        dst.reserve(body.len() + 1);
        dst.extend_from_slice(&body);
        dst.put_u8(PACKET_TERMINATOR);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::encode_b64;
    use crate::packet::PacketBuilder;

    /// A tag outside the numeral alphabet, so noise before it cannot pair
    /// with the tag into a valid length.
    const NOISE_SAFE_TAG: u8 = b'#';

    fn raw_frame(tag: u8, payload: &str) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend_from_slice(encode_b64(payload.len() as u32, 2).as_bytes());
        out.extend_from_slice(payload.as_bytes());
        out
    }

    fn drain(codec: &mut GameCodec, buf: &mut BytesMut) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn sample_stream() -> Vec<u8> {
        let mut bytes = raw_frame(b'@', "CDhello");
        bytes.extend_from_slice(b"!!");
        bytes.extend(raw_frame(NOISE_SAFE_TAG, ""));
        bytes.extend(raw_frame(b'@', &"x".repeat(200)));
        bytes.extend(raw_frame(b'@', "@Bend"));
        bytes
    }

    #[test]
    fn test_single_frame() {
        let mut codec = GameCodec::new();
        let mut buf = BytesMut::from(&raw_frame(b'@', "@Ahi")[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::new(b'@', "@Ahi"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_waits_for_header() {
        let mut codec = GameCodec::new();
        let mut buf = BytesMut::from(&b"@@"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2, "nothing consumed while the header is incomplete");
    }

    #[test]
    fn test_partial_payload_is_not_consumed() {
        let mut codec = GameCodec::new();
        let full = raw_frame(b'@', "abcdef");
        let mut buf = BytesMut::from(&full[..5]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], &full[..5]);

        buf.extend_from_slice(&full[5..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload, "abcdef");
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut codec = GameCodec::new();
        let mut bytes = raw_frame(b'@', "one");
        bytes.extend(raw_frame(b'@', "two"));
        bytes.extend(raw_frame(b'@', "three"));
        let mut buf = BytesMut::from(&bytes[..]);

        let payloads: Vec<String> = drain(&mut codec, &mut buf)
            .into_iter()
            .map(|f| f.payload)
            .collect();
        assert_eq!(payloads, ["one", "two", "three"]);
    }

    #[test]
    fn test_corrupt_length_skips_one_byte_at_a_time() {
        let mut codec = GameCodec::new();
        let mut bytes = b"\x00\x01\x02".to_vec();
        bytes.extend(raw_frame(NOISE_SAFE_TAG, "ok"));
        let mut buf = BytesMut::from(&bytes[..]);

        let frames = drain(&mut codec, &mut buf);
        assert_eq!(frames, vec![Frame::new(NOISE_SAFE_TAG, "ok")]);
        assert_eq!(codec.skipped_bytes(), 3);
    }

    #[test]
    fn test_pure_noise_never_errors() {
        let mut codec = GameCodec::new();
        let mut buf = BytesMut::from(&b"!!!!!!!!!!"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.len() < HEADER_LEN);
    }

    #[test]
    fn test_chunking_does_not_change_frames() {
        let stream = sample_stream();

        let mut whole_codec = GameCodec::new();
        let mut whole = BytesMut::from(&stream[..]);
        let expected = drain(&mut whole_codec, &mut whole);
        assert_eq!(expected.len(), 4);

        for chunk_size in [1, 2, 3, 7, 64] {
            let mut codec = GameCodec::new();
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                frames.extend(drain(&mut codec, &mut buf));
            }
            assert_eq!(frames, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_payload_uses_single_byte_charset() {
        let mut codec = GameCodec::new();
        let mut bytes = vec![b'@'];
        bytes.extend_from_slice(encode_b64(2, 2).as_bytes());
        bytes.extend_from_slice(&[0xe9, 0xff]);
        let mut buf = BytesMut::from(&bytes[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload, "\u{e9}\u{ff}");
    }

    #[test]
    fn test_decode_eof_discards_partial_frame() {
        let mut codec = GameCodec::new();
        let full = raw_frame(b'@', "abcdef");
        let mut buf = BytesMut::from(&full[..4]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_appends_terminator_without_prefix() {
        let mut codec = GameCodec::new();
        let mut dst = BytesMut::new();
        let packet = PacketBuilder::with_header("@c").append_raw("bye").build();
        codec.encode(packet, &mut dst).unwrap();
        assert_eq!(&dst[..], b"@cbye\x01");
    }

    #[tokio::test]
    async fn test_framed_read_over_duplex() {
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;
        use tokio_util::codec::FramedRead;

        let (mut client, server) = tokio::io::duplex(8);
        let stream = sample_stream();
        let writer = tokio::spawn(async move {
            client.write_all(&stream).await.unwrap();
        });

        let frames: Vec<Frame> = FramedRead::new(server, GameCodec::new())
            .map(|r| r.unwrap())
            .collect()
            .await;
        writer.await.unwrap();

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].payload, "CDhello");
        assert_eq!(frames[3].payload, "@Bend");
    }
}
