//! [`HudPacket`] framing for `tokio_util::codec::Framed`.
//!
//! Decoding waits until a whole header and payload are buffered, then
//! checks the magic, the length limit and the payload checksum.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::HudError;
use crate::protocol::packet::{HEADER_SIZE, HudPacket, MAGIC, MAX_PAYLOAD_SIZE, PacketKind, checksum};

/// Frames [`HudPacket`]s on a byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct HudCodec;

impl Decoder for HudCodec {
    type Item = HudPacket;
    type Error = HudError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            src.reserve(HEADER_SIZE - src.len());
            return Ok(None);
        }

        if src[0..4] != MAGIC {
            return Err(HudError::Protocol("invalid magic bytes"));
        }
        let kind = PacketKind::try_from(src[4])?;
        let command = u16::from_le_bytes([src[6], src[7]]);
        let len = u32::from_le_bytes([src[8], src[9], src[10], src[11]]) as usize;
        let sum = u32::from_le_bytes([src[12], src[13], src[14], src[15]]);

        if len > MAX_PAYLOAD_SIZE {
            return Err(HudError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        if src.len() < HEADER_SIZE + len {
            src.reserve(HEADER_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(len).freeze();
        if checksum(&payload) != sum {
            return Err(HudError::ChecksumMismatch);
        }

        Ok(Some(HudPacket::from_parts(kind, command, payload)))
    }
}

impl Encoder<HudPacket> for HudCodec {
    type Error = HudError;

    fn encode(&mut self, item: HudPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.payload();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(HudError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        dst.reserve(HEADER_SIZE + payload.len());
        dst.extend_from_slice(&MAGIC);
        dst.put_u8(item.kind() as u8);
        dst.put_u8(0);
        dst.put_u16_le(item.raw_command());
        dst.put_u32_le(payload.len() as u32);
        dst.put_u32_le(checksum(payload));
        dst.extend_from_slice(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{PixelFormat, RawFrame};
    use crate::pipeline::PixelConverter;
    use crate::protocol::HudCommand;
    use bytes::Bytes;

    fn encode(pkt: HudPacket) -> BytesMut {
        let mut buf = BytesMut::new();
        HudCodec.encode(pkt, &mut buf).unwrap();
        buf
    }

    #[test]
    fn image_packet_carries_size() {
        let frame = RawFrame::new(2, 1, 8, PixelFormat::Rgba8888, Bytes::from(vec![1; 8]));
        let bitmap = PixelConverter::new().convert(&frame, 2, 1).unwrap();
        let mut buf = encode(HudPacket::image(&bitmap));
        assert_eq!(buf.len(), HEADER_SIZE + 8 + 8);

        let pkt = HudCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(pkt.kind(), PacketKind::Image);
        assert_eq!(pkt.image_size(), Some((2, 1)));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_input_waits_for_more() {
        let full = encode(HudPacket::response(
            HudCommand::Versions,
            Bytes::from_static(b"1.2.3"),
        ));
        let mut buf = BytesMut::from(&full[..HEADER_SIZE - 3]);
        assert!(HudCodec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[HEADER_SIZE - 3..full.len() - 1]);
        assert!(HudCodec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&full[full.len() - 1..]);
        let pkt = HudCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(pkt.hud_command().unwrap(), HudCommand::Versions);
        assert_eq!(pkt.payload().as_ref(), b"1.2.3");
    }

    #[test]
    fn two_packets_in_one_buffer() {
        let mut buf = encode(HudPacket::command(HudCommand::Status, Bytes::new()));
        buf.extend_from_slice(&encode(HudPacket::command(HudCommand::HeartBeat, Bytes::new())));
        let a = HudCodec.decode(&mut buf).unwrap().unwrap();
        let b = HudCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(a.hud_command().unwrap(), HudCommand::Status);
        assert_eq!(b.hud_command().unwrap(), HudCommand::HeartBeat);
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut buf = encode(HudPacket::response(
            HudCommand::Status,
            Bytes::from_static(b"ok"),
        ));
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(
            HudCodec.decode(&mut buf),
            Err(HudError::ChecksumMismatch)
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = BytesMut::from(&[0u8; HEADER_SIZE][..]);
        assert!(matches!(
            HudCodec.decode(&mut buf),
            Err(HudError::Protocol(_))
        ));
    }

    #[test]
    fn oversized_length_rejected() {
        let mut buf = encode(HudPacket::command(HudCommand::Status, Bytes::new()));
        buf[8..12].copy_from_slice(&(MAX_PAYLOAD_SIZE as u32 + 1).to_le_bytes());
        assert!(matches!(
            HudCodec.decode(&mut buf),
            Err(HudError::PayloadTooLarge { .. })
        ));
    }
}
