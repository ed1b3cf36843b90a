//! Packet layout.
//!
//! ```text
//! magic:        [u8; 4]  "HUD0"
//! kind:         u8       1 = image, 2 = command, 3 = response
//! reserved:     u8
//! command:      u16      HudCommand id, 0 for images
//! payload_len:  u32
//! checksum:     u32      first 4 bytes of blake3(payload), 0 if empty
//! payload:      [u8]
//! ```
//!
//! All integers are little-endian. Image payloads start with
//! `width: u32 | height: u32` followed by the RGBA pixels.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::HudError;
use crate::pipeline::ConvertedBitmap;
use crate::protocol::HudCommand;

pub const MAGIC: [u8; 4] = *b"HUD0";
pub const HEADER_SIZE: usize = 16;
/// Largest accepted payload (8 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// What a packet carries.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Image = 1,
    Command = 2,
    Response = 3,
}

impl TryFrom<u8> for PacketKind {
    type Error = HudError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Image),
            2 => Ok(Self::Command),
            3 => Ok(Self::Response),
            _ => Err(HudError::Protocol("unknown packet kind")),
        }
    }
}

/// One framed unit on the HUD link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudPacket {
    kind: PacketKind,
    command: u16,
    payload: Bytes,
}

impl HudPacket {
    pub fn image(bitmap: &ConvertedBitmap) -> Self {
        let mut payload = BytesMut::with_capacity(8 + bitmap.pixels().len());
        payload.put_u32_le(bitmap.width());
        payload.put_u32_le(bitmap.height());
        payload.extend_from_slice(bitmap.pixels());
        Self {
            kind: PacketKind::Image,
            command: 0,
            payload: payload.freeze(),
        }
    }

    pub fn command(command: HudCommand, payload: Bytes) -> Self {
        Self {
            kind: PacketKind::Command,
            command: command.id(),
            payload,
        }
    }

    pub fn response(command: HudCommand, payload: Bytes) -> Self {
        Self {
            kind: PacketKind::Response,
            command: command.id(),
            payload,
        }
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// The command this packet carries or answers.
    pub fn hud_command(&self) -> Result<HudCommand, HudError> {
        HudCommand::try_from(self.command)
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// `(width, height)` of an image packet.
    pub fn image_size(&self) -> Option<(u32, u32)> {
        if self.kind != PacketKind::Image || self.payload.len() < 8 {
            return None;
        }
        let w = u32::from_le_bytes(self.payload[0..4].try_into().ok()?);
        let h = u32::from_le_bytes(self.payload[4..8].try_into().ok()?);
        Some((w, h))
    }

    pub(crate) fn raw_command(&self) -> u16 {
        self.command
    }

    pub(crate) fn from_parts(kind: PacketKind, command: u16, payload: Bytes) -> Self {
        Self {
            kind,
            command,
            payload,
        }
    }
}

/// Checksum stored in the header for `payload`.
pub fn checksum(payload: &[u8]) -> u32 {
    if payload.is_empty() {
        return 0;
    }
    let hash = blake3::hash(payload);
    let b = hash.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}
