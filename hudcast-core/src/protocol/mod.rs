//! HUD control protocol.
//!
//! Everything sent to the peripheral travels as a [`HudPacket`]: images,
//! commands, and the responses the peripheral sends back. Packets are
//! framed on the byte stream by [`HudCodec`].
//!
//! ```text
//! Host ──[Image]────────────► HUD
//! Host ──[Command(cmd)]─────► HUD
//! Host ◄─[Response(cmd)]───── HUD
//! ```

mod codec;
mod packet;

use std::fmt;

use crate::error::HudError;

pub use codec::HudCodec;
pub use packet::{HEADER_SIZE, HudPacket, MAX_PAYLOAD_SIZE, PacketKind};

// ── HudCommand ───────────────────────────────────────────────────

/// Control commands understood by the HUD.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HudCommand {
    /// Device status.
    Status = 0x0001,
    /// Firmware and hardware versions.
    Versions = 0x0002,
    /// Device identification.
    DevInfo = 0x0003,
    /// Persisted device settings.
    DevSettings = 0x0004,
    /// Enter firmware update mode.
    ModeUpdate = 0x0005,
    /// Soft reset.
    ModeSoftReset = 0x0006,
    /// Display resolution.
    DisplaySize = 0x0007,
    /// Display brightness.
    DisplayBrightness = 0x0008,
    /// Display power.
    DisplayOn = 0x0009,
    /// Display panel information.
    DisplayInfo = 0x000A,
    /// Enable the splash screen.
    SplashEnable = 0x000B,
    /// Splash screen delay.
    SplashDelay = 0x000C,
    /// Splash screen image.
    SplashImage = 0x000D,
    /// Reset configuration to factory defaults.
    ConfigReset = 0x000E,
    /// Runtime metrics.
    DevMetrics = 0x000F,
    /// Liveness ping.
    HeartBeat = 0x0010,
}

impl HudCommand {
    pub const ALL: [HudCommand; 16] = [
        Self::Status,
        Self::Versions,
        Self::DevInfo,
        Self::DevSettings,
        Self::ModeUpdate,
        Self::ModeSoftReset,
        Self::DisplaySize,
        Self::DisplayBrightness,
        Self::DisplayOn,
        Self::DisplayInfo,
        Self::SplashEnable,
        Self::SplashDelay,
        Self::SplashImage,
        Self::ConfigReset,
        Self::DevMetrics,
        Self::HeartBeat,
    ];

    pub fn id(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for HudCommand {
    type Error = HudError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.id() == value)
            .ok_or(HudError::UnknownCommand(value))
    }
}

impl fmt::Display for HudCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
