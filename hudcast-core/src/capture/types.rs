//! Capture configuration and pixel layouts.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::HudError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a buffer produced by the capture provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 4 bytes per pixel: Red, Green, Blue, unused.
    Rgbx8888,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8888,
    /// 4 bytes per pixel: Blue, Green, Red, Alpha.
    Bgra8888,
    /// 2 bytes per pixel, packed 5-6-5.
    Rgb565,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgbx8888 | PixelFormat::Rgba8888 | PixelFormat::Bgra8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }

    /// Whether frames in this format can be turned into HUD bitmaps.
    pub const fn is_convertible(self) -> bool {
        !matches!(self, PixelFormat::Rgb565)
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgbx8888 => write!(f, "RGBX 8888"),
            Self::Rgba8888 => write!(f, "RGBA 8888"),
            Self::Bgra8888 => write!(f, "BGRA 8888"),
            Self::Rgb565 => write!(f, "RGB 565"),
        }
    }
}

// ── DisplayFlags ─────────────────────────────────────────────────

bitflags! {
    /// Behaviour requested from the virtual display.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFlags: u32 {
        /// Visible to other applications.
        const PUBLIC = 1 << 0;
        /// Intended for presentation on a secondary screen.
        const PRESENTATION = 1 << 1;
        /// Mirror the default display when nothing else is shown.
        const AUTO_MIRROR = 1 << 4;
    }
}

// ── CaptureConfiguration ─────────────────────────────────────────

/// Parameters of a capture session, derived from the host display's
/// metrics. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfiguration {
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Layout the provider writes into the image reader.
    pub format: PixelFormat,
    /// Frame-rate hint; also the image reader's `max_images`.
    pub frame_rate: u32,
    /// Density of the mirrored display.
    pub density_dpi: u32,
    /// Name given to the virtual display.
    pub display_name: String,
    /// Virtual display flags.
    pub flags: DisplayFlags,
}

impl CaptureConfiguration {
    /// A `width × height` RGBX capture at 5 fps, auto-mirroring.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Rgbx8888,
            frame_rate: 5,
            density_dpi: 160,
            display_name: "HUD Mirror".into(),
            flags: DisplayFlags::AUTO_MIRROR,
        }
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_density(mut self, density_dpi: u32) -> Self {
        self.density_dpi = density_dpi;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Number of images the reader may hold at once.
    pub fn max_images(&self) -> u32 {
        self.frame_rate
    }

    /// Reject zero-sized or zero-rate configurations and formats the
    /// converter cannot read.
    pub fn validate(&self) -> Result<(), HudError> {
        if self.width == 0 || self.height == 0 {
            return Err(HudError::InvalidConfig(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(HudError::InvalidConfig("frame rate must be positive".into()));
        }
        if self.density_dpi == 0 {
            return Err(HudError::InvalidConfig("density must be positive".into()));
        }
        if !self.format.is_convertible() {
            return Err(HudError::InvalidConfig(format!(
                "{} frames cannot be sent to the HUD",
                self.format
            )));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hud_mirror() {
        let cfg = CaptureConfiguration::new(640, 400);
        assert_eq!(cfg.format, PixelFormat::Rgbx8888);
        assert_eq!(cfg.max_images(), 5);
        assert!(cfg.flags.contains(DisplayFlags::AUTO_MIRROR));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_values_rejected() {
        assert!(CaptureConfiguration::new(0, 400).validate().is_err());
        assert!(
            CaptureConfiguration::new(640, 400)
                .with_frame_rate(0)
                .validate()
                .is_err()
        );
        assert!(
            CaptureConfiguration::new(640, 400)
                .with_density(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn unconvertible_format_rejected() {
        let err = CaptureConfiguration::new(640, 400)
            .with_format(PixelFormat::Rgb565)
            .validate()
            .unwrap_err();
        assert!(matches!(err, HudError::InvalidConfig(_)));
        for format in [
            PixelFormat::Rgbx8888,
            PixelFormat::Rgba8888,
            PixelFormat::Bgra8888,
        ] {
            let cfg = CaptureConfiguration::new(640, 400).with_format(format);
            assert!(cfg.validate().is_ok(), "{format}");
        }
    }

    #[test]
    fn format_names_are_lowercase() {
        let fmt: PixelFormat = serde::Deserialize::deserialize(
            serde::de::value::StrDeserializer::<serde::de::value::Error>::new("bgra8888"),
        )
        .unwrap();
        assert_eq!(fmt, PixelFormat::Bgra8888);
        assert_eq!(PixelFormat::Rgb565.bytes_per_pixel(), 2);
    }
}
