//! Domain-specific error types for the HUD capture pipeline.
//!
//! All fallible operations return `Result<T, HudError>`.
//! Per-frame failures are reported as [`FrameError`] and never stop a
//! running session.

use thiserror::Error;

/// The canonical error type for hudcast.
#[derive(Debug, Error)]
pub enum HudError {
    // ── Capture Errors ───────────────────────────────────────────
    /// The capture provider could not bind a virtual display
    /// (typically because screen-capture consent was not granted).
    #[error("virtual display unavailable: {0}")]
    DisplayUnavailable(String),

    /// A capture configuration value is out of range.
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    /// A single frame could not be converted.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),

    // ── Connection Errors ────────────────────────────────────────
    /// The stream underneath the transport reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Protocol Errors ──────────────────────────────────────────
    /// A packet violated the framing rules.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// A command id did not map to any known [`HudCommand`](crate::protocol::HudCommand).
    #[error("unknown HUD command: {0:#06x}")]
    UnknownCommand(u16),

    /// The packet payload failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The payload exceeds the codec limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── FrameError ───────────────────────────────────────────────────

/// Why a raw frame could not be turned into a dense bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame does not have the configured capture resolution.
    #[error("frame is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The row pitch cannot hold a full row of pixels.
    #[error("stride {stride} is smaller than a row of {row_bytes} bytes")]
    StrideTooSmall { stride: usize, row_bytes: usize },

    /// The buffer ends before the last row does.
    #[error("buffer holds {actual} bytes, need at least {required}")]
    BufferTooSmall { required: usize, actual: usize },

    /// The frame uses a layout the converter cannot read.
    #[error("unsupported source format {0:?}")]
    UnsupportedFormat(crate::capture::PixelFormat),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for HudError {
    fn from(s: String) -> Self {
        HudError::Other(s)
    }
}

impl From<&str> for HudError {
    fn from(s: &str) -> Self {
        HudError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for HudError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        HudError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = HudError::DisplayUnavailable("consent not granted".into());
        assert!(e.to_string().contains("consent"));

        let e = HudError::PayloadTooLarge {
            size: 1000,
            max: 500,
        };
        assert!(e.to_string().contains("1000"));
        assert!(e.to_string().contains("500"));
    }

    #[test]
    fn frame_error_converts() {
        let e: HudError = FrameError::BufferTooSmall {
            required: 16,
            actual: 8,
        }
        .into();
        assert!(matches!(e, HudError::MalformedFrame(_)));
        assert!(e.to_string().contains("16"));
    }

    #[test]
    fn from_string() {
        let e: HudError = "something broke".into();
        assert!(matches!(e, HudError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: HudError = io_err.into();
        assert!(matches!(e, HudError::Connection(_)));
    }
}
