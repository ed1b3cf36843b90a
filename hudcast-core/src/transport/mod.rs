//! Transport boundary towards the HUD.
//!
//! The capture worker hands bitmaps to a [`Transport`] and moves on; a
//! transport must never block the caller on delivery.

mod queued;

use std::sync::Arc;

use bytes::Bytes;

use crate::pipeline::ConvertedBitmap;
use crate::protocol::HudCommand;

pub use queued::{QueuedTransport, ResponseHandler};

/// Shared handle to the live transport of a connected peripheral.
pub type TransportHandle = Arc<dyn Transport>;

/// Best-effort, non-blocking sink for HUD traffic.
pub trait Transport: Send + Sync {
    /// Queue a bitmap for display. No acknowledgement is surfaced.
    fn send(&self, bitmap: ConvertedBitmap);

    /// Queue a control command with its encoded payload.
    fn send_command(&self, command: HudCommand, payload: Bytes);
}
