//! # hudcast-core
//!
//! Screen-mirroring pipeline for a head-up display peripheral.
//!
//! This crate contains:
//! - **Capture**: `CaptureProvider` / `ImageReader` / `VirtualDisplay` seams,
//!   `RawFrame` with exactly-once release, and a synthetic `PatternProvider`
//! - **Pipeline**: `FrameThrottle` (1-in-4), `PixelConverter` (stride strip),
//!   `FramePipeline` and the `CaptureSession` worker
//! - **Link**: `PeripheralLink` connection state machine gating dispatch
//! - **Protocol**: `HudPacket`, `HudCommand` and `HudCodec` for framed I/O
//! - **Transport**: the `Transport` sink and the stream-backed `QueuedTransport`
//! - **Controller**: start / stop / toggle / teardown and device notifications
//! - **Error**: `HudError` — typed, `thiserror`-based error hierarchy

pub mod capture;
pub mod controller;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod protocol;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{
    CaptureConfiguration, CaptureProvider, DisplayFlags, ImageReader, PixelFormat, RawFrame,
    VirtualDisplay,
};
pub use controller::{Controller, StatusEvent, StatusHook};
pub use error::{FrameError, HudError};
pub use link::{ConnectionState, DeviceEvent, LinkEvent, PeripheralLink, Transition};
pub use pipeline::{
    CaptureSession, ConvertedBitmap, FrameOutcome, FramePipeline, FrameThrottle, PixelConverter,
    StatsSnapshot,
};
pub use protocol::{HudCodec, HudCommand, HudPacket, PacketKind};
pub use transport::{QueuedTransport, ResponseHandler, Transport, TransportHandle};
