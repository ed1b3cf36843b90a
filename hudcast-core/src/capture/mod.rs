//! Capture-provider boundary.
//!
//! The OS screen-capture service is an external collaborator. The
//! pipeline only sees it through three traits:
//!
//! ```text
//! CaptureProvider ──create_image_reader──► ImageReader  (surface + per-frame callback)
//!        │                                     ▲
//!        └──────create_virtual_display─────────┘   VirtualDisplay renders into it
//! ```
//!
//! Frames come out of [`ImageReader::acquire_latest_image`] as
//! [`RawFrame`]s. A `RawFrame` owns its slot in the provider until it is
//! dropped; dropping (or calling [`RawFrame::release`]) hands the slot
//! back exactly once.

pub mod pattern;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::error::HudError;

pub use types::{CaptureConfiguration, DisplayFlags, PixelFormat};

/// Callback fired by an [`ImageReader`] whenever a new image is ready.
pub type FrameCallback = Arc<dyn Fn() + Send + Sync>;

// ── RawFrame ─────────────────────────────────────────────────────

/// An image acquired from the capture provider.
///
/// The `data` buffer holds `height` rows of `stride` bytes each; the last
/// row may be cut short after its pixels. `stride` may exceed
/// `width * bytes_per_pixel` because of alignment padding.
pub struct RawFrame {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Bytes,
    timestamp: Instant,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, stride: usize, format: PixelFormat, data: Bytes) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data,
            timestamp: Instant::now(),
            on_release: None,
        }
    }

    /// Attach the hook that returns this frame's slot to the provider.
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// The first (and only) plane.
    pub fn plane(&self) -> &[u8] {
        &self.data
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Hand the buffer back to the provider.
    pub fn release(self) {}
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

// ── Provider traits ──────────────────────────────────────────────

/// Consumer surface the virtual display renders into.
///
/// Holds a single "latest" image: acquiring returns the most recent
/// frame and discards older ones, so nothing queues up under
/// backpressure.
pub trait ImageReader: Send + Sync {
    /// Take the newest image, or `None` if nothing new is ready or the
    /// reader has been closed.
    fn acquire_latest_image(&self) -> Option<RawFrame>;

    /// Register (or clear) the per-frame notification.
    fn set_on_image_available(&self, callback: Option<FrameCallback>);

    /// Tear the surface down. Later acquisitions return `None`.
    fn close(&self);
}

/// A bound virtual display.
pub trait VirtualDisplay: Send {
    /// Stop rendering. Calling this more than once has no effect.
    fn release(&mut self);
}

/// The OS screen-capture service.
pub trait CaptureProvider: Send + Sync {
    /// Create a reader of `width × height` images in `format`.
    fn create_image_reader(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        max_images: u32,
    ) -> Result<Arc<dyn ImageReader>, HudError>;

    /// Mirror the screen into `surface`.
    ///
    /// Fails with [`HudError::DisplayUnavailable`] when capture has not
    /// been authorised.
    fn create_virtual_display(
        &self,
        config: &CaptureConfiguration,
        surface: Arc<dyn ImageReader>,
    ) -> Result<Box<dyn VirtualDisplay>, HudError>;

    /// Drop the capture authorisation.
    fn shutdown(&self) {}
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn release_hook_runs_once_on_release() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let frame = RawFrame::new(1, 1, 4, PixelFormat::Rgba8888, Bytes::from_static(&[0; 4]))
            .with_release_hook(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        frame.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_hook_runs_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let c = Arc::clone(&count);
            let _frame =
                RawFrame::new(1, 1, 4, PixelFormat::Rgba8888, Bytes::from_static(&[0; 4]))
                    .with_release_hook(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
