//! Synthetic capture provider.
//!
//! Renders a moving gradient at the configured frame rate into a
//! single-slot reader. Rows are padded to 64-byte boundaries the way
//! GPU-backed surfaces pad them, so consumers exercise their stride
//! handling. Used by the daemon when no real screen source is wired in,
//! and by tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::capture::{
    CaptureConfiguration, CaptureProvider, FrameCallback, ImageReader, PixelFormat, RawFrame,
    VirtualDisplay,
};
use crate::error::HudError;

/// Row alignment applied to rendered buffers.
const ROW_ALIGN: usize = 64;

// ── PatternProvider ──────────────────────────────────────────────

/// A [`CaptureProvider`] that needs no OS service.
pub struct PatternProvider {
    consent: AtomicBool,
    readers: Mutex<Vec<Weak<PatternReader>>>,
}

impl PatternProvider {
    /// A provider whose capture consent is already granted.
    pub fn new() -> Self {
        Self {
            consent: AtomicBool::new(true),
            readers: Mutex::new(Vec::new()),
        }
    }

    /// A provider that refuses displays until consent is granted.
    pub fn without_consent() -> Self {
        let provider = Self::new();
        provider.consent.store(false, Ordering::SeqCst);
        provider
    }

    pub fn set_consent(&self, granted: bool) {
        self.consent.store(granted, Ordering::SeqCst);
    }

    /// The live reader behind `surface`, if this provider made it.
    fn reader_for(&self, surface: &Arc<dyn ImageReader>) -> Option<Arc<PatternReader>> {
        let readers = self.readers.lock().ok()?;
        readers
            .iter()
            .filter_map(Weak::upgrade)
            .find(|r| std::ptr::addr_eq(Arc::as_ptr(r), Arc::as_ptr(surface)))
    }
}

impl Default for PatternProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for PatternProvider {
    fn create_image_reader(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        max_images: u32,
    ) -> Result<Arc<dyn ImageReader>, HudError> {
        let reader = Arc::new(PatternReader::new(width, height, format, max_images));
        if let Ok(mut readers) = self.readers.lock() {
            readers.retain(|r| r.strong_count() > 0);
            readers.push(Arc::downgrade(&reader));
        }
        Ok(reader)
    }

    /// Starts rendering into `surface`, which must be a reader this
    /// provider created.
    fn create_virtual_display(
        &self,
        config: &CaptureConfiguration,
        surface: Arc<dyn ImageReader>,
    ) -> Result<Box<dyn VirtualDisplay>, HudError> {
        if !self.consent.load(Ordering::SeqCst) {
            return Err(HudError::DisplayUnavailable(
                "screen capture consent not granted".into(),
            ));
        }
        let reader = self.reader_for(&surface).ok_or_else(|| {
            HudError::DisplayUnavailable("surface was not created by this provider".into())
        })?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HudError::DisplayUnavailable(format!("no runtime: {e}")))?;

        let cancel = CancellationToken::new();
        let interval = Duration::from_secs_f64(1.0 / config.frame_rate.max(1) as f64);
        let token = cancel.clone();
        let name = config.display_name.clone();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut frame_no: u64 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        reader.push(frame_no);
                        frame_no += 1;
                    }
                }
            }
            debug!("virtual display {name} stopped after {frame_no} frames");
        });

        info!(
            "virtual display {}: {}x{} @ {} dpi",
            config.display_name, config.width, config.height, config.density_dpi
        );
        Ok(Box::new(PatternDisplay { cancel }))
    }

    fn shutdown(&self) {
        if let Ok(mut readers) = self.readers.lock() {
            readers.clear();
        }
        self.consent.store(false, Ordering::SeqCst);
    }
}

// ── PatternDisplay ───────────────────────────────────────────────

struct PatternDisplay {
    cancel: CancellationToken,
}

impl VirtualDisplay for PatternDisplay {
    fn release(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for PatternDisplay {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── PatternReader ────────────────────────────────────────────────

/// Single-slot image reader fed by the render task.
pub struct PatternReader {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    max_images: usize,
    latest: Mutex<Option<Bytes>>,
    callback: Mutex<Option<FrameCallback>>,
    outstanding: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl PatternReader {
    pub fn new(width: u32, height: u32, format: PixelFormat, max_images: u32) -> Self {
        let row = width as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            stride: row.div_ceil(ROW_ALIGN) * ROW_ALIGN,
            max_images: max_images.max(1) as usize,
            latest: Mutex::new(None),
            callback: Mutex::new(None),
            outstanding: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Row pitch of rendered images.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Images acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Render frame `frame_no` into the slot and notify the listener.
    pub fn push(&self, frame_no: u64) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let data = render(self.width, self.height, self.format, self.stride, frame_no);
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(Bytes::from(data));
        }
        let callback = self.callback.lock().ok().and_then(|cb| cb.clone());
        if let Some(cb) = callback {
            cb();
        }
    }
}

impl ImageReader for PatternReader {
    fn acquire_latest_image(&self) -> Option<RawFrame> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        if self.outstanding.load(Ordering::SeqCst) >= self.max_images {
            debug!("all {} images in use; skipping acquire", self.max_images);
            return None;
        }
        let data = self.latest.lock().ok()?.take()?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = Arc::clone(&self.outstanding);
        Some(
            RawFrame::new(self.width, self.height, self.stride, self.format, data)
                .with_release_hook(move || {
                    outstanding.fetch_sub(1, Ordering::SeqCst);
                }),
        )
    }

    fn set_on_image_available(&self, callback: Option<FrameCallback>) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = callback;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.set_on_image_available(None);
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────

/// Draw a diagonal gradient shifted by `frame_no`.
fn render(width: u32, height: u32, format: PixelFormat, stride: usize, frame_no: u64) -> Vec<u8> {
    let bpp = format.bytes_per_pixel();
    let mut buf = vec![0u8; stride * height as usize];
    let shift = (frame_no * 4) as u32;
    for y in 0..height {
        let row = &mut buf[y as usize * stride..][..width as usize * bpp];
        for (x, px) in row.chunks_exact_mut(bpp).enumerate() {
            let r = (x as u32).wrapping_add(shift) as u8;
            let g = y.wrapping_add(shift) as u8;
            let b = (x as u32 ^ y) as u8;
            match format {
                PixelFormat::Rgbx8888 | PixelFormat::Rgba8888 => {
                    px.copy_from_slice(&[r, g, b, 0xFF]);
                }
                PixelFormat::Bgra8888 => px.copy_from_slice(&[b, g, r, 0xFF]),
                PixelFormat::Rgb565 => {
                    let v = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
                    px.copy_from_slice(&v.to_le_bytes());
                }
            }
        }
    }
    buf
}

// ── Tests ────────────────────────────────────────────────────────
