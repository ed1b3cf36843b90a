//! Capture session: provider callbacks → throttle → convert → HUD.
//!
//! A [`CaptureSession`] owns the virtual display, the image reader and a
//! dedicated worker task. The reader's callback only wakes the worker;
//! the worker runs [`FramePipeline::on_frame_available`] one frame at a
//! time, so the throttle and buffer release never run concurrently.
//!
//! ```text
//! ImageReader ──notify──► worker ──► FramePipeline
//!                                      1. acquire latest RawFrame
//!                                      2. FrameThrottle::decide
//!                                      3. PixelConverter::convert
//!                                      4. PeripheralLink gate
//!                                      5. Transport::send
//!                                      6. release RawFrame
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{CaptureConfiguration, CaptureProvider, ImageReader, RawFrame, VirtualDisplay};
use crate::error::HudError;
use crate::link::PeripheralLink;
use crate::pipeline::convert::PixelConverter;
use crate::pipeline::throttle::{Decision, FrameThrottle};

// ── FrameOutcome ─────────────────────────────────────────────────

/// What happened to one acquired frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Converted and handed to the transport.
    Forwarded,
    /// Skipped by the throttle.
    Dropped,
    /// The buffer could not be converted.
    Malformed,
    /// Converted, then discarded because the HUD is not connected.
    NotReady,
}

// ── PipelineStats ────────────────────────────────────────────────

/// Running frame counters of a session.
#[derive(Debug, Default)]
pub struct PipelineStats {
    acquired: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
    malformed: AtomicU64,
    not_ready: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub acquired: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub malformed: u64,
    pub not_ready: u64,
}

impl PipelineStats {
    fn record(&self, outcome: FrameOutcome) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            FrameOutcome::Forwarded => &self.forwarded,
            FrameOutcome::Dropped => &self.dropped,
            FrameOutcome::Malformed => &self.malformed,
            FrameOutcome::NotReady => &self.not_ready,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
        }
    }
}

// ── FramePipeline ────────────────────────────────────────────────

/// The per-frame stages, independent of any live provider.
pub struct FramePipeline {
    width: u32,
    height: u32,
    throttle: FrameThrottle,
    converter: PixelConverter,
    link: PeripheralLink,
    stats: Arc<PipelineStats>,
}

impl FramePipeline {
    /// A pipeline with a freshly reset throttle.
    pub fn new(config: &CaptureConfiguration, link: PeripheralLink) -> Self {
        Self {
            width: config.width,
            height: config.height,
            throttle: FrameThrottle::new(),
            converter: PixelConverter::new(),
            link,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Handle one "image available" notification.
    ///
    /// Returns `None` for a spurious callback with nothing to acquire.
    pub fn on_frame_available(&mut self, reader: &dyn ImageReader) -> Option<FrameOutcome> {
        let frame = reader.acquire_latest_image()?;
        Some(self.process(frame))
    }

    /// Run `frame` through the stages and release it.
    pub fn process(&mut self, frame: RawFrame) -> FrameOutcome {
        let outcome = self.dispatch(&frame);
        frame.release();
        self.stats.record(outcome);
        outcome
    }

    fn dispatch(&mut self, frame: &RawFrame) -> FrameOutcome {
        if self.throttle.decide() == Decision::Drop {
            return FrameOutcome::Dropped;
        }

        let bitmap = match self.converter.convert(frame, self.width, self.height) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                warn!("dropping malformed frame: {e}");
                return FrameOutcome::Malformed;
            }
        };

        match self.link.ready_transport() {
            Some(transport) => {
                transport.send(bitmap);
                FrameOutcome::Forwarded
            }
            None => {
                debug!("HUD not ready ({}); frame discarded", self.link.state());
                FrameOutcome::NotReady
            }
        }
    }
}

// ── CaptureSession ───────────────────────────────────────────────

/// A live capture: virtual display + image reader + worker.
pub struct CaptureSession {
    config: CaptureConfiguration,
    reader: Option<Arc<dyn ImageReader>>,
    display: Option<Box<dyn VirtualDisplay>>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    stats: Arc<PipelineStats>,
}

impl CaptureSession {
    /// Bind a virtual display of `config`'s size and start dispatching
    /// its frames.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`HudError::DisplayUnavailable`] when the provider cannot bind a
    /// display; nothing is retried.
    pub fn start(
        config: CaptureConfiguration,
        provider: &dyn CaptureProvider,
        link: PeripheralLink,
    ) -> Result<Self, HudError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HudError::Other(format!("capture needs a Tokio runtime: {e}")))?;

        info!(
            "setting up virtual display: {}x{} ({})",
            config.width, config.height, config.format
        );
        let reader = provider.create_image_reader(
            config.width,
            config.height,
            config.format,
            config.max_images(),
        )?;

        let wake = Arc::new(Notify::new());
        let notifier = Arc::clone(&wake);
        reader.set_on_image_available(Some(Arc::new(move || notifier.notify_one())));

        let display = match provider.create_virtual_display(&config, Arc::clone(&reader)) {
            Ok(display) => display,
            Err(e) => {
                reader.close();
                return Err(e);
            }
        };

        let pipeline = FramePipeline::new(&config, link);
        let stats = pipeline.stats();
        let cancel = CancellationToken::new();
        let worker = runtime.spawn(run_worker(
            pipeline,
            Arc::clone(&reader),
            wake,
            cancel.clone(),
        ));

        Ok(Self {
            config,
            reader: Some(reader),
            display: Some(display),
            cancel,
            worker: Some(worker),
            stats,
        })
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop dispatching and release the display and reader.
    ///
    /// Waits for an in-flight frame to finish, so no buffer is touched
    /// after this returns. Stopping a stopped session does nothing.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.cancel.cancel();
        if let Some(reader) = &self.reader {
            reader.set_on_image_available(None);
        }
        if let Err(e) = worker.await {
            warn!("capture worker ended abnormally: {e}");
        }
        self.teardown();

        let s = self.stats.snapshot();
        info!(
            "capture stopped: {} frames, {} sent, {} throttled, {} malformed, {} while HUD not ready",
            s.acquired, s.forwarded, s.dropped, s.malformed, s.not_ready
        );
    }

    fn teardown(&mut self) {
        if let Some(mut display) = self.display.take() {
            display.release();
        }
        if let Some(reader) = self.reader.take() {
            reader.close();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.teardown();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Serially drain "image available" notifications until cancelled.
async fn run_worker(
    mut pipeline: FramePipeline,
    reader: Arc<dyn ImageReader>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wake.notified() => {
                pipeline.on_frame_available(reader.as_ref());
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
