//! Duty-cycle frame throttle.
//!
//! The HUD link is far slower than the capture rate, so only one frame
//! in every `threshold + 1` is forwarded. The first frame after a reset
//! always goes through so the peripheral gets an image without delay.
//!
//! ```text
//! frame:    1  2  3  4  5  6  7  8  9 …
//! decision: F  D  D  D  F  D  D  D  F …
//! ```

/// Frames dropped between two forwarded frames.
pub const DEFAULT_THRESHOLD: u32 = 3;

/// Per-frame verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward,
    Drop,
}

/// Where the throttle is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleMode {
    /// The next frame is forwarded.
    Resumed,
    /// Frames are dropped until the counter reaches the threshold.
    SteadyDropNext,
}

/// Stateful forward/drop policy, owned by a single capture session.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    mode: ThrottleMode,
    counter: u32,
    threshold: u32,
}

impl FrameThrottle {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// A throttle dropping `threshold` frames per cycle (at least 1).
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            mode: ThrottleMode::Resumed,
            counter: 0,
            threshold: threshold.max(1),
        }
    }

    /// Decide the fate of the next captured frame.
    pub fn decide(&mut self) -> Decision {
        match self.mode {
            ThrottleMode::Resumed => self.forward(),
            ThrottleMode::SteadyDropNext if self.counter >= self.threshold => {
                self.mode = ThrottleMode::Resumed;
                self.counter = 0;
                self.forward()
            }
            ThrottleMode::SteadyDropNext => {
                self.counter += 1;
                Decision::Drop
            }
        }
    }

    /// Back to the start of the cycle. Only called at session start.
    pub fn reset(&mut self) {
        self.mode = ThrottleMode::Resumed;
        self.counter = 0;
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    fn forward(&mut self) -> Decision {
        self.mode = ThrottleMode::SteadyDropNext;
        self.counter = 0;
        Decision::Forward
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
