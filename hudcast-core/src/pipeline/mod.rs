//! Frame dispatch pipeline.
//!
//! | Module     | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `convert`  | Strided provider buffer → dense RGBA bitmap        |
//! | `throttle` | Duty-cycle forward/drop policy                     |
//! | `session`  | Worker that drives the stages per captured frame   |

pub mod convert;
pub mod session;
pub mod throttle;

pub use convert::{ConvertedBitmap, PixelConverter};
pub use session::{CaptureSession, FrameOutcome, FramePipeline, PipelineStats, StatsSnapshot};
pub use throttle::{Decision, FrameThrottle, ThrottleMode};
