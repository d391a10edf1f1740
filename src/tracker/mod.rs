//! Per-instrument rolling state. Each tracker owns its own map keyed by instrument
//! and is only mutated through `observe`, one tick at a time.

pub mod high;
pub mod volume;

pub use high::{HighObservation, HighWaterMarkTracker};
pub use volume::RollingVolumeTracker;
