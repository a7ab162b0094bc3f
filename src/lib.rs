pub mod config;
pub mod counting;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod kalman_filter;
pub mod pipeline;
pub mod snapshot;
pub mod telemetry;
pub mod track;
pub mod tracker;
pub mod utils;

#[cfg(feature = "video")]
pub mod detector;
#[cfg(feature = "video")]
pub mod visualization;

// Re-export main types
pub use crate::config::{Config, InputSource};
pub use crate::counting::{CountingPolicy, CrossingDetector, CrossingEvent};
pub use crate::detection::{Detection, DetectionFilter, FrameSize, RawProposal};
pub use crate::error::CounterError;
pub use crate::pipeline::{CountSummary, CountingPipeline, FrameReport};
pub use crate::snapshot::{TrackId, TrackStateStore};
pub use crate::tracker::{MultiObjectTracker, Sort};
