//! Per-frame flow: detection filter, tracker, track state store, crossing
//! detector. Each stage only sees the previous stage's output.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::counting::{CountingPolicy, CrossingDetector, CrossingEvent};
use crate::detection::{Detection, DetectionFilter, FrameSize, RawProposal};
use crate::geometry::{BoundingBox, Point};
use crate::snapshot::{TrackId, TrackStateStore};
use crate::telemetry::Telemetry;
use crate::tracker::{MultiObjectTracker, TrackerInput};

/// Centroid movement of one track between the previous and current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSegment {
    pub track_id: TrackId,
    pub current: Point,
    pub previous: Point,
}

/// Everything one frame produced, for rendering and logging.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
    pub tracks: Vec<(TrackId, BoundingBox)>,
    pub motion: Vec<MotionSegment>,
    /// Tracks tested against the counting region this frame.
    pub evaluated: usize,
    pub events: Vec<CrossingEvent>,
    pub count: u64,
    pub fps: f64,
    pub latency: Option<Duration>,
}

/// End-of-run totals.
#[derive(Debug, Clone, Serialize)]
pub struct CountSummary {
    pub frames: u64,
    pub count: u64,
    pub policy: CountingPolicy,
    pub counted_ids: Vec<TrackId>,
}

pub struct CountingPipeline<T> {
    filter: DetectionFilter,
    tracker: T,
    store: TrackStateStore,
    crossings: CrossingDetector,
    telemetry: Telemetry,
    frames: u64,
}

impl<T: MultiObjectTracker> CountingPipeline<T> {
    pub fn new(
        filter: DetectionFilter,
        tracker: T,
        policy: CountingPolicy,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            filter,
            tracker,
            store: TrackStateStore::new(),
            crossings: CrossingDetector::new(policy),
            telemetry,
            frames: 0,
        }
    }

    pub fn process_frame(
        &mut self,
        proposals: &[RawProposal],
        frame_size: FrameSize,
        inference: Duration,
    ) -> FrameReport {
        self.process_frame_at(proposals, frame_size, inference, Instant::now())
    }

    /// Run one frame through every stage, finishing at `now`.
    pub fn process_frame_at(
        &mut self,
        proposals: &[RawProposal],
        frame_size: FrameSize,
        inference: Duration,
        now: Instant,
    ) -> FrameReport {
        self.telemetry.record_inference(inference);

        let detections = self.filter.apply(proposals, frame_size);
        let rows: Vec<TrackerInput> = detections.iter().map(Detection::tracker_row).collect();
        let tracked = self.tracker.update(&rows);

        self.store.begin_frame();
        for obj in &tracked {
            let [x1, y1, x2, y2] = obj.tlbr;
            match BoundingBox::from_corners_f32(x1, y1, x2, y2) {
                Some(bbox) => self.store.record(obj.track_id, bbox),
                None => debug!(track_id = obj.track_id, "dropping non-finite track box"),
            }
        }

        let evaluation = self.crossings.evaluate(&self.store);
        for event in &evaluation.events {
            info!(track_id = event.track_id, count = event.count, "vehicle counted");
        }

        let tracks: Vec<(TrackId, BoundingBox)> =
            self.store.current().iter().map(|(id, bbox)| (id, *bbox)).collect();
        let motion = self
            .store
            .pairs()
            .filter_map(|(track_id, current, previous)| {
                previous.map(|previous| MotionSegment {
                    track_id,
                    current: current.centroid(),
                    previous: previous.centroid(),
                })
            })
            .collect();

        let fps = self.telemetry.frame_done_at(now);
        let frame_index = self.frames;
        self.frames += 1;

        FrameReport {
            frame_index,
            detections,
            tracks,
            motion,
            evaluated: evaluation.evaluated,
            events: evaluation.events,
            count: self.crossings.count(),
            fps,
            latency: self.telemetry.latency(),
        }
    }

    pub fn count(&self) -> u64 {
        self.crossings.count()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn policy(&self) -> &CountingPolicy {
        self.crossings.policy()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn store(&self) -> &TrackStateStore {
        &self.store
    }

    pub fn summary(&self) -> CountSummary {
        let mut counted_ids: Vec<TrackId> = self.crossings.counted_ids().iter().copied().collect();
        counted_ids.sort_unstable();
        CountSummary {
            frames: self.frames,
            count: self.crossings.count(),
            policy: *self.crossings.policy(),
            counted_ids,
        }
    }
}
