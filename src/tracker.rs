//! Multi-object tracker seam and a reference SORT implementation.
//!
//! The counting core only consumes per-frame `[x1, y1, x2, y2, track_id]`
//! output through [`MultiObjectTracker`]; it never looks inside [`Sort`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::TrackId;
use crate::track::Track;
use crate::utils::compute_iou_tlbr;

/// `[x1, y1, x2, y2, score]` in absolute pixels.
pub type TrackerInput = [f32; 5];

/// One tracker output row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedObject {
    pub tlbr: [f32; 4],
    pub track_id: TrackId,
}

/// Assigns stable identities to per-frame detections.
pub trait MultiObjectTracker {
    /// Consume one frame of detections, possibly empty, and report the
    /// tracks visible in this frame.
    fn update(&mut self, detections: &[TrackerInput]) -> Vec<TrackedObject>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Frames a track survives without an associated detection.
    pub max_age: u32,
    /// Consecutive hits before a track is reported.
    pub min_hits: u32,
    /// Minimum IoU for a detection to continue a track.
    pub iou_threshold: f32,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            max_age: 1,
            min_hits: 3,
            iou_threshold: 0.3,
        }
    }
}

/// Kalman prediction plus IoU association.
#[derive(Debug, Clone)]
pub struct Sort {
    config: SortConfig,
    tracks: Vec<Track>,
    frame_count: u32,
    next_id: TrackId,
}

impl Sort {
    pub fn new(config: SortConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            frame_count: 0,
            next_id: 1,
        }
    }

    /// Live tracks, reported or not.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Greedy best-IoU matching of detections to predicted boxes.
    ///
    /// Returns `(detection, track)` index pairs and the unmatched detections.
    fn associate(
        &self,
        detections: &[TrackerInput],
        predicted: &[[f32; 4]],
    ) -> (Vec<(usize, usize)>, Vec<usize>) {
        let mut candidates: Vec<(f32, usize, usize)> = Vec::new();
        for (d, det) in detections.iter().enumerate() {
            let det_box = [det[0], det[1], det[2], det[3]];
            for (t, trk_box) in predicted.iter().enumerate() {
                let iou = compute_iou_tlbr(&det_box, trk_box);
                if iou >= self.config.iou_threshold {
                    candidates.push((iou, d, t));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut det_used = vec![false; detections.len()];
        let mut trk_used = vec![false; predicted.len()];
        let mut matches = Vec::new();
        for (_, d, t) in candidates {
            if det_used[d] || trk_used[t] {
                continue;
            }
            det_used[d] = true;
            trk_used[t] = true;
            matches.push((d, t));
        }

        let unmatched = (0..detections.len()).filter(|&d| !det_used[d]).collect();
        (matches, unmatched)
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new(SortConfig::default())
    }
}

impl MultiObjectTracker for Sort {
    fn update(&mut self, detections: &[TrackerInput]) -> Vec<TrackedObject> {
        self.frame_count += 1;

        let mut predicted = Vec::with_capacity(self.tracks.len());
        self.tracks.retain_mut(|track| {
            let tlbr = track.predict();
            let valid = tlbr.iter().all(|v| v.is_finite());
            if valid {
                predicted.push(tlbr);
            }
            valid
        });

        let (matches, unmatched) = self.associate(detections, &predicted);
        for (d, t) in matches {
            let det = &detections[d];
            self.tracks[t].update(&[det[0], det[1], det[2], det[3]]);
        }
        for d in unmatched {
            let det = &detections[d];
            self.tracks.push(Track::new(&[det[0], det[1], det[2], det[3]], self.next_id));
            self.next_id += 1;
        }

        let min_hits = self.config.min_hits;
        let warming_up = self.frame_count <= min_hits;
        let output: Vec<TrackedObject> = self
            .tracks
            .iter()
            .filter(|t| t.time_since_update < 1 && (t.hit_streak >= min_hits || warming_up))
            .map(|t| TrackedObject {
                tlbr: t.tlbr(),
                track_id: t.id,
            })
            .collect();

        let max_age = self.config.max_age;
        self.tracks.retain(|t| t.time_since_update <= max_age);

        debug!(
            frame = self.frame_count,
            detections = detections.len(),
            live = self.tracks.len(),
            reported = output.len(),
            "sort update"
        );
        output
    }
}
