use std::collections::HashSet;
use std::fs;
use std::path::Path;

use num_traits::cast::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CounterError, Result};
use crate::geometry::BoundingBox;
use crate::utils;

/// Darknet YOLO rows carry an objectness score at index 4.
pub const DARKNET_SCORE_OFFSET: usize = 5;

/// Width and height of the frame the detector looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: i32,
    pub height: i32,
}

impl FrameSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// How proposal coordinates are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Relative to the input tensor, in `[0, 1]`.
    #[default]
    Normalized,
    /// Already in frame pixels.
    Pixel,
}

/// One unfiltered box proposal from a detector output layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProposal {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub class_scores: Vec<f32>,
}

impl RawProposal {
    /// Split a detector row `[cx, cy, w, h, .., score_0 .. score_K]`.
    ///
    /// `score_offset` is the index of the first class score. Rows that cannot
    /// hold a box and at least one score yield `None`.
    pub fn from_row(row: &[f32], score_offset: usize) -> Option<Self> {
        if row.len() <= score_offset || score_offset < 4 {
            return None;
        }
        Some(Self {
            center_x: row[0],
            center_y: row[1],
            width: row[2],
            height: row[3],
            class_scores: row[score_offset..].to_vec(),
        })
    }

    /// Class with the highest score; the first one wins ties.
    pub fn best_class(&self) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (class_id, &score) in self.class_scores.iter().enumerate() {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((class_id, score)),
            }
        }
        best
    }
}

/// A single detection result.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }

    /// `[x1, y1, x2, y2, score]`, the row the tracker consumes.
    pub fn tracker_row(&self) -> [f32; 5] {
        let [x1, y1, x2, y2] = self.bbox.to_tlbr_f32();
        [x1, y1, x2, y2, self.confidence]
    }
}

/// Thresholds and options for [`DetectionFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub conf_threshold: f32,
    pub nms_threshold: f32,
    pub coordinates: CoordinateSpace,
    /// Class ids allowed through after suppression; `None` keeps every class.
    pub allowed_classes: Option<HashSet<usize>>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            nms_threshold: 0.3,
            coordinates: CoordinateSpace::Normalized,
            allowed_classes: None,
        }
    }
}

/// Confidence threshold plus non-maximum suppression over raw proposals.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    settings: FilterSettings,
}

impl DetectionFilter {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings }
    }

    /// Reduce proposals to at most one detection per physical object.
    ///
    /// Returns an empty list, never an error, when nothing survives.
    pub fn apply(&self, proposals: &[RawProposal], frame: FrameSize) -> Vec<Detection> {
        let candidates: Vec<Detection> = proposals
            .iter()
            .filter_map(|p| self.candidate(p, frame))
            .collect();

        if candidates.is_empty() {
            return candidates;
        }

        let boxes: Vec<BoundingBox> = candidates.iter().map(|d| d.bbox).collect();
        let scores: Vec<f32> = candidates.iter().map(|d| d.confidence).collect();
        let keep = utils::nms(&boxes, &scores, self.settings.nms_threshold);

        let detections: Vec<Detection> = keep
            .into_iter()
            .map(|idx| candidates[idx].clone())
            .filter(|det| self.is_allowed(det.class_id))
            .collect();

        debug!(
            proposals = proposals.len(),
            candidates = candidates.len(),
            kept = detections.len(),
            "detection filter"
        );
        detections
    }

    fn is_allowed(&self, class_id: usize) -> bool {
        self.settings
            .allowed_classes
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&class_id))
    }

    fn candidate(&self, proposal: &RawProposal, frame: FrameSize) -> Option<Detection> {
        let (class_id, confidence) = proposal.best_class()?;
        if confidence.is_nan() || confidence <= self.settings.conf_threshold {
            return None;
        }

        let (sx, sy) = match self.settings.coordinates {
            CoordinateSpace::Normalized => (frame.width as f32, frame.height as f32),
            CoordinateSpace::Pixel => (1.0, 1.0),
        };
        let center_x = (proposal.center_x * sx).to_i32()?;
        let center_y = (proposal.center_y * sy).to_i32()?;
        let width = (proposal.width * sx).to_i32()?;
        let height = (proposal.height * sy).to_i32()?;

        let x = (center_x as f32 - width as f32 / 2.0) as i32;
        let y = (center_y as f32 - height as f32 / 2.0) as i32;

        let bbox = BoundingBox::from_tlwh(x, y, width, height)?;
        Some(Detection::new(bbox, confidence, class_id))
    }
}

/// Split a label file's contents into one label per line.
pub fn parse_labels(contents: &str) -> Vec<String> {
    contents
        .trim()
        .lines()
        .map(|line| line.trim().to_string())
        .collect()
}

/// Load class labels, one per line, such as `coco.names`.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(CounterError::MissingFile(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path).map_err(|source| CounterError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_labels(&contents))
}

/// Map label names to class ids. An empty list means "all classes".
pub fn resolve_class_filter(
    labels: &[String],
    allowed: &[String],
) -> Result<Option<HashSet<usize>>> {
    if allowed.is_empty() {
        return Ok(None);
    }
    allowed
        .iter()
        .map(|name| {
            labels
                .iter()
                .position(|label| label == name)
                .ok_or_else(|| {
                    CounterError::InvalidConfig(format!("unknown class label '{}'", name))
                })
        })
        .collect::<Result<HashSet<usize>>>()
        .map(Some)
}
