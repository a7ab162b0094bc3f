//! Previous/current per-frame track boxes.
//!
//! The current snapshot is rebuilt from scratch from each frame's tracker
//! output and becomes the previous snapshot, unchanged, when the next frame
//! begins.

use std::collections::BTreeMap;

use crate::geometry::BoundingBox;

/// Stable identity assigned by the tracker.
pub type TrackId = u32;

/// Track boxes observed in a single frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSnapshot {
    boxes: BTreeMap<TrackId, BoundingBox>,
}

impl TrackSnapshot {
    pub fn get(&self, id: TrackId) -> Option<&BoundingBox> {
        self.boxes.get(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.boxes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &BoundingBox)> {
        self.boxes.iter().map(|(&id, bbox)| (id, bbox))
    }
}

impl FromIterator<(TrackId, BoundingBox)> for TrackSnapshot {
    fn from_iter<I: IntoIterator<Item = (TrackId, BoundingBox)>>(iter: I) -> Self {
        Self {
            boxes: iter.into_iter().collect(),
        }
    }
}

/// Owns the two snapshots and swaps them at every frame boundary.
#[derive(Debug, Default)]
pub struct TrackStateStore {
    previous: TrackSnapshot,
    current: TrackSnapshot,
}

impl TrackStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move "current" into "previous" and start an empty "current".
    pub fn begin_frame(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Insert a tracker output box into the current frame.
    ///
    /// A repeated identity within one frame keeps the last box.
    pub fn record(&mut self, id: TrackId, bbox: BoundingBox) {
        self.current.boxes.insert(id, bbox);
    }

    pub fn previous(&self) -> &TrackSnapshot {
        &self.previous
    }

    pub fn current(&self) -> &TrackSnapshot {
        &self.current
    }

    /// Every current track with its previous-frame box, if it had one.
    pub fn pairs(&self) -> impl Iterator<Item = (TrackId, &BoundingBox, Option<&BoundingBox>)> {
        self.current
            .iter()
            .map(move |(id, bbox)| (id, bbox, self.previous.get(id)))
    }
}
