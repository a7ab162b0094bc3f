use nalgebra::SVector;

use crate::kalman_filter::KalmanFilter;
use crate::snapshot::TrackId;

/// `[x1, y1, x2, y2]` to `[cx, cy, area, aspect]`.
pub fn tlbr_to_z(tlbr: &[f32; 4]) -> SVector<f64, 4> {
    let w = f64::from(tlbr[2] - tlbr[0]);
    let h = f64::from(tlbr[3] - tlbr[1]);
    let aspect = if h > 0.0 { w / h } else { 0.0 };
    SVector::<f64, 4>::new(
        f64::from(tlbr[0]) + w / 2.0,
        f64::from(tlbr[1]) + h / 2.0,
        w * h,
        aspect,
    )
}

/// `[cx, cy, area, aspect, ..]` back to `[x1, y1, x2, y2]`.
pub fn state_to_tlbr(state: &SVector<f64, 7>) -> [f32; 4] {
    let w = (state[2] * state[3]).max(0.0).sqrt();
    let h = if w > 0.0 { state[2] / w } else { 0.0 };
    [
        (state[0] - w / 2.0) as f32,
        (state[1] - h / 2.0) as f32,
        (state[0] + w / 2.0) as f32,
        (state[1] + h / 2.0) as f32,
    ]
}

/// One tracked object and its motion model.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    kf: KalmanFilter,
    pub time_since_update: u32,
    pub hits: u32,
    pub hit_streak: u32,
    pub age: u32,
}

impl Track {
    pub fn new(tlbr: &[f32; 4], id: TrackId) -> Self {
        Self {
            id,
            kf: KalmanFilter::new(&tlbr_to_z(tlbr)),
            time_since_update: 0,
            hits: 0,
            hit_streak: 0,
            age: 0,
        }
    }

    /// Advance one frame and return the predicted box.
    pub fn predict(&mut self) -> [f32; 4] {
        self.kf.predict();
        self.age += 1;
        if self.time_since_update > 0 {
            self.hit_streak = 0;
        }
        self.time_since_update += 1;
        self.tlbr()
    }

    /// Correct with an associated detection box.
    pub fn update(&mut self, tlbr: &[f32; 4]) {
        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;
        self.kf.update(&tlbr_to_z(tlbr));
    }

    pub fn tlbr(&self) -> [f32; 4] {
        state_to_tlbr(&self.kf.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_state_round_trip() {
        let tlbr = [100.0, 50.0, 140.0, 130.0];
        let z = tlbr_to_z(&tlbr);
        assert_relative_eq!(z[0], 120.0);
        assert_relative_eq!(z[1], 90.0);
        assert_relative_eq!(z[2], 3200.0);
        assert_relative_eq!(z[3], 0.5);

        let mut state = SVector::<f64, 7>::zeros();
        state.fixed_rows_mut::<4>(0).copy_from(&z);
        let back = state_to_tlbr(&state);
        for (a, b) in back.iter().zip(tlbr.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_track_initialization() {
        let track = Track::new(&[100.0, 100.0, 150.0, 150.0], 1);
        assert_eq!(track.id, 1);
        assert_eq!(track.time_since_update, 0);
        assert_eq!(track.hits, 0);
        assert_eq!(track.hit_streak, 0);
    }

    #[test]
    fn test_track_streak_resets_after_miss() {
        let tlbr = [100.0, 100.0, 150.0, 150.0];
        let mut track = Track::new(&tlbr, 1);

        track.predict();
        track.update(&tlbr);
        track.predict();
        track.update(&tlbr);
        assert_eq!(track.hit_streak, 2);
        assert_eq!(track.hits, 2);

        // missed frame
        track.predict();
        assert_eq!(track.time_since_update, 1);
        track.predict();
        assert_eq!(track.hit_streak, 0);
        assert_eq!(track.time_since_update, 2);
    }

    #[test]
    fn test_track_follows_motion() {
        let mut track = Track::new(&[0.0, 0.0, 40.0, 40.0], 1);
        for step in 1..=5 {
            track.predict();
            let x = 10.0 * step as f32;
            track.update(&[x, 0.0, x + 40.0, 40.0]);
        }
        let predicted = track.predict();
        assert!(predicted[0] > 50.0);
    }
}
