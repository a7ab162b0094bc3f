use nalgebra::{SMatrix, SVector};

/// Constant-velocity Kalman filter over `[cx, cy, area, aspect]`.
///
/// State is `[cx, cy, s, r, vx, vy, vs]`; the aspect ratio is assumed
/// constant.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    pub mean: SVector<f64, 7>,
    pub covariance: SMatrix<f64, 7, 7>,
    motion_mat: SMatrix<f64, 7, 7>,
    update_mat: SMatrix<f64, 4, 7>,
    process_noise: SMatrix<f64, 7, 7>,
    measurement_noise: SMatrix<f64, 4, 4>,
}

impl KalmanFilter {
    /// Initialize from a first measurement with zero velocity.
    pub fn new(measurement: &SVector<f64, 4>) -> Self {
        let mut motion_mat = SMatrix::<f64, 7, 7>::identity();
        for i in 0..3 {
            motion_mat[(i, i + 4)] = 1.0;
        }
        let update_mat = SMatrix::<f64, 4, 7>::identity();

        let measurement_noise =
            SMatrix::<f64, 4, 4>::from_diagonal(&SVector::<f64, 4>::new(1.0, 1.0, 10.0, 10.0));

        // unobservable velocities start with high uncertainty
        let initial_var =
            SVector::<f64, 7>::from_column_slice(&[10.0, 10.0, 10.0, 10.0, 1e4, 1e4, 1e4]);
        let covariance = SMatrix::<f64, 7, 7>::from_diagonal(&initial_var);
        let process_var =
            SVector::<f64, 7>::from_column_slice(&[1.0, 1.0, 1.0, 1.0, 0.01, 0.01, 1e-4]);
        let process_noise = SMatrix::<f64, 7, 7>::from_diagonal(&process_var);

        let mut mean = SVector::<f64, 7>::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);

        Self {
            mean,
            covariance,
            motion_mat,
            update_mat,
            process_noise,
            measurement_noise,
        }
    }

    /// Predict step: x' = F x, P' = F P F^T + Q
    pub fn predict(&mut self) {
        // area must stay non-negative
        if self.mean[6] + self.mean[2] <= 0.0 {
            self.mean[6] = 0.0;
        }
        self.mean = self.motion_mat * self.mean;
        self.covariance =
            self.motion_mat * self.covariance * self.motion_mat.transpose() + self.process_noise;
    }

    /// Correction step. Returns `false` and leaves the state untouched when
    /// the innovation covariance is singular.
    pub fn update(&mut self, measurement: &SVector<f64, 4>) -> bool {
        let projected_mean = self.update_mat * self.mean;
        let projected_cov = self.update_mat * self.covariance * self.update_mat.transpose()
            + self.measurement_noise;

        let Some(projected_inv) = projected_cov.try_inverse() else {
            return false;
        };
        let kalman_gain = self.covariance * self.update_mat.transpose() * projected_inv;

        let innovation = measurement - projected_mean;
        self.mean += kalman_gain * innovation;

        // Joseph form keeps the covariance symmetric
        let i_kh = SMatrix::<f64, 7, 7>::identity() - kalman_gain * self.update_mat;
        self.covariance = i_kh * self.covariance * i_kh.transpose()
            + kalman_gain * self.measurement_noise * kalman_gain.transpose();
        true
    }
}
