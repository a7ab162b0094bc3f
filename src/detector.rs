use std::time::{Duration, Instant};

use opencv::{
    core::{Mat, Scalar, Size, Vector, CV_32F},
    dnn,
    prelude::*,
};
use tracing::info;

use crate::config::Config;
use crate::detection::RawProposal;
use crate::error::Result;

/// Darknet YOLO network run through OpenCV's DNN module.
pub struct Detector {
    net: dnn::Net,
    output_names: Vector<String>,
    input_size: i32,
    score_offset: usize,
}

impl Detector {
    /// Load the network named by `cfg`. Missing files are reported before
    /// OpenCV is asked to parse anything.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        cfg.check_model_files()?;

        let config_path = cfg.model_config_path();
        let weights_path = cfg.model_weights_path();
        info!(
            config = %config_path.display(),
            weights = %weights_path.display(),
            "loading YOLO from disk"
        );

        let mut net = dnn::read_net_from_darknet(
            &config_path.to_string_lossy(),
            &weights_path.to_string_lossy(),
        )?;
        net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)?;
        net.set_preferable_target(dnn::DNN_TARGET_CPU)?;
        let output_names = net.get_unconnected_out_layers_names()?;

        Ok(Self {
            net,
            output_names,
            input_size: cfg.input_size,
            score_offset: cfg.score_offset,
        })
    }

    /// Forward pass over one BGR frame.
    ///
    /// Returns every output-layer row as a proposal plus the time spent in
    /// the network.
    pub fn detect(&mut self, frame: &Mat) -> Result<(Vec<RawProposal>, Duration)> {
        // scale to [0,1], square input, BGR to RGB
        let blob = dnn::blob_from_image(
            frame,
            1.0 / 255.0,
            Size::new(self.input_size, self.input_size),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;

        let mut outputs: Vector<Mat> = Vector::new();
        let start = Instant::now();
        self.net.forward(&mut outputs, &self.output_names)?;
        let elapsed = start.elapsed();

        let mut proposals = Vec::new();
        for output in outputs.iter() {
            for row in 0..output.rows() {
                let values = output.at_row::<f32>(row)?;
                if let Some(proposal) = RawProposal::from_row(values, self.score_offset) {
                    proposals.push(proposal);
                }
            }
        }
        Ok((proposals, elapsed))
    }
}
