use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::counting::CountingPolicy;
use crate::detection::{CoordinateSpace, FilterSettings, DARKNET_SCORE_OFFSET};
use crate::error::{CounterError, Result};
use crate::tracker::SortConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the Darknet model and its label file.
    pub model_dir: PathBuf,
    pub model_config: String,
    pub model_weights: String,
    pub labels_file: String,
    /// Side of the square detector input tensor.
    pub input_size: i32,
    pub conf_threshold: f32,
    pub nms_threshold: f32,
    pub coordinates: CoordinateSpace,
    /// Index of the first class score in a detector row.
    pub score_offset: usize,
    /// Label names kept after suppression; empty keeps everything.
    pub allowed_labels: Vec<String>,
    pub counting: CountingPolicy,
    /// Frames per frame-rate measurement window.
    pub fps_window: u32,
    pub tracker: SortConfig,
    /// Resize every frame to `[width, height]` before detection.
    pub resize_to: Option<[i32; 2]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("yolo-coco"),
            model_config: "yolov3.cfg".to_string(),
            model_weights: "yolov3.weights".to_string(),
            labels_file: "coco.names".to_string(),
            input_size: 416,
            conf_threshold: 0.5,
            nms_threshold: 0.3,
            coordinates: CoordinateSpace::Normalized,
            score_offset: DARKNET_SCORE_OFFSET,
            allowed_labels: ["car", "truck", "bus", "motorbike"]
                .iter()
                .map(|label| label.to_string())
                .collect(),
            counting: CountingPolicy::default(),
            fps_window: 30,
            tracker: SortConfig::default(),
            resize_to: None,
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| CounterError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = 0.0_f32..=1.0;
        if !unit.contains(&self.conf_threshold) {
            return Err(invalid(format!("conf_threshold {} outside [0, 1]", self.conf_threshold)));
        }
        if !unit.contains(&self.nms_threshold) {
            return Err(invalid(format!("nms_threshold {} outside [0, 1]", self.nms_threshold)));
        }
        if self.input_size <= 0 {
            return Err(invalid(format!("input_size must be positive, got {}", self.input_size)));
        }
        if self.score_offset < 4 {
            return Err(invalid("score_offset must leave room for the box".to_string()));
        }
        if self.fps_window == 0 {
            return Err(invalid("fps_window must be at least 1".to_string()));
        }
        if let Some([w, h]) = self.resize_to {
            if w <= 0 || h <= 0 {
                return Err(invalid(format!("resize_to must be positive, got {}x{}", w, h)));
            }
        }
        match self.counting {
            CountingPolicy::LineCrossing { line, .. } if line.start == line.end => {
                Err(invalid("counting line endpoints must differ".to_string()))
            }
            CountingPolicy::ZoneDwell { band } if band.top > band.bottom => Err(invalid(format!(
                "band top {} is below bottom {}",
                band.top, band.bottom
            ))),
            _ => Ok(()),
        }
    }

    pub fn model_config_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_config)
    }

    pub fn model_weights_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_weights)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.model_dir.join(&self.labels_file)
    }

    /// Fail fast when any model or label file is absent.
    pub fn check_model_files(&self) -> Result<()> {
        for path in [self.model_config_path(), self.model_weights_path(), self.labels_path()] {
            if !path.is_file() {
                return Err(CounterError::MissingFile(path));
            }
        }
        Ok(())
    }

    pub fn filter_settings(&self, allowed_classes: Option<HashSet<usize>>) -> FilterSettings {
        FilterSettings {
            conf_threshold: self.conf_threshold,
            nms_threshold: self.nms_threshold,
            coordinates: self.coordinates,
            allowed_classes,
        }
    }
}

fn invalid(msg: String) -> CounterError {
    CounterError::InvalidConfig(msg)
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Camera(i32),
    File(PathBuf),
}

impl InputSource {
    /// A number selects a camera, anything else is a video file path.
    /// No argument means camera 0.
    pub fn resolve(arg: Option<&str>) -> Result<Self> {
        let Some(arg) = arg else {
            return Ok(InputSource::Camera(0));
        };
        if let Ok(index) = arg.trim().parse::<i32>() {
            return Ok(InputSource::Camera(index));
        }
        let path = PathBuf::from(arg);
        if !path.exists() {
            return Err(CounterError::MissingFile(path));
        }
        Ok(InputSource::File(path))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, InputSource::Camera(_))
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Camera(index) => write!(f, "camera {}", index),
            InputSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{HorizontalBand, LineSegment, Point};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.model_config_path(), PathBuf::from("yolo-coco/yolov3.cfg"));
        assert_eq!(cfg.labels_path(), PathBuf::from("yolo-coco/coco.names"));
    }

    #[test]
    fn test_from_file_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "conf_threshold": 0.25,
                "nms_threshold": 0.5,
                "allowed_labels": ["car", "truck", "bus", "motorbike"],
                "counting": {{"policy": "zone_dwell", "band": {{"top": 200, "bottom": 260}}}},
                "fps_window": 10,
                "resize_to": [320, 320]
            }}"#
        )
        .unwrap();

        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.conf_threshold, 0.25);
        assert_eq!(cfg.allowed_labels.len(), 4);
        assert_eq!(
            cfg.counting,
            CountingPolicy::ZoneDwell {
                band: HorizontalBand::new(200, 260)
            }
        );
        assert_eq!(cfg.fps_window, 10);
        assert_eq!(cfg.resize_to, Some([320, 320]));
        // untouched fields keep their defaults
        assert_eq!(cfg.input_size, 416);
        assert_eq!(cfg.tracker, SortConfig::default());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, CounterError::ConfigIo { .. }));
    }

    #[test]
    fn test_from_file_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CounterError::ConfigParse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = Config {
            conf_threshold: 1.5,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(CounterError::InvalidConfig(_))));

        let cfg = Config {
            counting: CountingPolicy::ZoneDwell {
                band: HorizontalBand::new(300, 200),
            },
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            counting: CountingPolicy::LineCrossing {
                line: LineSegment::new(Point::new(5, 5), Point::new(5, 5)),
                dedup: false,
            },
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            fps_window: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_check_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            model_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        assert!(matches!(cfg.check_model_files(), Err(CounterError::MissingFile(_))));

        for name in ["yolov3.cfg", "yolov3.weights", "coco.names"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        assert!(cfg.check_model_files().is_ok());
    }

    #[test]
    fn test_input_source_resolution() {
        assert_eq!(InputSource::resolve(None).unwrap(), InputSource::Camera(0));
        assert_eq!(InputSource::resolve(Some("1")).unwrap(), InputSource::Camera(1));
        assert!(matches!(
            InputSource::resolve(Some("/nonexistent/video.mp4")),
            Err(CounterError::MissingFile(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let source = InputSource::resolve(Some(path)).unwrap();
        assert!(!source.is_camera());
        assert_eq!(source.to_string(), path);
    }
}
