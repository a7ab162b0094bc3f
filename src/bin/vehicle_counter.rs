use anyhow::{bail, Context, Result};
use clap::Parser;
use opencv::{
    core::{Size, Vector},
    highgui, imgcodecs, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use vehicle_counter::detection::{load_labels, resolve_class_filter};
use vehicle_counter::detector::Detector;
use vehicle_counter::geometry::{HorizontalBand, LineSegment, Point};
use vehicle_counter::telemetry::Telemetry;
use vehicle_counter::{
    visualization, Config, CountingPipeline, CountingPolicy, DetectionFilter, FrameSize,
    InputSource, Sort,
};

const FRAMES_DIR: &str = "output";
const WRITER_FPS: f64 = 30.0;
const PROGRESS_EVERY: u64 = 30;

#[derive(Parser)]
#[command(
    name = "vehicle-counter",
    about = "Count vehicles crossing a line or passing through a band of a video",
    version
)]
struct Args {
    /// Camera index (e.g. 0, 1) or path to a video file. Default: camera 0
    #[arg(short, long)]
    input: Option<String>,

    /// Optional path to an output video
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base path to the YOLO directory
    #[arg(short, long)]
    yolo: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum probability to filter weak detections
    #[arg(long)]
    confidence: Option<f32>,

    /// Threshold when applying non-maxima suppression
    #[arg(long)]
    threshold: Option<f32>,

    /// Count motion across the line x1,y1,x2,y2
    #[arg(long, value_parser = parse_line, conflicts_with = "band")]
    line: Option<LineSegment>,

    /// Count entries into the horizontal band top,bottom
    #[arg(long, value_parser = parse_band)]
    band: Option<HorizontalBand>,

    /// Credit each track at most once when counting line crossings
    #[arg(long)]
    dedup_line: bool,

    /// Save individual frames to the output directory
    #[arg(long)]
    save_frames: bool,

    /// Do not open a display window
    #[arg(long)]
    headless: bool,

    /// Write a JSON summary of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn parse_ints<const N: usize>(s: &str) -> std::result::Result<[i32; N], String> {
    let values: Vec<i32> = s
        .split(',')
        .map(|v| v.trim().parse::<i32>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<std::result::Result<_, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<i32>| format!("expected {} comma-separated integers, got {}", N, v.len()))
}

fn parse_line(s: &str) -> std::result::Result<LineSegment, String> {
    let [x1, y1, x2, y2] = parse_ints::<4>(s)?;
    Ok(LineSegment::new(Point::new(x1, y1), Point::new(x2, y2)))
}

fn parse_band(s: &str) -> std::result::Result<HorizontalBand, String> {
    let [top, bottom] = parse_ints::<2>(s)?;
    Ok(HorizontalBand::new(top, bottom))
}

/// Config file first, then command-line overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut cfg = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &args.yolo {
        cfg.model_dir = dir.clone();
    }
    if let Some(conf) = args.confidence {
        cfg.conf_threshold = conf;
    }
    if let Some(nms) = args.threshold {
        cfg.nms_threshold = nms;
    }
    if let Some(line) = args.line {
        cfg.counting = CountingPolicy::LineCrossing { line, dedup: false };
    }
    if let Some(band) = args.band {
        cfg.counting = CountingPolicy::ZoneDwell { band };
    }
    if args.dedup_line {
        match &mut cfg.counting {
            CountingPolicy::LineCrossing { dedup, .. } => *dedup = true,
            CountingPolicy::ZoneDwell { .. } => {
                warn!("--dedup-line has no effect on band counting")
            }
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Create the frame directory and remove stale PNGs from earlier runs.
fn prepare_frames_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn open_capture(source: &InputSource) -> Result<VideoCapture> {
    let mut cap = match source {
        InputSource::Camera(index) => {
            info!("starting video stream from camera {}", index);
            VideoCapture::new(*index, videoio::CAP_ANY)?
        }
        InputSource::File(path) => {
            info!("opening video file {}", path.display());
            VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)?
        }
    };
    if !cap.is_opened()? {
        bail!(vehicle_counter::CounterError::SourceUnavailable(source.to_string()));
    }
    if source.is_camera() {
        cap.set(videoio::CAP_PROP_FRAME_WIDTH, 1280.0)?;
        cap.set(videoio::CAP_PROP_FRAME_HEIGHT, 720.0)?;
        cap.set(videoio::CAP_PROP_FPS, 30.0)?;
        info!("camera opened, press 'q' to quit");
    }
    Ok(cap)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let cfg = load_config(&args)?;
    let source = InputSource::resolve(args.input.as_deref())?;

    let mut detector = Detector::from_config(&cfg)?;
    let labels = load_labels(&cfg.labels_path())?;
    let allowed = resolve_class_filter(&labels, &cfg.allowed_labels)?;

    if args.save_frames {
        prepare_frames_dir(Path::new(FRAMES_DIR))?;
    }

    let mut cap = open_capture(&source)?;
    let total_frames = if source.is_camera() {
        None
    } else {
        let total = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;
        if total > 0 {
            info!("{} total frames in video", total);
            Some(total as u64)
        } else {
            info!("could not determine number of frames in video");
            None
        }
    };

    let mut pipeline = CountingPipeline::new(
        DetectionFilter::new(cfg.filter_settings(allowed)),
        Sort::new(cfg.tracker),
        cfg.counting,
        Telemetry::new(cfg.fps_window),
    );

    let window_name = if source.is_camera() {
        "Traffic Counter - Real-time"
    } else {
        "Traffic Counter - Video"
    };
    let mut display = !args.headless;
    if display {
        if let Err(err) = highgui::named_window(window_name, highgui::WINDOW_AUTOSIZE) {
            warn!("Failed to open display window: {}. Running headless.", err);
            display = false;
        }
    }

    let mut writer: Option<VideoWriter> = None;
    let mut captured = Mat::default();
    let mut resized = Mat::default();

    loop {
        if !cap.read(&mut captured)? || captured.empty() {
            break;
        }

        let frame = match cfg.resize_to {
            Some([w, h]) => {
                let size = Size::new(w, h);
                imgproc::resize(&captured, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
                &mut resized
            }
            None => &mut captured,
        };
        let frame_size = FrameSize::new(frame.cols(), frame.rows());

        let (proposals, inference) = detector.detect(&*frame)?;
        let report = pipeline.process_frame(&proposals, frame_size, inference);
        for det in &report.detections {
            let label = labels.get(det.class_id).map_or("?", String::as_str);
            debug!(label, confidence = det.confidence, "detected");
        }

        visualization::draw_frame(frame, &report, pipeline.policy(), pipeline.telemetry())?;

        if args.save_frames {
            let path = Path::new(FRAMES_DIR).join(format!("frame-{}.png", report.frame_index));
            imgcodecs::imwrite(&path.to_string_lossy(), &*frame, &Vector::new())?;
        }

        if let Some(output) = &args.output {
            if writer.is_none() {
                let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G')?;
                let w = VideoWriter::new(
                    &output.to_string_lossy(),
                    fourcc,
                    WRITER_FPS,
                    Size::new(frame.cols(), frame.rows()),
                    true,
                )?;
                info!("saving video to {}", output.display());
                writer = Some(w);
            }
            if let Some(w) = writer.as_mut() {
                w.write(&*frame)?;
            }
        }

        if display {
            highgui::imshow(window_name, &*frame)?;
            let key = highgui::wait_key(1)? & 0xFF;
            if key == 'q' as i32 {
                info!("quit requested");
                break;
            }
        }

        if let Some(total) = total_frames {
            if report.frame_index % PROGRESS_EVERY == 0 {
                let progress = report.frame_index as f64 / total as f64 * 100.0;
                info!("progress: {:.1}% ({}/{} frames)", progress, report.frame_index, total);
            }
        }
    }

    info!("cleaning up...");
    info!(frames = pipeline.frames(), "total vehicles counted: {}", pipeline.count());
    if let Some(mut w) = writer {
        w.release()?;
    }
    cap.release()?;
    if display {
        highgui::destroy_all_windows()?;
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&pipeline.summary())?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("run summary saved to {}", path.display());
    }

    Ok(())
}
