use opencv::{
    core::{Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

use crate::counting::CountingPolicy;
use crate::geometry;
use crate::pipeline::FrameReport;
use crate::telemetry::Telemetry;

const COLORS: &[Scalar] = &[
    Scalar::new(255.0, 0.0, 0.0, 0.0),
    Scalar::new(0.0, 255.0, 0.0, 0.0),
    Scalar::new(0.0, 0.0, 255.0, 0.0),
    Scalar::new(255.0, 255.0, 0.0, 0.0),
    Scalar::new(255.0, 0.0, 255.0, 0.0),
    Scalar::new(0.0, 255.0, 255.0, 0.0),
    Scalar::new(128.0, 0.0, 255.0, 0.0),
    Scalar::new(0.0, 128.0, 255.0, 0.0),
];

// BGR
const REGION_COLOR: Scalar = Scalar::new(0.0, 255.0, 255.0, 0.0);
const HUD_COLOR: Scalar = Scalar::new(0.0, 255.0, 0.0, 0.0);

fn color_for(track_id: u32) -> Scalar {
    COLORS[track_id as usize % COLORS.len()]
}

fn to_cv(p: geometry::Point) -> Point {
    Point::new(p.x, p.y)
}

/// Draw text on an image with specified font size and color
pub fn draw_text(
    frame: &mut Mat,
    text: &str,
    org: Point,
    font_scale: f64,
    color: Scalar,
    thickness: i32,
) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        text,
        org,
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        color,
        thickness,
        imgproc::LINE_8,
        false,
    )
}

/// Boxes with identity labels plus each track's centroid motion.
pub fn draw_tracks(frame: &mut Mat, report: &FrameReport) -> opencv::Result<()> {
    for (track_id, bbox) in &report.tracks {
        let color = color_for(*track_id);
        let rect = Rect::from_points(Point::new(bbox.x1, bbox.y1), Point::new(bbox.x2, bbox.y2));
        imgproc::rectangle(frame, rect, color, 2, imgproc::LINE_8, 0)?;
        draw_text(
            frame,
            &track_id.to_string(),
            Point::new(bbox.x1, bbox.y1 - 5),
            0.5,
            color,
            2,
        )?;
    }
    for segment in &report.motion {
        imgproc::line(
            frame,
            to_cv(segment.current),
            to_cv(segment.previous),
            color_for(segment.track_id),
            3,
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

/// The counting line or band.
pub fn draw_region(frame: &mut Mat, policy: &CountingPolicy) -> opencv::Result<()> {
    match policy {
        CountingPolicy::LineCrossing { line, .. } => imgproc::line(
            frame,
            to_cv(line.start),
            to_cv(line.end),
            REGION_COLOR,
            5,
            imgproc::LINE_8,
            0,
        ),
        CountingPolicy::ZoneDwell { band } => {
            let top_left = Point::new(0, band.top);
            let bottom_right = Point::new(frame.cols(), band.bottom);
            let rect = Rect::from_points(top_left, bottom_right);
            imgproc::rectangle(frame, rect, REGION_COLOR, 2, imgproc::LINE_8, 0)
        }
    }
}

/// Counter, frame rate and inference latency.
pub fn draw_hud(
    frame: &mut Mat,
    report: &FrameReport,
    telemetry: &Telemetry,
) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        &format!("Count: {}", report.count),
        Point::new(10, 110),
        imgproc::FONT_HERSHEY_DUPLEX,
        1.5,
        REGION_COLOR,
        3,
        imgproc::LINE_8,
        false,
    )?;
    draw_text(
        frame,
        &format!("FPS: {:.1}", telemetry.fps()),
        Point::new(10, 30),
        1.0,
        HUD_COLOR,
        2,
    )?;
    draw_text(
        frame,
        &format!("Process: {:.1}ms", telemetry.latency_ms()),
        Point::new(10, 70),
        0.7,
        HUD_COLOR,
        2,
    )
}

pub fn draw_frame(
    frame: &mut Mat,
    report: &FrameReport,
    policy: &CountingPolicy,
    telemetry: &Telemetry,
) -> opencv::Result<()> {
    draw_tracks(frame, report)?;
    draw_region(frame, policy)?;
    draw_hud(frame, report, telemetry)
}
