use std::time::{Duration, Instant};

/// Frame rate averaged over a fixed window of frames.
///
/// The rate is recomputed only when a window closes and is reported unchanged
/// in between.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    window: u32,
    frames: u32,
    window_start: Instant,
    rate: f64,
}

impl FrameRateMeter {
    pub fn new(window: u32) -> Self {
        Self::starting_at(window, Instant::now())
    }

    pub fn starting_at(window: u32, start: Instant) -> Self {
        Self {
            window: window.max(1),
            frames: 0,
            window_start: start,
            rate: 0.0,
        }
    }

    /// Count one processed frame finishing at `now`.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        if self.frames >= self.window {
            let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
            if elapsed > 0.0 {
                self.rate = f64::from(self.frames) / elapsed;
            }
            self.window_start = now;
            self.frames = 0;
        }
        self.rate
    }

    /// Last computed rate, zero until the first window closes.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Frame rate plus the latest single-frame inference latency.
#[derive(Debug, Clone)]
pub struct Telemetry {
    fps: FrameRateMeter,
    last_latency: Option<Duration>,
}

impl Telemetry {
    pub fn new(window: u32) -> Self {
        Self {
            fps: FrameRateMeter::new(window),
            last_latency: None,
        }
    }

    pub fn with_meter(fps: FrameRateMeter) -> Self {
        Self {
            fps,
            last_latency: None,
        }
    }

    pub fn record_inference(&mut self, latency: Duration) {
        self.last_latency = Some(latency);
    }

    /// Count one finished frame; returns the current frame rate.
    pub fn frame_done_at(&mut self, now: Instant) -> f64 {
        self.fps.tick_at(now)
    }

    pub fn fps(&self) -> f64 {
        self.fps.rate()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.last_latency
    }

    /// Last inference latency in milliseconds, zero before the first frame.
    pub fn latency_ms(&self) -> f64 {
        self.last_latency.map_or(0.0, |d| d.as_secs_f64() * 1000.0)
    }
}
