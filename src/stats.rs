// Frame timing for the window title

use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: f32,
    /// Duration of the most recent frame
    pub frame_ms: f32,
}

#[derive(Debug)]
pub struct FrameStats {
    frame_count: u32,
    last_report: Instant,
    last_frame: Instant,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_report: now,
            last_frame: now,
        }
    }

    /// Count a presented frame. Returns a sample once per interval.
    pub fn record_frame(&mut self, now: Instant) -> Option<FpsSample> {
        let frame_time = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed < REPORT_INTERVAL {
            return None;
        }

        let sample = FpsSample {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_ms: frame_time.as_secs_f32() * 1000.0,
        };
        self.frame_count = 0;
        self.last_report = now;
        Some(sample)
    }

    pub fn title(base: &str, sample: &FpsSample) -> String {
        format!("{} - {:.0} FPS ({:.2}ms)", base, sample.fps, sample.frame_ms)
    }
}
