//! Frame-rate diagnostics for the preview thread.

use std::time::Instant;

use tracing::debug;

/// Frames between two rate reports.
const REPORT_INTERVAL: u64 = 32;

/// Counts frames and reports the average rate every 32 frames.
#[derive(Debug)]
pub struct FpsMeter {
    tag: &'static str,
    frames: u64,
    last_frames: u64,
    last_report: Instant,
}

impl FpsMeter {
    /// Create a meter whose reports are labeled `tag`.
    #[must_use]
    pub fn new(tag: &'static str) -> Self {
        Self::starting_at(tag, Instant::now())
    }

    fn starting_at(tag: &'static str, now: Instant) -> Self {
        Self {
            tag,
            frames: 0,
            last_frames: 0,
            last_report: now,
        }
    }

    /// Total frames counted.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Count a frame. Logs and returns the rate when a report is due.
    pub fn tick(&mut self) -> Option<f64> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        if self.frames % REPORT_INTERVAL != 0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.last_report).as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let counted = (self.frames - self.last_frames) as f64;
        self.last_report = now;
        self.last_frames = self.frames;

        if elapsed <= 0.0 {
            return None;
        }
        let fps = counted / elapsed;
        debug!(tag = self.tag, frames = self.frames, fps, "Frame rate");
        Some(fps)
    }
}
