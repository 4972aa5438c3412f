use std::time::{Duration, Instant};

/// Frame rate measured over the last reporting window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSummary {
    pub fps: f32,
    pub frame_ms: f32,
}

/// Per-frame delta for the animation clock plus a periodic fps summary
/// the host can show in its title bar.
#[derive(Debug)]
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Option<Instant>,
    frame_count: u32,
    pub frame_dt: f32,
    report_every: Duration,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTiming {
    pub fn new() -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: None,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            report_every: Duration::from_millis(500),
        }
    }

    /// Record a frame at `now`. Returns a summary once per reporting window.
    pub fn update(&mut self, now: Instant) -> Option<FpsSummary> {
        let dt_duration = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        let window_start = *self.last_fps_time.get_or_insert(now);
        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(window_start);
        if elapsed < self.report_every {
            return None;
        }
        let summary = FpsSummary {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_ms: self.frame_dt * 1000.0,
        };
        self.frame_count = 0;
        self.last_fps_time = Some(now);
        Some(summary)
    }
}
