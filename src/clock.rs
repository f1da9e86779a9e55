//! Frame clock: per-tick timing and frame-rate measurement

/// Interval between frame-rate reports
pub const FPS_REPORT_INTERVAL_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub now_ms: f64,
    /// Time since the previous tick, at least 1 ms
    pub delta_ms: f64,
    /// Averaged frame rate, present once per report interval
    pub fps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    last_tick_ms: f64,
    last_report_ms: f64,
    fps_accum: f64,
    fps_count: u32,
    fps: u32,
}

impl FrameClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            last_tick_ms: start_ms,
            last_report_ms: start_ms,
            fps_accum: 0.0,
            fps_count: 0,
            fps: 0,
        }
    }

    pub fn tick(&mut self, now_ms: f64) -> Tick {
        let delta_ms = (now_ms - self.last_tick_ms).max(1.0);
        self.last_tick_ms = now_ms;
        self.fps_accum += 1000.0 / delta_ms;
        self.fps_count += 1;

        let mut fps = None;
        if now_ms - self.last_report_ms > FPS_REPORT_INTERVAL_MS {
            self.fps = (self.fps_accum / self.fps_count.max(1) as f64).round() as u32;
            self.fps_accum = 0.0;
            self.fps_count = 0;
            self.last_report_ms = now_ms;
            fps = Some(self.fps);
        }

        Tick {
            now_ms,
            delta_ms,
            fps,
        }
    }

    /// Most recent averaged frame rate, 0 before the first report
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_average_every_half_second() {
        let mut clock = FrameClock::new(0.0);
        let mut reports = Vec::new();
        let mut now = 0.0;
        for _ in 0..70 {
            now += 1000.0 / 60.0;
            if let Some(fps) = clock.tick(now).fps {
                reports.push(fps);
            }
        }

        assert_eq!(reports, vec![60, 60]);
        assert_eq!(clock.fps(), 60);
    }

    #[test]
    fn no_report_before_interval() {
        let mut clock = FrameClock::new(0.0);
        assert_eq!(clock.tick(100.0).fps, None);
        assert_eq!(clock.fps(), 0);
    }

    #[test]
    fn zero_delta_is_clamped() {
        let mut clock = FrameClock::new(50.0);
        let tick = clock.tick(50.0);
        assert_eq!(tick.delta_ms, 1.0);
    }
}
