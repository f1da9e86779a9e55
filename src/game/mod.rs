//! Beat-driven rhythm game layered over the perspective grid

mod lanes;

pub use lanes::{lane_energies, LaneDetector, LANES, LANE_BANDS};

use crate::audio::AnalysisSnapshot;
use crate::viz::{Blend, Color, Paint, Point, Rect, SharedParams, Stroke, Surface};
use serde::Serialize;

/// Progress at which a target should be hit
pub const HIT_ZONE: f32 = 0.85;
/// Accepted distance from the hit zone on either side
pub const HIT_WINDOW: f32 = 0.1;
/// Progress added to every target each frame
pub const TARGET_SPEED: f32 = 0.0125;

const GLOBAL_SPAWN_COOLDOWN_MS: f64 = 180.0;
const LANE_SPAWN_COOLDOWN_MS: f64 = 400.0;
/// A press that hits nothing only costs the combo once a target in the lane
/// has come this far
const PENALTY_PROGRESS: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    lane: usize,
    progress: f32,
}

impl Target {
    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Scoreboard {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    Hit { points: u64, accuracy: f32 },
    /// Nothing close enough to judge
    Ignored,
    /// Missed a target that was already near the hit zone; combo reset
    Penalized,
}

/// What happened to the board during one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameEvents {
    pub spawned: Option<usize>,
    pub missed: u32,
}

#[derive(Debug, Clone, Default)]
pub struct RhythmGame {
    active: bool,
    scoreboard: Scoreboard,
    targets: Vec<Target>,
    detector: LaneDetector,
    last_spawn_ms: Option<f64>,
    lane_last_spawn_ms: [Option<f64>; LANES],
    pressed: [bool; LANES],
}

impl RhythmGame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starting a game clears the previous board; stopping keeps the final
    /// score readable but drops any targets in flight
    pub fn set_active(&mut self, active: bool) {
        if active == self.active {
            return;
        }
        if active {
            *self = Self {
                active: true,
                ..Self::default()
            };
            log::info!("Rhythm game started");
        } else {
            self.active = false;
            self.targets.clear();
            self.pressed = [false; LANES];
            log::info!(
                "Rhythm game stopped: score {} max combo {}",
                self.scoreboard.score,
                self.scoreboard.max_combo
            );
        }
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.scoreboard
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn is_pressed(&self, lane: usize) -> bool {
        self.pressed.get(lane).copied().unwrap_or(false)
    }

    /// Advance the board by one frame: move targets, retire those that passed
    /// the end, then maybe spawn one from this frame's lane beats
    pub fn update(&mut self, snapshot: &AnalysisSnapshot, now_ms: f64) -> FrameEvents {
        let mut events = FrameEvents::default();
        if !self.active {
            return events;
        }

        for target in &mut self.targets {
            target.progress += TARGET_SPEED;
        }
        let before = self.targets.len();
        self.targets.retain(|t| t.progress < 1.0);
        let missed = (before - self.targets.len()) as u32;
        if missed > 0 {
            self.scoreboard.misses += missed;
            self.scoreboard.combo = 0;
            events.missed = missed;
        }

        let values = lane_energies(snapshot.frequency());
        let beats = self.detector.detect(values, now_ms);
        let strongest = (0..LANES)
            .filter(|&lane| beats[lane])
            .max_by(|&a, &b| values[a].total_cmp(&values[b]));

        if let Some(lane) = strongest {
            if self.can_spawn(lane, now_ms) {
                self.targets.push(Target { lane, progress: 0.0 });
                self.last_spawn_ms = Some(now_ms);
                self.lane_last_spawn_ms[lane] = Some(now_ms);
                events.spawned = Some(lane);
                log::debug!("Spawned target in lane {lane}");
            }
        }

        events
    }

    fn can_spawn(&self, lane: usize, now_ms: f64) -> bool {
        let global_ready = self
            .last_spawn_ms
            .map_or(true, |last| now_ms - last >= GLOBAL_SPAWN_COOLDOWN_MS);
        let lane_ready = self.lane_last_spawn_ms[lane]
            .map_or(true, |last| now_ms - last >= LANE_SPAWN_COOLDOWN_MS);
        global_ready && lane_ready
    }

    /// Judge a key press in `lane`
    pub fn press(&mut self, lane: usize) -> HitOutcome {
        if !self.active || lane >= LANES {
            return HitOutcome::Ignored;
        }
        self.pressed[lane] = true;

        let nearest = self
            .targets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.lane == lane)
            .map(|(index, t)| (index, (t.progress - HIT_ZONE).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((index, distance)) if distance <= HIT_WINDOW => {
                let accuracy = (1.0 - distance / HIT_WINDOW).max(0.0);
                let board = &mut self.scoreboard;
                let multiplier = 1.0 + board.combo as f64 * 0.1;
                let points = (100.0 * accuracy as f64 * multiplier).floor() as u64;
                board.score += points;
                board.combo += 1;
                board.max_combo = board.max_combo.max(board.combo);
                board.hits += 1;
                self.targets.remove(index);
                HitOutcome::Hit { points, accuracy }
            }
            _ => {
                let approaching = self
                    .targets
                    .iter()
                    .any(|t| t.lane == lane && t.progress >= PENALTY_PROGRESS);
                if approaching {
                    self.scoreboard.combo = 0;
                    HitOutcome::Penalized
                } else {
                    HitOutcome::Ignored
                }
            }
        }
    }

    pub fn release(&mut self, lane: usize) {
        if let Some(pressed) = self.pressed.get_mut(lane) {
            *pressed = false;
        }
    }

    /// Lanes, hit zone and targets over the host renderer
    pub fn draw(&self, surface: &mut dyn Surface, params: &SharedParams) {
        if !self.active {
            return;
        }
        let (w, h) = surface.size();
        let lane_width = w * 0.08;
        let left = w / 2.0 - lane_width * LANES as f32 / 2.0;
        let top = h * 0.1;
        let track = h * 0.85;
        let palette = params.palette;
        let lane_colors = [palette.accent1, palette.accent2, palette.accent3, Color::rgba(255, 255, 255, 1.0)];

        for lane in 0..LANES {
            let x = left + lane as f32 * lane_width;
            let fill = if self.pressed[lane] { 0.22 } else { 0.08 };
            surface.fill_rect(
                Rect::new(x + 2.0, top, lane_width - 4.0, track),
                &Paint::Solid(lane_colors[lane].with_alpha(fill)),
            );
        }

        let zone_y = top + track * HIT_ZONE;
        let zone_half = track * HIT_WINDOW;
        surface.fill_rect(
            Rect::new(left, zone_y - zone_half, lane_width * LANES as f32, zone_half * 2.0),
            &Paint::Solid(palette.grid.with_alpha(0.15)),
        );
        surface.stroke_line(
            Point::new(left, zone_y),
            Point::new(left + lane_width * LANES as f32, zone_y),
            Stroke::new(palette.accent2, 2.0).glow(6.0),
        );

        surface.set_blend(Blend::Lighter);
        for target in &self.targets {
            let center = Point::new(
                left + (target.lane as f32 + 0.5) * lane_width,
                top + track * target.progress,
            );
            let near = (target.progress - HIT_ZONE).abs() <= HIT_WINDOW;
            let radius = lane_width * if near { 0.34 } else { 0.28 };
            surface.fill_circle(center, radius, &Paint::Solid(lane_colors[target.lane].with_alpha(0.9)));
        }
        surface.set_blend(Blend::Normal);
    }
}
