//! Circular spectrum: one radial bar per sampled bin, slowly rotating

use super::{Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface};
use crate::audio::AnalysisSnapshot;
use std::f32::consts::TAU;

const BARS: usize = 140;
const ROTATION_PER_MS: f64 = 0.00015;
/// Largest frame gap fed into the rotation, so a resumed mode continues
/// from where it stopped instead of jumping
const MAX_STEP_MS: f64 = 100.0;

pub struct CircularSpectrum {
    phase: f64,
    last_elapsed: Option<f64>,
}

impl CircularSpectrum {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            last_elapsed: None,
        }
    }

    /// Current rotation in radians
    pub fn rotation(&self) -> f32 {
        (self.phase % std::f64::consts::TAU) as f32
    }

    fn advance(&mut self, elapsed_ms: f64) {
        if let Some(last) = self.last_elapsed {
            let step = (elapsed_ms - last).clamp(0.0, MAX_STEP_MS);
            self.phase += step * ROTATION_PER_MS;
        }
        self.last_elapsed = Some(elapsed_ms);
    }
}

impl Default for CircularSpectrum {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for CircularSpectrum {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    ) {
        self.advance(elapsed_ms);

        let (w, h) = surface.size();
        surface.fill_rect(Rect::new(0.0, 0.0, w, h), &Paint::Solid(Color::BLACK));

        let freq = snapshot.frequency();
        if freq.is_empty() {
            return;
        }

        let center = Point::new(w / 2.0, h / 2.0);
        let max_radius = w.min(h) * 0.35;
        let step = (freq.len() / BARS).max(1);
        let rotation = self.rotation();
        let alpha = if params.beat { 0.8 } else { 0.65 };
        let hue_base = (elapsed_ms * 0.05) as f32;

        for i in 0..BARS {
            let value = freq.get(i * step).copied().unwrap_or(0) as f32 / 255.0;
            let value = (value * params.sensitivity).max(0.0).powf(1.05);
            let base_radius = i as f32 / BARS as f32 * max_radius;
            let length = value * (40.0 + 140.0 * params.intensity);
            let angle = i as f32 / BARS as f32 * TAU + rotation;

            let color = Color::hsla(i as f32 * 2.0 + hue_base, 0.9, 0.6, alpha);
            surface.stroke_line(
                center.polar(base_radius - 2.0, angle),
                center.polar(base_radius + length, angle),
                Stroke::new(color, 1.8),
            );
        }
    }
}
