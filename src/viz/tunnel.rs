//! Neon tunnel: receding rings, spokes and spark shower

use super::{band, Blend, Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface};
use crate::audio::AnalysisSnapshot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

const RINGS: usize = 36;
const SPOKES: usize = 18;
const BASE_SPARKS: f32 = 80.0;
const MAX_SPARKS: usize = 640;

pub struct NeonTunnel {
    rng: StdRng,
    spark_seed: f32,
}

impl NeonTunnel {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let spark_seed = rng.random::<f32>() * TAU;
        Self { rng, spark_seed }
    }
}

/// Spark count for a given highs level, capped
fn spark_count(highs: f32, sensitivity: f32) -> usize {
    let wanted = BASE_SPARKS * (0.5 + highs * sensitivity * 2.5);
    (wanted.max(0.0).ceil() as usize).min(MAX_SPARKS)
}

impl Renderer for NeonTunnel {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    ) {
        let (w, h) = surface.size();
        let freq = snapshot.frequency();
        let len = freq.len();
        let s = params.sensitivity;
        let bass = band(freq, 0, (len / 12).max(1)) / 255.0;
        let mids = band(freq, len / 6, len / 3) / 255.0;
        let highs = band(freq, len * 2 / 3, len) / 255.0;
        let t = elapsed_ms as f32;

        let center = Point::new(w / 2.0, h * 0.55);
        let speed = 0.8 + 4.5 * (bass * s).max(0.0).powf(0.9);
        let tilt = (mids * s * 1.2 - 0.6) * 0.5;
        let hue_shift = (highs * s * 120.0).floor();
        let rotation = t * 0.0002 + tilt;
        let short_side = w.min(h);

        surface.fill_rect(Rect::new(0.0, 0.0, w, h), &Paint::Solid(Color::BLACK));
        let bg_alpha = 0.12 + bass * s * 0.15;
        surface.fill_rect(
            Rect::new(0.0, 0.0, w, h),
            &Paint::Linear {
                from: Point::new(0.0, 0.0),
                to: Point::new(0.0, h),
                stops: vec![
                    (0.0, params.palette.accent3.with_alpha(bg_alpha)),
                    (1.0, Color::TRANSPARENT),
                ],
            },
        );

        // Rings drift outward; the fractional offset makes the loop seamless
        let travel = ((elapsed_ms * 0.004 * speed as f64) % 1.0) as f32;
        let ring_pulse = 1.0 + bass * s * 0.3;
        let saturation = (85.0 + highs * s * 15.0) / 100.0;
        let lightness = (55.0 + mids * s * 25.0) / 100.0;
        for i in 0..RINGS {
            let k = (i as f32 + travel) / RINGS as f32;
            let radius = (40.0 + k * k * short_side * 0.9) * ring_pulse;
            let alpha = (1.0 - k * 1.1).max(0.0) * 0.9;
            let width = (2.0 + bass * s * 1.5) * (1.0 - k * 0.8);
            let color = Color::hsla(hue_shift + i as f32 * 4.0, saturation, lightness, alpha);
            surface.stroke_circle(center, radius, Stroke::new(color, width.max(0.1)).glow(8.0));
        }

        let spoke_len = short_side * 0.65 * (1.0 + bass * s * 0.25);
        let spoke_alpha = (0.4 + 0.6 * mids * s).clamp(0.0, 1.0);
        let spoke_width = 1.5 + mids * s * 1.5;
        for i in 0..SPOKES {
            let angle = i as f32 / SPOKES as f32 * TAU + rotation;
            let color = Color::hsla(hue_shift + i as f32 * 8.0, 0.9, lightness, spoke_alpha);
            surface.stroke_line(
                center.polar(20.0, angle),
                center.polar(spoke_len, angle),
                Stroke::new(color, spoke_width.max(0.1)),
            );
        }

        surface.set_blend(Blend::Lighter);
        let spark_alpha = (0.3 + 0.7 * highs * s).min(1.0);
        let spark_size = 1.0 + highs * s * 3.5;
        for i in 0..spark_count(highs, s) {
            let angle = (i as f32 * 0.123 + t * 0.0013 + self.spark_seed) % TAU + rotation;
            let radius = 40.0 + self.rng.random::<f32>() * short_side * 0.65;
            let color = Color::hsla(hue_shift + i as f32 * 5.0, 1.0, 0.7, spark_alpha);
            surface.fill_circle(center.polar(radius, angle), spark_size, &Paint::Solid(color));
        }
        surface.set_blend(Blend::Normal);
    }
}
