//! 3-D waveform ribbon: recent waveforms stacked in depth and projected
//! towards a vanishing point

use super::{band, Blend, Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface};
use crate::audio::AnalysisSnapshot;
use std::collections::VecDeque;

/// Rows of history kept in the ribbon
const HISTORY: usize = 48;
/// Samples per row after downsampling
const ROW_POINTS: usize = 96;
/// Camera distance; larger flattens the perspective
const FOCAL: f32 = 1.6;

/// Body, voice and air levels from the lower half of the spectrum, 0-1
fn ribbon_bands(frequency: &[u8]) -> (f32, f32, f32) {
    let len = frequency.len();
    (
        band(frequency, 0, (len / 16).max(1)) / 255.0,
        band(frequency, len / 16, len / 4) / 255.0,
        band(frequency, len / 4, len / 2) / 255.0,
    )
}

pub struct WaveRibbon {
    rows: VecDeque<Vec<f32>>,
}

impl WaveRibbon {
    pub fn new() -> Self {
        Self {
            rows: VecDeque::with_capacity(HISTORY),
        }
    }

    pub fn depth(&self) -> usize {
        self.rows.len()
    }

    fn push_row(&mut self, snapshot: &AnalysisSnapshot) {
        let wave = snapshot.waveform();
        let row = if wave.is_empty() {
            vec![0.0; ROW_POINTS]
        } else {
            // Peak of each slice keeps transients visible after downsampling
            (0..ROW_POINTS)
                .map(|i| {
                    let start = i * wave.len() / ROW_POINTS;
                    let end = ((i + 1) * wave.len() / ROW_POINTS).max(start + 1).min(wave.len());
                    wave[start..end]
                        .iter()
                        .map(|&v| (v as f32 - 128.0) / 128.0)
                        .fold(0.0_f32, |peak, v| if v.abs() > peak.abs() { v } else { peak })
                })
                .collect()
        };
        if self.rows.len() == HISTORY {
            self.rows.pop_back();
        }
        self.rows.push_front(row);
    }
}

impl Default for WaveRibbon {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for WaveRibbon {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    ) {
        self.push_row(snapshot);

        let (w, h) = surface.size();
        let (body, voice, air) = ribbon_bands(snapshot.frequency());
        let s = params.sensitivity;

        surface.fill_rect(
            Rect::new(0.0, 0.0, w, h),
            &Paint::Solid(Color::rgba(0, 0, 0, 0.35)),
        );

        let vanishing = Point::new(w / 2.0, h * 0.3);
        let amplitude = h * 0.18 * (0.6 + params.intensity * 0.4) * (1.0 + body * s * 0.5);
        let hue_base = (elapsed_ms * 0.02) as f32 + air * s * 90.0;
        let glow = if snapshot.beat() { 12.0 } else { 4.0 };
        let width_boost = 1.0 + voice * s;

        surface.set_blend(Blend::Lighter);
        // Far rows first so near rows paint over them
        for (age, row) in self.rows.iter().enumerate().rev() {
            let z = age as f32 / HISTORY as f32;
            let scale = FOCAL / (FOCAL + z * 4.0);
            let base_y = vanishing.y + (h * 0.85 - vanishing.y) * scale;
            let half_width = w * 0.48 * scale;

            let points: Vec<Point> = row
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let u = i as f32 / (ROW_POINTS - 1) as f32 * 2.0 - 1.0;
                    Point::new(
                        vanishing.x + u * half_width,
                        base_y - v * amplitude * scale,
                    )
                })
                .collect();

            let alpha = (1.0 - z).powf(1.5) * 0.9;
            let color = if age == 0 {
                params.palette.accent2.with_alpha(alpha)
            } else {
                Color::hsla(hue_base + age as f32 * 3.0, 0.85, 0.6, alpha)
            };
            let mut stroke = Stroke::new(color, (2.5 * scale * width_boost).max(0.5));
            if age == 0 {
                stroke = stroke.glow(glow);
            }
            surface.stroke_polyline(&points, stroke);
        }
        surface.set_blend(Blend::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::{DrawCommand, DrawList};

    fn sine_snapshot(amplitude: f32) -> AnalysisSnapshot {
        let wave = (0..1024)
            .map(|i| {
                let x = (i as f32 / 1024.0 * std::f32::consts::TAU * 4.0).sin() * amplitude;
                (128.0 * (1.0 + x)).clamp(0.0, 255.0) as u8
            })
            .collect();
        AnalysisSnapshot::new(vec![0; 512], wave, false, 0.0)
    }

    #[test]
    fn bands_split_the_lower_half() {
        let mut freq = vec![0u8; 512];
        freq[128..256].fill(255);
        assert_eq!(ribbon_bands(&freq), (0.0, 0.0, 1.0));

        freq.fill(0);
        freq[..32].fill(255);
        freq[256..].fill(255);
        assert_eq!(ribbon_bands(&freq), (1.0, 0.0, 0.0));

        assert_eq!(ribbon_bands(&[]), (0.0, 0.0, 0.0));
        assert_eq!(ribbon_bands(&[255]), (1.0, 0.0, 0.0));
    }

    #[test]
    fn history_is_bounded() {
        let mut ribbon = WaveRibbon::new();
        let mut list = DrawList::new(640.0, 360.0);
        for frame in 0..(HISTORY + 10) {
            ribbon.draw(&mut list, &sine_snapshot(0.5), frame as f64 * 16.0, &SharedParams::default());
        }
        assert_eq!(ribbon.depth(), HISTORY);
    }

    #[test]
    fn draws_one_polyline_per_row() {
        let mut ribbon = WaveRibbon::new();
        let mut list = DrawList::new(640.0, 360.0);
        for frame in 0..3 {
            list.clear();
            ribbon.draw(&mut list, &sine_snapshot(0.5), frame as f64 * 16.0, &SharedParams::default());
        }
        let rows: Vec<usize> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline(points, _) => Some(points.len()),
                _ => None,
            })
            .collect();
        assert_eq!(rows, vec![ROW_POINTS; 3]);
    }

    #[test]
    fn nearest_row_follows_waveform() {
        let mut ribbon = WaveRibbon::new();
        ribbon.push_row(&sine_snapshot(0.8));
        let row = &ribbon.rows[0];
        let peak = row.iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!(peak > 0.7 && peak <= 1.0);

        ribbon.push_row(&AnalysisSnapshot::new(Vec::new(), Vec::new(), false, 0.0));
        assert!(ribbon.rows[0].iter().all(|&v| v == 0.0));
        assert_eq!(ribbon.depth(), 2);
    }
}
