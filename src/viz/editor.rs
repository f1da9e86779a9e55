//! Backdrop behind the external text editor: a slow audio-reactive glow and
//! pulsing rings. The editor itself is drawn by the host.

use super::{band, Blend, Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface};
use crate::audio::AnalysisSnapshot;

const RINGS: usize = 5;

pub struct EditorBackdrop;

impl EditorBackdrop {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditorBackdrop {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for EditorBackdrop {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        _params: &SharedParams,
    ) {
        let (w, h) = surface.size();
        let freq = snapshot.frequency();
        let len = freq.len();
        let bass = band(freq, 0, len / 12) / 255.0;
        let mids = band(freq, len / 6, len / 3) / 255.0;
        let highs = band(freq, len * 2 / 3, len) / 255.0;
        let t = elapsed_ms as f32;
        let center = Point::new(w / 2.0, h / 2.0);

        let hue1 = (t * 0.02 + bass * 60.0) % 360.0;
        let hue2 = (t * 0.03 + mids * 60.0) % 360.0;

        surface.fill_rect(Rect::new(0.0, 0.0, w, h), &Paint::Solid(Color::BLACK));
        surface.fill_rect(
            Rect::new(0.0, 0.0, w, h),
            &Paint::Radial {
                center,
                radius: w.max(h) * 0.6,
                stops: vec![
                    (0.0, Color::hsla(hue1, 0.7, 0.3, 0.1 + bass * 0.2)),
                    (0.5, Color::hsla(hue2, 0.6, 0.2, 0.05 + mids * 0.15)),
                    (1.0, Color::rgba(0, 0, 0, 0.8)),
                ],
            },
        );

        surface.set_blend(Blend::Lighter);
        let drift = (t * 0.5) % 100.0;
        for i in 0..RINGS {
            let radius = w * 0.15 + i as f32 * 80.0 + drift;
            let alpha = (0.05 + highs * 0.1) * (1.0 - i as f32 / RINGS as f32);
            let color = Color::hsla(hue1 + i as f32 * 30.0, 0.8, 0.6, alpha);
            surface.stroke_circle(center, radius, Stroke::new(color, 2.0));
        }
        surface.set_blend(Blend::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::{DrawCommand, DrawList};

    #[test]
    fn rings_brighten_with_highs() {
        let ring_alpha = |level: u8| {
            let mut list = DrawList::new(800.0, 600.0);
            let snapshot = AnalysisSnapshot::new(vec![level; 1024], vec![128; 2048], false, 0.0);
            EditorBackdrop::new().draw(&mut list, &snapshot, 0.0, &SharedParams::default());
            list.commands()
                .iter()
                .find_map(|c| match c {
                    DrawCommand::StrokeCircle(_, _, stroke) => Some(stroke.color.a),
                    _ => None,
                })
                .unwrap_or(0.0)
        };
        assert!(ring_alpha(255) > ring_alpha(0));
        assert!((ring_alpha(0) - 0.05).abs() < 1e-6);
    }
}
