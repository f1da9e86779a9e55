//! Synthwave perspective grid with sun, halo and twinkling stars

use super::{
    band, Blend, Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface,
};
use crate::audio::AnalysisSnapshot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// One full scroll of the grid towards the viewer
const SCROLL_PERIOD_MS: f64 = 600.0;
const HORIZON: f32 = 0.48;
const SCANLINES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Star {
    x: f32,
    y: f32,
    base: f32,
    speed: f32,
    phase: f32,
    radius: f32,
}

#[derive(Debug, Clone)]
struct StarField {
    width: f32,
    height: f32,
    stars: Vec<Star>,
}

pub struct PerspectiveGrid {
    rng: StdRng,
    anim_start: Option<f64>,
    stars: Option<StarField>,
}

impl PerspectiveGrid {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            anim_start: None,
            stars: None,
        }
    }

    /// Stars are rebuilt whenever the surface size or the wanted count changes
    fn stars_for(&mut self, w: f32, h: f32, horizon: f32, count: usize) -> &[Star] {
        let stale = match &self.stars {
            Some(field) => field.width != w || field.height != h || field.stars.len() != count,
            None => true,
        };
        if stale {
            let rng = &mut self.rng;
            let sky = (horizon - 12.0).max(10.0);
            let stars = (0..count)
                .map(|_| Star {
                    x: rng.random::<f32>() * w,
                    y: rng.random::<f32>() * sky,
                    base: 0.3 + rng.random::<f32>() * 0.7,
                    speed: 0.5 + rng.random::<f32>(),
                    phase: rng.random::<f32>() * TAU,
                    radius: rng.random::<f32>() * 0.8 + 0.5,
                })
                .collect();
            self.stars = Some(StarField {
                width: w,
                height: h,
                stars,
            });
        }
        self.stars
            .as_ref()
            .map(|field| field.stars.as_slice())
            .unwrap_or_default()
    }
}

impl Renderer for PerspectiveGrid {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    ) {
        let start = *self.anim_start.get_or_insert(elapsed_ms);
        let anim = (((elapsed_ms - start) / SCROLL_PERIOD_MS).rem_euclid(1.0)) as f32;

        let (w, h) = surface.size();
        let horizon = h * HORIZON;
        let s = params.sensitivity;
        let palette = params.palette;
        let freq = snapshot.frequency();
        let len = freq.len();
        let bass = band(freq, 0, len / 12) / 255.0;
        let mids = band(freq, len / 6, len / 3) / 255.0;
        let highs = band(freq, len * 2 / 3, len) / 255.0;
        let t = elapsed_ms as f32;

        surface.fill_rect(Rect::new(0.0, 0.0, w, h), &Paint::Solid(Color::BLACK));

        surface.fill_rect(
            Rect::new(0.0, 0.0, w, horizon),
            &Paint::Linear {
                from: Point::new(0.0, 0.0),
                to: Point::new(0.0, horizon),
                stops: vec![
                    (0.0, Color::rgba(138, 46, 255, 0.27)),
                    (0.5, Color::rgba(109, 247, 255, 0.13)),
                    (1.0, Color::TRANSPARENT),
                ],
            },
        );

        // Sun
        let sun_radius = w.min(h) * (0.14 + bass * s * 0.02);
        let sun = Point::new(w / 2.0, horizon - sun_radius * 0.2);
        surface.set_blend(Blend::Lighter);
        surface.fill_circle(
            sun,
            sun_radius,
            &Paint::Radial {
                center: sun,
                radius: sun_radius,
                stops: vec![
                    (0.0, palette.accent1.with_alpha(0.9)),
                    (0.6, palette.accent2.with_alpha(0.9)),
                    (1.0, palette.accent1.with_alpha(0.0)),
                ],
            },
        );
        let scan_alpha = 0.15 + highs * 0.15;
        for i in 0..SCANLINES {
            let y = sun.y - sun_radius * 0.8 + i as f32 * (sun_radius * 1.6 / SCANLINES as f32);
            surface.fill_rect(
                Rect::new(w / 2.0 - sun_radius, y, sun_radius * 2.0, 1.0),
                &Paint::Solid(palette.accent1.with_alpha(scan_alpha)),
            );
        }
        surface.set_blend(Blend::Normal);

        // Horizontal lines scroll towards the viewer
        let rows = params.detail.pick(8, 10, 12);
        for i in 0..=rows {
            let index = (i as f32 + anim) % (rows as f32 + 1.0);
            let depth = index / rows as f32;
            let y = horizon + (h - horizon) * depth.powf(2.2);
            let brightness = 1.0 + bass * s * 1.5 + mids * s * 0.8;
            let alpha = (0.7 * brightness * (1.0 - depth * 0.3)).min(1.0);
            let width = 2.0 + bass * s * 2.0 * (1.0 - depth * 0.5);
            surface.stroke_line(
                Point::new(0.0, y),
                Point::new(w, y),
                Stroke::new(palette.grid.with_alpha(palette.grid.a * alpha), width),
            );
        }

        // Vertical lines converge on the vanishing point
        let spacing = params.detail.pick(55.0, 45.0, 35.0);
        let columns = (w / spacing).ceil() as i32 + 2;
        let scroll = (anim * spacing) % spacing;
        let vanishing = Point::new(w / 2.0, horizon);
        let half = (w / 2.0).max(1.0);
        for i in -columns..=columns {
            let x = w / 2.0 + i as f32 * spacing - scroll;
            let dist = (x - vanishing.x).abs() / half;
            let brightness = 1.0 + mids * s * 1.2 + bass * s * 0.6;
            let alpha = (0.7 * brightness * (1.0 - dist * 0.2)).min(1.0);
            let width = 2.0 + (1.0 - dist) * mids * s * 1.5;
            surface.stroke_line(
                Point::new(x, h),
                vanishing,
                Stroke::new(palette.grid.with_alpha(palette.grid.a * alpha), width.max(0.5)),
            );
        }

        surface.set_blend(Blend::Lighter);

        // Floor glow
        let ambient = 0.08 + 0.06 * (0.5 + 0.5 * (t * 0.002).sin());
        let pulse = ambient
            + 0.8 * (bass * s).max(0.0).powf(0.9)
            + 0.4 * (mids * s).max(0.0).powf(0.95);
        surface.fill_rect(
            Rect::new(0.0, horizon, w, h - horizon),
            &Paint::Solid(palette.grid.with_alpha(palette.grid.a * pulse.min(0.8))),
        );

        // Halo shimmers with the highs
        let halo_alpha = ((0.15 + highs * s * 0.45) * 0.7).min(1.0);
        surface.fill_circle(
            sun,
            sun_radius * 2.2,
            &Paint::Radial {
                center: sun,
                radius: sun_radius * 2.5,
                stops: vec![
                    (0.0, palette.accent1.with_alpha(halo_alpha)),
                    (0.5, palette.accent2.with_alpha(halo_alpha)),
                    (1.0, palette.accent1.with_alpha(0.0)),
                ],
            },
        );

        let count = params.detail.pick(90, 120, 160);
        let twinkle_boost = 1.0 + highs * s * 1.8;
        let size_boost = 1.0 + highs * s * 1.2;
        for star in self.stars_for(w, h, horizon, count) {
            let twinkle = 0.3 + 0.7 * (t * 0.001 * star.speed + star.phase).sin();
            let alpha = (star.base * twinkle * twinkle_boost).clamp(0.0, 1.0);
            surface.fill_circle(
                Point::new(star.x, star.y),
                star.radius * size_boost,
                &Paint::Solid(Color::rgba(255, 255, 255, alpha)),
            );
        }
        surface.set_blend(Blend::Normal);
    }
}

/// Faint receding floor lines drawn over another mode
pub fn draw_grid_overlay(surface: &mut dyn Surface, params: &SharedParams) {
    const LINES: usize = 12;

    let (w, h) = surface.size();
    let horizon = h * 0.55;
    let color = params.palette.grid;
    let stroke = Stroke::new(color.with_alpha(color.a * 0.35), 1.0);
    for i in 0..LINES {
        let p = i as f32 / LINES as f32;
        let y = horizon + (h - horizon) * p * p;
        surface.stroke_line(Point::new(0.0, y), Point::new(w, y), stroke);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::{DetailLevel, DrawCommand, DrawList};

    fn snapshot(level: u8) -> AnalysisSnapshot {
        AnalysisSnapshot::new(vec![level; 1024], vec![128; 2048], false, 0.0)
    }

    fn star_count(list: &DrawList) -> usize {
        // Stars are the only solid white circles
        list.commands()
            .iter()
            .filter(|cmd| {
                matches!(cmd, DrawCommand::FillCircle(_, _, Paint::Solid(c)) if c.r == 255 && c.g == 255 && c.b == 255)
            })
            .count()
    }

    #[test]
    fn star_count_follows_detail() {
        let mut grid = PerspectiveGrid::new(9);
        for (detail, expected) in [
            (DetailLevel::Low, 90),
            (DetailLevel::Medium, 120),
            (DetailLevel::High, 160),
        ] {
            let mut list = DrawList::new(800.0, 600.0);
            let params = SharedParams {
                detail,
                ..SharedParams::default()
            };
            grid.draw(&mut list, &snapshot(0), 0.0, &params);
            assert_eq!(star_count(&list), expected);
        }
    }

    #[test]
    fn stars_regenerate_on_resize_only() {
        let mut grid = PerspectiveGrid::new(4);
        let params = SharedParams::default();

        let mut list = DrawList::new(800.0, 600.0);
        grid.draw(&mut list, &snapshot(0), 0.0, &params);
        let first_x = grid.stars.as_ref().map(|f| f.stars[0].x);

        grid.draw(&mut list, &snapshot(0), 16.0, &params);
        assert_eq!(grid.stars.as_ref().map(|f| f.stars[0].x), first_x);

        let mut wide = DrawList::new(1600.0, 600.0);
        grid.draw(&mut wide, &snapshot(0), 32.0, &params);
        assert_eq!(grid.stars.as_ref().map(|f| f.width), Some(1600.0));
    }

    #[test]
    fn stars_stay_above_horizon() {
        let mut grid = PerspectiveGrid::new(12);
        let mut list = DrawList::new(500.0, 400.0);
        grid.draw(&mut list, &snapshot(0), 0.0, &SharedParams::default());

        let horizon = 400.0 * HORIZON;
        let field = grid.stars.as_ref().map(|f| f.stars.clone()).unwrap_or_default();
        assert!(!field.is_empty());
        assert!(field.iter().all(|s| s.y <= horizon - 12.0));
    }

    #[test]
    fn animation_origin_is_first_draw() {
        let mut grid = PerspectiveGrid::new(0);
        let mut list = DrawList::new(100.0, 100.0);
        grid.draw(&mut list, &snapshot(0), 5000.0, &SharedParams::default());
        grid.draw(&mut list, &snapshot(0), 5300.0, &SharedParams::default());
        assert_eq!(grid.anim_start, Some(5000.0));
    }

    #[test]
    fn bass_thickens_floor_lines() {
        let widest = |level: u8| {
            let mut list = DrawList::new(400.0, 300.0);
            PerspectiveGrid::new(1).draw(&mut list, &snapshot(level), 0.0, &SharedParams::default());
            list.commands()
                .iter()
                .filter_map(|cmd| match cmd {
                    DrawCommand::Line(a, b, stroke) if a.y == b.y => Some(stroke.width),
                    _ => None,
                })
                .fold(0.0_f32, f32::max)
        };
        assert!(widest(255) > widest(0));
    }

    #[test]
    fn overlay_draws_twelve_faint_lines() {
        let mut list = DrawList::new(300.0, 200.0);
        draw_grid_overlay(&mut list, &SharedParams::default());

        assert_eq!(list.commands().len(), 12);
        for cmd in list.commands() {
            match cmd {
                DrawCommand::Line(a, _, stroke) => {
                    assert!(a.y >= 110.0 && a.y <= 200.0);
                    assert!((stroke.color.a - 0.25 * 0.35).abs() < 1e-6);
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    }
}
