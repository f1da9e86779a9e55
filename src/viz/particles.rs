//! Drifting particle field with a waveform trace and beat bursts

use super::{band, Color, Paint, Point, Rect, Renderer, SharedParams, Stroke, Surface};
use crate::audio::AnalysisSnapshot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

const POOL_SIZE: usize = 300;
const BURST_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    life: f32,
    seed: f32,
}

pub struct ParticleField {
    rng: StdRng,
    pool: Vec<Particle>,
}

impl ParticleField {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            pool: Vec::new(),
        }
    }

    fn populate(&mut self, w: f32, h: f32) {
        let rng = &mut self.rng;
        self.pool = (0..POOL_SIZE)
            .map(|_| Particle {
                x: rng.random::<f32>() * w,
                y: rng.random::<f32>() * h,
                vx: (rng.random::<f32>() - 0.5) * 0.5,
                vy: (rng.random::<f32>() - 0.5) * 0.5,
                life: rng.random(),
                seed: rng.random::<f32>() * 1000.0,
            })
            .collect();
    }

    fn respawn(rng: &mut StdRng, particle: &mut Particle, w: f32) {
        *particle = Particle {
            x: rng.random::<f32>() * w,
            y: -10.0,
            vx: (rng.random::<f32>() - 0.5) * 0.5,
            vy: rng.random::<f32>() + 0.2,
            life: 1.0,
            seed: rng.random::<f32>() * 1000.0,
        };
    }

    fn burst(&mut self, w: f32, h: f32) {
        for _ in 0..BURST_SIZE {
            let index = self.rng.random_range(0..self.pool.len());
            let angle = self.rng.random::<f32>() * TAU;
            let speed = self.rng.random::<f32>() * 2.0 + 0.5;
            let particle = &mut self.pool[index];
            particle.x = w / 2.0;
            particle.y = h / 2.0;
            particle.vx = angle.cos() * speed;
            particle.vy = angle.sin() * speed;
            particle.life = 1.0;
        }
    }
}

impl Renderer for ParticleField {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    ) {
        let (w, h) = surface.size();
        if self.pool.is_empty() {
            self.populate(w, h);
        }

        // Translucent clear leaves trails
        surface.fill_rect(
            Rect::new(0.0, 0.0, w, h),
            &Paint::Solid(Color::rgba(0, 0, 0, 0.2)),
        );

        let freq = snapshot.frequency();
        let bass = band(freq, 0, freq.len() / 8) / 255.0;
        let amp = (bass * 0.8 + 0.2) * params.sensitivity;
        let count = ((100.0 * params.intensity).floor().max(0.0) as usize).min(POOL_SIZE);

        let wave = snapshot.waveform();
        if !wave.is_empty() {
            let trace: Vec<Point> = wave
                .iter()
                .enumerate()
                .map(|(i, &sample)| {
                    let v = (sample as f32 - 128.0) / 128.0;
                    Point::new(i as f32 / wave.len() as f32 * w, h * 0.5 + v * 120.0 * amp)
                })
                .collect();
            surface.stroke_polyline(&trace, Stroke::new(params.palette.accent2, 2.0));
        }

        if snapshot.beat() {
            self.burst(w, h);
        }

        let t = elapsed_ms as f32;
        let radius = 1.5 + 2.0 * amp;
        for i in 0..count {
            let particle = &mut self.pool[i];
            particle.vx += (t * 0.001 + particle.seed).sin() * 0.02;
            particle.vy += (t * 0.0012 + particle.seed).cos() * 0.02 + amp * 0.03;
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.life -= 0.005 * params.intensity;
            if particle.life <= 0.0 || particle.y > h + 20.0 {
                Self::respawn(&mut self.rng, particle, w);
            }

            let alpha = 0.5 * particle.life;
            surface.fill_circle(
                Point::new(particle.x, particle.y),
                radius,
                &Paint::Solid(Color::rgba(255, 255, 255, alpha)),
            );
        }
    }
}
