//! Visualization layer: stateful renderers over the shared analysis snapshot

mod editor;
mod grid;
mod particles;
mod ribbon;
mod spectrum;
pub mod surface;
mod tunnel;

pub use editor::EditorBackdrop;
pub use grid::{draw_grid_overlay, PerspectiveGrid};
pub use particles::ParticleField;
pub use ribbon::WaveRibbon;
pub use spectrum::CircularSpectrum;
pub use surface::{Blend, Color, DrawCommand, DrawList, Paint, Point, Rect, Stroke, Surface};
pub use tunnel::NeonTunnel;

use crate::audio::AnalysisSnapshot;
use crate::quality::QualityMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Per-frame draw contract shared by every visual mode
pub trait Renderer: Send {
    fn draw(
        &mut self,
        surface: &mut dyn Surface,
        snapshot: &AnalysisSnapshot,
        elapsed_ms: f64,
        params: &SharedParams,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RendererId {
    #[serde(rename = "bars")]
    Spectrum,
    #[serde(rename = "particles")]
    Particles,
    #[serde(rename = "grid")]
    Grid,
    #[serde(rename = "neonTunnel")]
    Tunnel,
    #[serde(rename = "ribbon")]
    Ribbon,
    #[serde(rename = "codeEditor")]
    Editor,
}

impl RendererId {
    pub const ALL: [RendererId; 6] = [
        Self::Spectrum,
        Self::Particles,
        Self::Grid,
        Self::Tunnel,
        Self::Ribbon,
        Self::Editor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spectrum => "bars",
            Self::Particles => "particles",
            Self::Grid => "grid",
            Self::Tunnel => "neonTunnel",
            Self::Ribbon => "ribbon",
            Self::Editor => "codeEditor",
        }
    }

    /// Exact identifier match
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }

    /// Like [`lookup`](Self::lookup) but unknown identifiers select `bars`
    pub fn parse(name: &str) -> Self {
        Self::lookup(name).unwrap_or_else(|| {
            log::warn!("Unknown visual mode {name:?}, using bars");
            Self::Spectrum
        })
    }

    fn create(self, seed: u64) -> Box<dyn Renderer> {
        match self {
            Self::Spectrum => Box::new(CircularSpectrum::new()),
            Self::Particles => Box::new(ParticleField::new(seed)),
            Self::Grid => Box::new(PerspectiveGrid::new(seed)),
            Self::Tunnel => Box::new(NeonTunnel::new(seed)),
            Self::Ribbon => Box::new(WaveRibbon::new()),
            Self::Editor => Box::new(EditorBackdrop::new()),
        }
    }
}

impl Default for RendererId {
    fn default() -> Self {
        Self::Tunnel
    }
}

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much geometry renderers should spend, derived from the quality mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl From<QualityMode> for DetailLevel {
    fn from(mode: QualityMode) -> Self {
        match mode {
            QualityMode::High => Self::High,
            QualityMode::Low => Self::Low,
            QualityMode::Auto | QualityMode::Medium => Self::Medium,
        }
    }
}

impl DetailLevel {
    /// Pick one of three values by level
    pub(crate) fn pick<T>(self, low: T, medium: T, high: T) -> T {
        match self {
            Self::Low => low,
            Self::Medium => medium,
            Self::High => high,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub accent1: Color,
    pub accent2: Color,
    pub accent3: Color,
    pub grid: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            accent1: Color::rgba(0xff, 0x6e, 0xc7, 1.0),
            accent2: Color::rgba(0x00, 0xf6, 0xff, 1.0),
            accent3: Color::rgba(0xff, 0xa5, 0x00, 1.0),
            grid: Color::rgba(255, 100, 200, 0.25),
        }
    }
}

/// Inputs shared by all renderers for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedParams {
    pub sensitivity: f32,
    pub intensity: f32,
    pub palette: Palette,
    pub beat: bool,
    pub detail: DetailLevel,
}

impl Default for SharedParams {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            intensity: 1.0,
            palette: Palette::default(),
            beat: false,
            detail: DetailLevel::Medium,
        }
    }
}

/// Renderer instances keyed by mode, created on first activation and kept
/// for the lifetime of the registry
pub struct RendererRegistry {
    renderers: HashMap<RendererId, Box<dyn Renderer>>,
    seed: u64,
}

impl RendererRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            renderers: HashMap::new(),
            seed,
        }
    }

    pub fn get_or_create(&mut self, id: RendererId) -> &mut dyn Renderer {
        let seed = self.seed.wrapping_add(id as u64);
        self.renderers
            .entry(id)
            .or_insert_with(|| {
                log::debug!("Creating renderer {id}");
                id.create(seed)
            })
            .as_mut()
    }

    pub fn is_created(&self, id: RendererId) -> bool {
        self.renderers.contains_key(&id)
    }

    pub fn created_count(&self) -> usize {
        self.renderers.len()
    }
}

/// Mean of `frequency[start..end]` with `end` clamped to the array, 0 when
/// the range is empty
pub(crate) fn band(frequency: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(frequency.len());
    if start >= end {
        return 0.0;
    }
    let sum: u32 = frequency[start..end].iter().map(|&v| v as u32).sum();
    sum as f32 / (end - start) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AnalysisResolution;

    fn loud_snapshot() -> AnalysisSnapshot {
        let resolution = AnalysisResolution::Fft1024;
        AnalysisSnapshot::new(
            vec![200; resolution.bins()],
            (0..resolution.samples()).map(|i| (i % 256) as u8).collect(),
            true,
            1000.0,
        )
    }

    #[test]
    fn identifiers_round_trip() {
        for id in RendererId::ALL {
            assert_eq!(RendererId::lookup(id.as_str()), Some(id));
        }
        assert_eq!(RendererId::lookup("Bars"), None);
    }

    #[test]
    fn unknown_mode_falls_back_to_bars() {
        assert_eq!(RendererId::parse("kaleidoscope"), RendererId::Spectrum);
        assert_eq!(RendererId::parse(""), RendererId::Spectrum);
        assert_eq!(RendererId::parse("grid"), RendererId::Grid);
    }

    #[test]
    fn registry_creates_lazily_and_keeps_instances() {
        let mut registry = RendererRegistry::new(7);
        assert_eq!(registry.created_count(), 0);

        let mut surface = DrawList::new(320.0, 240.0);
        let snapshot = loud_snapshot();
        let params = SharedParams::default();

        registry
            .get_or_create(RendererId::Grid)
            .draw(&mut surface, &snapshot, 16.0, &params);
        assert!(registry.is_created(RendererId::Grid));
        assert!(!registry.is_created(RendererId::Particles));

        registry
            .get_or_create(RendererId::Particles)
            .draw(&mut surface, &snapshot, 32.0, &params);
        registry
            .get_or_create(RendererId::Grid)
            .draw(&mut surface, &snapshot, 48.0, &params);
        assert_eq!(registry.created_count(), 2);
    }

    #[test]
    fn every_renderer_tolerates_empty_snapshot() {
        let mut registry = RendererRegistry::new(1);
        let empty = AnalysisSnapshot::new(Vec::new(), Vec::new(), false, 0.0);
        let params = SharedParams::default();

        for id in RendererId::ALL {
            let mut surface = DrawList::new(200.0, 100.0);
            let renderer = registry.get_or_create(id);
            renderer.draw(&mut surface, &empty, 0.0, &params);
            renderer.draw(&mut surface, &empty, 16.0, &params);
        }
    }

    #[test]
    fn every_renderer_tolerates_zero_sized_surface() {
        let mut registry = RendererRegistry::new(2);
        let snapshot = loud_snapshot();
        let params = SharedParams {
            sensitivity: 2.0,
            intensity: 1.5,
            ..SharedParams::default()
        };

        for id in RendererId::ALL {
            let mut surface = DrawList::new(0.0, 0.0);
            registry
                .get_or_create(id)
                .draw(&mut surface, &snapshot, 500.0, &params);
        }
    }

    #[test]
    fn band_clamps_and_handles_empty_ranges() {
        let data = [10u8, 20, 30, 40];
        assert_eq!(band(&data, 0, 2), 15.0);
        assert_eq!(band(&data, 2, 100), 35.0);
        assert_eq!(band(&data, 3, 3), 0.0);
        assert_eq!(band(&[], 0, 4), 0.0);
    }

    #[test]
    fn detail_follows_quality_mode() {
        assert_eq!(DetailLevel::from(QualityMode::Auto), DetailLevel::Medium);
        assert_eq!(DetailLevel::from(QualityMode::High), DetailLevel::High);
        assert_eq!(DetailLevel::from(QualityMode::Low).pick(8, 10, 12), 8);
    }
}
