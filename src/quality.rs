//! Adaptive quality: trades render resolution and analysis size against
//! measured frame rate

use crate::audio::{AnalysisResolution, SourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this the controller sheds load
pub const FPS_LOW: f32 = 42.0;
/// Above this the controller adds detail
pub const FPS_HIGH: f32 = 58.0;

const SCALE_FLOOR: f32 = 1.0;
const SCALE_CEILING: f32 = 2.0;
const SCALE_DOWN_STEP: f32 = 0.2;
const SCALE_UP_STEP: f32 = 0.1;
const STREAMING_SCALE_CAP: f32 = 1.3;
const STREAMING_RESOLUTION_CAP: AnalysisResolution = AnalysisResolution::Fft2048;
const EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityState {
    /// Multiplier on the surface's pixel density
    pub resolution_scale: f32,
    pub analysis_resolution: AnalysisResolution,
    /// A capture source is active
    pub streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    #[default]
    Auto,
    High,
    Medium,
    Low,
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        f.write_str(name)
    }
}

/// Outcome of one control step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityStep {
    pub state: QualityState,
    pub scale_changed: bool,
    pub resolution_changed: bool,
}

impl QualityStep {
    fn between(before: QualityState, after: QualityState) -> Self {
        Self {
            state: after,
            scale_changed: (before.resolution_scale - after.resolution_scale).abs() > EPSILON,
            resolution_changed: before.analysis_resolution != after.analysis_resolution,
        }
    }

    pub fn changed(&self) -> bool {
        self.scale_changed || self.resolution_changed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QualityController {
    native_pixel_ratio: f32,
}

impl QualityController {
    pub fn new(native_pixel_ratio: f32) -> Self {
        let native_pixel_ratio = if native_pixel_ratio.is_finite() && native_pixel_ratio > 0.0 {
            native_pixel_ratio
        } else {
            SCALE_FLOOR
        };
        Self { native_pixel_ratio }
    }

    /// Highest scale the controller will ever pick
    pub fn ceiling(&self) -> f32 {
        self.native_pixel_ratio.clamp(SCALE_FLOOR, SCALE_CEILING)
    }

    pub fn initial_state(&self) -> QualityState {
        QualityState {
            resolution_scale: self.ceiling(),
            analysis_resolution: AnalysisResolution::Fft2048,
            streaming: false,
        }
    }

    /// One step of the control loop. Pure: the caller applies the result.
    pub fn step(&self, state: QualityState, fps: f32) -> QualityStep {
        let mut next = state;

        if fps < FPS_LOW {
            if next.resolution_scale > SCALE_FLOOR + EPSILON {
                next.resolution_scale =
                    round2((next.resolution_scale - SCALE_DOWN_STEP).max(SCALE_FLOOR));
            } else if let Some(smaller) = next.analysis_resolution.halved() {
                next.analysis_resolution = smaller;
            }
        } else if fps > FPS_HIGH && !state.streaming {
            if let Some(larger) = next.analysis_resolution.doubled() {
                next.analysis_resolution = larger;
            } else if next.resolution_scale < self.ceiling() - EPSILON {
                next.resolution_scale =
                    round2((next.resolution_scale + SCALE_UP_STEP).min(self.ceiling()));
            }
        }

        if next.streaming {
            next.analysis_resolution = next.analysis_resolution.min(STREAMING_RESOLUTION_CAP);
            next.resolution_scale = next.resolution_scale.min(STREAMING_SCALE_CAP);
        }

        QualityStep::between(state, next)
    }

    /// Settings applied when `mode` is selected. `Auto` restarts from the
    /// native pixel ratio and 2048 samples, within the streaming caps.
    pub fn preset(&self, mode: QualityMode, current: QualityState) -> QualityState {
        let (resolution_scale, analysis_resolution) = match mode {
            QualityMode::Auto if current.streaming => (
                self.ceiling().min(STREAMING_SCALE_CAP),
                STREAMING_RESOLUTION_CAP,
            ),
            QualityMode::Auto => (self.ceiling(), AnalysisResolution::Fft2048),
            QualityMode::High => (self.ceiling(), AnalysisResolution::Fft4096),
            QualityMode::Medium => (1.5, AnalysisResolution::Fft2048),
            QualityMode::Low => (1.0, AnalysisResolution::Fft1024),
        };
        QualityState {
            resolution_scale,
            analysis_resolution,
            streaming: current.streaming,
        }
    }

    /// Starting point after a source switch while in `Auto`
    pub fn for_source(&self, kind: SourceKind) -> QualityState {
        if kind.is_capture() {
            QualityState {
                resolution_scale: 1.2_f32.min(self.ceiling()),
                analysis_resolution: AnalysisResolution::Fft1024,
                streaming: true,
            }
        } else {
            QualityState {
                resolution_scale: 1.5_f32.min(self.ceiling()),
                analysis_resolution: AnalysisResolution::Fft2048,
                streaming: false,
            }
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(scale: f32, resolution: AnalysisResolution, streaming: bool) -> QualityState {
        QualityState {
            resolution_scale: scale,
            analysis_resolution: resolution,
            streaming,
        }
    }

    #[test]
    fn low_fps_sheds_scale_then_resolution() {
        let controller = QualityController::new(2.0);
        let mut current = state(2.0, AnalysisResolution::Fft4096, false);
        let mut scales = Vec::new();

        loop {
            let step = controller.step(current, 30.0);
            if !step.changed() {
                break;
            }
            if step.scale_changed {
                assert!(step.state.resolution_scale < current.resolution_scale);
                assert_eq!(step.state.analysis_resolution, current.analysis_resolution);
                scales.push(step.state.resolution_scale);
            } else {
                assert_eq!(current.resolution_scale, 1.0);
                assert!(step.state.analysis_resolution < current.analysis_resolution);
            }
            current = step.state;
        }

        assert_eq!(scales, vec![1.8, 1.6, 1.4, 1.2, 1.0]);
        assert_eq!(current.resolution_scale, 1.0);
        assert_eq!(current.analysis_resolution, AnalysisResolution::Fft1024);
    }

    #[test]
    fn high_fps_grows_resolution_then_scale_to_native() {
        let controller = QualityController::new(1.5);
        let mut current = state(1.0, AnalysisResolution::Fft1024, false);

        for _ in 0..20 {
            current = controller.step(current, 60.0).state;
        }

        assert_eq!(current.analysis_resolution, AnalysisResolution::Fft4096);
        assert_eq!(current.resolution_scale, 1.5);
    }

    #[test]
    fn first_high_fps_step_doubles_resolution_only() {
        let controller = QualityController::new(2.0);
        let step = controller.step(state(1.0, AnalysisResolution::Fft2048, false), 60.0);

        assert!(step.resolution_changed);
        assert!(!step.scale_changed);
        assert_eq!(step.state.analysis_resolution, AnalysisResolution::Fft4096);
    }

    #[test]
    fn steady_band_changes_nothing() {
        let controller = QualityController::new(2.0);
        let start = state(1.4, AnalysisResolution::Fft2048, false);

        for fps in [42.0, 50.0, 58.0] {
            let step = controller.step(start, fps);
            assert!(!step.changed());
            assert_eq!(step.state, start);
        }
    }

    #[test]
    fn streaming_caps_hold_after_every_step() {
        let controller = QualityController::new(2.0);
        for fps in [10.0, 50.0, 60.0, 144.0] {
            let step = controller.step(state(2.0, AnalysisResolution::Fft4096, true), fps);
            assert!(step.state.analysis_resolution <= AnalysisResolution::Fft2048);
            assert!(step.state.resolution_scale <= 1.3);
        }
    }

    #[test]
    fn streaming_blocks_upgrades() {
        let controller = QualityController::new(2.0);
        let start = state(1.2, AnalysisResolution::Fft1024, true);
        assert!(!controller.step(start, 120.0).changed());
    }

    #[test]
    fn presets_follow_mode() {
        let controller = QualityController::new(3.0);
        let current = controller.initial_state();

        let high = controller.preset(QualityMode::High, current);
        assert_eq!(high.resolution_scale, 2.0);
        assert_eq!(high.analysis_resolution, AnalysisResolution::Fft4096);

        let low = controller.preset(QualityMode::Low, current);
        assert_eq!(low.resolution_scale, 1.0);
        assert_eq!(low.analysis_resolution, AnalysisResolution::Fft1024);

    }

    #[test]
    fn selecting_auto_restarts_from_native_settings() {
        let controller = QualityController::new(1.75);
        let low = state(1.0, AnalysisResolution::Fft1024, false);

        let auto = controller.preset(QualityMode::Auto, low);
        assert_eq!(auto.resolution_scale, 1.75);
        assert_eq!(auto.analysis_resolution, AnalysisResolution::Fft2048);

        let streaming = controller.preset(QualityMode::Auto, state(1.0, AnalysisResolution::Fft1024, true));
        assert_eq!(streaming.resolution_scale, 1.3);
        assert_eq!(streaming.analysis_resolution, AnalysisResolution::Fft2048);
        assert!(streaming.streaming);
    }

    #[test]
    fn source_switch_resets_starting_point() {
        let controller = QualityController::new(2.0);

        let capture = controller.for_source(SourceKind::Microphone);
        assert!(capture.streaming);
        assert_eq!(capture.resolution_scale, 1.2);
        assert_eq!(capture.analysis_resolution, AnalysisResolution::Fft1024);

        let file = controller.for_source(SourceKind::FileTrack);
        assert!(!file.streaming);
        assert_eq!(file.resolution_scale, 1.5);
    }

    #[test]
    fn nan_fps_is_ignored() {
        let controller = QualityController::new(2.0);
        let start = controller.initial_state();
        assert!(!controller.step(start, f32::NAN).changed());
    }
}
