//! Session state: one of each core component plus the per-frame orchestration

use crate::audio::{
    AnalysisSnapshot, AudioConfig, MediaBackend, SignalGraph, SourceError, SourceKind,
    SourceRequest,
};
use crate::clock::FrameClock;
use crate::game::{FrameEvents, HitOutcome, RhythmGame, Scoreboard};
use crate::quality::{QualityController, QualityMode, QualityState};
use crate::viz::{draw_grid_overlay, DetailLevel, Palette, RendererId, RendererRegistry, SharedParams, Surface};
use serde::Serialize;
use std::fmt;

/// Status line shown over the visuals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HudStatus {
    pub fps: u32,
    pub pixel_ratio: f32,
    pub fft_size: usize,
    pub quality: QualityMode,
}

impl fmt::Display for HudStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {} | DPR: {:.2} | FFT: {} | Quality: {}",
            self.fps, self.pixel_ratio, self.fft_size, self.quality
        )
    }
}

/// Outcome of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp_ms: f64,
    pub beat: bool,
    /// Present on frames that closed a frame-rate measurement
    pub fps: Option<u32>,
    pub quality_changed: bool,
    pub game: FrameEvents,
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub frames: u64,
    pub beats: u64,
    pub mode: RendererId,
    pub source: Option<String>,
    pub hud: HudStatus,
    pub quality: QualityState,
    pub scoreboard: Option<Scoreboard>,
}

pub struct Session {
    graph: SignalGraph,
    controller: QualityController,
    quality: QualityState,
    quality_mode: QualityMode,
    clock: Option<FrameClock>,
    registry: RendererRegistry,
    mode: RendererId,
    overlay: bool,
    game: RhythmGame,
    sensitivity: f32,
    intensity: f32,
    palette: Palette,
    volume: f32,
    muted: bool,
    applied_scale: Option<f32>,
    frames: u64,
    beats: u64,
}

impl Session {
    pub fn new(
        config: AudioConfig,
        backend: Box<dyn MediaBackend>,
        native_pixel_ratio: f32,
        seed: u64,
    ) -> Self {
        let controller = QualityController::new(native_pixel_ratio);
        let quality = QualityState {
            analysis_resolution: config.fft_size,
            ..controller.initial_state()
        };
        let volume = config.volume;
        let mut graph = SignalGraph::new(config, backend);
        graph.set_analysis_resolution(quality.analysis_resolution);

        Self {
            graph,
            controller,
            quality,
            quality_mode: QualityMode::Auto,
            clock: None,
            registry: RendererRegistry::new(seed),
            mode: RendererId::default(),
            overlay: false,
            game: RhythmGame::new(),
            sensitivity: 1.0,
            intensity: 1.0,
            palette: Palette::default(),
            volume,
            muted: false,
            applied_scale: None,
            frames: 0,
            beats: 0,
        }
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraph {
        &mut self.graph
    }

    /// Switch sources and reset the quality starting point for the new kind
    pub fn activate_source(&mut self, request: SourceRequest) -> Result<(), SourceError> {
        let kind = request.kind();
        self.graph.activate(request)?;
        self.on_source_changed(Some(kind));
        Ok(())
    }

    /// Release an active capture source; returns whether one was running
    pub fn stop_capture(&mut self) -> bool {
        let stopped = self.graph.stop_capture();
        if stopped {
            self.on_source_changed(None);
        }
        stopped
    }

    fn on_source_changed(&mut self, kind: Option<SourceKind>) {
        let streaming = kind.is_some_and(SourceKind::is_capture);
        if self.quality_mode == QualityMode::Auto {
            if let Some(kind) = kind {
                self.quality = self.controller.for_source(kind);
            }
        }
        self.quality.streaming = streaming;
        self.graph.set_analysis_resolution(self.quality.analysis_resolution);
        log::info!(
            "Quality after source change: scale {:.2}, FFT {}, streaming {}",
            self.quality.resolution_scale,
            self.quality.analysis_resolution.samples(),
            streaming
        );
    }

    pub fn mode(&self) -> RendererId {
        self.mode
    }

    /// Select a visual mode. Leaving the grid ends a running game.
    pub fn set_mode(&mut self, mode: RendererId) {
        if mode != RendererId::Grid && self.game.is_active() {
            self.game.set_active(false);
        }
        if mode != self.mode {
            log::info!("Visual mode: {mode}");
        }
        self.mode = mode;
    }

    /// Select a visual mode by identifier; unknown names select `bars`
    pub fn set_mode_name(&mut self, name: &str) {
        self.set_mode(RendererId::parse(name));
    }

    pub fn set_overlay(&mut self, enabled: bool) {
        self.overlay = enabled;
    }

    pub fn overlay(&self) -> bool {
        self.overlay
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        if sensitivity.is_finite() {
            self.sensitivity = sensitivity;
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        if intensity.is_finite() {
            self.intensity = intensity;
        }
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.graph.set_smoothing(smoothing);
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Set the output volume; a positive volume also unmutes
    pub fn set_volume(&mut self, volume: f32) {
        self.graph.set_volume(volume);
        self.volume = self.graph.volume();
        if self.muted && self.volume > 0.0 {
            self.muted = false;
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.graph.set_volume(if self.muted { 0.0 } else { self.volume });
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_monitoring(&mut self, enabled: bool) {
        self.graph.set_monitoring(enabled);
    }

    pub fn quality_mode(&self) -> QualityMode {
        self.quality_mode
    }

    pub fn quality(&self) -> QualityState {
        self.quality
    }

    /// Every mode applies its preset immediately; `Auto` then resumes the
    /// control loop from there
    pub fn set_quality_mode(&mut self, mode: QualityMode) {
        self.quality_mode = mode;
        self.quality = self.controller.preset(mode, self.quality);
        self.graph.set_analysis_resolution(self.quality.analysis_resolution);
        log::info!(
            "Quality mode {mode}: scale {:.2}, FFT {}",
            self.quality.resolution_scale,
            self.quality.analysis_resolution.samples()
        );
    }

    /// Starting the game switches to its host renderer
    pub fn set_game_active(&mut self, active: bool) {
        if active {
            self.set_mode(RendererId::Grid);
        }
        self.game.set_active(active);
    }

    pub fn game(&self) -> &RhythmGame {
        &self.game
    }

    pub fn lane_press(&mut self, lane: usize) -> HitOutcome {
        let outcome = self.game.press(lane);
        if let HitOutcome::Hit { points, .. } = outcome {
            log::debug!("Lane {lane} hit for {points}");
        }
        outcome
    }

    pub fn lane_release(&mut self, lane: usize) {
        self.game.release(lane);
    }

    fn shared_params(&self, snapshot: &AnalysisSnapshot) -> SharedParams {
        SharedParams {
            sensitivity: self.sensitivity,
            intensity: self.intensity,
            palette: self.palette,
            beat: snapshot.beat(),
            detail: DetailLevel::from(self.quality_mode),
        }
    }

    /// Run one frame on the graph clock
    pub fn frame_now(&mut self, surface: &mut dyn Surface) -> FrameReport {
        let now = self.graph.now_ms();
        self.frame(now, surface)
    }

    /// Run one frame: analyse once, draw the active mode (plus overlay and
    /// game), then account the frame for the quality loop
    pub fn frame(&mut self, now_ms: f64, surface: &mut dyn Surface) -> FrameReport {
        if self.applied_scale != Some(self.quality.resolution_scale) {
            surface.set_resolution_scale(self.quality.resolution_scale);
            self.applied_scale = Some(self.quality.resolution_scale);
        }

        let snapshot = self.graph.read_frame_at(now_ms);
        let params = self.shared_params(&snapshot);

        self.registry
            .get_or_create(self.mode)
            .draw(surface, &snapshot, now_ms, &params);
        if self.overlay && self.mode != RendererId::Tunnel {
            draw_grid_overlay(surface, &params);
        }

        let game = self.game.update(&snapshot, now_ms);
        self.game.draw(surface, &params);

        self.frames += 1;
        if snapshot.beat() {
            self.beats += 1;
        }

        // The first frame only starts the clock
        let fps = match self.clock.as_mut() {
            Some(clock) => clock.tick(now_ms).fps,
            None => {
                self.clock = Some(FrameClock::new(now_ms));
                None
            }
        };
        let mut quality_changed = false;
        if let (Some(fps), QualityMode::Auto) = (fps, self.quality_mode) {
            let step = self.controller.step(self.quality, fps as f32);
            if step.changed() {
                log::info!(
                    "Auto quality at {fps} fps: scale {:.2} -> {:.2}, FFT {} -> {}",
                    self.quality.resolution_scale,
                    step.state.resolution_scale,
                    self.quality.analysis_resolution.samples(),
                    step.state.analysis_resolution.samples()
                );
                self.quality = step.state;
                self.graph.set_analysis_resolution(self.quality.analysis_resolution);
                quality_changed = true;
            }
        }

        FrameReport {
            timestamp_ms: now_ms,
            beat: snapshot.beat(),
            fps,
            quality_changed,
            game,
        }
    }

    pub fn hud(&self) -> HudStatus {
        HudStatus {
            fps: self.clock.as_ref().map_or(0, FrameClock::fps),
            pixel_ratio: self.quality.resolution_scale,
            fft_size: self.graph.analysis_resolution().samples(),
            quality: self.quality_mode,
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            frames: self.frames,
            beats: self.beats,
            mode: self.mode,
            source: self.graph.active_request().map(SourceRequest::describe),
            hud: self.hud(),
            quality: self.quality,
            scoreboard: (self.game.is_active() || self.game.scoreboard().hits > 0)
                .then(|| self.game.scoreboard()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{Outcome, ScriptedBackend};
    use crate::audio::AnalysisResolution;
    use crate::viz::DrawList;
    use std::path::PathBuf;

    fn session() -> (Session, ScriptedBackend) {
        let backend = ScriptedBackend::default();
        let session = Session::new(AudioConfig::default(), Box::new(backend.clone()), 2.0, 1);
        (session, backend)
    }

    fn file() -> SourceRequest {
        SourceRequest::FileTrack {
            path: PathBuf::from("song.mp3"),
        }
    }

    #[test]
    fn hud_line_format() {
        let hud = HudStatus {
            fps: 59,
            pixel_ratio: 1.5,
            fft_size: 2048,
            quality: QualityMode::Auto,
        };
        assert_eq!(hud.to_string(), "FPS: 59 | DPR: 1.50 | FFT: 2048 | Quality: auto");
    }

    #[test]
    fn starts_on_tunnel_at_native_ceiling() {
        let (session, _) = session();
        assert_eq!(session.mode(), RendererId::Tunnel);
        assert_eq!(session.quality().resolution_scale, 2.0);
        assert_eq!(session.hud().fft_size, 2048);
    }

    #[test]
    fn capture_source_enters_streaming_limits() {
        let (mut session, backend) = session();
        backend.push(Outcome::Tracks { audio: 1, video: 0 });

        session
            .activate_source(SourceRequest::Microphone { device_id: None })
            .unwrap();
        let quality = session.quality();
        assert!(quality.streaming);
        assert_eq!(quality.resolution_scale, 1.2);
        assert_eq!(quality.analysis_resolution, AnalysisResolution::Fft1024);
        assert_eq!(session.graph().analysis_resolution(), AnalysisResolution::Fft1024);

        assert!(session.stop_capture());
        assert!(!session.quality().streaming);
    }

    #[test]
    fn failed_activation_keeps_quality() {
        let (mut session, backend) = session();
        backend.push(Outcome::Tracks { audio: 0, video: 1 });
        let before = session.quality();

        let result = session.activate_source(SourceRequest::DisplayCapture);
        assert_eq!(result, Err(SourceError::NoAudioTrack));
        assert_eq!(session.quality(), before);
    }

    #[test]
    fn manual_quality_skips_source_rules() {
        let (mut session, backend) = session();
        session.set_quality_mode(QualityMode::Low);
        backend.push(Outcome::Tracks { audio: 1, video: 0 });
        session.activate_source(file()).unwrap();

        let quality = session.quality();
        assert_eq!(quality.resolution_scale, 1.0);
        assert_eq!(quality.analysis_resolution, AnalysisResolution::Fft1024);
        assert!(!quality.streaming);
    }

    #[test]
    fn returning_to_auto_restarts_from_native_settings() {
        let (mut session, _) = session();
        session.set_quality_mode(QualityMode::Low);
        session.set_quality_mode(QualityMode::Auto);

        let quality = session.quality();
        assert_eq!(quality.resolution_scale, 2.0);
        assert_eq!(quality.analysis_resolution, AnalysisResolution::Fft2048);
        assert_eq!(session.graph().analysis_resolution(), AnalysisResolution::Fft2048);
    }

    #[test]
    fn slow_frames_step_quality_down_in_auto() {
        let (mut session, _) = session();
        let mut surface = DrawList::new(320.0, 240.0);

        // 20 fps for just over a second
        let mut changed = 0;
        for frame in 0..25 {
            let report = session.frame(frame as f64 * 50.0, &mut surface);
            if report.quality_changed {
                changed += 1;
            }
            surface.clear();
        }
        assert!(changed >= 1);
        assert!(session.quality().resolution_scale < 2.0);
        assert_eq!(session.hud().fps, 20);
    }

    #[test]
    fn manual_quality_ignores_frame_rate() {
        let (mut session, _) = session();
        session.set_quality_mode(QualityMode::High);
        let mut surface = DrawList::new(320.0, 240.0);
        for frame in 0..25 {
            assert!(!session.frame(frame as f64 * 50.0, &mut surface).quality_changed);
            surface.clear();
        }
        assert_eq!(session.quality().analysis_resolution, AnalysisResolution::Fft4096);
    }

    #[test]
    fn surface_scale_follows_quality() {
        let (mut session, _) = session();
        let mut surface = DrawList::new(100.0, 100.0);
        session.frame(0.0, &mut surface);
        assert_eq!(surface.resolution_scale(), 2.0);

        session.set_quality_mode(QualityMode::Medium);
        session.frame(16.0, &mut surface);
        assert_eq!(surface.resolution_scale(), 1.5);
    }

    #[test]
    fn game_switches_to_grid_and_leaving_grid_ends_it() {
        let (mut session, _) = session();
        session.set_game_active(true);
        assert_eq!(session.mode(), RendererId::Grid);
        assert!(session.game().is_active());

        session.set_mode_name("particles");
        assert!(!session.game().is_active());
        assert_eq!(session.mode(), RendererId::Particles);
    }

    #[test]
    fn unknown_mode_name_selects_bars() {
        let (mut session, _) = session();
        session.set_mode_name("holodeck");
        assert_eq!(session.mode(), RendererId::Spectrum);
    }

    #[test]
    fn mute_restores_previous_volume() {
        let (mut session, _) = session();
        session.set_volume(0.6);
        assert!(session.toggle_mute());
        assert_eq!(session.graph().volume(), 0.0);
        assert!(!session.toggle_mute());
        assert_eq!(session.graph().volume(), 0.6);

        session.toggle_mute();
        session.set_volume(0.3);
        assert!(!session.is_muted());
    }

    #[test]
    fn overlay_is_skipped_on_tunnel() {
        let (mut session, _) = session();
        session.set_overlay(true);

        let mut tunnel = DrawList::new(200.0, 200.0);
        session.frame(0.0, &mut tunnel);
        session.set_mode(RendererId::Spectrum);
        let mut bars = DrawList::new(200.0, 200.0);
        session.frame(16.0, &mut bars);

        let overlay_lines = |list: &DrawList| {
            list.commands()
                .iter()
                .filter(|c| matches!(c, crate::viz::DrawCommand::Line(a, b, _) if a.y == b.y && a.x == 0.0 && b.x == 200.0))
                .count()
        };
        assert_eq!(overlay_lines(&tunnel), 0);
        assert_eq!(overlay_lines(&bars), 12);
    }

    #[test]
    fn report_serializes() {
        let (mut session, _) = session();
        let mut surface = DrawList::new(64.0, 64.0);
        session.frame(0.0, &mut surface);

        let json = serde_json::to_value(session.report()).unwrap();
        assert_eq!(json["frames"], 1);
        assert_eq!(json["mode"], "neonTunnel");
        assert_eq!(json["hud"]["quality"], "auto");
        assert!(json["scoreboard"].is_null());
    }
}
