//! Signal graph: switchable sources feeding one analysis node
//!
//! The graph owns a single context holding the analyser, a volume node and a
//! monitor node. Exactly one source is connected at a time. A source is
//! always connected to the analyser; file and stream sources also reach the
//! volume node, capture sources reach the monitor node only while monitoring
//! is enabled.

use super::analyser::Analyser;
use super::beat::BeatDetector;
use super::media::{MediaBackend, MediaStream, PlaybackControl, SourceTap};
use super::snapshot::AnalysisSnapshot;
use super::sources::{SourceError, SourceKind, SourceRequest};
use super::{AnalysisResolution, AudioConfig};
use std::sync::Arc;
use std::time::Instant;

/// Nodes a source can be connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphNode {
    Analyser,
    Volume,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    source: u64,
    node: GraphNode,
}

struct ActiveSource {
    id: u64,
    request: SourceRequest,
    stream: MediaStream,
    tap: Arc<SourceTap>,
}

impl ActiveSource {
    fn kind(&self) -> SourceKind {
        self.request.kind()
    }
}

struct GraphContext {
    analyser: Analyser,
    volume: f32,
    monitor_gain: f32,
    monitoring: bool,
    edges: Vec<Edge>,
    active: Option<ActiveSource>,
    next_source_id: u64,
    origin: Instant,
}

impl GraphContext {
    fn new(config: &AudioConfig) -> Self {
        log::info!(
            "Creating signal graph ({} samples, smoothing {:.2})",
            config.fft_size.samples(),
            config.smoothing
        );
        Self {
            analyser: Analyser::new(
                config.fft_size,
                config.smoothing,
                config.min_decibels,
                config.max_decibels,
            ),
            volume: clamp_unit(config.volume),
            monitor_gain: config.monitor_gain,
            monitoring: false,
            edges: Vec::new(),
            active: None,
            next_source_id: 1,
            origin: Instant::now(),
        }
    }

    fn connect(&mut self, source: u64, node: GraphNode) {
        let edge = Edge { source, node };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    fn disconnect(&mut self, source: u64, node: GraphNode) {
        self.edges.retain(|e| !(e.source == source && e.node == node));
    }

    fn disconnect_all(&mut self, source: u64) {
        self.edges.retain(|e| e.source != source);
    }

    fn is_connected(&self, source: u64, node: GraphNode) -> bool {
        self.edges.contains(&Edge { source, node })
    }

    /// Disconnect and release whatever source is active
    fn release_active(&mut self) -> Option<SourceRequest> {
        let mut previous = self.active.take()?;
        self.disconnect_all(previous.id);
        previous.tap.set_audible_gain(0.0);
        previous.stream.stop_all();
        Some(previous.request)
    }

    /// Push the summed gain of every output node onto the active tap
    fn refresh_gains(&self) {
        let Some(active) = &self.active else {
            return;
        };
        let mut gain = 0.0;
        if self.is_connected(active.id, GraphNode::Volume) {
            gain += self.volume;
        }
        if self.is_connected(active.id, GraphNode::Monitor) {
            gain += self.monitor_gain;
        }
        active.tap.set_audible_gain(gain);
    }

    fn analysed_tap(&self) -> Option<&Arc<SourceTap>> {
        self.active
            .as_ref()
            .filter(|a| self.is_connected(a.id, GraphNode::Analyser))
            .map(|a| &a.tap)
    }

    /// Paused or finished playback feeds silence to the analyser
    fn is_paused(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.stream.control())
            .is_some_and(|c| c.is_paused())
    }

    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

pub struct SignalGraph {
    config: AudioConfig,
    backend: Box<dyn MediaBackend>,
    context: Option<GraphContext>,
    detector: BeatDetector,
}

impl SignalGraph {
    pub fn new(config: AudioConfig, backend: Box<dyn MediaBackend>) -> Self {
        let detector = BeatDetector::new(config.beat_threshold, config.min_beat_interval_ms);
        Self {
            config,
            backend,
            context: None,
            detector,
        }
    }

    fn context(&mut self) -> &mut GraphContext {
        let config = &self.config;
        self.context.get_or_insert_with(|| GraphContext::new(config))
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// Switch the analysed signal to `request`.
    ///
    /// On error nothing changes: the previous source stays connected and any
    /// tracks the failed request obtained are released. The exception is
    /// reopening the active capture request, which releases the device before
    /// opening it again and leaves no source if that fails.
    pub fn activate(&mut self, request: SourceRequest) -> Result<(), SourceError> {
        let capacity = self.config.tap_capacity;
        // Capture devices can be exclusive: release before reopening
        let ctx = self.context();
        let reopening = ctx
            .active
            .as_ref()
            .is_some_and(|a| a.kind().is_capture() && a.request == request);
        if reopening {
            if let Some(previous) = ctx.release_active() {
                log::debug!("Reopening {}", previous.describe());
            }
        }

        let tap = Arc::new(SourceTap::new(capacity));
        let mut stream = match self.backend.open(&request, tap.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("Could not open {}: {}", request.describe(), e);
                return Err(e);
            }
        };

        if stream.audio_track_count() == 0 {
            stream.stop_video_tracks();
            stream.stop_all();
            log::warn!("{} has no audio track", request.describe());
            return Err(SourceError::NoAudioTrack);
        }

        let ctx = self.context();
        if let Some(previous) = ctx.release_active() {
            log::debug!("Released {}", previous.describe());
        }

        let id = ctx.next_source_id;
        ctx.next_source_id += 1;

        let kind = request.kind();
        ctx.connect(id, GraphNode::Analyser);
        if kind.is_audible() {
            ctx.connect(id, GraphNode::Volume);
        } else if ctx.monitoring {
            ctx.connect(id, GraphNode::Monitor);
        }

        log::info!("Source active: {}", request.describe());
        ctx.active = Some(ActiveSource {
            id,
            request,
            stream,
            tap,
        });
        ctx.refresh_gains();
        Ok(())
    }

    /// Release an active capture source. File and stream sources are left
    /// alone.
    pub fn stop_capture(&mut self) -> bool {
        let Some(ctx) = self.context.as_mut() else {
            return false;
        };
        let is_capture = ctx
            .active
            .as_ref()
            .map(|a| a.kind().is_capture())
            .unwrap_or(false);
        if !is_capture {
            return false;
        }
        if let Some(previous) = ctx.release_active() {
            log::info!("Stopped {}", previous.describe());
        }
        true
    }

    /// Release whatever source is active
    pub fn stop(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            if let Some(previous) = ctx.release_active() {
                log::info!("Stopped {}", previous.describe());
            }
        }
    }

    /// Milliseconds since the graph context was created, 0 before that
    pub fn now_ms(&self) -> f64 {
        self.context.as_ref().map_or(0.0, GraphContext::now_ms)
    }

    /// Analyse the current window of the connected source
    pub fn read_frame(&mut self) -> AnalysisSnapshot {
        let now = self.now_ms();
        self.read_frame_at(now)
    }

    /// `read_frame` with an explicit graph-clock timestamp
    pub fn read_frame_at(&mut self, now_ms: f64) -> AnalysisSnapshot {
        let Some(ctx) = self.context.as_mut() else {
            return AnalysisSnapshot::silent(self.config.fft_size, now_ms);
        };

        let n = ctx.analyser.resolution().samples();
        let samples = ctx
            .analysed_tap()
            .filter(|_| !ctx.is_paused())
            .map(|tap| tap.latest(n))
            .unwrap_or_default();
        ctx.analyser.process(&samples);

        let frequency = ctx.analyser.frequency().to_vec();
        let waveform = ctx.analyser.waveform().to_vec();
        let beat = self.detector.detect(&frequency, now_ms);
        AnalysisSnapshot::new(frequency, waveform, beat, now_ms)
    }

    pub fn set_volume(&mut self, volume: f32) {
        let ctx = self.context();
        ctx.volume = clamp_unit(volume);
        ctx.refresh_gains();
    }

    pub fn volume(&self) -> f32 {
        self.context
            .as_ref()
            .map_or(clamp_unit(self.config.volume), |c| c.volume)
    }

    pub fn set_analysis_resolution(&mut self, resolution: AnalysisResolution) {
        let ctx = self.context();
        if ctx.analyser.resolution() != resolution {
            log::debug!("Analysis resolution -> {}", resolution.samples());
            ctx.analyser.set_resolution(resolution);
        }
    }

    pub fn analysis_resolution(&self) -> AnalysisResolution {
        self.context
            .as_ref()
            .map_or(self.config.fft_size, |c| c.analyser.resolution())
    }

    /// Route capture sources to the monitor node
    pub fn set_monitoring(&mut self, enabled: bool) {
        let ctx = self.context();
        ctx.monitoring = enabled;

        let capture_id = ctx
            .active
            .as_ref()
            .filter(|a| a.kind().is_capture())
            .map(|a| a.id);
        if let Some(id) = capture_id {
            if enabled {
                ctx.connect(id, GraphNode::Monitor);
            } else {
                ctx.disconnect(id, GraphNode::Monitor);
            }
        }
        ctx.refresh_gains();
    }

    pub fn monitoring(&self) -> bool {
        self.context.as_ref().is_some_and(|c| c.monitoring)
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.context().analyser.set_smoothing(smoothing);
    }

    pub fn smoothing(&self) -> f32 {
        self.context
            .as_ref()
            .map_or(self.config.smoothing, |c| c.analyser.smoothing())
    }

    pub fn active_kind(&self) -> Option<SourceKind> {
        self.context
            .as_ref()
            .and_then(|c| c.active.as_ref())
            .map(ActiveSource::kind)
    }

    pub fn active_request(&self) -> Option<&SourceRequest> {
        self.context
            .as_ref()
            .and_then(|c| c.active.as_ref())
            .map(|a| &a.request)
    }

    /// Edges from the active source into `node`
    pub fn edge_count(&self, node: GraphNode) -> usize {
        self.context.as_ref().map_or(0, |c| {
            c.edges.iter().filter(|e| e.node == node).count()
        })
    }

    fn playback(&self) -> Option<&Arc<PlaybackControl>> {
        self.context
            .as_ref()
            .and_then(|c| c.active.as_ref())
            .and_then(|a| a.stream.control())
    }

    pub fn play(&self) {
        if let Some(control) = self.playback() {
            control.play();
        }
    }

    pub fn pause(&self) {
        if let Some(control) = self.playback() {
            control.pause();
        }
    }

    /// Pause and rewind the active file
    pub fn stop_playback(&self) {
        if let Some(control) = self.playback() {
            control.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback().is_some_and(|c| !c.is_paused())
    }
}

impl Drop for SignalGraph {
    fn drop(&mut self) {
        self.stop();
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
