//! Media streams, tracks and the sample taps sources write into

use super::sources::{SourceError, SourceRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Circular audio buffer
pub struct AudioBuffer {
    samples: Vec<f32>,
    write_pos: usize,
    capacity: usize,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![0.0; capacity],
            write_pos: 0,
            capacity,
        }
    }

    pub fn push_samples(&mut self, data: &[f32]) {
        for &sample in data {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.capacity;
        }
    }

    pub fn get_latest(&self, count: usize) -> Vec<f32> {
        let count = count.min(self.capacity);
        let mut result = Vec::with_capacity(count);

        let start = if self.write_pos >= count {
            self.write_pos - count
        } else {
            self.capacity - (count - self.write_pos)
        };

        for i in 0..count {
            let idx = (start + i) % self.capacity;
            result.push(self.samples[idx]);
        }

        result
    }

    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.write_pos = 0;
    }
}

/// Where a source's producer thread delivers mono samples.
///
/// The analysis side reads the latest window once per frame. The audible
/// gain is owned by the signal graph: it is the sum of the gains of the
/// output nodes the source is connected to, zero when it is analysis-only.
pub struct SourceTap {
    buffer: Mutex<AudioBuffer>,
    audible_gain: AtomicU32,
    sample_rate: AtomicU32,
}

impl SourceTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(AudioBuffer::new(capacity)),
            audible_gain: AtomicU32::new(0.0_f32.to_bits()),
            sample_rate: AtomicU32::new(48_000),
        }
    }

    pub fn push(&self, samples: &[f32]) {
        self.buffer.lock().push_samples(samples);
    }

    pub fn latest(&self, count: usize) -> Vec<f32> {
        self.buffer.lock().get_latest(count)
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }

    pub fn audible_gain(&self) -> f32 {
        f32::from_bits(self.audible_gain.load(Ordering::Relaxed))
    }

    pub fn set_audible_gain(&self, gain: f32) {
        self.audible_gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    pub fn set_sample_rate(&self, rate: u32) {
        self.sample_rate.store(rate, Ordering::Relaxed);
    }
}

/// Transport shared between the graph and a file player thread
#[derive(Debug, Default)]
pub struct PlaybackControl {
    paused: AtomicBool,
    rewind: AtomicBool,
}

impl PlaybackControl {
    pub fn play(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    /// Pause and return to the start of the track
    pub fn stop(&self) {
        self.paused.store(true, Ordering::Relaxed);
        self.rewind.store(true, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Consume a pending rewind request
    pub fn take_rewind(&self) -> bool {
        self.rewind.swap(false, Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Exclusive ownership of a device or decoder behind one track
pub trait TrackHandle: Send {
    /// Release the underlying resource. Must be idempotent.
    fn stop(&mut self);
}

/// One track of a media stream. The handle is released on `stop` or drop.
pub struct MediaTrack {
    kind: TrackKind,
    label: String,
    handle: Option<Box<dyn TrackHandle>>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, handle: Box<dyn TrackHandle>) -> Self {
        Self {
            kind,
            label: label.into(),
            handle: Some(handle),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            log::debug!("releasing {:?} track '{}'", self.kind, self.label);
            handle.stop();
        }
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tracks opened for one source activation
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
    control: Option<Arc<PlaybackControl>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            tracks,
            control: None,
        }
    }

    pub fn with_control(mut self, control: Arc<PlaybackControl>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.kind() == TrackKind::Audio)
            .count()
    }

    pub fn control(&self) -> Option<&Arc<PlaybackControl>> {
        self.control.as_ref()
    }

    pub fn stop_video_tracks(&mut self) {
        for track in self.tracks.iter_mut().filter(|t| t.kind() == TrackKind::Video) {
            track.stop();
        }
    }

    pub fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}

/// Opens platform media for a source request.
///
/// Implementations start their producers writing into `tap` and return the
/// tracks that own them. Dropping the returned stream releases everything.
pub trait MediaBackend {
    fn open(
        &mut self,
        request: &SourceRequest,
        tap: Arc<SourceTap>,
    ) -> Result<MediaStream, SourceError>;
}
