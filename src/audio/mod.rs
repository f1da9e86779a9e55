//! Audio sources, signal graph and analysis

mod analyser;
mod backend;
mod beat;
mod capture;
mod decode;
mod graph;
mod media;
#[cfg(test)]
pub(crate) mod mock;
mod playout;
mod snapshot;
mod sources;

pub use analyser::Analyser;
pub use backend::CpalBackend;
pub use beat::{BeatDetector, EnergyHistory};
pub use capture::{CaptureHandle, CaptureTarget};
pub use graph::{GraphNode, SignalGraph};
pub use media::{
    AudioBuffer, MediaBackend, MediaStream, MediaTrack, PlaybackControl, SourceTap, TrackHandle,
    TrackKind,
};
pub use playout::{AudioSink, NullSink, Playout};
pub use snapshot::AnalysisSnapshot;
pub use sources::{list_sources, AudioSource, SourceError, SourceKind, SourceRequest, SourceType};

use serde::{Deserialize, Serialize};

/// Number of samples per analysis pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum AnalysisResolution {
    Fft1024,
    Fft2048,
    Fft4096,
}

impl AnalysisResolution {
    pub fn samples(self) -> usize {
        match self {
            Self::Fft1024 => 1024,
            Self::Fft2048 => 2048,
            Self::Fft4096 => 4096,
        }
    }

    /// Frequency bins produced at this resolution
    pub fn bins(self) -> usize {
        self.samples() / 2
    }

    /// Next smaller resolution, or `None` at the floor
    pub fn halved(self) -> Option<Self> {
        match self {
            Self::Fft1024 => None,
            Self::Fft2048 => Some(Self::Fft1024),
            Self::Fft4096 => Some(Self::Fft2048),
        }
    }

    /// Next larger resolution, or `None` at the ceiling
    pub fn doubled(self) -> Option<Self> {
        match self {
            Self::Fft1024 => Some(Self::Fft2048),
            Self::Fft2048 => Some(Self::Fft4096),
            Self::Fft4096 => None,
        }
    }
}

impl Default for AnalysisResolution {
    fn default() -> Self {
        Self::Fft2048
    }
}

impl TryFrom<usize> for AnalysisResolution {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            1024 => Ok(Self::Fft1024),
            2048 => Ok(Self::Fft2048),
            4096 => Ok(Self::Fft4096),
            other => Err(format!("unsupported analysis resolution {other} (expected 1024, 2048 or 4096)")),
        }
    }
}

impl From<AnalysisResolution> for usize {
    fn from(value: AnalysisResolution) -> Self {
        value.samples()
    }
}

/// Audio processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Analysis resolution used when the graph context is created
    pub fft_size: AnalysisResolution,

    /// Smoothing time constant of the analysis node (0-0.98)
    pub smoothing: f32,

    /// Lower bound of the byte-scaled spectrum in dBFS
    pub min_decibels: f32,

    /// Upper bound of the byte-scaled spectrum in dBFS
    pub max_decibels: f32,

    /// Initial output volume (0-1)
    pub volume: f32,

    /// Gain applied to monitored capture sources
    pub monitor_gain: f32,

    /// Beat fires when low-band energy exceeds the rolling mean by this factor
    pub beat_threshold: f32,

    /// Minimum spacing between detected beats
    pub min_beat_interval_ms: f64,

    /// Samples retained per source tap
    pub tap_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: AnalysisResolution::Fft2048,
            smoothing: 0.75,
            min_decibels: -100.0,
            max_decibels: -30.0,
            volume: 1.0,
            monitor_gain: 0.8,
            beat_threshold: 1.35,
            min_beat_interval_ms: 250.0,
            tap_capacity: 16384,
        }
    }
}
