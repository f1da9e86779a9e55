//! Per-frame analysis snapshot

use super::AnalysisResolution;
use serde::Serialize;

/// One frame of analysis data.
///
/// Built once per tick by the signal graph and handed by reference to every
/// consumer of that frame. There are no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSnapshot {
    frequency: Vec<u8>,
    waveform: Vec<u8>,
    beat: bool,
    timestamp_ms: f64,
}

impl AnalysisSnapshot {
    pub fn new(frequency: Vec<u8>, waveform: Vec<u8>, beat: bool, timestamp_ms: f64) -> Self {
        Self {
            frequency,
            waveform,
            beat,
            timestamp_ms,
        }
    }

    /// Zero-filled snapshot sized for `resolution`. "Zero" means zero
    /// signal: the spectrum bytes are 0 and the waveform bytes are 128, the
    /// byte encoding of zero amplitude, so waveform renderers draw a flat line.
    pub fn silent(resolution: AnalysisResolution, timestamp_ms: f64) -> Self {
        Self {
            frequency: vec![0; resolution.bins()],
            waveform: vec![128; resolution.samples()],
            beat: false,
            timestamp_ms,
        }
    }

    /// Byte-scaled magnitude per frequency bin, lowest frequency first
    pub fn frequency(&self) -> &[u8] {
        &self.frequency
    }

    /// Byte-scaled time-domain samples, 128 is zero amplitude
    pub fn waveform(&self) -> &[u8] {
        &self.waveform
    }

    pub fn beat(&self) -> bool {
        self.beat
    }

    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    /// Frequency value at `index` normalised to 0-1, or 0 when out of range
    pub fn frequency_at(&self, index: usize) -> f32 {
        self.frequency.get(index).map_or(0.0, |&v| v as f32 / 255.0)
    }

    /// Waveform value at `index` normalised to -1..1, or 0 when out of range
    pub fn waveform_at(&self, index: usize) -> f32 {
        self.waveform
            .get(index)
            .map_or(0.0, |&v| (v as f32 - 128.0) / 128.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_snapshot_has_resolution_lengths() {
        let snapshot = AnalysisSnapshot::silent(AnalysisResolution::Fft1024, 0.0);

        assert_eq!(snapshot.frequency().len(), 512);
        assert_eq!(snapshot.waveform().len(), 1024);
        assert!(snapshot.frequency().iter().all(|&v| v == 0));
        assert!(snapshot.waveform().iter().all(|&v| v == 128));
        assert!(snapshot.waveform_at(0) == 0.0);
        assert!(!snapshot.beat());
    }

    #[test]
    fn out_of_range_reads_are_zero() {
        let snapshot = AnalysisSnapshot::new(vec![255], vec![0], false, 0.0);

        assert_eq!(snapshot.frequency_at(0), 1.0);
        assert_eq!(snapshot.frequency_at(5), 0.0);
        assert_eq!(snapshot.waveform_at(0), -1.0);
        assert_eq!(snapshot.waveform_at(9), 0.0);
    }
}
