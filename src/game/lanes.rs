//! Per-lane band energies and beat detection for the rhythm game.
//!
//! Separate from the analysis beat detector: each lane tracks a slow rolling
//! threshold instead of a fixed ratio over a history window.

use crate::viz::band;

pub const LANES: usize = 4;

/// Lane boundaries as fractions of the frequency array, lowest lane first
pub const LANE_BANDS: [(f32, f32); LANES] = [(0.0, 0.04), (0.04, 0.12), (0.12, 0.35), (0.35, 0.75)];

const THRESHOLD_DECAY: f32 = 0.95;
const THRESHOLD_RATIO: f32 = 1.4;
const MIN_LEVEL: f32 = 0.35;
const LANE_REFIRE_MS: f64 = 350.0;

/// Mean level of each lane band, normalised to 0-1
pub fn lane_energies(frequency: &[u8]) -> [f32; LANES] {
    let len = frequency.len() as f32;
    let mut energies = [0.0; LANES];
    for (energy, &(lo, hi)) in energies.iter_mut().zip(LANE_BANDS.iter()) {
        let start = (lo * len).round() as usize;
        let end = ((hi * len).round() as usize).max(start + 1);
        *energy = band(frequency, start, end) / 255.0;
    }
    energies
}

#[derive(Debug, Clone, Default)]
pub struct LaneDetector {
    thresholds: [f32; LANES],
    last_beat_ms: [Option<f64>; LANES],
}

impl LaneDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update every lane's threshold with this frame's values and report which
    /// lanes beat. The threshold includes the current value.
    pub fn detect(&mut self, values: [f32; LANES], now_ms: f64) -> [bool; LANES] {
        let mut beats = [false; LANES];
        for lane in 0..LANES {
            let value = values[lane];
            let threshold = self.thresholds[lane] * THRESHOLD_DECAY + value * (1.0 - THRESHOLD_DECAY);
            self.thresholds[lane] = threshold;

            let rested = self.last_beat_ms[lane].map_or(true, |last| now_ms - last >= LANE_REFIRE_MS);
            if rested && value > (threshold * THRESHOLD_RATIO).max(MIN_LEVEL) {
                self.last_beat_ms[lane] = Some(now_ms);
                beats[lane] = true;
            }
        }
        beats
    }

    pub fn thresholds(&self) -> [f32; LANES] {
        self.thresholds
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energies_cover_their_bands() {
        let mut freq = vec![0u8; 1000];
        freq[..40].fill(255);
        freq[350..750].fill(51);

        let energies = lane_energies(&freq);
        assert_eq!(energies[0], 1.0);
        assert_eq!(energies[1], 0.0);
        assert_eq!(energies[2], 0.0);
        assert!((energies[3] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn short_spectrum_reads_single_bins() {
        let energies = lane_energies(&[255, 0]);
        assert_eq!(energies[0], 1.0);
        assert_eq!(lane_energies(&[]), [0.0; LANES]);
    }

    #[test]
    fn quiet_lanes_never_beat() {
        let mut detector = LaneDetector::new();
        for frame in 0..100 {
            let beats = detector.detect([0.3; LANES], frame as f64 * 16.0);
            assert_eq!(beats, [false; LANES]);
        }
    }

    #[test]
    fn spike_over_rolling_threshold_beats_once() {
        let mut detector = LaneDetector::new();
        for frame in 0..60 {
            detector.detect([0.3, 0.0, 0.0, 0.0], frame as f64 * 16.0);
        }

        let beats = detector.detect([0.9, 0.0, 0.0, 0.0], 1000.0);
        assert_eq!(beats, [true, false, false, false]);

        // Within the refire window
        assert!(!detector.detect([0.95, 0.0, 0.0, 0.0], 1200.0)[0]);
        // After it
        assert!(detector.detect([0.95, 0.0, 0.0, 0.0], 1400.0)[0]);
    }

    #[test]
    fn sustained_level_raises_threshold() {
        let mut detector = LaneDetector::new();
        for frame in 0..400 {
            detector.detect([0.8; LANES], frame as f64 * 16.0);
        }
        assert!(detector.thresholds()[0] > 0.79);
        assert_eq!(detector.detect([0.9; LANES], 10_000.0), [false; LANES]);
    }
}
