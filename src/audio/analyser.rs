//! Spectral and time-domain analysis node
//!
//! Produces byte-scaled frequency and waveform arrays the way a browser
//! analyser node does: Blackman window, per-bin smoothing over time, decibel
//! conversion and a linear map of `[min_decibels, max_decibels]` onto 0-255.

use super::AnalysisResolution;
use rustfft::{num_complex::Complex, FftPlanner};

/// Upper bound for the smoothing time constant
pub const MAX_SMOOTHING: f32 = 0.98;

pub struct Analyser {
    resolution: AnalysisResolution,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    planner: FftPlanner<f32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    frequency: Vec<u8>,
    waveform: Vec<u8>,
}

impl Analyser {
    pub fn new(
        resolution: AnalysisResolution,
        smoothing: f32,
        min_decibels: f32,
        max_decibels: f32,
    ) -> Self {
        let mut analyser = Self {
            resolution,
            smoothing: clamp_smoothing(smoothing),
            min_decibels,
            max_decibels,
            planner: FftPlanner::new(),
            window: Vec::new(),
            smoothed: Vec::new(),
            frequency: Vec::new(),
            waveform: Vec::new(),
        };
        analyser.allocate();
        analyser
    }

    fn allocate(&mut self) {
        let n = self.resolution.samples();
        self.window = blackman(n);
        self.smoothed = vec![0.0; n / 2];
        self.frequency = vec![0; n / 2];
        self.waveform = vec![128; n];
    }

    pub fn resolution(&self) -> AnalysisResolution {
        self.resolution
    }

    /// Reallocate every buffer for a new resolution. Smoothing history is
    /// discarded because bins no longer line up.
    pub fn set_resolution(&mut self, resolution: AnalysisResolution) {
        if resolution == self.resolution {
            return;
        }
        self.resolution = resolution;
        self.allocate();
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = clamp_smoothing(smoothing);
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.resolution.bins()
    }

    /// Analyse the most recent samples. Input shorter than the resolution is
    /// treated as preceded by silence; longer input keeps only its tail.
    pub fn process(&mut self, samples: &[f32]) {
        let n = self.resolution.samples();
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        let mut input: Vec<f32> = Vec::with_capacity(n);
        input.resize(pad, 0.0);
        input.extend_from_slice(tail);

        for (byte, &sample) in self.waveform.iter_mut().zip(input.iter()) {
            *byte = (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8;
        }

        let mut buffer: Vec<Complex<f32>> = input
            .iter()
            .zip(self.window.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        let range = self.max_decibels - self.min_decibels;

        for (k, bin) in buffer.iter().take(n / 2).enumerate() {
            let magnitude = bin.norm() * scale;
            let value = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            self.smoothed[k] = if value.is_finite() { value } else { 0.0 };

            let db = 20.0 * self.smoothed[k].log10();
            let scaled = 255.0 / range * (db - self.min_decibels);
            self.frequency[k] = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    pub fn frequency(&self) -> &[u8] {
        &self.frequency
    }

    pub fn waveform(&self) -> &[u8] {
        &self.waveform
    }
}

fn clamp_smoothing(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_SMOOTHING)
}

fn blackman(n: usize) -> Vec<f32> {
    let alpha = 0.16_f32;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser(smoothing: f32) -> Analyser {
        Analyser::new(AnalysisResolution::Fft1024, smoothing, -100.0, -30.0)
    }

    fn sine(freq_bin: usize, n: usize, amplitude: f32) -> Vec<f32> {
        (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq_bin as f32 * i as f32 / n as f32).sin()
            })
            .collect()
    }

    #[test]
    fn silence_yields_zero_spectrum_and_centred_waveform() {
        let mut analyser = analyser(0.0);
        analyser.process(&vec![0.0; 1024]);

        assert_eq!(analyser.frequency().len(), 512);
        assert!(analyser.frequency().iter().all(|&v| v == 0));
        assert!(analyser.waveform().iter().all(|&v| v == 128));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = analyser(0.0);
        analyser.process(&sine(64, 1024, 0.1));

        let freq = analyser.frequency();
        let peak = freq
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i);
        assert_eq!(peak, Some(64));
        assert!(freq[64] > 200);
        assert!(freq[300] < freq[64]);
    }

    #[test]
    fn waveform_bytes_follow_sample_amplitude() {
        let mut analyser = analyser(0.0);
        let mut samples = vec![0.0; 1024];
        samples[1023] = 1.0;
        samples[1022] = -1.0;
        samples[1021] = 0.5;
        analyser.process(&samples);

        let wave = analyser.waveform();
        assert_eq!(wave[1023], 255);
        assert_eq!(wave[1022], 0);
        assert_eq!(wave[1021], 192);
    }

    #[test]
    fn short_input_is_padded_with_silence() {
        let mut analyser = analyser(0.0);
        analyser.process(&[1.0, 1.0]);

        let wave = analyser.waveform();
        assert_eq!(wave.len(), 1024);
        assert_eq!(wave[0], 128);
        assert_eq!(wave[1023], 255);
    }

    #[test]
    fn smoothing_decays_spectrum_gradually() {
        let mut analyser = analyser(0.75);
        analyser.process(&sine(32, 1024, 0.2));
        let loud = analyser.frequency()[32];

        analyser.process(&vec![0.0; 1024]);
        let decayed = analyser.frequency()[32];

        assert!(decayed > 0);
        assert!(decayed < loud);
    }

    #[test]
    fn smoothing_is_clamped() {
        let mut analyser = analyser(0.5);
        analyser.set_smoothing(1.5);
        assert_eq!(analyser.smoothing(), MAX_SMOOTHING);
        analyser.set_smoothing(-1.0);
        assert_eq!(analyser.smoothing(), 0.0);
    }

    #[test]
    fn resolution_change_reallocates_buffers() {
        let mut analyser = analyser(0.5);
        analyser.set_resolution(AnalysisResolution::Fft4096);

        assert_eq!(analyser.frequency().len(), 2048);
        assert_eq!(analyser.waveform().len(), 4096);
        assert_eq!(analyser.frequency_bin_count(), 2048);
    }
}
