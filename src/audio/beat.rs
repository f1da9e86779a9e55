//! Energy-based beat detection over the low end of the spectrum

/// Slots in the rolling energy history
pub const ENERGY_HISTORY_LEN: usize = 60;

/// Fixed-capacity ring of low-band energy samples.
///
/// Slots start at zero and count towards the mean before they are written,
/// so the first frames after start-up see a deflated mean.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    slots: Vec<f32>,
    cursor: usize,
}

impl EnergyHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)],
            cursor: 0,
        }
    }

    /// Overwrite the oldest slot
    pub fn push(&mut self, energy: f32) {
        self.slots[self.cursor] = energy;
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Mean over every slot, including ones never written
    pub fn mean(&self) -> f32 {
        self.slots.iter().sum::<f32>() / self.slots.len() as f32
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for EnergyHistory {
    fn default() -> Self {
        Self::new(ENERGY_HISTORY_LEN)
    }
}

/// Flags a beat when low-band energy jumps above its rolling mean.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    history: EnergyHistory,
    threshold: f32,
    min_interval_ms: f64,
    // Timestamps share the graph clock origin, so the first beat can only
    // fire once `min_interval_ms` has passed since that origin.
    last_beat_ms: f64,
}

impl BeatDetector {
    pub fn new(threshold: f32, min_interval_ms: f64) -> Self {
        Self {
            history: EnergyHistory::default(),
            threshold,
            min_interval_ms,
            last_beat_ms: 0.0,
        }
    }

    /// Low-band energy: mean of the lowest sixth of the bins (at least one)
    pub fn low_band_energy(frequency: &[u8]) -> f32 {
        if frequency.is_empty() {
            return 0.0;
        }
        let count = (frequency.len() / 6).max(1);
        let sum: u32 = frequency[..count].iter().map(|&v| v as u32).sum();
        sum as f32 / count as f32
    }

    /// Feed one frame of frequency data observed at `now_ms`.
    pub fn detect(&mut self, frequency: &[u8], now_ms: f64) -> bool {
        if frequency.is_empty() {
            return false;
        }

        let energy = Self::low_band_energy(frequency);
        self.history.push(energy);
        let mean = self.history.mean();

        if energy > mean * self.threshold && now_ms - self.last_beat_ms >= self.min_interval_ms {
            self.last_beat_ms = now_ms;
            log::debug!("beat: energy {energy:.1} over mean {mean:.1}");
            return true;
        }
        false
    }

    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new(1.35, 250.0)
    }
}
