use crate::error::{AudioModemError, Result};
use crate::{
    BLOCK_LEN, DEFAULT_TONES, FRAMES_PER_SYMBOL, KAISER_ALPHA, LEVEL_FULL_SCALE,
    MAX_PAYLOAD_DIFF, MIN_PEAK, SAMPLE_RATE, HISTORY_SLOTS, TONE_COUNT,
};

/// Run-time parameters shared by the receive and transmit paths.
///
/// The payload shape (tone count, RS parameters, field widths) is fixed at
/// compile time; everything here only changes timing, frequencies and
/// detection thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ModemConfig {
    /// Audio sample rate in Hz
    pub sample_rate: f32,
    /// Samples per analysis block
    pub block_len: usize,
    /// Analysis blocks per tone slot (the symbol period)
    pub frames_per_symbol: usize,
    /// Carrier frequencies in Hz, strictly increasing
    pub tones: [f32; TONE_COUNT],
    /// Kaiser-Bessel window shape
    pub kaiser_alpha: f32,
    /// Minimum rolling-sum rise that counts as a start-marker edge
    pub min_peak: f32,
    /// Positions two consecutive candidates may disagree in before validation
    pub max_payload_diff: usize,
    /// Sum of absolute sum-deltas mapped to a full level meter reading
    pub level_full_scale: f32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            block_len: BLOCK_LEN,
            frames_per_symbol: FRAMES_PER_SYMBOL,
            tones: DEFAULT_TONES,
            kaiser_alpha: KAISER_ALPHA,
            min_peak: MIN_PEAK,
            max_payload_diff: MAX_PAYLOAD_DIFF,
            level_full_scale: LEVEL_FULL_SCALE,
        }
    }
}

impl ModemConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioModemError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.block_len < 3 {
            return Err(AudioModemError::InvalidConfig(format!(
                "block length must be at least 3 samples, got {}",
                self.block_len
            )));
        }
        if self.frames_per_symbol == 0 {
            return Err(AudioModemError::InvalidConfig(
                "frames per symbol must be non-zero".to_string(),
            ));
        }
        if !self.tones.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(AudioModemError::InvalidConfig(
                "tone frequencies must be strictly increasing".to_string(),
            ));
        }
        let nyquist = self.sample_rate / 2.0;
        if self.tones[0] <= 0.0 || self.tones[TONE_COUNT - 1] >= nyquist {
            return Err(AudioModemError::InvalidConfig(format!(
                "tones must lie in (0, {}) Hz",
                nyquist
            )));
        }
        if !self.level_full_scale.is_finite() || self.level_full_scale <= 0.0 {
            return Err(AudioModemError::InvalidConfig(
                "level full scale must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Samples transmitted per tone slot
    pub fn samples_per_slot(&self) -> usize {
        self.block_len * self.frames_per_symbol
    }

    /// Blocks held by the test history: one full transmission plus one
    /// symbol period of alignment padding
    pub fn history_len(&self) -> usize {
        self.frames_per_symbol * HISTORY_SLOTS
    }

    /// Duration of one whole transmission in seconds
    pub fn transmission_secs(&self) -> f32 {
        (self.samples_per_slot() * crate::TONE_SLOTS) as f32 / self.sample_rate
    }
}
