use std::f32::consts::PI;

use log::trace;

use crate::config::ModemConfig;
use crate::error::{AudioModemError, Result};
use crate::window::KaiserWindow;
use crate::TONE_COUNT;

/// Per-block measurement of every tone
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Spectrum {
    /// Magnitude squared of each tone's Goertzel output
    pub magnitudes: [f32; TONE_COUNT],
    /// Coarse phase-change flag per tone relative to the previous block
    pub phase_changed: [bool; TONE_COUNT],
}

/// Two-tap Goertzel resonator bank over the windowed block.
///
/// Holds the previous block's complex output per tone so it can flag
/// phase jumps between consecutive blocks.
pub struct SpectralAnalyzer {
    window: KaiserWindow,
    /// 2cos(2πf/fs)
    cos_coeffs: [f32; TONE_COUNT],
    /// sin(2πf/fs)
    sin_coeffs: [f32; TONE_COUNT],
    prev_re: [f32; TONE_COUNT],
    prev_im: [f32; TONE_COUNT],
    scratch: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        let window = KaiserWindow::new(config.block_len, config.kaiser_alpha)?;

        let mut cos_coeffs = [0.0; TONE_COUNT];
        let mut sin_coeffs = [0.0; TONE_COUNT];
        for (i, &freq) in config.tones.iter().enumerate() {
            let omega = 2.0 * PI * freq / config.sample_rate;
            cos_coeffs[i] = 2.0 * omega.cos();
            sin_coeffs[i] = omega.sin();
        }

        Ok(Self {
            window,
            cos_coeffs,
            sin_coeffs,
            prev_re: [0.0; TONE_COUNT],
            prev_im: [0.0; TONE_COUNT],
            scratch: vec![0.0; config.block_len],
        })
    }

    pub fn block_len(&self) -> usize {
        self.scratch.len()
    }

    /// Analyze one block of exactly `block_len` samples.
    pub fn analyze(&mut self, samples: &[f32]) -> Result<Spectrum> {
        if samples.len() != self.scratch.len() {
            return Err(AudioModemError::InvalidInputSize {
                expected: self.scratch.len(),
                actual: samples.len(),
            });
        }

        self.window.apply(samples, &mut self.scratch);

        let mut spectrum = Spectrum::default();
        for tone in 0..TONE_COUNT {
            let coeff = self.cos_coeffs[tone];

            let mut q1 = 0.0f32;
            let mut q2 = 0.0f32;
            for &sample in &self.scratch {
                let q0 = coeff * q1 - q2 + sample;
                q2 = q1;
                q1 = q0;
            }

            let re = q1 - q2 * 0.5 * coeff;
            let im = q2 * self.sin_coeffs[tone];
            spectrum.magnitudes[tone] = re * re + im * im;

            // rotate by the conjugate of the previous output
            let (p_re, p_im) = (self.prev_re[tone], self.prev_im[tone]);
            let d_re = re * p_re + im * p_im;
            let d_im = -im * p_re + re * p_im;
            spectrum.phase_changed[tone] = !(d_re * d_re > d_im * d_im && d_re < 0.0);

            self.prev_re[tone] = re;
            self.prev_im[tone] = im;
        }

        trace!(
            "spectrum {:?} phase {:?}",
            spectrum.magnitudes,
            spectrum.phase_changed
        );
        Ok(spectrum)
    }

    /// Forget the previous block's phase reference
    pub fn reset(&mut self) {
        self.prev_re = [0.0; TONE_COUNT];
        self.prev_im = [0.0; TONE_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BLOCK_LEN, DEFAULT_TONES, SAMPLE_RATE};

    fn tone_block(freq: f32, amplitude: f32, start: usize) -> Vec<f32> {
        (start..start + BLOCK_LEN)
            .map(|n| amplitude * (2.0 * PI * freq * n as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn loudest(spectrum: &Spectrum) -> usize {
        let mut best = 0;
        for i in 1..TONE_COUNT {
            if spectrum.magnitudes[i] > spectrum.magnitudes[best] {
                best = i;
            }
        }
        best
    }

    #[test]
    fn test_analyzer_picks_each_tone() {
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        for (i, &freq) in DEFAULT_TONES.iter().enumerate() {
            analyzer.reset();
            let spectrum = analyzer.analyze(&tone_block(freq, 0.5, 0)).unwrap();
            assert_eq!(loudest(&spectrum), i, "tone {} Hz", freq);
        }
    }

    #[test]
    fn test_silence_gives_zero_magnitudes() {
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        let spectrum = analyzer.analyze(&vec![0.0; BLOCK_LEN]).unwrap();
        assert!(spectrum.magnitudes.iter().all(|&m| m == 0.0));
        // zero rotation never satisfies the negative-real condition
        assert!(spectrum.phase_changed.iter().all(|&flag| flag));
    }

    #[test]
    fn test_magnitude_scales_with_amplitude() {
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        let loud = analyzer.analyze(&tone_block(DEFAULT_TONES[3], 0.4, 0)).unwrap();
        analyzer.reset();
        let quiet = analyzer.analyze(&tone_block(DEFAULT_TONES[3], 0.1, 0)).unwrap();

        // power ratio of a 4x amplitude change
        let ratio = loud.magnitudes[3] / quiet.magnitudes[3];
        assert!((ratio - 16.0).abs() < 0.1, "ratio {}", ratio);
    }

    #[test]
    fn test_steady_tone_phase_is_stable() {
        // each default tone advances half a cycle per block, so a
        // phase-continuous tone rotates by pi and keeps the flag clear
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        let freq = DEFAULT_TONES[2];
        analyzer.analyze(&tone_block(freq, 0.5, 0)).unwrap();
        for block in 1..4 {
            let spectrum = analyzer
                .analyze(&tone_block(freq, 0.5, block * BLOCK_LEN))
                .unwrap();
            assert!(!spectrum.phase_changed[2], "block {}", block);
        }
    }

    #[test]
    fn test_phase_jump_is_flagged() {
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        let freq = DEFAULT_TONES[4];
        analyzer.analyze(&tone_block(freq, 0.5, 0)).unwrap();
        // restart at sample 0 instead of continuing: a half-cycle jump
        let spectrum = analyzer.analyze(&tone_block(freq, 0.5, 0)).unwrap();
        assert!(spectrum.phase_changed[4]);
    }

    #[test]
    fn test_wrong_block_size() {
        let mut analyzer = SpectralAnalyzer::new(&ModemConfig::default()).unwrap();
        let result = analyzer.analyze(&[0.0; 100]);
        assert_eq!(
            result,
            Err(AudioModemError::InvalidInputSize {
                expected: BLOCK_LEN,
                actual: 100
            })
        );
    }
}
