use std::f64::consts::TAU;

use log::debug;

use crate::config::ModemConfig;
use crate::error::{AudioModemError, Result};
use crate::generator::{GeneratorStep, ToneGenerator};
use crate::payload::{build_tone_sequence, ToneSequence};
use crate::TONE_SLOTS;

/// Sine synthesizer driving a `ToneGenerator`.
///
/// Phase carries across slot boundaries, so every tone stays coherent from
/// one analysis block to the next.
pub struct Transmitter {
    generator: ToneGenerator,
    sample_rate: f64,
    amplitude: f32,
    phase: f64,
    active: bool,
}

impl Transmitter {
    pub fn new(config: &ModemConfig, amplitude: f32) -> Result<Self> {
        if !amplitude.is_finite() || amplitude <= 0.0 || amplitude > 1.0 {
            return Err(AudioModemError::InvalidConfig(format!(
                "amplitude must be within (0, 1], got {}",
                amplitude
            )));
        }
        Ok(Self {
            generator: ToneGenerator::new(config)?,
            sample_rate: config.sample_rate as f64,
            amplitude,
            phase: 0.0,
            active: false,
        })
    }

    /// Prepare a transmission of `value` and return its tone sequence
    pub fn begin(&mut self, value: u32) -> Result<ToneSequence> {
        let sequence = build_tone_sequence(value)?;
        debug!("transmitting {:08X} as tones {:?}", value, sequence);
        self.generator.load(sequence);
        self.phase = 0.0;
        self.active = true;
        Ok(sequence)
    }

    /// Synthesize into `out`. Returns the number of samples written, which
    /// is short of `out.len()` once the transmission ends.
    pub fn fill(&mut self, out: &mut [f32]) -> Result<usize> {
        let mut written = 0;

        while self.active {
            if self.generator.remaining() == 0 {
                if let GeneratorStep::Finished = self.generator.advance()? {
                    self.active = false;
                    break;
                }
            }
            if written == out.len() {
                break;
            }

            let count = self.generator.remaining().min(out.len() - written);
            let step = TAU * self.generator.carrier() as f64 / self.sample_rate;
            for sample in &mut out[written..written + count] {
                *sample = self.amplitude * self.phase.sin() as f32;
                self.phase += step;
                if self.phase >= TAU {
                    self.phase -= TAU;
                }
            }

            self.generator.consume(count);
            written += count;
        }

        Ok(written)
    }

    /// Whole transmission of `value` as one buffer
    pub fn render(&mut self, value: u32) -> Result<Vec<f32>> {
        self.begin(value)?;
        let mut samples = vec![0.0; self.generator.samples_per_slot() * TONE_SLOTS];
        let written = self.fill(&mut samples)?;
        samples.truncate(written);
        Ok(samples)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generator(&self) -> &ToneGenerator {
        &self.generator
    }
}
