use log::warn;

use crate::config::ModemConfig;
use crate::error::{AudioModemError, Result};
use crate::payload::ToneSequence;
use crate::{TONE_COUNT, TONE_SLOTS};

/// Outcome of advancing the generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorStep {
    /// A new tone slot started at this carrier frequency (Hz)
    Tone(f32),
    /// The sequence is exhausted and the generator is idle again
    Finished,
}

/// Walks a tone sequence one slot at a time.
///
/// The generator only tracks which carrier should be playing and how many
/// samples of the current slot are still owed; the caller synthesizes the
/// samples and reports them through `consume`.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    tones: [f32; TONE_COUNT],
    samples_per_slot: usize,
    sequence: ToneSequence,
    position: Option<usize>,
    remaining: usize,
    carrier: f32,
}

impl ToneGenerator {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tones: config.tones,
            samples_per_slot: config.samples_per_slot(),
            sequence: [0; TONE_SLOTS],
            position: None,
            remaining: 0,
            carrier: 0.0,
        })
    }

    /// Replace the sequence and return to idle
    pub fn load(&mut self, sequence: ToneSequence) {
        self.sequence = sequence;
        self.reset();
    }

    /// Move to the next tone slot.
    ///
    /// Fails while samples of the current slot are still owed. Past the last
    /// slot the generator resets to idle and reports `Finished`.
    pub fn advance(&mut self) -> Result<GeneratorStep> {
        if self.remaining > 0 {
            warn!(
                "generator advanced with {} samples left in slot {:?}",
                self.remaining, self.position
            );
            return Err(AudioModemError::GeneratorBusy {
                remaining: self.remaining,
            });
        }

        let next = self.position.map_or(0, |p| p + 1);
        if next >= self.sequence.len() {
            self.reset();
            return Ok(GeneratorStep::Finished);
        }

        let tone = self.sequence[next];
        let carrier = match self.tones.get(tone) {
            Some(&freq) => freq,
            None => {
                warn!("tone index {} at slot {} is out of range", tone, next);
                return Err(AudioModemError::InvalidToneIndex(tone));
            }
        };

        self.position = Some(next);
        self.carrier = carrier;
        self.remaining = self.samples_per_slot;
        Ok(GeneratorStep::Tone(carrier))
    }

    /// Advance and report `(carrier, done)`
    pub fn next_step(&mut self) -> Result<(f32, bool)> {
        match self.advance()? {
            GeneratorStep::Tone(freq) => Ok((freq, false)),
            GeneratorStep::Finished => Ok((self.carrier, true)),
        }
    }

    /// Record `count` synthesized samples of the current slot
    pub fn consume(&mut self, count: usize) {
        self.remaining = self.remaining.saturating_sub(count);
    }

    pub fn carrier(&self) -> f32 {
        self.carrier
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn samples_per_slot(&self) -> usize {
        self.samples_per_slot
    }

    pub fn is_idle(&self) -> bool {
        self.position.is_none() && self.remaining == 0
    }

    pub fn reset(&mut self) {
        self.position = None;
        self.remaining = 0;
        self.carrier = 0.0;
    }
}
