use log::{debug, trace};

use crate::analyzer::{SpectralAnalyzer, Spectrum};
use crate::config::ModemConfig;
use crate::error::Result;
use crate::payload::{validate_payload, Payload, PayloadDisplay};
use crate::symbols::{cross_lookup, ScoringTable, START_SYMBOL, START_TABLE, START_TONES};
use crate::tracker::EnergyTracker;
use crate::{MAX_PHASE_CHANGE, RS_PARITY, TONE_SLOTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitingSync,
    Decoding,
}

/// Result of processing one analysis block
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BlockReport {
    /// Value decoded on this block, if any
    pub value: Option<u32>,
    /// Level meter reading in 0.0..=1.0
    pub level: f32,
    /// Start marker recognised on this block
    pub synced: bool,
}

/// Streaming receiver: spectral analysis, energy tracking and the
/// sync/decode state machine, one block at a time.
///
/// All buffers are sized at construction; processing a block never
/// allocates.
pub struct Decoder {
    config: ModemConfig,
    analyzer: SpectralAnalyzer,
    tracker: EnergyTracker,
    state: DecoderState,
    cooldown: usize,
    previous: Option<Payload>,
    scoring: ScoringTable,
    pending: Vec<f32>,
}

impl Decoder {
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            analyzer: SpectralAnalyzer::new(&config)?,
            tracker: EnergyTracker::new(&config)?,
            state: DecoderState::AwaitingSync,
            cooldown: 0,
            previous: None,
            scoring: ScoringTable::default(),
            pending: Vec::with_capacity(config.block_len),
            config,
        })
    }

    /// Accept samples in chunks of any size. Whole blocks are processed as
    /// they complete and a partial tail is kept for the next call. Returns
    /// every value decoded during this call, oldest first.
    pub fn feed(&mut self, mut samples: &[f32]) -> Vec<u32> {
        let block_len = self.config.block_len;
        let mut decoded = Vec::new();

        while !samples.is_empty() {
            let report = if self.pending.is_empty() && samples.len() >= block_len {
                let (block, rest) = samples.split_at(block_len);
                samples = rest;
                self.process_block(block)
            } else {
                let needed = block_len - self.pending.len();
                let take = needed.min(samples.len());
                self.pending.extend_from_slice(&samples[..take]);
                samples = &samples[take..];
                if self.pending.len() < block_len {
                    break;
                }

                let block = std::mem::take(&mut self.pending);
                let report = self.process_block(&block);
                self.pending = block;
                self.pending.clear();
                report
            };

            if let Ok(BlockReport { value: Some(value), .. }) = report {
                decoded.push(value);
            }
        }

        decoded
    }

    /// Process exactly one block of `block_len` samples
    pub fn process_block(&mut self, samples: &[f32]) -> Result<BlockReport> {
        let spectrum = self.analyzer.analyze(samples)?;
        Ok(self.process_spectrum(&spectrum))
    }

    /// Run the tracker and state machine on an already analyzed block
    pub fn process_spectrum(&mut self, spectrum: &Spectrum) -> BlockReport {
        let level = self.tracker.update(spectrum);
        let mut report = BlockReport {
            value: None,
            level,
            synced: false,
        };

        if self.cooldown > 0 {
            self.cooldown -= 1;
            return report;
        }

        if !self.detect_start() {
            return report;
        }

        report.synced = true;
        self.state = DecoderState::Decoding;
        debug!("start marker at history index {}", self.tracker.oldest());

        report.value = self.decode_attempt();
        self.state = DecoderState::AwaitingSync;

        if let Some(value) = report.value {
            debug!("decoded {:08X}", value);
            self.cooldown = self.tracker.capacity();
        }

        report
    }

    /// Start marker check: a rise of the first start tone at the oldest
    /// block and of the second one symbol period later, confirmed by the
    /// rankings of both blocks.
    fn detect_start(&self) -> bool {
        let period = self.tracker.frames_per_symbol();
        let first = self.tracker.frame(self.tracker.oldest());
        let second = self.tracker.frame(self.tracker.oldest() + period);

        if first.diff[START_TONES.0] <= self.config.min_peak
            || second.diff[START_TONES.1] <= self.config.min_peak
        {
            return false;
        }

        cross_lookup(&START_TABLE, first.top, second.top)
            .iter()
            .any(|&symbol| symbol == Some(START_SYMBOL))
    }

    fn decode_attempt(&mut self) -> Option<u32> {
        let start = self.tracker.oldest();
        self.previous = None;

        for offset in 0..self.tracker.frames_per_symbol() {
            if !self.fill_scoring(start + offset) {
                debug!("offset {}: too many phase changes", offset);
                break;
            }
            self.scoring.correct_overlaps();

            let candidate = match self.scoring.vote(RS_PARITY) {
                Some(candidate) => candidate,
                None => {
                    debug!("offset {}: too many erasures", offset);
                    continue;
                }
            };
            debug!("offset {}: candidate {}", offset, PayloadDisplay(&candidate));

            if let Some(previous) = &self.previous {
                let differing = previous
                    .iter()
                    .zip(candidate.iter())
                    .filter(|(a, b)| a != b)
                    .count();
                if differing <= self.config.max_payload_diff {
                    if let Some(value) = validate_payload(&candidate) {
                        return Some(value);
                    }
                } else {
                    trace!("offset {}: {} positions differ from previous", offset, differing);
                }
            }
            self.previous = Some(candidate);
        }

        None
    }

    /// Read the history at symbol-period strides from `start`. Returns false
    /// once the leading tones flip phase too often.
    fn fill_scoring(&mut self, start: usize) -> bool {
        let period = self.tracker.frames_per_symbol();
        let mut phase_changes = 0;

        for slot in 0..TONE_SLOTS {
            let frame = self.tracker.frame(start + period * slot);
            if frame.phase_changed[frame.top[0]] {
                phase_changes += 1;
                if phase_changes > MAX_PHASE_CHANGE {
                    return false;
                }
            }
            self.scoring.set_slot(
                slot,
                frame.top,
                [frame.power[frame.top[0]], frame.power[frame.top[1]]],
            );
        }

        true
    }

    /// State between calls. A whole decode attempt runs inside the block
    /// that recognised the start marker, so this always reads
    /// `AwaitingSync` here; `BlockReport::synced` marks the transition.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Blocks left before detection resumes
    pub fn cooldown(&self) -> usize {
        self.cooldown
    }

    pub fn level(&self) -> f32 {
        self.tracker.level()
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.analyzer.reset();
        self.tracker.reset();
        self.state = DecoderState::AwaitingSync;
        self.cooldown = 0;
        self.previous = None;
        self.pending.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(ModemConfig::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Transmitter;
    use crate::payload::build_tone_sequence;
    use crate::BLOCK_LEN;

    fn spectrum_for_tone(tone: usize) -> Spectrum {
        let mut spectrum = Spectrum::default();
        spectrum.magnitudes[tone] = 1.0;
        spectrum
    }

    fn run_trace(
        decoder: &mut Decoder,
        value: u32,
        lead: usize,
        tail: usize,
    ) -> Vec<(usize, BlockReport)> {
        let sequence = build_tone_sequence(value).unwrap();
        let mut spectra = vec![Spectrum::default(); lead];
        for &tone in &sequence {
            for _ in 0..4 {
                spectra.push(spectrum_for_tone(tone));
            }
        }
        spectra.extend(vec![Spectrum::default(); tail]);

        spectra
            .iter()
            .enumerate()
            .map(|(i, s)| (i, decoder.process_spectrum(s)))
            .collect()
    }

    #[test]
    fn test_decodes_fabricated_trace() {
        let mut decoder = Decoder::default();
        let reports = run_trace(&mut decoder, 0xABCDEFAB, 10, 200);

        let decoded: Vec<_> = reports
            .iter()
            .filter_map(|(i, r)| r.value.map(|v| (*i, v)))
            .collect();
        assert_eq!(decoded, vec![(133, 0xABCDEFAB)]);
        assert_eq!(decoder.state(), DecoderState::AwaitingSync);
    }

    #[test]
    fn test_cooldown_after_decode() {
        let mut decoder = Decoder::default();
        let sequence = build_tone_sequence(0x00000042).unwrap();
        let mut decoded_at = None;
        let mut block = 0;
        for &tone in &sequence {
            for _ in 0..4 {
                if decoder.process_spectrum(&spectrum_for_tone(tone)).value.is_some() {
                    decoded_at = Some(block);
                }
                block += 1;
            }
        }
        for _ in 0..4 {
            if decoder.process_spectrum(&Spectrum::default()).value.is_some() {
                decoded_at = Some(block);
            }
            block += 1;
        }

        assert_eq!(decoded_at, Some(123));
        assert_eq!(decoder.cooldown(), 124);
        decoder.process_spectrum(&Spectrum::default());
        assert_eq!(decoder.cooldown(), 123);
    }

    #[test]
    fn test_silence_never_syncs() {
        let mut decoder = Decoder::default();
        for _ in 0..500 {
            let report = decoder.process_spectrum(&Spectrum::default());
            assert!(!report.synced);
            assert_eq!(report.value, None);
        }
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut decoder = Decoder::default();
        // stop on the decode block, before the cooldown runs out
        let reports = run_trace(&mut decoder, 0x00C0FFEE, 0, 4);
        assert_eq!(reports.last().and_then(|(_, r)| r.value), Some(0x00C0FFEE));
        assert_eq!(decoder.cooldown(), 124);
        decoder.reset();
        assert_eq!(decoder.cooldown(), 0);
        assert_eq!(decoder.level(), 0.0);
        assert_eq!(decoder.state(), DecoderState::AwaitingSync);
    }

    #[test]
    fn test_feed_odd_chunks() {
        let mut tx = Transmitter::new(&ModemConfig::default(), 0.5).unwrap();
        let mut audio = vec![0.0f32; 1234];
        audio.extend(tx.render(0x57DF973B).unwrap());
        audio.extend(vec![0.0f32; BLOCK_LEN * 140]);

        let mut decoder = Decoder::default();
        let mut decoded = Vec::new();
        for chunk in audio.chunks(1000) {
            decoded.extend(decoder.feed(chunk));
        }
        assert_eq!(decoded, vec![0x57DF973B]);
    }

    #[test]
    fn test_feed_whole_recording_returns_every_value() {
        let mut tx = Transmitter::new(&ModemConfig::default(), 0.5).unwrap();
        let mut audio = vec![0.0f32; 300];
        audio.extend(tx.render(0x11111111).unwrap());
        audio.extend(vec![0.0f32; BLOCK_LEN * 140]);
        audio.extend(tx.render(0x22222222).unwrap());
        audio.extend(vec![0.0f32; BLOCK_LEN * 140]);

        let mut decoder = Decoder::default();
        assert_eq!(decoder.feed(&audio), vec![0x11111111, 0x22222222]);
        assert!(decoder.feed(&[0.0; 100]).is_empty());
    }

    #[test]
    fn test_process_block_rejects_wrong_size() {
        let mut decoder = Decoder::default();
        assert!(decoder.process_block(&[0.0; 10]).is_err());
    }
}
