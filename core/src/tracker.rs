use crate::analyzer::Spectrum;
use crate::config::ModemConfig;
use crate::error::Result;
use crate::TONE_COUNT;

/// Level reported on the second of two consecutive full-scale readings
const DECIMATED_LEVEL: f32 = 0.8;

/// One analysis block as kept in the test history
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TestFrame {
    /// Strongest and runner-up tone by power
    pub top: [usize; 2],
    /// Rolling sum plus its delta, per tone
    pub power: [f32; TONE_COUNT],
    /// Change of the rolling sum on this block, per tone
    pub diff: [f32; TONE_COUNT],
    pub phase_changed: [bool; TONE_COUNT],
}

/// Rolling per-tone energy over one symbol period, plus a ring of the last
/// `history_len` blocks' rankings for sync detection and decoding.
pub struct EnergyTracker {
    magnitudes: Vec<[f32; TONE_COUNT]>,
    sums: Vec<[f32; TONE_COUNT]>,
    frame_index: usize,
    history: Vec<TestFrame>,
    test_index: usize,
    level: f32,
    level_full_scale: f32,
}

impl EnergyTracker {
    pub fn new(config: &ModemConfig) -> Result<Self> {
        config.validate()?;
        let period = config.frames_per_symbol;
        Ok(Self {
            magnitudes: vec![[0.0; TONE_COUNT]; period],
            sums: vec![[0.0; TONE_COUNT]; period],
            frame_index: 0,
            history: vec![TestFrame::default(); config.history_len()],
            test_index: 0,
            level: 0.0,
            level_full_scale: config.level_full_scale,
        })
    }

    /// Fold one block's spectrum into the rolling sums and the history.
    /// Returns the level meter reading for the block.
    pub fn update(&mut self, spectrum: &Spectrum) -> f32 {
        let period = self.sums.len();
        let fi = self.frame_index;
        let prev = (fi + period - 1) % period;

        let frame = &mut self.history[self.test_index];
        let mut activity = 0.0f32;
        for tone in 0..TONE_COUNT {
            let mag = spectrum.magnitudes[tone];
            let sum = self.sums[prev][tone] - self.magnitudes[fi][tone] + mag;
            self.sums[fi][tone] = sum;
            self.magnitudes[fi][tone] = mag;

            let diff = sum - self.sums[prev][tone];
            frame.diff[tone] = diff;
            frame.power[tone] = sum + diff;
            frame.phase_changed[tone] = spectrum.phase_changed[tone];
            activity += diff.abs();
        }
        frame.top = rank_top_two(&frame.power);

        self.frame_index = (fi + 1) % period;
        self.test_index = (self.test_index + 1) % self.history.len();

        let mut level = (activity / self.level_full_scale).min(1.0);
        if level == 1.0 && self.level == 1.0 {
            level = DECIMATED_LEVEL;
        }
        self.level = level;
        level
    }

    /// Index of the oldest block in the history, which is also where the
    /// next block will be written
    pub fn oldest(&self) -> usize {
        self.test_index
    }

    /// History entry at `index`, wrapping around the ring
    pub fn frame(&self, index: usize) -> &TestFrame {
        &self.history[index % self.history.len()]
    }

    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    pub fn frames_per_symbol(&self) -> usize {
        self.sums.len()
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Rolling sum of `tone` at the most recent block
    pub fn rolling_sum(&self, tone: usize) -> f32 {
        let period = self.sums.len();
        self.sums[(self.frame_index + period - 1) % period][tone]
    }

    pub fn reset(&mut self) {
        for row in self.magnitudes.iter_mut().chain(self.sums.iter_mut()) {
            *row = [0.0; TONE_COUNT];
        }
        self.history.fill(TestFrame::default());
        self.frame_index = 0;
        self.test_index = 0;
        self.level = 0.0;
    }
}

/// Strongest tone and runner-up. Ties go to the lower index and the
/// runner-up never repeats the leader.
fn rank_top_two(power: &[f32; TONE_COUNT]) -> [usize; 2] {
    let mut first = 0;
    let mut best = f32::MIN;
    for (i, &p) in power.iter().enumerate() {
        if p > best {
            best = p;
            first = i;
        }
    }

    let mut second = 0;
    best = f32::MIN;
    for (i, &p) in power.iter().enumerate() {
        if i != first && p > best {
            best = p;
            second = i;
        }
    }

    [first, second]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_with(tone: usize, mag: f32) -> Spectrum {
        let mut spectrum = Spectrum::default();
        spectrum.magnitudes[tone] = mag;
        spectrum
    }

    #[test]
    fn test_rolling_sum_invariant() {
        let mut tracker = EnergyTracker::new(&ModemConfig::default()).unwrap();
        let mags = [0.5, 1.0, 0.25, 2.0, 0.0, 1.5, 0.75, 0.1, 3.0];
        for (n, &mag) in mags.iter().enumerate() {
            tracker.update(&spectrum_with(2, mag));
            let start = n.saturating_sub(3);
            let expected: f32 = mags[start..=n].iter().sum();
            assert!((tracker.rolling_sum(2) - expected).abs() < 1e-5, "block {}", n);
        }
    }

    #[test]
    fn test_power_and_diff() {
        let mut tracker = EnergyTracker::new(&ModemConfig::default()).unwrap();
        tracker.update(&spectrum_with(4, 1.0));
        tracker.update(&spectrum_with(4, 1.0));
        let frame = tracker.frame(1);
        // sum 2, diff 1, power 3
        assert_eq!(frame.diff[4], 1.0);
        assert_eq!(frame.power[4], 3.0);
        assert_eq!(frame.top[0], 4);
    }

    #[test]
    fn test_rank_ties_prefer_lower_index() {
        assert_eq!(rank_top_two(&[0.0; TONE_COUNT]), [0, 1]);
        assert_eq!(rank_top_two(&[1.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0]), [1, 2]);
        assert_eq!(rank_top_two(&[5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]), [0, 6]);
    }

    #[test]
    fn test_history_ring_wraps() {
        let config = ModemConfig::default();
        let mut tracker = EnergyTracker::new(&config).unwrap();
        let capacity = config.history_len();
        for _ in 0..capacity + 3 {
            tracker.update(&Spectrum::default());
        }
        assert_eq!(tracker.capacity(), capacity);
        assert_eq!(tracker.oldest(), 3);
        assert_eq!(tracker.frames_per_symbol(), config.frames_per_symbol);
    }

    #[test]
    fn test_level_meter() {
        let mut tracker = EnergyTracker::new(&ModemConfig::default()).unwrap();
        assert_eq!(tracker.update(&spectrum_with(0, 5.0)), 0.2);

        // full scale twice in a row is decimated on the second reading
        let loud = spectrum_with(0, 100.0);
        assert_eq!(tracker.update(&loud), 1.0);
        let mut next = loud;
        next.magnitudes[1] = 100.0;
        assert_eq!(tracker.update(&next), 0.8);
        next.magnitudes[2] = 100.0;
        assert_eq!(tracker.update(&next), 1.0);
        assert_eq!(tracker.level(), 1.0);
    }

    #[test]
    fn test_reset() {
        let mut tracker = EnergyTracker::new(&ModemConfig::default()).unwrap();
        tracker.update(&spectrum_with(3, 2.0));
        tracker.reset();
        assert_eq!(tracker.oldest(), 0);
        assert_eq!(tracker.rolling_sum(3), 0.0);
        assert_eq!(tracker.level(), 0.0);
        assert_eq!(*tracker.frame(0), TestFrame::default());
    }
}
