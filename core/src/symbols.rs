//! Tone-pair alphabet and the voting logic that turns per-slot tone
//! rankings back into payload symbols.
//!
//! Every symbol occupies two consecutive tone slots: tone `a` then tone `b`
//! with `a < b`. Both lookup tables are therefore populated strictly above
//! the diagonal.

use crate::error::{AudioModemError, Result};
use crate::payload::Payload;
use crate::{PAYLOAD_LEN, TONE_COUNT, TONE_SLOTS};

pub type SymbolTable = [[Option<u8>; TONE_COUNT]; TONE_COUNT];

/// Start marker value
pub const START_SYMBOL: u8 = 0;

/// Tone pair of the start marker: lowest then highest tone
pub const START_TONES: (usize, usize) = (0, TONE_COUNT - 1);

/// Tone pair for each data nibble 0x0..=0xF
pub const DATA_TONES: [(usize, usize); 16] = [
    (0, 1),
    (5, 6),
    (1, 2),
    (4, 5),
    (2, 3),
    (3, 4),
    (0, 2),
    (4, 6),
    (1, 3),
    (3, 5),
    (2, 4),
    (0, 3),
    (3, 6),
    (1, 4),
    (2, 5),
    (0, 4),
];

const fn start_table() -> SymbolTable {
    let mut table = [[None; TONE_COUNT]; TONE_COUNT];
    table[START_TONES.0][START_TONES.1] = Some(START_SYMBOL);
    table
}

const fn data_table() -> SymbolTable {
    let mut table = [[None; TONE_COUNT]; TONE_COUNT];
    let mut value = 0;
    while value < DATA_TONES.len() {
        let (a, b) = DATA_TONES[value];
        table[a][b] = Some(value as u8);
        value += 1;
    }
    table
}

pub static START_TABLE: SymbolTable = start_table();
pub static DATA_TABLE: SymbolTable = data_table();

pub fn lookup(table: &SymbolTable, first: usize, second: usize) -> Option<u8> {
    table
        .get(first)
        .and_then(|row| row.get(second))
        .copied()
        .flatten()
}

/// All four cross combinations of two ranked slots, in the order
/// (1st,1st), (1st,2nd), (2nd,1st), (2nd,2nd).
pub fn cross_lookup(table: &SymbolTable, first: [usize; 2], second: [usize; 2]) -> [Option<u8>; 4] {
    [
        lookup(table, first[0], second[0]),
        lookup(table, first[0], second[1]),
        lookup(table, first[1], second[0]),
        lookup(table, first[1], second[1]),
    ]
}

/// Tone pair carrying a data nibble
pub fn tones_for_symbol(value: u8) -> Result<(usize, usize)> {
    DATA_TONES
        .get(value as usize)
        .copied()
        .ok_or(AudioModemError::InvalidSymbol(value))
}

/// Per tone slot: the two strongest tones and their powers, read across one
/// whole transmission at symbol-period strides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringTable {
    pub top: [[usize; TONE_SLOTS]; 2],
    pub energy: [[f32; TONE_SLOTS]; 2],
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self {
            top: [[0; TONE_SLOTS]; 2],
            energy: [[0.0; TONE_SLOTS]; 2],
        }
    }
}

impl ScoringTable {
    pub fn set_slot(&mut self, slot: usize, top: [usize; 2], energy: [f32; 2]) {
        self.top[0][slot] = top[0];
        self.top[1][slot] = top[1];
        self.energy[0][slot] = energy[0];
        self.energy[1][slot] = energy[1];
    }

    /// Undo tone bleed inside a symbol: when both slots of a pair rank the
    /// same tone first, the second slot's runner-up becomes its leader.
    pub fn correct_overlaps(&mut self) {
        for i in (0..TONE_SLOTS - 1).step_by(2) {
            if self.top[0][i] == self.top[0][i + 1] {
                self.top[0][i + 1] = self.top[1][i + 1];
                self.top[1][i + 1] = self.top[0][i];
                let leader = self.energy[0][i + 1];
                self.energy[0][i + 1] = self.energy[1][i + 1];
                self.energy[1][i + 1] = leader;
            }
        }
    }

    /// Resolve one symbol from the tone slots `slot` and `slot + 1`.
    pub fn resolve(&self, slot: usize) -> Option<u8> {
        let [t1, t2, t3, t4] = cross_lookup(
            &DATA_TABLE,
            [self.top[0][slot], self.top[1][slot]],
            [self.top[0][slot + 1], self.top[1][slot + 1]],
        );

        if t1.is_some() {
            return t1;
        }
        match (t2, t3) {
            (Some(_), None) => t2,
            (None, Some(_)) => t3,
            (Some(_), Some(_)) => {
                let e2 = self.energy[0][slot] + self.energy[1][slot + 1];
                let e3 = self.energy[1][slot] + self.energy[0][slot + 1];
                if e2 >= e3 {
                    t2
                } else {
                    t3
                }
            }
            (None, None) => t4,
        }
    }

    /// Vote the payload symbols that follow the start marker.
    ///
    /// Returns `None` once more than `max_erasures` slots fail to resolve.
    pub fn vote(&self, max_erasures: usize) -> Option<Payload> {
        let mut payload: Payload = [None; PAYLOAD_LEN];
        let mut erasures = 0;

        for (i, symbol) in payload.iter_mut().enumerate() {
            *symbol = self.resolve(2 * (i + 1));
            if symbol.is_none() {
                erasures += 1;
                if erasures > max_erasures {
                    return None;
                }
            }
        }

        Some(payload)
    }
}
