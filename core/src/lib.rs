//! Acoustic tone-pair modem for short numeric codes
//!
//! Encodes a 32-bit value as a sequence of near-ultrasonic tones (two tone
//! slots per 4-bit symbol) protected by RS(15,11) over GF(16) and a CRC-8,
//! and decodes it back from a live block-by-block audio stream.

pub mod error;
pub mod config;
pub mod crc;
pub mod rs16;
pub mod fec;
pub mod window;
pub mod analyzer;
pub mod symbols;
pub mod tracker;
pub mod payload;
pub mod generator;
pub mod encoder;
pub mod decoder;

pub use analyzer::{SpectralAnalyzer, Spectrum};
pub use config::ModemConfig;
pub use decoder::{BlockReport, Decoder, DecoderState};
pub use encoder::Transmitter;
pub use error::{AudioModemError, Result};
pub use generator::{GeneratorStep, ToneGenerator};
pub use payload::{build_tone_sequence, validate_payload, Payload, ToneSequence};

// Audio defaults
pub const SAMPLE_RATE: f32 = 44100.0;
pub const BLOCK_LEN: usize = 525; // 44100 / 525 = 84 Hz per bin
pub const FRAMES_PER_SYMBOL: usize = 4; // blocks per tone slot
pub const KAISER_ALPHA: f32 = 2.5;

// Tone set
pub const TONE_COUNT: usize = 7;
pub const DEFAULT_TONES: [f32; TONE_COUNT] = [
    18102.0, 18270.0, 18438.0, 18606.0, 18774.0, 18942.0, 19110.0,
];

// FEC configuration: RS(15,11) over GF(2^4)
pub const RS_SYMBOL_BITS: usize = 4;
pub const RS_PARITY: usize = 4;
pub const RS_TOTAL: usize = (1 << RS_SYMBOL_BITS) - 1; // 15
pub const RS_DATA: usize = RS_TOTAL - RS_PARITY; // 11
pub const RS_FIELD_POLY: u8 = 0x13;
pub const RS_FIRST_ROOT: usize = 1;

// Payload layout
pub const START_LEN: usize = 1;
pub const CRC_LEN: usize = 2;
pub const DATA_LEN: usize = 8; // hex digits of a u32
pub const PAYLOAD_LEN: usize = RS_PARITY + CRC_LEN + DATA_LEN; // 14
pub const TONE_SLOTS: usize = 2 * (START_LEN + PAYLOAD_LEN); // 30
pub const HISTORY_SLOTS: usize = TONE_SLOTS + 1; // one slot of alignment padding

// Detection tuning
pub const MIN_PEAK: f32 = 0.003;
pub const MAX_PAYLOAD_DIFF: usize = 4;
pub const MAX_PHASE_CHANGE: usize = TONE_SLOTS / 2;
pub const LEVEL_FULL_SCALE: f32 = 25.0;
