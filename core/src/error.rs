use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AudioModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input size: expected {expected}, got {actual}")]
    InvalidInputSize { expected: usize, actual: usize },

    #[error("Generator not ready: {remaining} samples left in current slot")]
    GeneratorBusy { remaining: usize },

    #[error("Tone index {0} out of range")]
    InvalidToneIndex(usize),

    #[error("Symbol value {0} out of range")]
    InvalidSymbol(u8),

    #[error("Too many erasures: {count} (max {max})")]
    TooManyErasures { count: usize, max: usize },

    #[error("Reed-Solomon decode failure")]
    FecDecodeFailure,
}

pub type Result<T> = std::result::Result<T, AudioModemError>;
