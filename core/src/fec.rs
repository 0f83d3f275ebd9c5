use crate::error::{AudioModemError, Result};
use crate::rs16::ReedSolomon16;
use crate::{RS_DATA, RS_FIRST_ROOT, RS_PARITY, RS_TOTAL};

/// Codeword layout: `RS_DATA` message nibbles followed by `RS_PARITY` check
/// nibbles, all values in 0..=15.
pub type Codeword = [u8; RS_TOTAL];

pub struct FecEncoder {
    rs: ReedSolomon16,
}

pub struct FecDecoder {
    rs: ReedSolomon16,
}

impl FecEncoder {
    pub fn new() -> Result<Self> {
        let rs = ReedSolomon16::new(RS_PARITY, RS_FIRST_ROOT)?;
        Ok(Self { rs })
    }

    /// Parity nibbles only
    pub fn parity(&self, message: &[u8; RS_DATA]) -> Result<[u8; RS_PARITY]> {
        let mut parity = [0u8; RS_PARITY];
        self.rs.encode_parity(message, &mut parity)?;
        Ok(parity)
    }
}

impl FecDecoder {
    pub fn new() -> Result<Self> {
        let rs = ReedSolomon16::new(RS_PARITY, RS_FIRST_ROOT)?;
        Ok(Self { rs })
    }

    /// Decode with known bad positions marked as erasures.
    ///
    /// Erased symbols may hold any value. Up to RS_PARITY erasures can be
    /// filled, fewer when unknown errors are also present; with no erasures
    /// up to RS_PARITY / 2 unknown errors are corrected.
    pub fn decode_with_erasures(
        &self,
        codeword: &Codeword,
        erasures: &[usize],
    ) -> Result<[u8; RS_DATA]> {
        if erasures.len() > RS_PARITY {
            return Err(AudioModemError::TooManyErasures {
                count: erasures.len(),
                max: RS_PARITY,
            });
        }

        let mut work = *codeword;
        self.rs.decode(&mut work, erasures)?;

        let mut message = [0u8; RS_DATA];
        message.copy_from_slice(&work[..RS_DATA]);
        Ok(message)
    }
}
