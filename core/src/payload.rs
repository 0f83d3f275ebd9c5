use std::fmt;

use log::debug;

use crate::crc::{crc8_hex, hex_digits};
use crate::error::Result;
use crate::fec::{FecDecoder, FecEncoder};
use crate::symbols::{tones_for_symbol, START_TONES};
use crate::{CRC_LEN, DATA_LEN, PAYLOAD_LEN, RS_DATA, RS_PARITY, RS_TOTAL, TONE_SLOTS};

/// Received payload in transmit order: parity, checksum, data. `None`
/// marks an erased symbol.
pub type Payload = [Option<u8>; PAYLOAD_LEN];

/// Tone index for every slot of one transmission, start marker first
pub type ToneSequence = [usize; TONE_SLOTS];

// Field offsets inside a payload
const PARITY_OFFSET: usize = 0;
const CRC_OFFSET: usize = PARITY_OFFSET + RS_PARITY;
const DATA_OFFSET: usize = CRC_OFFSET + CRC_LEN;

// Field offsets inside the RS codeword; the slot after the checksum is a
// zero pad filling the message to RS_DATA symbols
const CODEWORD_DATA: usize = 0;
const CODEWORD_CRC: usize = CODEWORD_DATA + DATA_LEN;
const CODEWORD_PARITY: usize = RS_DATA;

/// Displays a payload as hex nibbles with `?` for erasures
pub struct PayloadDisplay<'a>(pub &'a Payload);

impl fmt::Display for PayloadDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in self.0.iter() {
            match symbol {
                Some(v) => write!(f, "{:X}", v)?,
                None => write!(f, "?")?,
            }
        }
        Ok(())
    }
}

/// Map a payload index to its RS codeword position
fn codeword_position(index: usize) -> usize {
    if index >= DATA_OFFSET {
        CODEWORD_DATA + index - DATA_OFFSET
    } else if index >= CRC_OFFSET {
        CODEWORD_CRC + index - CRC_OFFSET
    } else {
        CODEWORD_PARITY + index - PARITY_OFFSET
    }
}

/// Payload symbols for `value` in transmit order
pub fn build_payload(value: u32) -> Result<[u8; PAYLOAD_LEN]> {
    let crc = crc8_hex(value);

    let mut message = [0u8; RS_DATA];
    for (i, nibble) in message[CODEWORD_DATA..CODEWORD_CRC].iter_mut().enumerate() {
        *nibble = ((value >> (28 - 4 * i)) & 0x0F) as u8;
    }
    message[CODEWORD_CRC] = crc >> 4;
    message[CODEWORD_CRC + 1] = crc & 0x0F;

    let parity = FecEncoder::new()?.parity(&message)?;

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[PARITY_OFFSET..CRC_OFFSET].copy_from_slice(&parity);
    payload[CRC_OFFSET..DATA_OFFSET].copy_from_slice(&message[CODEWORD_CRC..CODEWORD_CRC + CRC_LEN]);
    payload[DATA_OFFSET..].copy_from_slice(&message[CODEWORD_DATA..CODEWORD_CRC]);
    Ok(payload)
}

/// Tone slots for `value`: the start marker, then each payload symbol as
/// its two tones.
pub fn build_tone_sequence(value: u32) -> Result<ToneSequence> {
    let payload = build_payload(value)?;

    let mut sequence = [0usize; TONE_SLOTS];
    sequence[0] = START_TONES.0;
    sequence[1] = START_TONES.1;
    for (i, &symbol) in payload.iter().enumerate() {
        let (a, b) = tones_for_symbol(symbol)?;
        sequence[2 * (i + 1)] = a;
        sequence[2 * (i + 1) + 1] = b;
    }
    Ok(sequence)
}

/// Check a voted payload with FEC and checksum.
///
/// Returns the value only when the codeword decodes, the checksum matches
/// and the value is non-zero. Every rejection looks the same to the caller.
pub fn validate_payload(payload: &Payload) -> Option<u32> {
    let mut codeword = [0u8; RS_TOTAL];
    let mut erasures = [0usize; PAYLOAD_LEN];
    let mut erasure_count = 0;

    for (i, symbol) in payload.iter().enumerate() {
        let pos = codeword_position(i);
        match symbol {
            Some(v) => codeword[pos] = *v,
            None => {
                erasures[erasure_count] = pos;
                erasure_count += 1;
                if erasure_count > RS_PARITY {
                    debug!("rejected {}: too many erasures", PayloadDisplay(payload));
                    return None;
                }
            }
        }
    }

    let decoder = match FecDecoder::new() {
        Ok(decoder) => decoder,
        Err(e) => {
            debug!("rejected {}: {}", PayloadDisplay(payload), e);
            return None;
        }
    };
    let message = match decoder.decode_with_erasures(&codeword, &erasures[..erasure_count]) {
        Ok(message) => message,
        Err(e) => {
            debug!("rejected {}: {}", PayloadDisplay(payload), e);
            return None;
        }
    };

    let value = message[CODEWORD_DATA..CODEWORD_CRC]
        .iter()
        .fold(0u32, |acc, &nibble| (acc << 4) | nibble as u32);
    let checksum = (message[CODEWORD_CRC] << 4) | message[CODEWORD_CRC + 1];

    if value == 0 {
        debug!("rejected {}: zero value", PayloadDisplay(payload));
        return None;
    }
    let expected = crc8_hex(value);
    if expected != checksum {
        debug!(
            "rejected {}: checksum {:02X} != {:02X} for {}",
            PayloadDisplay(payload),
            checksum,
            expected,
            String::from_utf8_lossy(&hex_digits(value))
        );
        return None;
    }

    debug!("accepted {} as {:08X}", PayloadDisplay(payload), value);
    Some(value)
}
