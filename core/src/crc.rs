use std::sync::OnceLock;

/// CRC-8 polynomial x^8 + x^2 + x + 1 (0x107, high bit implied)
const POLYNOMIAL: u8 = 0x07;
const INITIAL: u8 = 0x00;

static CRC8_TABLE: OnceLock<[u8; 256]> = OnceLock::new();

fn crc8_step(mut crc: u8) -> u8 {
    for _ in 0..8 {
        if (crc & 0x80) != 0 {
            crc = (crc << 1) ^ POLYNOMIAL;
        } else {
            crc <<= 1;
        }
    }
    crc
}

fn table() -> &'static [u8; 256] {
    CRC8_TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        for (byte, entry) in table.iter_mut().enumerate() {
            *entry = crc8_step(byte as u8);
        }
        table
    })
}

/// Bitwise CRC-8
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = INITIAL;
    for &byte in data {
        crc = crc8_step(crc ^ byte);
    }
    crc
}

/// Table-driven CRC-8. The lookup table is built on first use and shared
/// process-wide.
pub fn crc8_table(data: &[u8]) -> u8 {
    let table = table();
    data.iter()
        .fold(INITIAL, |crc, &byte| table[(crc ^ byte) as usize])
}

/// Render `value` as 8 uppercase hex digits without allocating
pub fn hex_digits(value: u32) -> [u8; 8] {
    let mut digits = [0u8; 8];
    for (i, digit) in digits.iter_mut().enumerate() {
        let nibble = ((value >> (28 - 4 * i)) & 0x0F) as u8;
        *digit = hex_char(nibble);
    }
    digits
}

/// ASCII character for a nibble, uppercase
pub fn hex_char(nibble: u8) -> u8 {
    if nibble < 0x0A {
        b'0' + nibble
    } else {
        b'A' + nibble - 0x0A
    }
}

/// Checksum carried alongside a transmitted value: CRC-8 of its 8-digit
/// uppercase hex rendering
pub fn crc8_hex(value: u32) -> u8 {
    crc8_table(&hex_digits(value))
}
