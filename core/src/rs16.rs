//! Reed-Solomon codec over GF(2^4).
//!
//! Symbols are nibbles (0..=15) and a full codeword is 15 symbols. The
//! field tables are generated at compile time from the field polynomial,
//! and all working polynomials live in fixed-size stack buffers, so
//! decoding on the real-time path never touches the allocator.

use crate::error::{AudioModemError, Result};
use crate::RS_FIELD_POLY;

/// Size of the multiplicative group of GF(16)
const GF_MUL_ORDER: usize = 15;

/// Longest codeword over GF(16)
pub const MAX_CODEWORD: usize = GF_MUL_ORDER;

/// Room for the product of two codeword-sized polynomials
const MAX_POLY: usize = 2 * MAX_CODEWORD + 2;

const fn exp_table(poly: u8) -> [u8; 2 * GF_MUL_ORDER] {
    let mut table = [0u8; 2 * GF_MUL_ORDER];
    let mut x: u8 = 1;
    let mut i = 0;
    while i < GF_MUL_ORDER {
        table[i] = x;
        table[i + GF_MUL_ORDER] = x;
        x <<= 1;
        if x & 0x10 != 0 {
            x ^= poly;
        }
        i += 1;
    }
    table
}

const fn log_table(exp: &[u8; 2 * GF_MUL_ORDER]) -> [u8; 16] {
    // log(0) is undefined; 255 marks it
    let mut table = [u8::MAX; 16];
    let mut i = 0;
    while i < GF_MUL_ORDER {
        table[exp[i] as usize] = i as u8;
        i += 1;
    }
    table
}

const GF_EXP: [u8; 2 * GF_MUL_ORDER] = exp_table(RS_FIELD_POLY);
const GF_LOG: [u8; 16] = log_table(&GF_EXP);

#[inline]
fn gf_mul(x: u8, y: u8) -> u8 {
    if x == 0 || y == 0 {
        0
    } else {
        GF_EXP[GF_LOG[x as usize] as usize + GF_LOG[y as usize] as usize]
    }
}

#[inline]
fn gf_div(x: u8, y: u8) -> u8 {
    debug_assert!(y != 0);
    if x == 0 {
        return 0;
    }
    GF_EXP[GF_LOG[x as usize] as usize + GF_MUL_ORDER - GF_LOG[y as usize] as usize]
}

#[inline]
fn gf_pow(x: u8, power: isize) -> u8 {
    if x == 0 {
        return 0;
    }
    let exponent = (GF_LOG[x as usize] as isize * power).rem_euclid(GF_MUL_ORDER as isize);
    GF_EXP[exponent as usize]
}

#[inline]
fn gf_inverse(x: u8) -> u8 {
    debug_assert!(x != 0);
    GF_EXP[GF_MUL_ORDER - GF_LOG[x as usize] as usize]
}

/// Polynomial with coefficients stored highest degree first
#[derive(Clone, Copy)]
struct Poly {
    coef: [u8; MAX_POLY],
    len: usize,
}

impl Poly {
    fn from_slice(coefs: &[u8]) -> Self {
        let mut poly = Self {
            coef: [0; MAX_POLY],
            len: coefs.len(),
        };
        poly.coef[..coefs.len()].copy_from_slice(coefs);
        poly
    }

    fn one() -> Self {
        Self::from_slice(&[1])
    }

    fn as_slice(&self) -> &[u8] {
        &self.coef[..self.len]
    }

    fn push(&mut self, value: u8) {
        self.coef[self.len] = value;
        self.len += 1;
    }

    fn scale(&self, x: u8) -> Self {
        let mut out = *self;
        for c in out.coef[..out.len].iter_mut() {
            *c = gf_mul(*c, x);
        }
        out
    }

    fn add(&self, other: &Poly) -> Self {
        let len = self.len.max(other.len);
        let mut out = Self {
            coef: [0; MAX_POLY],
            len,
        };
        for (i, &v) in self.as_slice().iter().enumerate() {
            out.coef[i + len - self.len] = v;
        }
        for (i, &v) in other.as_slice().iter().enumerate() {
            out.coef[i + len - other.len] ^= v;
        }
        out
    }

    fn mul(&self, other: &Poly) -> Self {
        let mut out = Self {
            coef: [0; MAX_POLY],
            len: self.len + other.len - 1,
        };
        for (j, &q) in other.as_slice().iter().enumerate() {
            for (i, &p) in self.as_slice().iter().enumerate() {
                out.coef[i + j] ^= gf_mul(p, q);
            }
        }
        out
    }

    fn eval(&self, x: u8) -> u8 {
        self.as_slice()[1..]
            .iter()
            .fold(self.coef[0], |y, &c| gf_mul(y, x) ^ c)
    }

    fn reversed(&self) -> Self {
        let mut out = *self;
        out.coef[..out.len].reverse();
        out
    }

    /// Lowest `n` coefficients, i.e. the remainder modulo x^n
    fn tail(&self, n: usize) -> Self {
        Self::from_slice(&self.as_slice()[self.len - n..])
    }

    fn strip_leading_zeros(&self) -> Self {
        let shift = self
            .as_slice()
            .iter()
            .position(|&c| c != 0)
            .unwrap_or(self.len);
        Self::from_slice(&self.as_slice()[shift..])
    }
}

/// Fixed-capacity list of codeword positions
#[derive(Clone, Copy)]
struct Positions {
    items: [usize; MAX_CODEWORD],
    len: usize,
}

impl Positions {
    fn new() -> Self {
        Self {
            items: [0; MAX_CODEWORD],
            len: 0,
        }
    }

    fn push(&mut self, pos: usize) -> bool {
        if self.len == MAX_CODEWORD {
            return false;
        }
        self.items[self.len] = pos;
        self.len += 1;
        true
    }

    fn as_slice(&self) -> &[usize] {
        &self.items[..self.len]
    }
}

/// Reed-Solomon encoder/decoder over GF(2^4).
///
/// `parity` check symbols are appended to up to `15 - parity` message
/// symbols. Generator roots are consecutive powers of alpha starting at
/// `first_root`. Shorter codewords are handled as shortened codes.
#[derive(Clone)]
pub struct ReedSolomon16 {
    parity: usize,
    first_root: usize,
    generator: Poly,
}

impl ReedSolomon16 {
    pub fn new(parity: usize, first_root: usize) -> Result<Self> {
        if parity == 0 || parity >= MAX_CODEWORD {
            return Err(AudioModemError::InvalidConfig(format!(
                "RS parity must be within 1..{}, got {}",
                MAX_CODEWORD, parity
            )));
        }

        let mut generator = Poly::one();
        for i in 0..parity {
            let root = gf_pow(2, (i + first_root) as isize);
            generator = generator.mul(&Poly::from_slice(&[1, root]));
        }

        Ok(Self {
            parity,
            first_root,
            generator,
        })
    }

    pub fn parity(&self) -> usize {
        self.parity
    }

    /// Largest message accepted by `encode_parity`
    pub fn max_message(&self) -> usize {
        MAX_CODEWORD - self.parity
    }

    /// Compute the parity symbols for `message` into `parity_out`.
    pub fn encode_parity(&self, message: &[u8], parity_out: &mut [u8]) -> Result<()> {
        if message.len() > self.max_message() {
            return Err(AudioModemError::InvalidInputSize {
                expected: self.max_message(),
                actual: message.len(),
            });
        }
        if parity_out.len() != self.parity {
            return Err(AudioModemError::InvalidInputSize {
                expected: self.parity,
                actual: parity_out.len(),
            });
        }
        check_symbols(message)?;

        let mut work = [0u8; MAX_CODEWORD];
        work[..message.len()].copy_from_slice(message);

        let generator = self.generator.as_slice();
        for i in 0..message.len() {
            let coef = work[i];
            if coef != 0 {
                for (j, &g) in generator.iter().enumerate().skip(1) {
                    work[i + j] ^= gf_mul(g, coef);
                }
            }
        }

        parity_out.copy_from_slice(&work[message.len()..message.len() + self.parity]);
        Ok(())
    }

    /// Correct `codeword` (message followed by parity) in place.
    ///
    /// `erasures` lists positions known to be unreliable. Unknown errors are
    /// corrected as long as `2 * errors + erasures <= parity`. Returns the
    /// number of corrected positions; on failure `codeword` is left untouched.
    pub fn decode(&self, codeword: &mut [u8], erasures: &[usize]) -> Result<usize> {
        let n = codeword.len();
        if n <= self.parity || n > MAX_CODEWORD {
            return Err(AudioModemError::InvalidInputSize {
                expected: MAX_CODEWORD,
                actual: n,
            });
        }
        check_symbols(codeword)?;

        let synd = self.syndromes(codeword);
        if synd.as_slice().iter().all(|&s| s == 0) {
            return Ok(0);
        }

        if erasures.len() > self.parity {
            return Err(AudioModemError::TooManyErasures {
                count: erasures.len(),
                max: self.parity,
            });
        }
        if erasures.iter().any(|&pos| pos >= n) {
            return Err(AudioModemError::FecDecodeFailure);
        }

        let forney = forney_syndromes(&synd, erasures, n);
        let error_loc = self
            .error_locator(&forney, erasures.len())
            .ok_or(AudioModemError::FecDecodeFailure)?;
        let errors = find_errors(&error_loc.reversed(), n).ok_or(AudioModemError::FecDecodeFailure)?;

        let mut positions = Positions::new();
        for &pos in erasures.iter().chain(errors.as_slice()) {
            if !positions.push(pos) {
                return Err(AudioModemError::FecDecodeFailure);
            }
        }
        if positions.len == 0 {
            return Err(AudioModemError::FecDecodeFailure);
        }

        let mut work = [0u8; MAX_CODEWORD];
        work[..n].copy_from_slice(codeword);
        self.correct_errata(&mut work[..n], &synd, positions.as_slice())?;

        let verify = self.syndromes(&work[..n]);
        if verify.as_slice().iter().any(|&s| s != 0) {
            return Err(AudioModemError::FecDecodeFailure);
        }

        codeword.copy_from_slice(&work[..n]);
        Ok(positions.len)
    }

    /// Syndromes with a leading zero pad, length `parity + 1`
    fn syndromes(&self, codeword: &[u8]) -> Poly {
        let msg = Poly::from_slice(codeword);
        let mut synd = Poly::from_slice(&[0]);
        for i in 0..self.parity {
            synd.push(msg.eval(gf_pow(2, (i + self.first_root) as isize)));
        }
        synd
    }

    /// Berlekamp-Massey over the Forney syndromes
    fn error_locator(&self, synd: &Poly, erase_count: usize) -> Option<Poly> {
        let mut err_loc = Poly::one();
        let mut old_loc = Poly::one();
        let s = synd.as_slice();
        let shift = s.len().saturating_sub(self.parity);

        for i in 0..(self.parity - erase_count) {
            let k = i + shift;
            let mut delta = s[k];
            for j in 1..err_loc.len {
                delta ^= gf_mul(err_loc.coef[err_loc.len - j - 1], s[k - j]);
            }

            old_loc.push(0);

            if delta != 0 {
                if old_loc.len > err_loc.len {
                    let new_loc = old_loc.scale(delta);
                    old_loc = err_loc.scale(gf_inverse(delta));
                    err_loc = new_loc;
                }
                err_loc = err_loc.add(&old_loc.scale(delta));
            }
        }

        let err_loc = err_loc.strip_leading_zeros();
        if err_loc.len == 0 {
            return None;
        }
        let errs = err_loc.len - 1;
        if errs * 2 + erase_count > self.parity {
            return None;
        }
        Some(err_loc)
    }

    /// Forney algorithm: add error magnitudes at `positions` into `msg`
    fn correct_errata(&self, msg: &mut [u8], synd: &Poly, positions: &[usize]) -> Result<()> {
        let n = msg.len();

        let mut errata_loc = Poly::one();
        let mut x_vals = [0u8; MAX_CODEWORD];
        for (i, &pos) in positions.iter().enumerate() {
            let coef_pos = (n - 1 - pos) as isize;
            x_vals[i] = gf_pow(2, coef_pos);
            errata_loc = errata_loc.mul(&Poly::from_slice(&[x_vals[i], 1]));
        }
        let x_vals = &x_vals[..positions.len()];

        let evaluator = synd.reversed().mul(&errata_loc).tail(errata_loc.len);
        let fcr_adjust = 1 - self.first_root as isize;

        for (i, &xi) in x_vals.iter().enumerate() {
            let xi_inv = gf_inverse(xi);

            let mut loc_prime = 1u8;
            for (j, &xj) in x_vals.iter().enumerate() {
                if j != i {
                    loc_prime = gf_mul(loc_prime, 1 ^ gf_mul(xi_inv, xj));
                }
            }
            if loc_prime == 0 {
                return Err(AudioModemError::FecDecodeFailure);
            }

            let y = gf_mul(gf_pow(xi, fcr_adjust), evaluator.eval(xi_inv));
            msg[positions[i]] ^= gf_div(y, loc_prime);
        }

        Ok(())
    }
}

fn check_symbols(symbols: &[u8]) -> Result<()> {
    match symbols.iter().find(|&&s| s > 0x0F) {
        Some(&bad) => Err(AudioModemError::InvalidSymbol(bad)),
        None => Ok(()),
    }
}

fn forney_syndromes(synd: &Poly, erasures: &[usize], n: usize) -> Poly {
    let mut forney = Poly::from_slice(&synd.as_slice()[1..]);
    for &pos in erasures {
        let x = gf_pow(2, (n - 1 - pos) as isize);
        for j in 0..forney.len.saturating_sub(1) {
            forney.coef[j] = gf_mul(forney.coef[j], x) ^ forney.coef[j + 1];
        }
    }
    forney
}

/// Chien search
fn find_errors(locator: &Poly, n: usize) -> Option<Positions> {
    let errs = locator.len - 1;
    let mut positions = Positions::new();
    for i in 0..n {
        if locator.eval(gf_pow(2, i as isize)) == 0 {
            positions.push(n - 1 - i);
        }
    }
    if positions.len != errs {
        return None;
    }
    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RS_DATA, RS_FIRST_ROOT, RS_PARITY, RS_TOTAL};

    fn codec() -> ReedSolomon16 {
        ReedSolomon16::new(RS_PARITY, RS_FIRST_ROOT).unwrap()
    }

    fn codeword(message: &[u8]) -> Vec<u8> {
        let rs = codec();
        let mut parity = vec![0u8; RS_PARITY];
        rs.encode_parity(message, &mut parity).unwrap();
        let mut word = message.to_vec();
        word.extend_from_slice(&parity);
        word
    }

    #[test]
    fn test_gf_tables_consistent() {
        assert_eq!(&GF_EXP[..GF_MUL_ORDER], &[1, 2, 4, 8, 3, 6, 12, 11, 5, 10, 7, 14, 15, 13, 9]);
        for i in 0..GF_MUL_ORDER {
            assert_eq!(GF_LOG[GF_EXP[i] as usize] as usize, i);
        }
    }

    #[test]
    fn test_gf_mul_div_roundtrip() {
        for x in 1..16u8 {
            assert_eq!(gf_mul(x, gf_inverse(x)), 1);
            for y in 1..16u8 {
                assert_eq!(gf_div(gf_mul(x, y), y), x);
            }
        }
    }

    #[test]
    fn test_codeword_has_zero_syndromes() {
        let rs = codec();
        let word = codeword(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 0]);
        assert_eq!(word.len(), RS_TOTAL);
        assert!(rs.syndromes(&word).as_slice().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_clean_decode_reports_no_corrections() {
        let rs = codec();
        let mut word = codeword(&[0xF; RS_DATA]);
        assert_eq!(rs.decode(&mut word, &[]), Ok(0));
    }

    #[test]
    fn test_erasures_up_to_parity_recover() {
        let rs = codec();
        let message: Vec<u8> = (0..RS_DATA as u8).collect();
        let original = codeword(&message);

        let erasure_sets: [&[usize]; 5] = [&[], &[3], &[0, 14], &[1, 7, 11], &[0, 5, 10, 13]];
        for erasures in erasure_sets {
            let mut word = original.clone();
            for &pos in erasures {
                word[pos] = (word[pos] + 9) & 0x0F;
            }
            rs.decode(&mut word, erasures).unwrap();
            assert_eq!(word, original, "erasures {:?}", erasures);
        }
    }

    #[test]
    fn test_erasures_beyond_parity_fail() {
        let rs = codec();
        let message: Vec<u8> = (0..RS_DATA as u8).collect();
        let mut word = codeword(&message);
        let erasures = [0, 2, 4, 6, 8];
        for &pos in &erasures {
            word[pos] ^= 0x05;
        }
        let before = word.clone();
        assert_eq!(
            rs.decode(&mut word, &erasures),
            Err(AudioModemError::TooManyErasures { count: 5, max: RS_PARITY })
        );
        assert_eq!(word, before);
    }

    #[test]
    fn test_corrects_unknown_errors() {
        let rs = codec();
        let message = [0xA, 0xB, 0xC, 0xD, 0xE, 0xF, 0x0, 0x1, 0x2, 0x3, 0x0];
        let original = codeword(&message);

        for pos in 0..RS_TOTAL {
            let mut word = original.clone();
            word[pos] ^= 0x06;
            rs.decode(&mut word, &[]).unwrap();
            assert_eq!(word, original, "single error at {}", pos);
        }

        let mut word = original.clone();
        word[2] ^= 0x01;
        word[12] ^= 0x0C;
        assert_eq!(rs.decode(&mut word, &[]), Ok(2));
        assert_eq!(word, original);
    }

    #[test]
    fn test_erasures_plus_error() {
        let rs = codec();
        let original = codeword(&[3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 0]);
        let mut word = original.clone();
        word[1] = 0;
        word[6] = 0;
        word[9] ^= 0x07;
        rs.decode(&mut word, &[1, 6]).unwrap();
        assert_eq!(word, original);
    }

    #[test]
    fn test_rejects_out_of_range_symbols() {
        let rs = codec();
        let mut parity = [0u8; RS_PARITY];
        assert_eq!(
            rs.encode_parity(&[0x10], &mut parity),
            Err(AudioModemError::InvalidSymbol(0x10))
        );
    }

    #[test]
    fn test_invalid_parity_count() {
        assert!(ReedSolomon16::new(0, 1).is_err());
        assert!(ReedSolomon16::new(15, 1).is_err());
    }
}
