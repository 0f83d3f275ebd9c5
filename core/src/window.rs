use std::f64::consts::PI;

use crate::error::{AudioModemError, Result};

/// Relative convergence threshold for the Bessel series
const SERIES_TOLERANCE: f64 = 1e-6;

/// Zeroth-order modified Bessel function of the first kind, summed until
/// the added term falls below `SERIES_TOLERANCE` of the running total.
fn bessel_i0(x: f64) -> f64 {
    let x2 = x * x;
    let mut d = 0.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    loop {
        d += 2.0;
        term *= x2 / (d * d);
        sum += term;
        if term <= sum * SERIES_TOLERANCE {
            break;
        }
    }
    sum
}

/// Kaiser-Bessel taper applied to every analysis block.
///
/// Coefficients are scaled so the center tap is exactly 2.0. Index 0 is
/// zero and the table is symmetric about `len / 2`; for odd lengths the
/// final tap is also zero.
#[derive(Debug, Clone)]
pub struct KaiserWindow {
    coeffs: Vec<f32>,
}

impl KaiserWindow {
    pub fn new(len: usize, alpha: f32) -> Result<Self> {
        if len < 3 {
            return Err(AudioModemError::InvalidConfig(format!(
                "window length must be at least 3, got {}",
                len
            )));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(AudioModemError::InvalidConfig(format!(
                "window shape must be non-negative, got {}",
                alpha
            )));
        }

        let beta = PI * alpha as f64;
        let den = bessel_i0(beta);
        let center = len / 2;
        let center_sq = (center * center) as f64;

        let mut coeffs = vec![0.0f32; len];
        coeffs[center] = 2.0;
        for i in 1..center {
            let ratio = (i * i) as f64 / center_sq;
            let w = (2.0 * bessel_i0(beta * (1.0 - ratio).sqrt()) / den) as f32;
            coeffs[center + i] = w;
            coeffs[center - i] = w;
        }

        Ok(Self { coeffs })
    }

    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn center(&self) -> usize {
        self.coeffs.len() / 2
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coeffs
    }

    /// Multiply `input` by the taper into `output`. Both must be `len()` long.
    pub fn apply(&self, input: &[f32], output: &mut [f32]) {
        for ((out, &x), &w) in output.iter_mut().zip(input).zip(&self.coeffs) {
            *out = x * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BLOCK_LEN, KAISER_ALPHA};

    #[test]
    fn test_bessel_i0_known_values() {
        assert_eq!(bessel_i0(0.0), 1.0);
        // I0(1) = 1.2660658...
        assert!((bessel_i0(1.0) - 1.266_065_8).abs() < 1e-5);
    }

    #[test]
    fn test_window_shape() {
        let window = KaiserWindow::new(BLOCK_LEN, KAISER_ALPHA).unwrap();
        let w = window.coefficients();
        let center = window.center();

        assert_eq!(window.len(), BLOCK_LEN);
        assert_eq!(w[0], 0.0);
        assert_eq!(w[center], 2.0);
        for i in 1..=center {
            assert_eq!(w[center + i], w[center - i], "asymmetric at offset {}", i);
        }
    }

    #[test]
    fn test_window_tapers_toward_edges() {
        let window = KaiserWindow::new(BLOCK_LEN, KAISER_ALPHA).unwrap();
        let w = window.coefficients();
        let center = window.center();
        for i in 1..center - 1 {
            assert!(w[center + i] >= w[center + i + 1]);
        }
        assert!(w[1] > 0.0 && w[1] < 0.2);
    }

    #[test]
    fn test_even_length_window() {
        let window = KaiserWindow::new(8, KAISER_ALPHA).unwrap();
        let w = window.coefficients();
        assert_eq!(w[4], 2.0);
        assert_eq!(w[0], 0.0);
        assert_eq!(w[3], w[5]);
        assert_eq!(w[1], w[7]);
    }

    #[test]
    fn test_apply() {
        let window = KaiserWindow::new(5, KAISER_ALPHA).unwrap();
        let input = [1.0f32; 5];
        let mut output = [0.0f32; 5];
        window.apply(&input, &mut output);
        assert_eq!(&output[..], window.coefficients());
    }

    #[test]
    fn test_invalid_length() {
        assert!(KaiserWindow::new(0, KAISER_ALPHA).is_err());
        assert!(KaiserWindow::new(2, KAISER_ALPHA).is_err());
    }
}
