//! High-pass filter kernels
//!
//! Kernels are square with an odd side of at least 3. High-pass kernels are
//! built as `identity - lowpass`: every weight is the negated low-pass weight
//! and the center gets `+1` on top.

use ndarray::Array2;
use pansharp_core::{Error, Result};
use std::f64::consts::PI;

/// Square convolution kernel
#[derive(Debug, Clone, PartialEq)]
pub struct Filter2D {
    weights: Array2<f64>,
}

impl Filter2D {
    /// Wrap a weight matrix. It must be square with an odd side of at least 3.
    pub fn new(weights: Array2<f64>) -> Result<Self> {
        let (rows, cols) = weights.dim();
        if rows != cols {
            return Err(Error::InvalidParameter {
                name: "kernel",
                value: format!("{}x{}", cols, rows),
                reason: "kernel must be square".to_string(),
            });
        }
        if rows < 3 || rows % 2 == 0 {
            return Err(Error::InvalidParameter {
                name: "kernel",
                value: format!("{}x{}", cols, rows),
                reason: "kernel side must be odd and at least 3".to_string(),
            });
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "kernel",
                value: "non-finite weight".to_string(),
                reason: "kernel weights must be finite".to_string(),
            });
        }
        Ok(Self { weights })
    }

    /// Box high-pass: `-1/n²` everywhere, `1 - 1/n²` at the center.
    ///
    /// `size` is raised to 3 and rounded up to odd.
    pub fn box_high_pass(size: usize) -> Self {
        let n = odd_at_least_3(size);
        let w = -1.0 / (n * n) as f64;
        let mut weights = Array2::from_elem((n, n), w);
        weights[[n / 2, n / 2]] += 1.0;
        Self { weights }
    }

    /// Gaussian high-pass with side `ceil(6σ)`, rounded up to odd, at least 3.
    ///
    /// Weight at distance `d` from the center is `-exp(-d²/2σ²)/(2πσ²)`,
    /// with `+1` added at the center.
    pub fn gaussian_high_pass(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "sigma",
                value: sigma.to_string(),
                reason: "sigma must be finite and positive".to_string(),
            });
        }
        let n = odd_at_least_3((6.0 * sigma).ceil() as usize);
        let c = (n / 2) as f64;
        let two_s2 = 2.0 * sigma * sigma;
        let mut weights = Array2::from_shape_fn((n, n), |(r, col)| {
            let d2 = (r as f64 - c).powi(2) + (col as f64 - c).powi(2);
            -(-d2 / two_s2).exp() / (PI * two_s2)
        });
        weights[[n / 2, n / 2]] += 1.0;
        Ok(Self { weights })
    }

    /// Side length
    pub fn size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn height(&self) -> usize {
        self.weights.nrows()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Kernel rotated by 180°, so correlating with it convolves with `self`
    pub fn flipped(&self) -> Array2<f64> {
        let n = self.size();
        Array2::from_shape_fn((n, n), |(r, c)| self.weights[[n - 1 - r, n - 1 - c]])
    }
}

fn odd_at_least_3(size: usize) -> usize {
    let n = size.max(3);
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_high_pass() {
        let k = Filter2D::box_high_pass(3);
        assert_eq!(k.size(), 3);
        assert_relative_eq!(k.weights()[[0, 0]], -1.0 / 9.0);
        assert_relative_eq!(k.weights()[[1, 1]], 8.0 / 9.0);
        assert_relative_eq!(k.weights().sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_size_normalized() {
        assert_eq!(Filter2D::box_high_pass(1).size(), 3);
        assert_eq!(Filter2D::box_high_pass(4).size(), 5);
        assert_eq!(Filter2D::box_high_pass(7).size(), 7);
    }

    #[test]
    fn test_gaussian_high_pass() {
        let k = Filter2D::gaussian_high_pass(1.0).unwrap();
        assert_eq!(k.size(), 7);
        let center = 1.0 - 1.0 / (2.0 * PI);
        assert_relative_eq!(k.weights()[[3, 3]], center);
        // symmetric
        assert_relative_eq!(k.weights()[[0, 2]], k.weights()[[2, 0]]);
        assert_relative_eq!(k.weights()[[6, 4]], k.weights()[[0, 2]]);

        assert_eq!(Filter2D::gaussian_high_pass(0.2).unwrap().size(), 3);
        assert!(Filter2D::gaussian_high_pass(0.0).is_err());
        assert!(Filter2D::gaussian_high_pass(f64::NAN).is_err());
    }

    #[test]
    fn test_new_validates_shape() {
        assert!(Filter2D::new(Array2::zeros((3, 3))).is_ok());
        assert!(Filter2D::new(Array2::zeros((4, 4))).is_err());
        assert!(Filter2D::new(Array2::zeros((1, 1))).is_err());
        assert!(Filter2D::new(Array2::zeros((3, 5))).is_err());
    }

    #[test]
    fn test_flipped() {
        let w = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64);
        let k = Filter2D::new(w).unwrap();
        let f = k.flipped();
        assert_eq!(f[[0, 0]], 8.0);
        assert_eq!(f[[2, 1]], 1.0);
    }
}
