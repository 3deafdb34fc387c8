//! Block math: convolution, min/max and linear stretch over `Array2<f64>`

use crate::kernel::Filter2D;
use crate::maybe_rayon::*;
use ndarray::Array2;
use pansharp_core::{Error, Result};

/// Convolve `input` with `kernel` (not correlate: the kernel is flipped first).
///
/// Borders use reflect-101 (`gfedcb|abcdefgh|gfedcba`), so the output has the
/// same shape as the input.
pub fn convolve(input: &Array2<f64>, kernel: &Filter2D) -> Result<Array2<f64>> {
    let (rows, cols) = input.dim();
    if rows == 0 || cols == 0 {
        return Ok(input.clone());
    }
    let flipped = kernel.flipped();
    let n = kernel.size();
    let half = (n / 2) as isize;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0.0; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut acc = 0.0;
                for kr in 0..n {
                    let r = reflect101(row as isize + kr as isize - half, rows);
                    for kc in 0..n {
                        let c = reflect101(col as isize + kc as isize - half, cols);
                        acc += flipped[[kr, kc]] * input[[r, c]];
                    }
                }
                *out = acc;
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((rows, cols), output_data).map_err(|e| Error::Other(e.to_string()))
}

/// Map a possibly out-of-range index into `[0, n)` by mirroring without
/// repeating the edge sample.
pub fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Minimum and maximum, ignoring NaN. Returns `None` when nothing is finite.
pub fn min_max(values: &Array2<f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        None
    } else {
        Some((min, max))
    }
}

/// Linearly map `[min, max]` onto `[0, out_max]`. Requires `max > min`.
pub fn stretch(values: &Array2<f64>, min: f64, max: f64, out_max: f64) -> Array2<f64> {
    let scale = out_max / (max - min);
    values.mapv(|v| (v - min) * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(2, 5), 2);
        assert_eq!(reflect101(-3, 1), 0);
        assert_eq!(reflect101(-1, 2), 1);
        assert_eq!(reflect101(2, 2), 0);
    }

    #[test]
    fn test_high_pass_of_constant_is_zero() {
        let input = Array2::from_elem((6, 9), 42.0);
        let out = convolve(&input, &Filter2D::box_high_pass(5)).unwrap();
        for &v in out.iter() {
            assert_relative_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_convolution_flips_kernel() {
        // impulse response of a convolution is the kernel itself
        let mut input = Array2::zeros((5, 5));
        input[[2, 2]] = 1.0;
        let w = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64);
        let kernel = Filter2D::new(w.clone()).unwrap();
        let out = convolve(&input, &kernel).unwrap();
        for r in 0..3 {
            for c in 0..3 {
                assert_relative_eq!(out[[r + 1, c + 1]], w[[r, c]]);
            }
        }
    }

    #[test]
    fn test_min_max_and_stretch() {
        let a = Array2::from_shape_vec((1, 4), vec![2.0, f64::NAN, 6.0, 4.0]).unwrap();
        assert_eq!(min_max(&a), Some((2.0, 6.0)));
        let s = stretch(&a, 2.0, 6.0, 255.0);
        assert_relative_eq!(s[[0, 0]], 0.0);
        assert_relative_eq!(s[[0, 2]], 255.0);
        assert_relative_eq!(s[[0, 3]], 127.5);

        let empty = Array2::from_elem((2, 2), f64::NAN);
        assert_eq!(min_max(&empty), None);
    }
}
