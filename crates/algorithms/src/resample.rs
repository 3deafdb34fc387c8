//! Upsampling of multispectral bands onto the panchromatic grid
//!
//! Pixel centers are aligned: output pixel `x` samples the source at
//! `(x + 0.5) * src_width / width - 0.5`, and the same for rows. Neighbours
//! outside the source are clamped to the border.

use crate::maybe_rayon::*;
use ndarray::Array2;
use pansharp_core::band::RasterBand;
use pansharp_core::tile::{read_array, write_array};
use pansharp_core::{Error, MemBand, Result, Shape};
use std::fmt;

/// Interpolation used when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    /// Source pixel whose center is nearest
    Nearest,
    /// Weighted mean of the four surrounding source centers
    #[default]
    Bilinear,
    /// Keys cubic convolution (`a = -0.5`) over the 4x4 surrounding centers
    Cubic,
}

impl ResampleMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ResampleMethod::Nearest => "nearest",
            ResampleMethod::Bilinear => "bilinear",
            ResampleMethod::Cubic => "cubic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nearest" | "near" => Some(ResampleMethod::Nearest),
            "bilinear" => Some(ResampleMethod::Bilinear),
            "cubic" | "bicubic" => Some(ResampleMethod::Cubic),
            _ => None,
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resample `band` to `width` x `height`.
///
/// The result keeps the source datatype and nodata value and uses `block` as
/// its native block size. Integer results are rounded and saturated.
pub fn resample(
    band: &mut dyn RasterBand,
    width: usize,
    height: usize,
    block: Shape,
    method: ResampleMethod,
) -> Result<MemBand> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let data_type = band.data_type();
    let nodata = band.nodata();
    let src = read_array(band)?;
    let values = resample_array(&src, width, height, method)?;

    let mut out = MemBand::new(width, height, data_type)?.with_block_size(block);
    out.set_nodata(nodata);
    write_array(&mut out, &values)?;
    out.reset_counters();
    Ok(out)
}

/// Resample an array indexed `[row, col]` to `height` rows and `width` columns
pub fn resample_array(
    src: &Array2<f64>,
    width: usize,
    height: usize,
    method: ResampleMethod,
) -> Result<Array2<f64>> {
    let (src_rows, src_cols) = src.dim();
    if src_rows == 0 || src_cols == 0 {
        return Err(Error::InvalidDimensions {
            width: src_cols,
            height: src_rows,
        });
    }
    let sx = src_cols as f64 / width as f64;
    let sy = src_rows as f64 / height as f64;

    let output_data: Vec<f64> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            let fy = (row as f64 + 0.5) * sy - 0.5;
            let mut row_data = vec![0.0; width];
            for (col, out) in row_data.iter_mut().enumerate() {
                let fx = (col as f64 + 0.5) * sx - 0.5;
                *out = match method {
                    ResampleMethod::Nearest => {
                        let r = nearest(fy, src_rows);
                        let c = nearest(fx, src_cols);
                        src[[r, c]]
                    }
                    ResampleMethod::Bilinear => bilinear(src, fx, fy),
                    ResampleMethod::Cubic => cubic(src, fx, fy),
                };
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((height, width), output_data).map_err(|e| Error::Other(e.to_string()))
}

fn nearest(f: f64, n: usize) -> usize {
    (f.round().max(0.0) as usize).min(n - 1)
}

fn bilinear(src: &Array2<f64>, fx: f64, fy: f64) -> f64 {
    let (rows, cols) = src.dim();
    let fx = fx.clamp(0.0, (cols - 1) as f64);
    let fy = fy.clamp(0.0, (rows - 1) as f64);
    let (x0, y0) = (fx.floor() as usize, fy.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(cols - 1), (y0 + 1).min(rows - 1));
    let (tx, ty) = (fx - x0 as f64, fy - y0 as f64);

    let top = src[[y0, x0]] * (1.0 - tx) + src[[y0, x1]] * tx;
    let bottom = src[[y1, x0]] * (1.0 - tx) + src[[y1, x1]] * tx;
    top * (1.0 - ty) + bottom * ty
}

fn cubic(src: &Array2<f64>, fx: f64, fy: f64) -> f64 {
    let (rows, cols) = src.dim();
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

    let mut sum = 0.0;
    for j in -1..=2isize {
        let wy = cubic_weight(ty - j as f64);
        if wy == 0.0 {
            continue;
        }
        let r = clamp(y0 as isize + j, rows);
        for i in -1..=2isize {
            let c = clamp(x0 as isize + i, cols);
            sum += src[[r, c]] * cubic_weight(tx - i as f64) * wy;
        }
    }
    sum
}

fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}
