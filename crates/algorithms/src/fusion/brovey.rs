//! Brovey (ratio) fusion
//!
//! Each channel is scaled by the ratio of the panchromatic value to the
//! sum of the visible channels, so with unit weights the fused channels add
//! up to the panchromatic value:
//!
//! ```text
//! pseudo = R + G + B
//! ratio  = (PA - NIR * w_nir) / pseudo     (0 where pseudo == 0)
//! out_c  = c * w_c * ratio
//! ```
//!
//! All arithmetic happens in a common working range, the widest datatype of
//! the participating bands.

use super::{require_extent, require_integer, require_roles, split_roles, Fusor};
use ndarray::{Array2, Zip};
use pansharp_core::band::BandMap;
use pansharp_core::progress::{Phase, ProgressObserver, ProgressTicker};
use pansharp_core::tile::IntTileBuffer;
use pansharp_core::{DataType, Error, Result, Shape, Spectrum};

/// Channel weights, normalized by the largest visible weight on use
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroveyWeights {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    /// Near-infrared weight, subtracted from the panchromatic band
    pub nir: f64,
}

impl Default for BroveyWeights {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
            nir: 0.0,
        }
    }
}

impl BroveyWeights {
    pub fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            nir: 0.0,
        }
    }

    pub fn with_nir(mut self, nir: f64) -> Self {
        self.nir = nir;
        self
    }

    /// Reject negative or non-finite weights
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("red_weight", self.red),
            ("green_weight", self.green),
            ("blue_weight", self.blue),
            ("nir_weight", self.nir),
        ];
        for (name, w) in named {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidParameter {
                    name,
                    value: w.to_string(),
                    reason: "weights must be finite and non-negative".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Divide every weight by `max(red, green, blue)`; all zero if that max is zero
    pub fn normalized(&self) -> Self {
        let max = self.red.max(self.green).max(self.blue);
        if max == 0.0 {
            return Self::rgb(0.0, 0.0, 0.0);
        }
        Self {
            red: self.red / max,
            green: self.green / max,
            blue: self.blue / max,
            nir: self.nir / max,
        }
    }

    fn visible(&self) -> [f64; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Brovey transform
#[derive(Debug, Clone)]
pub struct Brovey {
    weights: BroveyWeights,
}

impl Default for Brovey {
    fn default() -> Self {
        Self {
            weights: BroveyWeights::default(),
        }
    }
}

impl Brovey {
    pub fn new(weights: BroveyWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights: weights.normalized(),
        })
    }

    /// Normalized weights in use
    pub fn weights(&self) -> BroveyWeights {
        self.weights
    }
}

impl Fusor for Brovey {
    fn name(&self) -> &'static str {
        "brovey"
    }

    fn fuse(
        &self,
        dst: &mut BandMap<'_>,
        src: &mut BandMap<'_>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()> {
        require_roles(dst, &Spectrum::RGB)?;
        require_roles(
            src,
            &[
                Spectrum::Red,
                Spectrum::Green,
                Spectrum::Blue,
                Spectrum::Panchromatic,
            ],
        )?;
        let extent = src
            .get(&Spectrum::Panchromatic)
            .map(|pa| pa.shape())
            .ok_or(Error::MissingBand(Spectrum::Panchromatic))?;
        let has_nir = src.contains_key(&Spectrum::NearInfrared);
        let mut src_roles = vec![
            Spectrum::Red,
            Spectrum::Green,
            Spectrum::Blue,
            Spectrum::Panchromatic,
        ];
        if has_nir {
            src_roles.push(Spectrum::NearInfrared);
        }
        require_extent(src, &src_roles, extent)?;
        require_extent(dst, &Spectrum::RGB, extent)?;
        require_integer(src, &src_roles, self.name())?;
        require_integer(dst, &Spectrum::RGB, self.name())?;

        let use_nir = has_nir && self.weights.nir != 0.0;
        if !use_nir {
            src_roles.truncate(4);
        }

        let src_bands = split_roles(src, &src_roles)?;
        let dst_bands = split_roles(dst, &Spectrum::RGB)?;

        let layouts: Vec<(DataType, Shape)> = src_bands
            .iter()
            .map(|b| (b.data_type(), b.block_size()))
            .chain(dst_bands.iter().map(|b| (b.data_type(), b.block_size())))
            .collect();
        let working = DataType::largest(layouts.iter().map(|&(t, _)| t))
            .ok_or(Error::MissingBand(Spectrum::Panchromatic))?;
        let block = layouts
            .iter()
            .fold(Shape::new(1, 1), |acc, &(_, b)| acc.max(b));

        let mut src_bufs = src_bands
            .into_iter()
            .map(|band| IntTileBuffer::with_block_size(band, block, working))
            .collect::<Result<Vec<_>>>()?;
        let mut dst_bufs = dst_bands
            .into_iter()
            .map(|band| IntTileBuffer::with_block_size(band, block, working))
            .collect::<Result<Vec<_>>>()?;

        let blocks_x = src_bufs[0].blocks_in_row();
        let blocks_y = src_bufs[0].blocks_in_col();
        tracing::debug!(
            "Brovey: {}x{} blocks of {}x{}, working type {}, nir {}",
            blocks_x,
            blocks_y,
            src_bufs[0].block_shape().width,
            src_bufs[0].block_shape().height,
            working,
            if use_nir { "on" } else { "off" }
        );

        let weights = self.weights.visible();
        let mut ticker = ProgressTicker::new(Phase::Fusion, blocks_x * blocks_y);

        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let blocks = src_bufs
                    .iter_mut()
                    .map(|buf| buf.read_block_values(bx, by))
                    .collect::<Result<Vec<_>>>()?;

                let ratio = brovey_ratio(
                    [&blocks[0], &blocks[1], &blocks[2]],
                    &blocks[3],
                    blocks.get(4).map(|nir| (nir, self.weights.nir)),
                );

                for ((buf, channel), &w) in dst_bufs.iter_mut().zip(&blocks).zip(&weights) {
                    let out = if w == 0.0 {
                        Array2::zeros(ratio.dim())
                    } else {
                        channel * &ratio * w
                    };
                    buf.write_block_values(bx, by, &out)?;
                }
                ticker.tick(progress);
            }
        }

        for buf in dst_bufs.iter_mut() {
            buf.flush_cache()?;
        }
        Ok(())
    }
}

/// Per-pixel `(PA - NIR * w) / (R + G + B)`, zero where the sum is zero
fn brovey_ratio(
    rgb: [&Array2<f64>; 3],
    pa: &Array2<f64>,
    nir: Option<(&Array2<f64>, f64)>,
) -> Array2<f64> {
    let pseudo = rgb[0] + rgb[1] + rgb[2];
    let mut adjusted = pa.clone();
    if let Some((nir, w)) = nir {
        adjusted.zip_mut_with(nir, |p, &n| *p -= n * w);
    }
    Zip::from(&adjusted)
        .and(&pseudo)
        .map_collect(|&p, &s| if s == 0.0 { 0.0 } else { p / s })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pansharp_core::progress::NoProgress;
    use pansharp_core::MemBand;

    #[test]
    fn test_weights_normalized() {
        let w = BroveyWeights::rgb(2.0, 1.0, 0.5).with_nir(1.0).normalized();
        assert_eq!(w, BroveyWeights {
            red: 1.0,
            green: 0.5,
            blue: 0.25,
            nir: 0.5
        });
        let zero = BroveyWeights::rgb(0.0, 0.0, 0.0).with_nir(3.0).normalized();
        assert_eq!(zero.nir, 0.0);
    }

    #[test]
    fn test_weights_rejected() {
        assert!(Brovey::new(BroveyWeights::rgb(-1.0, 1.0, 1.0)).is_err());
        assert!(Brovey::new(BroveyWeights::rgb(1.0, f64::NAN, 1.0)).is_err());
        assert!(Brovey::new(BroveyWeights::default().with_nir(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_ratio_zero_guard() {
        let zero = Array2::zeros((1, 2));
        let pa = Array2::from_elem((1, 2), 50.0);
        let ratio = brovey_ratio([&zero, &zero, &zero], &pa, None);
        assert_eq!(ratio, Array2::zeros((1, 2)));
    }

    #[test]
    fn test_ratio_uses_channel_sum() {
        let r = Array2::from_elem((1, 1), 40.0);
        let g = Array2::from_elem((1, 1), 50.0);
        let b = Array2::from_elem((1, 1), 60.0);
        let pa = Array2::from_elem((1, 1), 300.0);
        let ratio = brovey_ratio([&r, &g, &b], &pa, None);
        assert_eq!(ratio[[0, 0]], 2.0);
    }

    #[test]
    fn test_uniform_image() {
        let make = |v: f64| MemBand::filled(4, 4, DataType::Byte, v).unwrap();
        let (mut r, mut g, mut b, mut pa) = (make(100.0), make(100.0), make(100.0), make(300.0));
        let (mut or, mut og, mut ob) = (make(0.0), make(0.0), make(0.0));
        {
            let mut src: BandMap = BandMap::new();
            src.insert(Spectrum::Red, &mut r);
            src.insert(Spectrum::Green, &mut g);
            src.insert(Spectrum::Blue, &mut b);
            src.insert(Spectrum::Panchromatic, &mut pa);
            let mut dst: BandMap = BandMap::new();
            dst.insert(Spectrum::Red, &mut or);
            dst.insert(Spectrum::Green, &mut og);
            dst.insert(Spectrum::Blue, &mut ob);
            Brovey::default()
                .fuse(&mut dst, &mut src, &mut NoProgress)
                .unwrap();
        }
        for band in [&or, &og, &ob] {
            assert!(band.to_array().iter().all(|&v| v == 100.0));
        }
    }
}
