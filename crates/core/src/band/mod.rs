//! Band capability
//!
//! A band is a single raster channel with a native datatype and a native
//! block layout. Fusion and histogram matching only touch bands through
//! [`RasterBand`], so any storage backend can take part.

mod memory;

pub use memory::MemBand;

use crate::datatype::DataType;
use crate::error::Result;
use crate::shape::{Rectangle, Shape};
use crate::spectrum::Spectrum;
use crate::tile::FloatTileBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Block-oriented access to one raster channel.
///
/// Buffers passed to [`read_block`](RasterBand::read_block) and
/// [`write_block`](RasterBand::write_block) hold `window.width` samples per
/// row, tightly packed, in native byte order and encoded as `data_type`.
/// Implementations convert when `data_type` differs from the native type.
pub trait RasterBand {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn shape(&self) -> Shape {
        Shape::new(self.width(), self.height())
    }

    /// Native block (tile or strip) shape
    fn block_size(&self) -> Shape;

    /// Native sample datatype
    fn data_type(&self) -> DataType;

    fn nodata(&self) -> Option<f64> {
        None
    }

    /// Read `window` into `buf`. Fails if the window leaves the band.
    fn read_block(&self, window: Rectangle, data_type: DataType, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` into `window`. Fails if the window leaves the band.
    fn write_block(&mut self, window: Rectangle, data_type: DataType, buf: &[u8]) -> Result<()>;
}

/// Bands taking part in one fusion call, keyed by their role
pub type BandMap<'a> = BTreeMap<Spectrum, &'a mut dyn RasterBand>;

/// Summary statistics of a band, skipping nodata samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid_count: usize,
    pub nodata_count: usize,
}

/// Compute min/max/mean over every valid sample, block by block.
///
/// A band with no valid samples reports NaN for min, max and mean.
pub fn statistics(band: &mut dyn RasterBand) -> Result<BandStatistics> {
    let nodata = band.nodata();
    let mut buffer = FloatTileBuffer::new(band)?;

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut valid_count = 0usize;
    let mut nodata_count = 0usize;

    for by in 0..buffer.blocks_in_col() {
        for bx in 0..buffer.blocks_in_row() {
            buffer.cache_block(bx, by)?;
            for i in 0..buffer.block_len(bx, by) {
                let v = buffer.get_at(i)?;
                let is_nodata = match nodata {
                    Some(nd) => v == nd || (nd.is_nan() && v.is_nan()),
                    None => v.is_nan(),
                };
                if is_nodata {
                    nodata_count += 1;
                    continue;
                }
                min = min.min(v);
                max = max.max(v);
                sum += v;
                valid_count += 1;
            }
        }
    }

    if valid_count == 0 {
        return Ok(BandStatistics {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            valid_count,
            nodata_count,
        });
    }

    Ok(BandStatistics {
        min,
        max,
        mean: sum / valid_count as f64,
        valid_count,
        nodata_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_statistics_skip_nodata() {
        let mut band = MemBand::from_values(3, 2, DataType::Int16, &[1.0, 2.0, -9.0, 4.0, 5.0, 6.0])
            .unwrap()
            .with_nodata(-9.0)
            .with_block_size(Shape::new(2, 1));

        let stats = statistics(&mut band).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 6.0);
        assert_relative_eq!(stats.mean, 18.0 / 5.0);
        assert_eq!(stats.valid_count, 5);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_band_map_is_keyed_by_role() {
        let mut pan = MemBand::new(4, 4, DataType::Byte).unwrap();
        let mut red = MemBand::new(4, 4, DataType::Byte).unwrap();

        let mut map: BandMap = BandMap::new();
        map.insert(Spectrum::Panchromatic, &mut pan);
        map.insert(Spectrum::Red, &mut red);

        let roles: Vec<Spectrum> = map.keys().copied().collect();
        assert_eq!(roles, vec![Spectrum::Red, Spectrum::Panchromatic]);
    }
}
