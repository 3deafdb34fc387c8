//! Numeric tile buffer

use super::{BlockCache, CacheState};
use crate::band::RasterBand;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use ndarray::{s, Array2};

/// Tile buffer over native numeric values.
///
/// Accepts any datatype. Writes to integer bands round to nearest and saturate.
pub struct FloatTileBuffer<'a> {
    cache: BlockCache<'a>,
}

impl<'a> FloatTileBuffer<'a> {
    pub fn new(band: &'a mut (dyn RasterBand + 'a)) -> Result<Self> {
        let block = band.block_size();
        Self::with_block_size(band, block)
    }

    pub fn with_block_size(band: &'a mut (dyn RasterBand + 'a), block: Shape) -> Result<Self> {
        Ok(Self {
            cache: BlockCache::new(band, block)?,
        })
    }

    pub fn cache_block(&mut self, bx: usize, by: usize) -> Result<()> {
        self.cache.cache_block(bx, by)
    }

    pub fn flush_cache(&mut self) -> Result<()> {
        self.cache.flush()
    }

    pub fn get(&mut self, x: usize, y: usize) -> Result<f64> {
        let i = self.cache.locate(x, y)?;
        self.cache.read_value(i)
    }

    pub fn set(&mut self, x: usize, y: usize, value: f64) -> Result<()> {
        let i = self.cache.locate(x, y)?;
        self.cache.write_value(i, value)
    }

    pub fn get_at(&self, i: usize) -> Result<f64> {
        self.cache.read_value(i)
    }

    pub fn set_at(&mut self, i: usize, value: f64) -> Result<()> {
        self.cache.write_value(i, value)
    }

    pub fn has_data(&mut self, x: usize, y: usize) -> Result<bool> {
        let i = self.cache.locate(x, y)?;
        self.cache.is_valid(i)
    }

    /// Load block `(bx, by)` and copy it out, indexed `[row, col]`
    pub fn read_block_values(&mut self, bx: usize, by: usize) -> Result<Array2<f64>> {
        self.cache_block(bx, by)?;
        let mut out = Array2::zeros((self.block_height(by), self.block_width(bx)));
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.get_at(i)?;
        }
        Ok(out)
    }

    /// Load block `(bx, by)` and overwrite it. The block stays resident and dirty.
    pub fn write_block_values(&mut self, bx: usize, by: usize, values: &Array2<f64>) -> Result<()> {
        self.cache_block(bx, by)?;
        let expected = (self.block_height(by), self.block_width(bx));
        if values.dim() != expected {
            return Err(Error::InvalidParameter {
                name: "values",
                value: format!("{:?}", values.dim()),
                reason: format!("block ({}, {}) is {:?}", bx, by, expected),
            });
        }
        for (i, &v) in values.iter().enumerate() {
            self.set_at(i, v)?;
        }
        Ok(())
    }

    pub fn data_type(&self) -> DataType {
        self.cache.codec().data_type()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.cache.band().nodata()
    }

    pub fn width(&self) -> usize {
        self.cache.width()
    }

    pub fn height(&self) -> usize {
        self.cache.height()
    }

    pub fn block_shape(&self) -> Shape {
        self.cache.block_shape()
    }

    pub fn blocks_in_row(&self) -> usize {
        self.cache.blocks_in_row()
    }

    pub fn blocks_in_col(&self) -> usize {
        self.cache.blocks_in_col()
    }

    pub fn block_width(&self, bx: usize) -> usize {
        self.cache.block_width(bx)
    }

    pub fn block_height(&self, by: usize) -> usize {
        self.cache.block_height(by)
    }

    pub fn block_len(&self, bx: usize, by: usize) -> usize {
        self.block_width(bx) * self.block_height(by)
    }

    pub fn block_x_start(&self, bx: usize) -> usize {
        self.cache.block_x_start(bx)
    }

    pub fn block_y_start(&self, by: usize) -> usize {
        self.cache.block_y_start(by)
    }

    pub fn cached_block(&self) -> Option<(usize, usize)> {
        self.cache.state().resident().map(|c| (c.x, c.y))
    }

    pub fn state(&self) -> CacheState {
        self.cache.state()
    }
}

/// Read a whole band into an array indexed `[row, col]`
pub fn read_array(band: &mut dyn RasterBand) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((band.height(), band.width()));
    let mut buffer = FloatTileBuffer::new(band)?;
    for by in 0..buffer.blocks_in_col() {
        for bx in 0..buffer.blocks_in_row() {
            let block = buffer.read_block_values(bx, by)?;
            let (x0, y0) = (buffer.block_x_start(bx), buffer.block_y_start(by));
            let (h, w) = block.dim();
            out.slice_mut(s![y0..y0 + h, x0..x0 + w]).assign(&block);
        }
    }
    Ok(out)
}

/// Write an array indexed `[row, col]` over a whole band
pub fn write_array(band: &mut dyn RasterBand, values: &Array2<f64>) -> Result<()> {
    let (rows, cols) = values.dim();
    if rows != band.height() || cols != band.width() {
        return Err(Error::InvalidParameter {
            name: "values",
            value: format!("{}x{}", cols, rows),
            reason: format!("band is {}x{}", band.width(), band.height()),
        });
    }
    let mut buffer = FloatTileBuffer::new(band)?;
    for by in 0..buffer.blocks_in_col() {
        for bx in 0..buffer.blocks_in_row() {
            let (x0, y0) = (buffer.block_x_start(bx), buffer.block_y_start(by));
            let (w, h) = (buffer.block_width(bx), buffer.block_height(by));
            let block = values.slice(s![y0..y0 + h, x0..x0 + w]).to_owned();
            buffer.write_block_values(bx, by, &block)?;
        }
    }
    buffer.flush_cache()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::MemBand;
    use approx::assert_relative_eq;

    #[test]
    fn test_native_values() {
        let mut band = MemBand::from_values(2, 2, DataType::Int16, &[-5.0, 3.0, 0.0, 7.0]).unwrap();
        let mut buffer = FloatTileBuffer::new(&mut band).unwrap();
        assert_eq!(buffer.get(0, 0).unwrap(), -5.0);
        buffer.set(1, 1, 12.6).unwrap();
        buffer.flush_cache().unwrap();
        drop(buffer);
        assert_eq!(band.value(1, 1), Some(13.0));
    }

    #[test]
    fn test_float_band() {
        let mut band = MemBand::new(3, 1, DataType::Float32).unwrap();
        let mut buffer = FloatTileBuffer::new(&mut band).unwrap();
        buffer.set(2, 0, 0.5).unwrap();
        assert_relative_eq!(buffer.get(2, 0).unwrap(), 0.5);
        buffer.flush_cache().unwrap();
    }

    #[test]
    fn test_read_write_array_across_blocks() {
        let mut band = MemBand::new(7, 5, DataType::UInt16)
            .unwrap()
            .with_block_size(Shape::new(3, 2));
        let values = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f64);
        write_array(&mut band, &values).unwrap();
        assert_eq!(read_array(&mut band).unwrap(), values);
        assert_eq!(band.to_array(), values);
    }

    #[test]
    fn test_write_array_shape_mismatch() {
        let mut band = MemBand::new(4, 4, DataType::Byte).unwrap();
        let values = Array2::zeros((3, 4));
        assert!(write_array(&mut band, &values).is_err());
        assert_eq!(band.writes(), 0);
    }
}
