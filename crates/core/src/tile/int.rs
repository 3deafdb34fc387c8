//! Integer tile buffer with bit-width translation

use super::{BlockCache, CacheState};
use crate::band::RasterBand;
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use ndarray::Array2;

/// Tile buffer that presents samples in a working integer range.
///
/// Stored bit patterns (read unsigned, whatever the signedness of the native
/// type) span `[0, 2^native_bits - 1]`; `get`/`set` values span
/// `[0, 2^working_bits - 1]`. Conversion is proportional with floor division:
///
/// ```text
/// stored  = value  * native_max  / working_max
/// value   = stored * working_max / native_max
/// ```
pub struct IntTileBuffer<'a> {
    cache: BlockCache<'a>,
    working: DataType,
    working_max: u64,
    native_max: u64,
}

impl<'a> IntTileBuffer<'a> {
    /// Buffer using the band's native block size
    pub fn new(band: &'a mut (dyn RasterBand + 'a), working: DataType) -> Result<Self> {
        let block = band.block_size();
        Self::with_block_size(band, block, working)
    }

    /// Buffer with an explicit block size, capped at the band extents
    pub fn with_block_size(
        band: &'a mut (dyn RasterBand + 'a),
        block: Shape,
        working: DataType,
    ) -> Result<Self> {
        let native = band.data_type();
        if !working.is_integer() {
            return Err(Error::UnsupportedDataType(format!(
                "integer tile buffer cannot work in {}",
                working
            )));
        }
        if !native.is_integer() {
            return Err(Error::UnsupportedDataType(format!(
                "integer tile buffer cannot store into a {} band",
                native
            )));
        }
        Ok(Self {
            cache: BlockCache::new(band, block)?,
            working,
            working_max: working.bit_range_max(),
            native_max: native.bit_range_max(),
        })
    }

    /// Working value to stored bit pattern. Values above the working maximum are clamped.
    pub fn translate(&self, value: u64) -> u64 {
        value.min(self.working_max) * self.native_max / self.working_max
    }

    /// Stored bit pattern to working value
    pub fn detranslate(&self, stored: u64) -> u64 {
        stored * self.working_max / self.native_max
    }

    /// Flush the resident block if dirty, then load block `(bx, by)`
    pub fn cache_block(&mut self, bx: usize, by: usize) -> Result<()> {
        self.cache.cache_block(bx, by)
    }

    /// Write the resident block back if it was modified
    pub fn flush_cache(&mut self) -> Result<()> {
        self.cache.flush()
    }

    pub fn get(&mut self, x: usize, y: usize) -> Result<u64> {
        let i = self.cache.locate(x, y)?;
        self.get_at(i)
    }

    pub fn set(&mut self, x: usize, y: usize, value: u64) -> Result<()> {
        let i = self.cache.locate(x, y)?;
        self.set_at(i, value)
    }

    /// Value at flat index `i` of the resident block
    pub fn get_at(&self, i: usize) -> Result<u64> {
        Ok(self.detranslate(self.cache.read_bits(i)?))
    }

    /// Store at flat index `i` of the resident block
    pub fn set_at(&mut self, i: usize, value: u64) -> Result<()> {
        let stored = self.translate(value);
        self.cache.write_bits(i, stored)
    }

    /// False when the stored value at `(x, y)` equals the band's nodata value
    pub fn has_data(&mut self, x: usize, y: usize) -> Result<bool> {
        let i = self.cache.locate(x, y)?;
        self.cache.is_valid(i)
    }

    /// Load block `(bx, by)` and return its working values indexed `[row, col]`
    pub fn read_block_values(&mut self, bx: usize, by: usize) -> Result<Array2<f64>> {
        self.cache_block(bx, by)?;
        let (w, h) = (self.block_width(bx), self.block_height(by));
        let mut out = Array2::zeros((h, w));
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.get_at(i)? as f64;
        }
        Ok(out)
    }

    /// Load block `(bx, by)` and overwrite it with working values.
    ///
    /// Values are rounded and clamped to `[0, working_max]` before translation.
    /// The block stays resident and dirty.
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
        let max = self.working_max as f64;
        for (i, &v) in values.iter().enumerate() {
            let clamped = if v.is_nan() { 0.0 } else { v.round().clamp(0.0, max) };
            self.set_at(i, clamped as u64)?;
        }
        Ok(())
    }

    pub fn working_type(&self) -> DataType {
        self.working
    }

    pub fn native_type(&self) -> DataType {
        self.cache.codec().data_type()
    }

    pub fn working_max(&self) -> u64 {
        self.working_max
    }

    pub fn native_max(&self) -> u64 {
        self.native_max
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

    pub fn to_block_x(&self, x: usize) -> usize {
        self.cache.to_block_x(x)
    }

    pub fn to_block_y(&self, y: usize) -> usize {
        self.cache.to_block_y(y)
    }

    /// Coordinates of the resident block, if any
    pub fn cached_block(&self) -> Option<(usize, usize)> {
        self.cache.state().resident().map(|c| (c.x, c.y))
    }

    pub fn state(&self) -> CacheState {
        self.cache.state()
    }

    pub fn is_dirty(&self) -> bool {
        self.cache.state().is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::MemBand;

    #[test]
    fn test_rejects_float_types() {
        let mut band = MemBand::new(4, 4, DataType::Float32).unwrap();
        assert!(matches!(
            IntTileBuffer::new(&mut band, DataType::Int16),
            Err(Error::UnsupportedDataType(_))
        ));

        let mut band = MemBand::new(4, 4, DataType::Int16).unwrap();
        assert!(matches!(
            IntTileBuffer::new(&mut band, DataType::Float64),
            Err(Error::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_translation_between_widths() {
        let mut band = MemBand::new(4, 4, DataType::UInt16).unwrap();
        let buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
        assert_eq!(buffer.working_max(), 255);
        assert_eq!(buffer.native_max(), 65535);
        assert_eq!(buffer.translate(255), 65535);
        assert_eq!(buffer.translate(1), 257);
        assert_eq!(buffer.translate(1000), 65535);
        assert_eq!(buffer.detranslate(65535), 255);
        assert_eq!(buffer.detranslate(256), 0);
    }

    #[test]
    fn test_roundtrip_every_byte_value() {
        let mut band = MemBand::new(16, 16, DataType::UInt32).unwrap();
        {
            let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
            for v in 0..256u64 {
                buffer.set((v % 16) as usize, (v / 16) as usize, v).unwrap();
            }
            buffer.flush_cache().unwrap();
        }
        let mut fresh = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
        fresh.cache_block(0, 0).unwrap();
        for v in 0..256u64 {
            assert_eq!(fresh.get((v % 16) as usize, (v / 16) as usize).unwrap(), v);
        }
    }

    #[test]
    fn test_roundtrip_signed_native() {
        let mut band = MemBand::new(3, 3, DataType::Int16).unwrap();
        {
            let mut buffer = IntTileBuffer::new(&mut band, DataType::Int16).unwrap();
            buffer.set(2, 2, 65535).unwrap();
            buffer.set(1, 0, 40000).unwrap();
            buffer.flush_cache().unwrap();
        }
        // stored bit patterns are reinterpreted as signed by the band
        assert_eq!(band.value(2, 2), Some(-1.0));
        let mut fresh = IntTileBuffer::new(&mut band, DataType::Int16).unwrap();
        assert_eq!(fresh.get(2, 2).unwrap(), 65535);
        assert_eq!(fresh.get(1, 0).unwrap(), 40000);
    }

    #[test]
    fn test_flat_index_requires_resident_block() {
        let mut band = MemBand::new(4, 4, DataType::Byte).unwrap();
        let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
        assert!(matches!(buffer.get_at(0), Err(Error::EmptyCache)));
        assert!(matches!(buffer.set_at(0, 1), Err(Error::EmptyCache)));
        buffer.cache_block(0, 0).unwrap();
        assert_eq!(buffer.get_at(15).unwrap(), 0);
        assert!(matches!(
            buffer.get_at(16),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_coordinate_access_out_of_band() {
        let mut band = MemBand::new(4, 4, DataType::Byte).unwrap();
        let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
        assert!(matches!(
            buffer.get(4, 0),
            Err(Error::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_repeated_cache_block_writes_back_once() {
        let mut band = MemBand::new(4, 4, DataType::Byte).unwrap();
        {
            let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
            buffer.set(1, 1, 9).unwrap();
            buffer.cache_block(0, 0).unwrap();
            buffer.cache_block(0, 0).unwrap();
            buffer.flush_cache().unwrap();
        }
        assert_eq!(band.writes(), 1);
        assert_eq!(band.value(1, 1), Some(9.0));
    }

    #[test]
    fn test_moving_between_blocks_flushes() {
        let mut band = MemBand::new(8, 2, DataType::Byte)
            .unwrap()
            .with_block_size(Shape::new(4, 2));
        {
            let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
            buffer.set(0, 0, 1).unwrap();
            assert_eq!(buffer.cached_block(), Some((0, 0)));
            buffer.set(5, 1, 2).unwrap();
            assert_eq!(buffer.cached_block(), Some((1, 0)));
            assert!(buffer.is_dirty());
            buffer.flush_cache().unwrap();
            buffer.flush_cache().unwrap();
        }
        assert_eq!(band.writes(), 2);
        assert_eq!(band.value(0, 0), Some(1.0));
        assert_eq!(band.value(5, 1), Some(2.0));
    }

    #[test]
    fn test_has_data_uses_nodata() {
        let mut band = MemBand::from_values(2, 1, DataType::Byte, &[0.0, 5.0])
            .unwrap()
            .with_nodata(0.0);
        let mut buffer = IntTileBuffer::new(&mut band, DataType::Byte).unwrap();
        assert!(!buffer.has_data(0, 0).unwrap());
        assert!(buffer.has_data(1, 0).unwrap());
    }

    #[test]
    fn test_block_values_roundtrip() {
        let mut band = MemBand::new(5, 3, DataType::UInt16)
            .unwrap()
            .with_block_size(Shape::new(3, 3));
        let mut buffer = IntTileBuffer::new(&mut band, DataType::UInt16).unwrap();
        let values = Array2::from_shape_fn((3, 2), |(r, c)| (r * 2 + c) as f64 * 100.0);
        buffer.write_block_values(1, 0, &values).unwrap();
        assert_eq!(buffer.read_block_values(1, 0).unwrap(), values);

        let wrong = Array2::zeros((3, 3));
        assert!(buffer.write_block_values(1, 0, &wrong).is_err());
        buffer.flush_cache().unwrap();
    }
}
