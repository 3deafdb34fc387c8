//! In-memory band

use super::RasterBand;
use crate::datatype::{DataType, SampleCodec};
use crate::error::{Error, Result};
use crate::shape::{Rectangle, Shape};
use ndarray::Array2;
use std::cell::Cell;

/// Default edge length of a square native block
const DEFAULT_BLOCK: usize = 256;

/// A band backed by a contiguous byte vector.
///
/// Samples are stored row-major in the native datatype. Block reads and
/// writes are counted so callers can observe caching behaviour.
#[derive(Debug, Clone)]
pub struct MemBand {
    width: usize,
    height: usize,
    block: Shape,
    data_type: DataType,
    nodata: Option<f64>,
    data: Vec<u8>,
    reads: Cell<usize>,
    writes: usize,
}

impl MemBand {
    /// Create a zero-filled band
    pub fn new(width: usize, height: usize, data_type: DataType) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            block: Shape::new(width.min(DEFAULT_BLOCK), height.min(DEFAULT_BLOCK)),
            data_type,
            nodata: None,
            data: vec![0; width * height * data_type.size_bytes()],
            reads: Cell::new(0),
            writes: 0,
        })
    }

    /// Create a band holding `value` everywhere
    pub fn filled(width: usize, height: usize, data_type: DataType, value: f64) -> Result<Self> {
        let mut band = Self::new(width, height, data_type)?;
        let codec = band.codec();
        for sample in band.data.chunks_exact_mut(data_type.size_bytes()) {
            codec.encode(value, sample);
        }
        Ok(band)
    }

    /// Create a band from row-major values
    pub fn from_values(
        width: usize,
        height: usize,
        data_type: DataType,
        values: &[f64],
    ) -> Result<Self> {
        if values.len() != width * height {
            return Err(Error::InvalidParameter {
                name: "values",
                value: values.len().to_string(),
                reason: format!("expected {} samples for {}x{}", width * height, width, height),
            });
        }
        let mut band = Self::new(width, height, data_type)?;
        let codec = band.codec();
        for (sample, &v) in band
            .data
            .chunks_exact_mut(data_type.size_bytes())
            .zip(values)
        {
            codec.encode(v, sample);
        }
        Ok(band)
    }

    /// Create a band from an array indexed `[row, col]`
    pub fn from_array(array: &Array2<f64>, data_type: DataType) -> Result<Self> {
        let (rows, cols) = array.dim();
        let values: Vec<f64> = array.iter().copied().collect();
        Self::from_values(cols, rows, data_type, &values)
    }

    /// Set the native block shape, capped at the band extents
    pub fn with_block_size(mut self, block: Shape) -> Self {
        let capped = block.min(self.shape());
        self.block = Shape::new(capped.width.max(1), capped.height.max(1));
        self
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Numeric value at `(x, y)`
    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let size = self.data_type.size_bytes();
        let offset = (y * self.width + x) * size;
        Some(self.codec().decode(&self.data[offset..offset + size]))
    }

    /// Store a numeric value at `(x, y)`, rounding and saturating for integer types
    pub fn set_value(&mut self, x: usize, y: usize, value: f64) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(Error::IndexOutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let size = self.data_type.size_bytes();
        let offset = (y * self.width + x) * size;
        let codec = self.codec();
        codec.encode(value, &mut self.data[offset..offset + size]);
        Ok(())
    }

    /// All values as an array indexed `[row, col]`
    pub fn to_array(&self) -> Array2<f64> {
        let codec = self.codec();
        let values: Vec<f64> = self
            .data
            .chunks_exact(self.data_type.size_bytes())
            .map(|s| codec.decode(s))
            .collect();
        Array2::from_shape_vec((self.height, self.width), values)
            .unwrap_or_else(|_| Array2::zeros((self.height, self.width)))
    }

    /// Raw native bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of `read_block` calls served so far
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Number of `write_block` calls served so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn reset_counters(&mut self) {
        self.reads.set(0);
        self.writes = 0;
    }

    fn codec(&self) -> SampleCodec {
        self.data_type.codec()
    }

    fn check_window(&self, window: Rectangle, data_type: DataType, buf_len: usize) -> Result<()> {
        if window.is_empty() || !window.fits_in(self.shape()) {
            return Err(Error::IndexOutOfBounds {
                x: window.x1(),
                y: window.y1(),
                width: self.width,
                height: self.height,
            });
        }
        let needed = window.len() * data_type.size_bytes();
        if buf_len < needed {
            return Err(Error::InvalidParameter {
                name: "buf",
                value: buf_len.to_string(),
                reason: format!("window needs {} bytes", needed),
            });
        }
        Ok(())
    }
}

impl RasterBand for MemBand {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn block_size(&self) -> Shape {
        self.block
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn read_block(&self, window: Rectangle, data_type: DataType, buf: &mut [u8]) -> Result<()> {
        self.check_window(window, data_type, buf.len())?;
        let native = self.data_type.size_bytes();
        let row_bytes = window.width * native;

        if data_type == self.data_type {
            for (r, y) in (window.y0..window.y1()).enumerate() {
                let src = (y * self.width + window.x0) * native;
                buf[r * row_bytes..(r + 1) * row_bytes]
                    .copy_from_slice(&self.data[src..src + row_bytes]);
            }
        } else {
            let from = self.codec();
            let to = data_type.codec();
            let out = data_type.size_bytes();
            let mut i = 0;
            for y in window.y0..window.y1() {
                for x in window.x0..window.x1() {
                    let src = (y * self.width + x) * native;
                    let v = from.decode(&self.data[src..src + native]);
                    to.encode(v, &mut buf[i * out..(i + 1) * out]);
                    i += 1;
                }
            }
        }

        self.reads.set(self.reads.get() + 1);
        Ok(())
    }

    fn write_block(&mut self, window: Rectangle, data_type: DataType, buf: &[u8]) -> Result<()> {
        self.check_window(window, data_type, buf.len())?;
        let native = self.data_type.size_bytes();
        let row_bytes = window.width * native;

        if data_type == self.data_type {
            for (r, y) in (window.y0..window.y1()).enumerate() {
                let dst = (y * self.width + window.x0) * native;
                self.data[dst..dst + row_bytes]
                    .copy_from_slice(&buf[r * row_bytes..(r + 1) * row_bytes]);
            }
        } else {
            let from = data_type.codec();
            let to = self.codec();
            let inp = data_type.size_bytes();
            let mut i = 0;
            for y in window.y0..window.y1() {
                for x in window.x0..window.x1() {
                    let dst = (y * self.width + x) * native;
                    let v = from.decode(&buf[i * inp..(i + 1) * inp]);
                    to.encode(v, &mut self.data[dst..dst + native]);
                    i += 1;
                }
            }
        }

        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(
            MemBand::new(0, 5, DataType::Byte),
            Err(Error::InvalidDimensions { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_block_size_is_capped() {
        let band = MemBand::new(100, 40, DataType::UInt16)
            .unwrap()
            .with_block_size(Shape::new(64, 64));
        assert_eq!(band.block_size(), Shape::new(64, 40));

        let default = MemBand::new(300, 10, DataType::Byte).unwrap();
        assert_eq!(default.block_size(), Shape::new(256, 10));
    }

    #[test]
    fn test_read_write_window() {
        let values: Vec<f64> = (0..12).map(|v| v as f64).collect();
        let mut band = MemBand::from_values(4, 3, DataType::UInt16, &values).unwrap();

        let mut buf = vec![0u8; 4];
        band.read_block(Rectangle::new(1, 1, 2, 1), DataType::UInt16, &mut buf)
            .unwrap();
        let codec = DataType::UInt16.codec();
        assert_eq!(codec.decode(&buf[0..2]), 5.0);
        assert_eq!(codec.decode(&buf[2..4]), 6.0);

        codec.encode(99.0, &mut buf[0..2]);
        band.write_block(Rectangle::new(3, 2, 1, 1), DataType::UInt16, &buf[0..2])
            .unwrap();
        assert_eq!(band.value(3, 2), Some(99.0));
        assert_eq!(band.reads(), 1);
        assert_eq!(band.writes(), 1);
    }

    #[test]
    fn test_read_converts_datatype() {
        let band = MemBand::from_values(2, 1, DataType::Int16, &[-3.0, 400.0]).unwrap();
        let mut buf = vec![0u8; 2];
        band.read_block(Rectangle::new(0, 0, 2, 1), DataType::Byte, &mut buf)
            .unwrap();
        assert_eq!(buf, vec![0, 255]);
    }

    #[test]
    fn test_window_out_of_bounds() {
        let band = MemBand::new(4, 4, DataType::Byte).unwrap();
        let mut buf = vec![0u8; 16];
        let err = band
            .read_block(Rectangle::new(2, 2, 3, 1), DataType::Byte, &mut buf)
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfBounds { .. }));
    }

    #[test]
    fn test_array_roundtrip() {
        let array = Array2::from_shape_fn((3, 5), |(r, c)| (r * 10 + c) as f64);
        let band = MemBand::from_array(&array, DataType::Int32).unwrap();
        assert_eq!(band.width(), 5);
        assert_eq!(band.height(), 3);
        assert_eq!(band.value(4, 2), Some(24.0));
        assert_eq!(band.to_array(), array);
    }
}
