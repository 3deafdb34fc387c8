//! Tiled block buffers over a band
//!
//! A tile buffer keeps exactly one block of a band resident. Moving to another
//! block writes the resident one back first when it was modified. Blocks on the
//! last row or column are truncated to the band extents and stored with their
//! actual width as row stride.
//!
//! - [`IntTileBuffer`] exposes samples as unsigned integers in a *working*
//!   datatype range, scaling from the band's native bit width.
//! - [`FloatTileBuffer`] exposes native numeric values as `f64`.

mod float;
mod int;

pub use float::{read_array, write_array, FloatTileBuffer};
pub use int::IntTileBuffer;

use crate::band::RasterBand;
use crate::datatype::SampleCodec;
use crate::error::{Error, Result};
use crate::shape::{Rectangle, Shape};

/// Block grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCoord {
    pub x: usize,
    pub y: usize,
}

/// Residency of the single cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Clean(BlockCoord),
    Dirty(BlockCoord),
}

impl CacheState {
    pub fn resident(&self) -> Option<BlockCoord> {
        match *self {
            CacheState::Empty => None,
            CacheState::Clean(c) | CacheState::Dirty(c) => Some(c),
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, CacheState::Dirty(_))
    }
}

/// Single-entry write-back block cache in native encoding.
///
/// State only changes through `cache_block`, `flush` and the sample writers.
pub(crate) struct BlockCache<'a> {
    band: &'a mut (dyn RasterBand + 'a),
    codec: SampleCodec,
    block: Shape,
    blocks_in_row: usize,
    blocks_in_col: usize,
    data: Vec<u8>,
    state: CacheState,
}

impl<'a> BlockCache<'a> {
    pub(crate) fn new(band: &'a mut (dyn RasterBand + 'a), requested: Shape) -> Result<Self> {
        let extent = band.shape();
        if extent.is_empty() {
            return Err(Error::InvalidDimensions {
                width: extent.width,
                height: extent.height,
            });
        }
        if requested.is_empty() {
            return Err(Error::InvalidParameter {
                name: "block_size",
                value: format!("{}x{}", requested.width, requested.height),
                reason: "block dimensions must be positive".into(),
            });
        }

        let block = requested.min(extent);
        let codec = band.data_type().codec();
        Ok(Self {
            blocks_in_row: extent.width.div_ceil(block.width),
            blocks_in_col: extent.height.div_ceil(block.height),
            data: vec![0; block.len() * codec.sample_size()],
            band,
            codec,
            block,
            state: CacheState::Empty,
        })
    }

    pub(crate) fn band(&self) -> &dyn RasterBand {
        &*self.band
    }

    pub(crate) fn codec(&self) -> SampleCodec {
        self.codec
    }

    pub(crate) fn width(&self) -> usize {
        self.band.width()
    }

    pub(crate) fn height(&self) -> usize {
        self.band.height()
    }

    pub(crate) fn block_shape(&self) -> Shape {
        self.block
    }

    pub(crate) fn blocks_in_row(&self) -> usize {
        self.blocks_in_row
    }

    pub(crate) fn blocks_in_col(&self) -> usize {
        self.blocks_in_col
    }

    /// Width of block column `bx`, truncated on the last column
    pub(crate) fn block_width(&self, bx: usize) -> usize {
        if bx + 1 == self.blocks_in_row {
            self.width() - (self.blocks_in_row - 1) * self.block.width
        } else {
            self.block.width
        }
    }

    /// Height of block row `by`, truncated on the last row
    pub(crate) fn block_height(&self, by: usize) -> usize {
        if by + 1 == self.blocks_in_col {
            self.height() - (self.blocks_in_col - 1) * self.block.height
        } else {
            self.block.height
        }
    }

    pub(crate) fn block_x_start(&self, bx: usize) -> usize {
        bx * self.block.width
    }

    pub(crate) fn block_y_start(&self, by: usize) -> usize {
        by * self.block.height
    }

    pub(crate) fn to_block_x(&self, x: usize) -> usize {
        x / self.block.width
    }

    pub(crate) fn to_block_y(&self, y: usize) -> usize {
        y / self.block.height
    }

    pub(crate) fn block_window(&self, bx: usize, by: usize) -> Rectangle {
        Rectangle::new(
            self.block_x_start(bx),
            self.block_y_start(by),
            self.block_width(bx),
            self.block_height(by),
        )
    }

    pub(crate) fn state(&self) -> CacheState {
        self.state
    }

    /// Flush the resident block if dirty, then load block `(bx, by)`
    pub(crate) fn cache_block(&mut self, bx: usize, by: usize) -> Result<()> {
        if bx >= self.blocks_in_row || by >= self.blocks_in_col {
            return Err(Error::IndexOutOfBounds {
                x: bx,
                y: by,
                width: self.blocks_in_row,
                height: self.blocks_in_col,
            });
        }
        self.flush()?;

        let window = self.block_window(bx, by);
        let n = window.len() * self.codec.sample_size();
        match self
            .band
            .read_block(window, self.codec.data_type(), &mut self.data[..n])
        {
            Ok(()) => {
                self.state = CacheState::Clean(BlockCoord { x: bx, y: by });
                Ok(())
            }
            Err(e) => {
                self.state = CacheState::Empty;
                Err(Error::BlockIo {
                    block_x: bx,
                    block_y: by,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Write the resident block back if dirty
    pub(crate) fn flush(&mut self) -> Result<()> {
        let CacheState::Dirty(coord) = self.state else {
            return Ok(());
        };

        let window = self.block_window(coord.x, coord.y);
        let n = window.len() * self.codec.sample_size();
        self.band
            .write_block(window, self.codec.data_type(), &self.data[..n])
            .map_err(|e| Error::BlockIo {
                block_x: coord.x,
                block_y: coord.y,
                reason: e.to_string(),
            })?;
        self.state = CacheState::Clean(coord);
        Ok(())
    }

    /// Cache the block owning `(x, y)` if needed and return its index within the block
    pub(crate) fn locate(&mut self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width() || y >= self.height() {
            return Err(Error::IndexOutOfBounds {
                x,
                y,
                width: self.width(),
                height: self.height(),
            });
        }
        let (bx, by) = (self.to_block_x(x), self.to_block_y(y));
        if self.state.resident() != Some(BlockCoord { x: bx, y: by }) {
            self.cache_block(bx, by)?;
        }
        let local_x = x - self.block_x_start(bx);
        let local_y = y - self.block_y_start(by);
        Ok(local_y * self.block_width(bx) + local_x)
    }

    /// Sample count of the resident block
    pub(crate) fn resident_len(&self) -> Result<usize> {
        let coord = self.state.resident().ok_or(Error::EmptyCache)?;
        Ok(self.block_width(coord.x) * self.block_height(coord.y))
    }

    fn check_index(&self, i: usize) -> Result<()> {
        let len = self.resident_len()?;
        if i >= len {
            return Err(Error::IndexOutOfBounds {
                x: i,
                y: 0,
                width: len,
                height: 1,
            });
        }
        Ok(())
    }

    fn sample(&self, i: usize) -> &[u8] {
        let size = self.codec.sample_size();
        &self.data[i * size..(i + 1) * size]
    }

    fn sample_mut(&mut self, i: usize) -> &mut [u8] {
        if let CacheState::Clean(coord) = self.state {
            self.state = CacheState::Dirty(coord);
        }
        let size = self.codec.sample_size();
        &mut self.data[i * size..(i + 1) * size]
    }

    pub(crate) fn read_bits(&self, i: usize) -> Result<u64> {
        self.check_index(i)?;
        Ok(self.codec.decode_bits(self.sample(i)))
    }

    pub(crate) fn write_bits(&mut self, i: usize, bits: u64) -> Result<()> {
        self.check_index(i)?;
        let codec = self.codec;
        codec.encode_bits(bits, self.sample_mut(i));
        Ok(())
    }

    pub(crate) fn read_value(&self, i: usize) -> Result<f64> {
        self.check_index(i)?;
        Ok(self.codec.decode(self.sample(i)))
    }

    pub(crate) fn write_value(&mut self, i: usize, value: f64) -> Result<()> {
        self.check_index(i)?;
        let codec = self.codec;
        codec.encode(value, self.sample_mut(i));
        Ok(())
    }

    /// Whether the stored value at `i` differs from the band's nodata value
    pub(crate) fn is_valid(&self, i: usize) -> Result<bool> {
        let v = self.read_value(i)?;
        Ok(match self.band.nodata() {
            Some(nd) if nd.is_nan() => !v.is_nan(),
            Some(nd) => v != nd,
            None => true,
        })
    }
}

impl Drop for BlockCache<'_> {
    fn drop(&mut self) {
        if let CacheState::Dirty(coord) = self.state {
            tracing::warn!(
                "tile buffer dropped with unflushed block ({}, {})",
                coord.x,
                coord.y
            );
        }
    }
}
