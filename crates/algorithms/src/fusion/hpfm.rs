//! High-pass filter modulation (HPFM) fusion
//!
//! Spatial detail of the panchromatic band is extracted with a high-pass
//! kernel and added to every multispectral channel:
//!
//! ```text
//! fused_c = c + (PA ⊛ kernel)
//! ```
//!
//! The image is streamed in full-width row blocks. Each row block is at
//! least `kernel_height - 1` rows tall, so the blocks above and below the
//! current one cover the convolution halo and the result matches a
//! convolution of the whole image.

use super::halo::RowBlockRing;
use super::{require_extent, require_integer, require_roles, split_roles, Fusor};
use crate::convolve::{convolve, min_max, stretch};
use crate::kernel::Filter2D;
use ndarray::{s, Array2};
use pansharp_core::band::BandMap;
use pansharp_core::progress::{Phase, ProgressObserver, ProgressTicker};
use pansharp_core::tile::IntTileBuffer;
use pansharp_core::{DataType, Error, Result, Shape, Spectrum};

/// Image size above which `MemoryPolicy::Auto` drops the halo cache
pub const MEMORY_POLITE_THRESHOLD: usize = 150 * 1024 * 1024;

/// How the panchromatic halo is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryPolicy {
    /// `PerBlock` for images over [`MEMORY_POLITE_THRESHOLD`] bytes, `Cached` otherwise
    #[default]
    Auto,
    /// Keep previous and next row blocks resident (seamless)
    Cached,
    /// Convolve each row block on its own; bounded memory, visible seams
    PerBlock,
}

impl MemoryPolicy {
    /// Whether row blocks are convolved without halo for a panchromatic band
    /// of `extent` pixels of `data_type`
    pub fn per_block(self, extent: Shape, data_type: DataType) -> bool {
        match self {
            MemoryPolicy::Cached => false,
            MemoryPolicy::PerBlock => true,
            MemoryPolicy::Auto => extent.len() * data_type.size_bytes() > MEMORY_POLITE_THRESHOLD,
        }
    }
}

/// Parameters for HPFM
#[derive(Debug, Clone)]
pub struct HpfmParams {
    pub kernel: Filter2D,
    pub memory: MemoryPolicy,
}

impl Default for HpfmParams {
    fn default() -> Self {
        Self {
            kernel: Filter2D::box_high_pass(5),
            memory: MemoryPolicy::Auto,
        }
    }
}

/// High-pass filter modulation
#[derive(Debug, Clone, Default)]
pub struct Hpfm {
    params: HpfmParams,
}

impl Hpfm {
    pub fn new(params: HpfmParams) -> Self {
        Self { params }
    }

    pub fn with_kernel(kernel: Filter2D) -> Self {
        Self::new(HpfmParams {
            kernel,
            ..Default::default()
        })
    }

    pub fn params(&self) -> &HpfmParams {
        &self.params
    }
}

/// Row block height: whole native tiles, at least `kernel_height - 1` rows,
/// capped at the image height
pub fn row_block_height(image_height: usize, tile_height: usize, kernel_height: usize) -> usize {
    let tile_height = tile_height.max(1);
    let tiles = kernel_height.saturating_sub(2) / tile_height + 1;
    (tile_height * tiles).min(image_height)
}

impl Fusor for Hpfm {
    fn name(&self) -> &'static str {
        "hpfm"
    }

    fn fuse(
        &self,
        dst: &mut BandMap<'_>,
        src: &mut BandMap<'_>,
        progress: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let src_roles = [
            Spectrum::Red,
            Spectrum::Green,
            Spectrum::Blue,
            Spectrum::Panchromatic,
        ];
        require_roles(dst, &Spectrum::RGB)?;
        require_roles(src, &src_roles)?;
        let (extent, pa_type, tile) = src
            .get(&Spectrum::Panchromatic)
            .map(|pa| (pa.shape(), pa.data_type(), pa.block_size()))
            .ok_or(Error::MissingBand(Spectrum::Panchromatic))?;

        // near infrared plays no part here
        require_extent(src, &src_roles, extent)?;
        require_extent(dst, &Spectrum::RGB, extent)?;
        require_integer(src, &src_roles, self.name())?;
        require_integer(dst, &Spectrum::RGB, self.name())?;

        let kernel = &self.params.kernel;
        let block = Shape::new(
            extent.width,
            row_block_height(extent.height, tile.height, kernel.height()),
        );
        let per_block = self.params.memory.per_block(extent, pa_type);
        if per_block {
            tracing::info!("HPFM: convolving row blocks without halo to bound memory");
        }

        let mut src_bands = split_roles(src, &src_roles)?;
        let pa_band = src_bands.pop().ok_or(Error::MissingBand(Spectrum::Panchromatic))?;
        let mut pa = IntTileBuffer::with_block_size(pa_band, block, pa_type)?;
        let mut src_bufs = src_bands
            .into_iter()
            .map(|band| IntTileBuffer::with_block_size(band, block, pa_type))
            .collect::<Result<Vec<_>>>()?;
        let mut dst_bufs = split_roles(dst, &Spectrum::RGB)?
            .into_iter()
            .map(|band| IntTileBuffer::with_block_size(band, block, pa_type))
            .collect::<Result<Vec<_>>>()?;

        let blocks = pa.blocks_in_col();
        let working_max = pa.working_max() as f64;
        tracing::debug!(
            "HPFM: {} row blocks of {}x{}, kernel {}x{}, working type {}",
            blocks,
            block.width,
            pa.block_shape().height,
            kernel.size(),
            kernel.size(),
            pa_type
        );

        let mut ring = RowBlockRing::new();
        let mut ticker = ProgressTicker::new(Phase::Fusion, blocks);

        for by in 0..blocks {
            let detail = if per_block {
                convolve(&pa.read_block_values(0, by)?, kernel)?
            } else {
                if by == 0 {
                    let current = pa.read_block_values(0, 0)?;
                    let next = if blocks > 1 {
                        Some(pa.read_block_values(0, 1)?)
                    } else {
                        None
                    };
                    ring.prime(current, next);
                } else {
                    let next = if by + 1 < blocks {
                        Some(pa.read_block_values(0, by + 1)?)
                    } else {
                        None
                    };
                    ring.advance(next);
                }
                tracing::trace!("HPFM row block {} window {:?}", by, ring.state());
                let (stack, roi) = ring.stacked()?;
                convolve(&stack, kernel)?.slice(s![roi, ..]).to_owned()
            };

            for (src_buf, dst_buf) in src_bufs.iter_mut().zip(dst_bufs.iter_mut()) {
                let fused = src_buf.read_block_values(0, by)? + &detail;
                let out = modulate(&fused, working_max);
                dst_buf.write_block_values(0, by, &out)?;
            }
            ticker.tick(progress);
        }

        for buf in dst_bufs.iter_mut() {
            buf.flush_cache()?;
        }
        Ok(())
    }
}

/// Stretch `[min, max]` of the fused block onto `[0, working_max]`; a flat
/// block keeps its single value
fn modulate(fused: &Array2<f64>, working_max: f64) -> Array2<f64> {
    match min_max(fused) {
        Some((min, max)) if max > min => stretch(fused, min, max, working_max),
        Some((_, max)) => Array2::from_elem(fused.dim(), max.round().clamp(0.0, working_max)),
        None => Array2::zeros(fused.dim()),
    }
}
