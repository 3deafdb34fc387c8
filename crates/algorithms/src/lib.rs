//! # Pansharp Algorithms
//!
//! Pansharpening passes over block-oriented bands.
//!
//! ## Modules
//!
//! - **fusion**: Brovey transform and high-pass filter modulation (HPFM)
//! - **histogram**: histogram matching through a lookup table
//! - **resample**: nearest and bilinear upsampling of multispectral bands
//! - **kernel** / **convolve**: high-pass kernels and reflect-101 convolution
//! - **job**: the full pipeline (resample, fuse, match)

pub mod convolve;
pub mod fusion;
pub mod histogram;
pub mod job;
pub mod kernel;
pub(crate) mod maybe_rayon;
pub mod resample;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::fusion::{Brovey, BroveyWeights, Fusor, Hpfm, HpfmParams, MemoryPolicy};
    pub use crate::histogram::{
        get_histogram, lookup_table, match_histograms, match_to_histogram, Histogram,
        LookupTable,
    };
    pub use crate::job::{FusedImage, FusionMethod, JobOptions, PansharpJob};
    pub use crate::kernel::Filter2D;
    pub use crate::resample::{resample, ResampleMethod};
    pub use pansharp_core::prelude::*;
}
