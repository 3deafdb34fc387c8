//! # Pansharp Core
//!
//! Core types, traits and I/O for pansharpening.
//!
//! This crate provides:
//! - `DataType` and `SampleCodec`: sample types and their byte encoding
//! - `RasterBand`: block-oriented band capability, with `MemBand` in memory
//! - `IntTileBuffer` / `FloatTileBuffer`: single-block write-back caches
//! - `ProgressObserver`: bounded-frequency progress reporting
//! - TIFF reading and writing

pub mod band;
pub mod datatype;
pub mod error;
pub mod io;
pub mod progress;
pub mod shape;
pub mod spectrum;
pub mod tile;

pub use band::{BandMap, MemBand, RasterBand};
pub use datatype::{DataType, SampleCodec};
pub use error::{Error, Result};
pub use shape::{Rectangle, Shape};
pub use spectrum::Spectrum;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::band::{BandMap, MemBand, RasterBand};
    pub use crate::datatype::DataType;
    pub use crate::error::{Error, Result};
    pub use crate::progress::{NoProgress, Phase, ProgressObserver};
    pub use crate::shape::{Rectangle, Shape};
    pub use crate::spectrum::Spectrum;
    pub use crate::tile::{FloatTileBuffer, IntTileBuffer};
}
