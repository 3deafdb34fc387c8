//! Error types for pansharp

use crate::spectrum::Spectrum;
use thiserror::Error;

/// Main error type for pansharp operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid band dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({x}, {y}) in grid of size ({width}, {height})")]
    IndexOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error(
        "{role} band size mismatch: expected {}x{}, got {}x{}",
        expected.0, expected.1, actual.0, actual.1
    )]
    DimensionMismatch {
        role: Spectrum,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Missing {0} band")]
    MissingBand(Spectrum),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Block I/O failed at block ({block_x}, {block_y}): {reason}")]
    BlockIo {
        block_x: usize,
        block_y: usize,
        reason: String,
    },

    #[error("No block resident in cache")]
    EmptyCache,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("{0}")]
    Other(String),
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for pansharp operations
pub type Result<T> = std::result::Result<T, Error>;
