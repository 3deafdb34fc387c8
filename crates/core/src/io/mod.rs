//! Raster file I/O

mod tiff_io;

pub use tiff_io::{
    read_tiff, read_tiff_from_buffer, write_tiff, write_tiff_to_buffer, write_tiff_to_buffer_with,
    write_tiff_with, Compression,
};
