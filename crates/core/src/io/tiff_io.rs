//! TIFF reading and writing with the `tiff` crate
//!
//! Pixel-interleaved images are split into one [`MemBand`] per sample. The
//! native block size follows the file's strip or tile layout. Nodata is kept
//! in the GDAL_NODATA tag. Output strips can be LZW, Deflate or PackBits
//! compressed; the decoder handles all three.

use crate::band::{MemBand, RasterBand};
use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::shape::Shape;
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::fmt;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, DeflateLevel, TiffEncoder};
use tiff::tags::Tag;

/// GDAL_NODATA, stored as ASCII
const GDAL_NODATA: u16 = 42113;

/// Compression of written TIFF strips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Lzw,
    Deflate,
    PackBits,
}

impl Compression {
    pub const ALL: [Compression; 4] = [
        Compression::None,
        Compression::Lzw,
        Compression::Deflate,
        Compression::PackBits,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lzw => "lzw",
            Compression::Deflate => "deflate",
            Compression::PackBits => "packbits",
        }
    }

    /// Case-insensitive lookup; `zip` is accepted for Deflate
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(Compression::None),
            "lzw" => Some(Compression::Lzw),
            "deflate" | "zip" => Some(Compression::Deflate),
            "packbits" => Some(Compression::PackBits),
            _ => None,
        }
    }

    fn to_tiff(self) -> tiff::encoder::Compression {
        match self {
            Compression::None => tiff::encoder::Compression::Uncompressed,
            Compression::Lzw => tiff::encoder::Compression::Lzw,
            Compression::Deflate => tiff::encoder::Compression::Deflate(DeflateLevel::Balanced),
            Compression::PackBits => tiff::encoder::Compression::Packbits,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read every sample of a TIFF file as separate bands
pub fn read_tiff<P: AsRef<Path>>(path: P) -> Result<Vec<MemBand>> {
    let file = File::open(path.as_ref())?;
    decode_tiff(file)
}

/// Same as [`read_tiff`] over an in-memory buffer
pub fn read_tiff_from_buffer(data: &[u8]) -> Result<Vec<MemBand>> {
    decode_tiff(Cursor::new(data))
}

fn decode_tiff<R: Read + Seek>(reader: R) -> Result<Vec<MemBand>> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let (chunk_w, chunk_h) = decoder.chunk_dimensions();
    let nodata = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok());

    let (data_type, samples) = match decoder.read_image()? {
        DecodingResult::U8(buf) => (DataType::Byte, widen(&buf)),
        DecodingResult::I8(buf) => (DataType::SignedByte, widen(&buf)),
        DecodingResult::U16(buf) => (DataType::UInt16, widen(&buf)),
        DecodingResult::I16(buf) => (DataType::Int16, widen(&buf)),
        DecodingResult::U32(buf) => (DataType::UInt32, widen(&buf)),
        DecodingResult::I32(buf) => (DataType::Int32, widen(&buf)),
        DecodingResult::F32(buf) => (DataType::Float32, widen(&buf)),
        DecodingResult::F64(buf) => (DataType::Float64, buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    let pixels = width * height;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let channels = samples.len() / pixels;
    tracing::debug!(
        "TIFF {}x{} {} with {} band(s), block {}x{}",
        width,
        height,
        data_type,
        channels,
        chunk_w,
        chunk_h
    );

    let block = Shape::new(chunk_w as usize, chunk_h as usize);
    (0..channels)
        .map(|c| {
            let values: Vec<f64> = samples.iter().skip(c).step_by(channels).copied().collect();
            let mut band = MemBand::from_values(width, height, data_type, &values)?
                .with_block_size(block);
            band.set_nodata(nodata);
            Ok(band)
        })
        .collect()
}

fn widen<T: Copy + Into<f64>>(buf: &[T]) -> Vec<f64> {
    buf.iter().map(|&v| v.into()).collect()
}

/// Write one band as grayscale or three bands as RGB, uncompressed
pub fn write_tiff<P: AsRef<Path>>(path: P, bands: &[&MemBand]) -> Result<()> {
    write_tiff_with(path, bands, Compression::None)
}

/// Same as [`write_tiff`] with the given strip compression
pub fn write_tiff_with<P: AsRef<Path>>(
    path: P,
    bands: &[&MemBand],
    compression: Compression,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_tiff(BufWriter::new(file), bands, compression)
}

/// Same as [`write_tiff`], returning the encoded bytes
pub fn write_tiff_to_buffer(bands: &[&MemBand]) -> Result<Vec<u8>> {
    write_tiff_to_buffer_with(bands, Compression::None)
}

pub fn write_tiff_to_buffer_with(bands: &[&MemBand], compression: Compression) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_tiff(Cursor::new(&mut buf), bands, compression)?;
    Ok(buf)
}

macro_rules! encode_image {
    ($encoder:expr, $color:ty, $prim:ty, $shape:expr, $samples:expr, $nodata:expr) => {{
        let data: Vec<$prim> = $samples
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or_default())
            .collect();
        let mut image = $encoder.new_image::<$color>($shape.width as u32, $shape.height as u32)?;
        if let Some(text) = $nodata {
            image
                .encoder()
                .write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())?;
        }
        image.write_data(&data)?;
    }};
}

fn encode_tiff<W: Write + Seek>(
    writer: W,
    bands: &[&MemBand],
    compression: Compression,
) -> Result<()> {
    let first = bands.first().ok_or_else(|| Error::InvalidParameter {
        name: "bands",
        value: "0".into(),
        reason: "nothing to write".into(),
    })?;
    let shape = first.shape();
    let data_type = first.data_type();
    for band in bands {
        if band.shape() != shape {
            return Err(Error::InvalidDimensions {
                width: band.width(),
                height: band.height(),
            });
        }
        if band.data_type() != data_type {
            return Err(Error::UnsupportedDataType(format!(
                "mixed band types {} and {}",
                data_type,
                band.data_type()
            )));
        }
    }

    // pixel-interleaved
    let arrays: Vec<_> = bands.iter().map(|b| b.to_array()).collect();
    let mut samples = Vec::with_capacity(shape.len() * bands.len());
    for (r, c) in (0..shape.height).flat_map(|r| (0..shape.width).map(move |c| (r, c))) {
        samples.extend(arrays.iter().map(|a| a[[r, c]]));
    }
    let nodata = first.nodata().map(|v| v.to_string());

    tracing::debug!(
        "Writing {} band(s) {}x{} {}, compression {}",
        bands.len(),
        shape.width,
        shape.height,
        data_type,
        compression
    );
    let mut encoder = TiffEncoder::new(writer)?.with_compression(compression.to_tiff());
    match (bands.len(), data_type) {
        (1, DataType::Byte) => encode_image!(encoder, colortype::Gray8, u8, shape, samples, nodata),
        (1, DataType::SignedByte) => {
            encode_image!(encoder, colortype::GrayI8, i8, shape, samples, nodata)
        }
        (1, DataType::UInt16) => {
            encode_image!(encoder, colortype::Gray16, u16, shape, samples, nodata)
        }
        (1, DataType::Int16) => {
            encode_image!(encoder, colortype::GrayI16, i16, shape, samples, nodata)
        }
        (1, DataType::UInt32) => {
            encode_image!(encoder, colortype::Gray32, u32, shape, samples, nodata)
        }
        (1, DataType::Int32) => {
            encode_image!(encoder, colortype::GrayI32, i32, shape, samples, nodata)
        }
        (1, DataType::Float32) => {
            encode_image!(encoder, colortype::Gray32Float, f32, shape, samples, nodata)
        }
        (1, DataType::Float64) => {
            encode_image!(encoder, colortype::Gray64Float, f64, shape, samples, nodata)
        }
        (3, DataType::Byte) => encode_image!(encoder, colortype::RGB8, u8, shape, samples, nodata),
        (3, DataType::UInt16) => {
            encode_image!(encoder, colortype::RGB16, u16, shape, samples, nodata)
        }
        (3, DataType::UInt32) => {
            encode_image!(encoder, colortype::RGB32, u32, shape, samples, nodata)
        }
        (3, other) => {
            return Err(Error::UnsupportedDataType(format!(
                "RGB TIFF output in {}",
                other
            )))
        }
        (n, _) => {
            return Err(Error::Unsupported(format!(
                "TIFF output with {} bands (expected 1 or 3)",
                n
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_roundtrip_keeps_type() {
        for dt in DataType::ALL {
            let values: Vec<f64> = (0..12).map(|v| v as f64 * 3.0).collect();
            let band = MemBand::from_values(4, 3, dt, &values).unwrap();
            let bytes = write_tiff_to_buffer(&[&band]).unwrap();
            let back = read_tiff_from_buffer(&bytes).unwrap();
            assert_eq!(back.len(), 1, "{}", dt);
            assert_eq!(back[0].data_type(), dt);
            assert_eq!(back[0].to_array(), band.to_array());
        }
    }

    #[test]
    fn test_rgb_roundtrip() {
        let r = MemBand::filled(5, 2, DataType::UInt16, 1000.0).unwrap();
        let g = MemBand::filled(5, 2, DataType::UInt16, 2000.0).unwrap();
        let b = MemBand::filled(5, 2, DataType::UInt16, 3000.0).unwrap();
        let bytes = write_tiff_to_buffer(&[&r, &g, &b]).unwrap();
        let back = read_tiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back[0].value(4, 1), Some(1000.0));
        assert_eq!(back[1].value(0, 0), Some(2000.0));
        assert_eq!(back[2].value(2, 1), Some(3000.0));
    }

    #[test]
    fn test_nodata_preserved() {
        let band = MemBand::filled(3, 3, DataType::Int16, 7.0)
            .unwrap()
            .with_nodata(-9999.0);
        let bytes = write_tiff_to_buffer(&[&band]).unwrap();
        let back = read_tiff_from_buffer(&bytes).unwrap();
        assert_eq!(back[0].nodata(), Some(-9999.0));
    }

    #[test]
    fn test_rejects_bad_band_sets() {
        let a = MemBand::new(3, 3, DataType::Int16).unwrap();
        let b = MemBand::new(3, 3, DataType::Int16).unwrap();
        let c = MemBand::new(3, 3, DataType::Int16).unwrap();
        assert!(matches!(
            write_tiff_to_buffer(&[&a, &b, &c]),
            Err(Error::UnsupportedDataType(_))
        ));
        assert!(matches!(
            write_tiff_to_buffer(&[&a, &b]),
            Err(Error::Unsupported(_))
        ));
        let small = MemBand::new(2, 3, DataType::Int16).unwrap();
        assert!(write_tiff_to_buffer(&[&a, &small]).is_err());
        assert!(write_tiff_to_buffer(&[]).is_err());
    }

    #[test]
    fn test_compressed_roundtrip() {
        // runs of 32 equal bytes
        let values: Vec<f64> = (0..64 * 64).map(|v| ((v / 32) % 8) as f64 * 30.0).collect();
        let band = MemBand::from_values(64, 64, DataType::Byte, &values).unwrap();
        let plain = write_tiff_to_buffer(&[&band]).unwrap();
        for compression in Compression::ALL {
            let bytes = write_tiff_to_buffer_with(&[&band, &band, &band], compression).unwrap();
            let back = read_tiff_from_buffer(&bytes).unwrap();
            assert_eq!(back.len(), 3, "{}", compression);
            for read in &back {
                assert_eq!(read.to_array(), band.to_array(), "{}", compression);
            }
            if compression != Compression::None {
                let gray = write_tiff_to_buffer_with(&[&band], compression).unwrap();
                assert!(gray.len() < plain.len(), "{} did not shrink", compression);
            }
        }
    }

    #[test]
    fn test_compression_names() {
        for compression in Compression::ALL {
            assert_eq!(Compression::from_name(compression.name()), Some(compression));
        }
        assert_eq!(Compression::from_name("ZIP"), Some(Compression::Deflate));
        assert_eq!(Compression::from_name("jpeg"), None);
        assert_eq!(Compression::default(), Compression::None);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        let band = MemBand::from_values(2, 2, DataType::Byte, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        write_tiff(&path, &[&band]).unwrap();
        let back = read_tiff(&path).unwrap();
        assert_eq!(back[0].to_array(), band.to_array());
    }
}
