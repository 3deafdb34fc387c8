//! Sample data types and their codec

use byteorder::{ByteOrder, NativeEndian};
use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type of a band's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Byte,
    SignedByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Byte,
        DataType::SignedByte,
        DataType::Int16,
        DataType::UInt16,
        DataType::Int32,
        DataType::UInt32,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Size of one sample in bytes
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::Byte | DataType::SignedByte => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    /// Size of one sample in bits
    pub fn bits(self) -> u32 {
        8 * self.size_bytes() as u32
    }

    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_signed(self) -> bool {
        match self {
            DataType::Byte | DataType::UInt16 | DataType::UInt32 => false,
            DataType::SignedByte
            | DataType::Int16
            | DataType::Int32
            | DataType::Float32
            | DataType::Float64 => true,
        }
    }

    /// Smallest representable value
    pub fn min_value(self) -> f64 {
        match self {
            DataType::Byte => u8::MIN as f64,
            DataType::SignedByte => i8::MIN as f64,
            DataType::Int16 => i16::MIN as f64,
            DataType::UInt16 => u16::MIN as f64,
            DataType::Int32 => i32::MIN as f64,
            DataType::UInt32 => u32::MIN as f64,
            DataType::Float32 => f32::MIN as f64,
            DataType::Float64 => f64::MIN,
        }
    }

    /// Largest representable value
    pub fn max_value(self) -> f64 {
        match self {
            DataType::Byte => u8::MAX as f64,
            DataType::SignedByte => i8::MAX as f64,
            DataType::Int16 => i16::MAX as f64,
            DataType::UInt16 => u16::MAX as f64,
            DataType::Int32 => i32::MAX as f64,
            DataType::UInt32 => u32::MAX as f64,
            DataType::Float32 => f32::MAX as f64,
            DataType::Float64 => f64::MAX,
        }
    }

    /// Largest unsigned bit pattern of this width: `2^bits - 1`
    pub fn bit_range_max(self) -> u64 {
        match self.bits() {
            64 => u64::MAX,
            bits => (1u64 << bits) - 1,
        }
    }

    /// GDAL-style type name
    pub fn name(self) -> &'static str {
        match self {
            DataType::Byte => "Byte",
            DataType::SignedByte => "Int8",
            DataType::Int16 => "Int16",
            DataType::UInt16 => "UInt16",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        }
    }

    /// Parse a type name, case-insensitive. Accepts GDAL names and Rust primitive names.
    pub fn from_name(name: &str) -> Option<DataType> {
        match name.to_ascii_lowercase().as_str() {
            "byte" | "uint8" | "u8" => Some(DataType::Byte),
            "int8" | "signedbyte" | "i8" => Some(DataType::SignedByte),
            "int16" | "i16" => Some(DataType::Int16),
            "uint16" | "u16" => Some(DataType::UInt16),
            "int32" | "i32" => Some(DataType::Int32),
            "uint32" | "u32" => Some(DataType::UInt32),
            "float32" | "f32" => Some(DataType::Float32),
            "float64" | "f64" => Some(DataType::Float64),
            _ => None,
        }
    }

    /// The widest type of a set. On equal width the signed type wins; among
    /// equally wide signed types the first one seen is kept.
    pub fn largest<I>(types: I) -> Option<DataType>
    where
        I: IntoIterator<Item = DataType>,
    {
        types.into_iter().fold(None, |best, dt| match best {
            None => Some(dt),
            Some(b) if dt.size_bytes() > b.size_bytes() => Some(dt),
            Some(b) if dt.size_bytes() == b.size_bytes() && !b.is_signed() => Some(dt),
            keep => keep,
        })
    }

    pub fn codec(self) -> SampleCodec {
        SampleCodec::new(self)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encodes and decodes single samples of one data type in native byte order.
///
/// Two views of a sample are offered:
/// - *bits*: the stored bit pattern read as an unsigned integer, which is
///   what tiled buffers scale between bit widths;
/// - *value*: the signed-aware numeric value as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleCodec {
    data_type: DataType,
}

impl SampleCodec {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn sample_size(&self) -> usize {
        self.data_type.size_bytes()
    }

    /// Read the stored bit pattern as an unsigned integer
    pub fn decode_bits(&self, bytes: &[u8]) -> u64 {
        match self.data_type {
            DataType::Byte | DataType::SignedByte => bytes[0] as u64,
            DataType::Int16 | DataType::UInt16 => NativeEndian::read_u16(bytes) as u64,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => {
                NativeEndian::read_u32(bytes) as u64
            }
            DataType::Float64 => NativeEndian::read_u64(bytes),
        }
    }

    /// Store the low bits of `bits` as one sample
    pub fn encode_bits(&self, bits: u64, out: &mut [u8]) {
        match self.data_type {
            DataType::Byte | DataType::SignedByte => out[0] = (bits & 0xff) as u8,
            DataType::Int16 | DataType::UInt16 => {
                NativeEndian::write_u16(out, (bits & 0xffff) as u16)
            }
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => {
                NativeEndian::write_u32(out, (bits & 0xffff_ffff) as u32)
            }
            DataType::Float64 => NativeEndian::write_u64(out, bits),
        }
    }

    /// Read the numeric value of one sample
    pub fn decode(&self, bytes: &[u8]) -> f64 {
        match self.data_type {
            DataType::Byte => bytes[0] as f64,
            DataType::SignedByte => bytes[0] as i8 as f64,
            DataType::Int16 => NativeEndian::read_i16(bytes) as f64,
            DataType::UInt16 => NativeEndian::read_u16(bytes) as f64,
            DataType::Int32 => NativeEndian::read_i32(bytes) as f64,
            DataType::UInt32 => NativeEndian::read_u32(bytes) as f64,
            DataType::Float32 => NativeEndian::read_f32(bytes) as f64,
            DataType::Float64 => NativeEndian::read_f64(bytes),
        }
    }

    /// Store a numeric value. Integer types round to nearest and saturate;
    /// NaN becomes 0.
    pub fn encode(&self, value: f64, out: &mut [u8]) {
        match self.data_type {
            DataType::Byte => out[0] = saturate::<u8>(value),
            DataType::SignedByte => out[0] = saturate::<i8>(value) as u8,
            DataType::Int16 => NativeEndian::write_i16(out, saturate(value)),
            DataType::UInt16 => NativeEndian::write_u16(out, saturate(value)),
            DataType::Int32 => NativeEndian::write_i32(out, saturate(value)),
            DataType::UInt32 => NativeEndian::write_u32(out, saturate(value)),
            DataType::Float32 => NativeEndian::write_f32(out, value as f32),
            DataType::Float64 => NativeEndian::write_f64(out, value),
        }
    }
}

fn saturate<T>(value: f64) -> T
where
    T: NumCast + num_traits::Bounded + num_traits::Zero,
{
    if value.is_nan() {
        return T::zero();
    }
    let lo: f64 = NumCast::from(T::min_value()).unwrap_or(f64::MIN);
    let hi: f64 = NumCast::from(T::max_value()).unwrap_or(f64::MAX);
    NumCast::from(value.round().clamp(lo, hi)).unwrap_or_else(T::zero)
}
