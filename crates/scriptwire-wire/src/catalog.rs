//! The primitive wire-type catalog.
//!
//! Every primitive has one encode and one decode rule operating directly on
//! a byte buffer at a caller-supplied offset. Fixed-width numbers are
//! big-endian. Variable-length primitives are self-delimiting: a varint
//! length or value always precedes or constitutes the payload.

use std::fmt;

use bytes::Bytes;

use crate::buffer::EncodeBuffer;
use crate::error::{Result, WireError};
use crate::transcoder::DATA_CHARSET;
use crate::varint::{decode_varint, zigzag_decode, zigzag_encode};

/// A primitive wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// One byte, mapped through the data charset.
    Char,
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
    /// One bit inside a shared, bit-packed byte.
    Boolean,
    /// Unsigned varint.
    VarInt,
    /// ZigZag-mapped signed varint.
    ZigZagVarInt,
    /// Varint byte length followed by UTF-8 bytes.
    String,
    /// Varint length followed by raw bytes.
    ByteArray,
}

impl Primitive {
    /// Every primitive, in catalog order.
    pub const ALL: [Primitive; 14] = [
        Primitive::Char,
        Primitive::Int8,
        Primitive::Int16,
        Primitive::Int32,
        Primitive::UInt8,
        Primitive::UInt16,
        Primitive::UInt32,
        Primitive::Float32,
        Primitive::Float64,
        Primitive::Boolean,
        Primitive::VarInt,
        Primitive::ZigZagVarInt,
        Primitive::String,
        Primitive::ByteArray,
    ];

    /// Name used in declarations and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Char => "char",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::UInt8 => "uint8",
            Primitive::UInt16 => "uint16",
            Primitive::UInt32 => "uint32",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::Boolean => "bool",
            Primitive::VarInt => "varint",
            Primitive::ZigZagVarInt => "zigzag",
            Primitive::String => "string",
            Primitive::ByteArray => "bytes",
        }
    }

    /// Look a primitive up by its declaration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Encoded width for fixed-width primitives.
    ///
    /// `None` for varints, strings and byte arrays. Booleans report 0: they
    /// occupy a bit of a byte shared with neighbouring booleans.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Primitive::Char | Primitive::Int8 | Primitive::UInt8 => Some(1),
            Primitive::Int16 | Primitive::UInt16 => Some(2),
            Primitive::Int32 | Primitive::UInt32 | Primitive::Float32 => Some(4),
            Primitive::Float64 => Some(8),
            Primitive::Boolean => Some(0),
            Primitive::VarInt
            | Primitive::ZigZagVarInt
            | Primitive::String
            | Primitive::ByteArray => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owned primitive value produced by decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Bytes),
}

/// A borrowed primitive value handed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarRef<'a> {
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(&'a str),
    Bytes(&'a [u8]),
}

impl ScalarRef<'_> {
    /// Short description of the runtime kind, for mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ScalarRef::Char(_) => "char",
            ScalarRef::Int(_) => "signed integer",
            ScalarRef::UInt(_) => "unsigned integer",
            ScalarRef::Float(_) => "float",
            ScalarRef::Bool(_) => "boolean",
            ScalarRef::Str(_) => "string",
            ScalarRef::Bytes(_) => "byte array",
        }
    }
}

/// Where the next boolean bit lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlot {
    /// Offset of the byte holding the bit.
    pub byte: usize,
    /// Bit index inside that byte, 0 = least significant.
    pub bit: u8,
    /// Whether this claim allocated a fresh byte at the claimed offset.
    pub allocated: bool,
}

/// Bit-packing state shared by all booleans of one record.
///
/// A new byte is allocated exactly when the previous boolean byte holds 8
/// bits; the bit position is the allocation order modulo 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCursor {
    byte: Option<usize>,
    used: u8,
}

impl BoolCursor {
    /// Fresh cursor with no boolean byte allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next bit. `offset` is where a new byte would be placed.
    pub fn claim(&mut self, offset: usize) -> BitSlot {
        match self.byte {
            Some(byte) if self.used < 8 => {
                let bit = self.used;
                self.used += 1;
                BitSlot {
                    byte,
                    bit,
                    allocated: false,
                }
            }
            _ => {
                self.byte = Some(offset);
                self.used = 1;
                BitSlot {
                    byte: offset,
                    bit: 0,
                    allocated: true,
                }
            }
        }
    }

    /// Write one boolean, allocating a byte at the end of `buf` if needed.
    pub fn encode(&mut self, value: bool, buf: &mut EncodeBuffer) {
        let slot = self.claim(buf.len());
        if slot.allocated {
            buf.put_u8(0);
        }
        if value {
            buf.set_bit(slot.byte, slot.bit);
        }
    }

    /// Read one boolean. Returns the value and the next read offset.
    pub fn decode(&mut self, src: &[u8], offset: usize) -> Result<(bool, usize)> {
        let slot = self.claim(offset);
        let byte = *src.get(slot.byte).ok_or(WireError::UnexpectedEof {
            offset: slot.byte,
            needed: 1,
            available: src.len().saturating_sub(slot.byte),
        })?;
        let next = if slot.allocated { offset + 1 } else { offset };
        Ok((byte & (1 << slot.bit) != 0, next))
    }
}

/// Encode one primitive value at the end of `buf`.
pub fn encode_primitive(
    ty: Primitive,
    value: ScalarRef<'_>,
    buf: &mut EncodeBuffer,
    bools: &mut BoolCursor,
) -> Result<()> {
    match ty {
        Primitive::Char => {
            let ch = match value {
                ScalarRef::Char(ch) => ch,
                ScalarRef::Str(s) => single_char(s).ok_or_else(|| mismatch(ty, &value))?,
                _ => return Err(mismatch(ty, &value)),
            };
            let byte = DATA_CHARSET
                .char_to_byte(ch)
                .ok_or(WireError::InvalidCharacter {
                    ch,
                    charset: DATA_CHARSET.name(),
                })?;
            buf.put_u8(byte);
        }
        Primitive::Int8 => {
            let v = signed_in_range(ty, value, i64::from(i8::MIN), i64::from(i8::MAX))?;
            buf.put_slice(&(v as i8).to_be_bytes());
        }
        Primitive::Int16 => {
            let v = signed_in_range(ty, value, i64::from(i16::MIN), i64::from(i16::MAX))?;
            buf.put_slice(&(v as i16).to_be_bytes());
        }
        Primitive::Int32 => {
            let v = signed_in_range(ty, value, i64::from(i32::MIN), i64::from(i32::MAX))?;
            buf.put_slice(&(v as i32).to_be_bytes());
        }
        Primitive::UInt8 => {
            let v = unsigned_in_range(ty, value, u64::from(u8::MAX))?;
            buf.put_u8(v as u8);
        }
        Primitive::UInt16 => {
            let v = unsigned_in_range(ty, value, u64::from(u16::MAX))?;
            buf.put_slice(&(v as u16).to_be_bytes());
        }
        Primitive::UInt32 => {
            let v = unsigned_in_range(ty, value, u64::from(u32::MAX))?;
            buf.put_slice(&(v as u32).to_be_bytes());
        }
        Primitive::Float32 => {
            let v = float_value(ty, value)?;
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                return Err(WireError::OutOfRange {
                    ty,
                    value: v.to_string(),
                });
            }
            buf.put_slice(&(v as f32).to_be_bytes());
        }
        Primitive::Float64 => {
            let v = float_value(ty, value)?;
            buf.put_slice(&v.to_be_bytes());
        }
        Primitive::Boolean => match value {
            ScalarRef::Bool(b) => bools.encode(b, buf),
            _ => return Err(mismatch(ty, &value)),
        },
        Primitive::VarInt => {
            let v = unsigned_in_range(ty, value, u64::MAX)?;
            buf.put_varint(v);
        }
        Primitive::ZigZagVarInt => {
            let v = signed_in_range(ty, value, i64::MIN, i64::MAX)?;
            buf.put_varint(zigzag_encode(v));
        }
        Primitive::String => match value {
            ScalarRef::Str(s) => {
                buf.put_varint(s.len() as u64);
                buf.put_slice(s.as_bytes());
            }
            _ => return Err(mismatch(ty, &value)),
        },
        Primitive::ByteArray => match value {
            ScalarRef::Bytes(b) => {
                buf.put_varint(b.len() as u64);
                buf.put_slice(b);
            }
            _ => return Err(mismatch(ty, &value)),
        },
    }
    Ok(())
}

/// Decode one primitive value starting at `offset`.
///
/// Returns the value and the offset of the next unread byte. Byte arrays are
/// zero-copy slices of `src`.
pub fn decode_primitive(
    ty: Primitive,
    src: &Bytes,
    offset: usize,
    bools: &mut BoolCursor,
) -> Result<(Scalar, usize)> {
    let decoded = match ty {
        Primitive::Char => {
            let [b] = take::<1>(src, offset)?;
            (Scalar::Char(DATA_CHARSET.byte_to_char(b)), offset + 1)
        }
        Primitive::Int8 => (
            Scalar::Int(i64::from(i8::from_be_bytes(take(src, offset)?))),
            offset + 1,
        ),
        Primitive::Int16 => (
            Scalar::Int(i64::from(i16::from_be_bytes(take(src, offset)?))),
            offset + 2,
        ),
        Primitive::Int32 => (
            Scalar::Int(i64::from(i32::from_be_bytes(take(src, offset)?))),
            offset + 4,
        ),
        Primitive::UInt8 => {
            let [b] = take::<1>(src, offset)?;
            (Scalar::UInt(u64::from(b)), offset + 1)
        }
        Primitive::UInt16 => (
            Scalar::UInt(u64::from(u16::from_be_bytes(take(src, offset)?))),
            offset + 2,
        ),
        Primitive::UInt32 => (
            Scalar::UInt(u64::from(u32::from_be_bytes(take(src, offset)?))),
            offset + 4,
        ),
        Primitive::Float32 => (
            Scalar::Float(f64::from(f32::from_be_bytes(take(src, offset)?))),
            offset + 4,
        ),
        Primitive::Float64 => (
            Scalar::Float(f64::from_be_bytes(take(src, offset)?)),
            offset + 8,
        ),
        Primitive::Boolean => {
            let (value, next) = bools.decode(src, offset)?;
            (Scalar::Bool(value), next)
        }
        Primitive::VarInt => {
            let (value, next) = decode_varint(src, offset)?;
            (Scalar::UInt(value), next)
        }
        Primitive::ZigZagVarInt => {
            let (value, next) = decode_varint(src, offset)?;
            (Scalar::Int(zigzag_decode(value)), next)
        }
        Primitive::String => {
            let (start, end) = length_prefixed(src, offset)?;
            let text = std::str::from_utf8(&src[start..end])
                .map_err(|_| WireError::InvalidUtf8 { offset: start })?;
            (Scalar::String(text.to_owned()), end)
        }
        Primitive::ByteArray => {
            let (start, end) = length_prefixed(src, offset)?;
            (Scalar::Bytes(src.slice(start..end)), end)
        }
    };
    Ok(decoded)
}

/// Encode a dynamic array: varint element count, then each element.
pub fn encode_array<T, E, F>(items: &[T], buf: &mut EncodeBuffer, mut encode_item: F) -> std::result::Result<(), E>
where
    F: FnMut(&T, &mut EncodeBuffer) -> std::result::Result<(), E>,
{
    buf.put_varint(items.len() as u64);
    for item in items {
        encode_item(item, buf)?;
    }
    Ok(())
}

/// Elements a decoder accepts per remaining byte. Eight packed booleans is
/// the densest element encoding.
const MAX_ELEMENTS_PER_BYTE: u64 = 8;

/// Elements a decoder accepts beyond the byte budget: booleans filling a
/// bool byte the record already allocated, or empty composites.
const MAX_ZERO_WIDTH_ELEMENTS: u64 = 7;

/// Decode a dynamic array written by [`encode_array`].
///
/// `decode_item` receives the offset of the next element and returns the
/// element with the offset after it.
///
/// A count that the remaining bytes cannot hold fails with
/// [`WireError::UnexpectedEof`] before any element is decoded, so arrays of
/// zero-width elements longer than [`MAX_ZERO_WIDTH_ELEMENTS`] plus eight per
/// trailing byte do not decode.
pub fn decode_array<T, E, F>(src: &Bytes, offset: usize, mut decode_item: F) -> std::result::Result<(Vec<T>, usize), E>
where
    E: From<WireError>,
    F: FnMut(usize) -> std::result::Result<(T, usize), E>,
{
    let (count, mut index) = decode_varint(src, offset)?;
    let available = src.len().saturating_sub(index);
    let remaining = available as u64;
    let limit = remaining
        .saturating_mul(MAX_ELEMENTS_PER_BYTE)
        .saturating_add(MAX_ZERO_WIDTH_ELEMENTS);
    if count > limit {
        return Err(WireError::UnexpectedEof {
            offset: index,
            needed: usize::try_from(count.div_ceil(MAX_ELEMENTS_PER_BYTE)).unwrap_or(usize::MAX),
            available,
        }
        .into());
    }
    let mut items = Vec::with_capacity(count.min(remaining) as usize);
    for _ in 0..count {
        let (item, next) = decode_item(index)?;
        items.push(item);
        index = next;
    }
    Ok((items, index))
}

fn mismatch(expected: Primitive, value: &ScalarRef<'_>) -> WireError {
    WireError::ArgumentTypeMismatch {
        expected,
        found: value.kind(),
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn signed_in_range(ty: Primitive, value: ScalarRef<'_>, min: i64, max: i64) -> Result<i64> {
    let v = match value {
        ScalarRef::Int(v) => v,
        ScalarRef::UInt(v) => i64::try_from(v).map_err(|_| WireError::OutOfRange {
            ty,
            value: v.to_string(),
        })?,
        _ => return Err(mismatch(ty, &value)),
    };
    if v < min || v > max {
        return Err(WireError::OutOfRange {
            ty,
            value: v.to_string(),
        });
    }
    Ok(v)
}

fn unsigned_in_range(ty: Primitive, value: ScalarRef<'_>, max: u64) -> Result<u64> {
    let v = match value {
        ScalarRef::UInt(v) => v,
        ScalarRef::Int(v) => u64::try_from(v).map_err(|_| WireError::OutOfRange {
            ty,
            value: v.to_string(),
        })?,
        _ => return Err(mismatch(ty, &value)),
    };
    if v > max {
        return Err(WireError::OutOfRange {
            ty,
            value: v.to_string(),
        });
    }
    Ok(v)
}

fn float_value(ty: Primitive, value: ScalarRef<'_>) -> Result<f64> {
    match value {
        ScalarRef::Float(v) => Ok(v),
        ScalarRef::Int(v) => Ok(v as f64),
        ScalarRef::UInt(v) => Ok(v as f64),
        _ => Err(mismatch(ty, &value)),
    }
}

fn take<const N: usize>(src: &[u8], offset: usize) -> Result<[u8; N]> {
    src.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(WireError::UnexpectedEof {
            offset,
            needed: N,
            available: src.len().saturating_sub(offset),
        })
}

fn length_prefixed(src: &[u8], offset: usize) -> Result<(usize, usize)> {
    let (len, start) = decode_varint(src, offset)?;
    let available = src.len().saturating_sub(start);
    match usize::try_from(len) {
        Ok(len) if len <= available => Ok((start, start + len)),
        _ => Err(WireError::UnexpectedEof {
            offset: start,
            needed: usize::try_from(len).unwrap_or(usize::MAX),
            available,
        }),
    }
}
