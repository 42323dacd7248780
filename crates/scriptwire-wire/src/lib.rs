//! Primitive wire encodings for scriptwire.
//!
//! This is the leaf layer every composite codec is built from:
//! - [`varint`]: LEB128-style varints and ZigZag mapping
//! - [`transcoder`]: the closed 256-entry byte ↔ code point tables that let
//!   binary payloads travel over a string-only transport
//! - [`catalog`]: one encode/decode rule per [`Primitive`], big-endian for
//!   all fixed-width numbers, bit-packed booleans via [`BoolCursor`]
//! - [`buffer`]: the growable [`EncodeBuffer`] owned by one encode call

pub mod buffer;
pub mod catalog;
pub mod error;
pub mod transcoder;
pub mod varint;

pub use buffer::{EncodeBuffer, DEFAULT_ENCODE_BUFFER_SIZE};
pub use catalog::{
    decode_array, decode_primitive, encode_array, encode_primitive, BitSlot, BoolCursor,
    Primitive, Scalar, ScalarRef,
};
pub use error::{Result, WireError};
pub use transcoder::{Charset, DATA_CHARSET, ID_CHARSET};
pub use varint::{decode_varint, encode_varint, put_varint, varint_len, zigzag_decode, zigzag_encode};
