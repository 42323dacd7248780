use crate::catalog::Primitive;

/// Errors that can occur while encoding or decoding primitive wire values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    /// A read needed more bytes than the buffer holds.
    #[error("unexpected end of buffer at offset {offset} (needed {needed} bytes, have {available})")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A varint ran past the 10 groups a u64 can occupy.
    #[error("varint at offset {offset} exceeds 64 bits")]
    VarintOverflow { offset: usize },

    /// A character is not part of the charset in use.
    #[error("character {ch:?} is not in the {charset} charset")]
    InvalidCharacter { ch: char, charset: &'static str },

    /// String bytes are not valid UTF-8.
    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    /// The runtime value does not match the declared primitive.
    #[error("expected {expected} value, found {found}")]
    ArgumentTypeMismatch {
        expected: Primitive,
        found: &'static str,
    },

    /// A numeric value does not fit the declared fixed-width primitive.
    #[error("value {value} out of range for {ty}")]
    OutOfRange { ty: Primitive, value: String },
}

pub type Result<T> = std::result::Result<T, WireError>;
