//! Variable-length integers.
//!
//! Each byte carries 7 payload bits, least-significant group first. The high
//! bit (0x80) is set on every byte except the last. Signed values go through
//! the ZigZag mapping first so small magnitudes stay short.

use bytes::BufMut;

use crate::error::{Result, WireError};

/// Maximum encoded length of a u64 varint.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

/// Encode `value` into a fresh byte vector.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_len(value));
    put_varint(&mut out, value);
    out
}

/// Append the varint encoding of `value` to `dst`.
pub fn put_varint<B: BufMut + ?Sized>(dst: &mut B, mut value: u64) {
    while value > u64::from(PAYLOAD_MASK) {
        dst.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `value` occupies once encoded.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Decode a varint starting at `offset`.
///
/// Returns the value and the offset of the first byte after it.
pub fn decode_varint(src: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut index = offset;

    for group in 0..MAX_VARINT_LEN {
        let byte = *src.get(index).ok_or(WireError::UnexpectedEof {
            offset: index,
            needed: 1,
            available: src.len().saturating_sub(index),
        })?;
        index += 1;

        let payload = u64::from(byte & PAYLOAD_MASK);
        if group == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(WireError::VarintOverflow { offset });
        }
        value |= payload << (7 * group);

        if byte & CONTINUATION == 0 {
            return Ok((value, index));
        }
    }

    Err(WireError::VarintOverflow { offset })
}

/// Map a signed integer onto an unsigned one: 0, -1, 1, -2, 2 → 0, 1, 2, 3, 4.
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Reverse of [`zigzag_encode`].
pub fn zigzag_decode(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_boundary_values() {
        for value in [0u64, 1, 127, 128, 16383, 16384, (1 << 31) - 1, u64::MAX] {
            let encoded = encode_varint(value);
            assert_eq!(encoded.len(), varint_len(value), "length of {value}");
            let (decoded, next) = decode_varint(&encoded, 0).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(next, encoded.len());
        }
    }

    #[test]
    fn length_grows_at_seven_bit_boundaries() {
        assert_eq!(encode_varint(0).len(), 1);
        assert_eq!(encode_varint(127).len(), 1);
        assert_eq!(encode_varint(128).len(), 2);
        assert_eq!(encode_varint(16383).len(), 2);
        assert_eq!(encode_varint(16384).len(), 3);
        assert_eq!(encode_varint((1 << 21) - 1).len(), 3);
        assert_eq!(encode_varint(1 << 21).len(), 4);
        assert_eq!(encode_varint(u64::MAX).len(), MAX_VARINT_LEN);

        let mut previous = 0;
        for shift in 0..64 {
            let len = varint_len(1u64 << shift);
            assert!(len >= previous);
            previous = len;
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(4), vec![0x04]);
        assert_eq!(encode_varint(300), vec![0xAC, 0x02]);
        assert_eq!(encode_varint(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn decode_at_offset() {
        let buf = [0xFF, 0xAC, 0x02, 0x07];
        assert_eq!(decode_varint(&buf, 1).unwrap(), (300, 3));
        assert_eq!(decode_varint(&buf, 3).unwrap(), (7, 4));
    }

    #[test]
    fn truncated_varint_is_eof() {
        let err = decode_varint(&[0x80, 0x80], 0).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof { offset: 2, .. }));
        assert!(matches!(
            decode_varint(&[], 0),
            Err(WireError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let buf = [0xFF; 11];
        assert!(matches!(
            decode_varint(&buf, 0),
            Err(WireError::VarintOverflow { offset: 0 })
        ));

        let mut too_big = vec![0xFF; 9];
        too_big.push(0x02);
        assert!(matches!(
            decode_varint(&too_big, 0),
            Err(WireError::VarintOverflow { .. })
        ));
    }

    #[test]
    fn zigzag_roundtrip() {
        for n in [0i64, -1, 1, -(1 << 30), (1 << 30) - 1, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(n)), n);
        }
    }

    #[test]
    fn zigzag_matches_32_bit_mapping() {
        for n in [0i32, -1, 1, -2, 2, i32::MIN, i32::MAX] {
            let narrow = ((n << 1) ^ (n >> 31)) as u32;
            assert_eq!(zigzag_encode(i64::from(n)), u64::from(narrow));
        }
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
    }
}
