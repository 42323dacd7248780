use bytes::{BufMut, Bytes, BytesMut};

use crate::varint::put_varint;

/// Default starting capacity of an [`EncodeBuffer`].
pub const DEFAULT_ENCODE_BUFFER_SIZE: usize = 16 * 1024;

/// Growable output buffer owned by a single encode call.
///
/// Capacity starts at a fixed size and doubles whenever a write would not
/// fit. Growth never moves the write offset or disturbs bytes already
/// written, so positions recorded earlier (such as a boolean byte still
/// being filled) stay valid.
#[derive(Debug)]
pub struct EncodeBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl EncodeBuffer {
    /// Buffer with [`DEFAULT_ENCODE_BUFFER_SIZE`] starting capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ENCODE_BUFFER_SIZE)
    }

    /// Buffer with an explicit starting capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current logical capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Make room for `additional` more bytes, doubling as often as needed.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.buf.len() + additional;
        if required <= self.capacity {
            return;
        }
        let mut grown = self.capacity;
        while grown < required {
            grown = grown.saturating_mul(2);
        }
        tracing::trace!(from = self.capacity, to = grown, "growing encode buffer");
        self.buf.reserve(grown - self.buf.len());
        self.capacity = grown;
    }

    /// Append one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.reserve(1);
        self.buf.put_u8(value);
    }

    /// Append a byte slice.
    pub fn put_slice(&mut self, src: &[u8]) {
        self.reserve(src.len());
        self.buf.put_slice(src);
    }

    /// Append a varint.
    pub fn put_varint(&mut self, value: u64) {
        self.reserve(crate::varint::varint_len(value));
        put_varint(&mut self.buf, value);
    }

    /// Set bit `bit` of the already written byte at `index`.
    pub(crate) fn set_bit(&mut self, index: usize, bit: u8) {
        self.buf[index] |= 1 << bit;
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Finish encoding and hand out the written bytes.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

impl Default for EncodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_when_full_and_keeps_contents() {
        let mut buf = EncodeBuffer::with_capacity(4);
        buf.put_slice(&[1, 2, 3, 4]);
        assert_eq!(buf.capacity(), 4);

        buf.put_u8(5);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);

        buf.put_slice(&[0; 20]);
        assert_eq!(buf.capacity(), 32);
        assert_eq!(buf.len(), 25);
        assert_eq!(&buf.as_slice()[..5], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn set_bit_survives_growth() {
        let mut buf = EncodeBuffer::with_capacity(1);
        buf.put_u8(0);
        buf.put_slice(&[0xAA; 9]);
        buf.set_bit(0, 3);
        assert_eq!(buf.as_slice()[0], 0b0000_1000);
        assert_eq!(buf.freeze().len(), 10);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = EncodeBuffer::with_capacity(0);
        assert_eq!(buf.capacity(), 1);
        buf.put_varint(300);
        assert_eq!(buf.as_slice(), &[0xAC, 0x02]);
        assert_eq!(buf.capacity(), 2);
    }
}
