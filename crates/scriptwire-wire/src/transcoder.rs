//! Byte ↔ code point transcoding.
//!
//! The transport only carries strings, so every byte is mapped onto one of
//! 256 transport-safe code points. Both tables are closed and
//! order-significant: byte `n` is the `n`-th code point. Changing either
//! table breaks wire compatibility with peers using the old one.

use crate::error::{Result, WireError};

/// A closed table of 256 transport-safe code points.
#[derive(Debug)]
pub struct Charset {
    name: &'static str,
    ranges: &'static [(u32, u32)],
    table: [char; 256],
}

const DATA_RANGES: &[(u32, u32)] = &[(0x20, 0x39), (0x3B, 0x7E), (0xA1, 0x142)];
const ID_RANGES: &[(u32, u32)] = &[(0x21, 0x39), (0x3B, 0x7E), (0xA1, 0x143)];

/// Payload charset: printable ASCII without `:`, then U+00A1..U+0142.
pub static DATA_CHARSET: Charset = Charset::new("data", DATA_RANGES);

/// Identifier charset: like [`DATA_CHARSET`] without the space, shifted by one.
pub static ID_CHARSET: Charset = Charset::new("id", ID_RANGES);

impl Charset {
    const fn new(name: &'static str, ranges: &'static [(u32, u32)]) -> Self {
        Self {
            name,
            ranges,
            table: build_table(ranges),
        }
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Code point for `byte`.
    pub fn byte_to_char(&self, byte: u8) -> char {
        self.table[usize::from(byte)]
    }

    /// Byte for `ch`, or `None` if `ch` is outside the table.
    pub fn char_to_byte(&self, ch: char) -> Option<u8> {
        let cp = u32::from(ch);
        let mut base = 0u32;
        for &(lo, hi) in self.ranges {
            if (lo..=hi).contains(&cp) {
                return u8::try_from(base + (cp - lo)).ok();
            }
            base += hi - lo + 1;
        }
        None
    }

    /// Whether `ch` is part of this table.
    pub fn contains(&self, ch: char) -> bool {
        self.char_to_byte(ch).is_some()
    }

    /// Transcode bytes to a transport-safe string, one char per byte.
    pub fn encode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.byte_to_char(b)).collect()
    }

    /// Transcode a string produced by [`Charset::encode`] back to bytes.
    pub fn decode(&self, text: &str) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len());
        self.decode_into(text, &mut out)?;
        Ok(out)
    }

    /// Like [`Charset::decode`], appending to `out`.
    pub fn decode_into(&self, text: &str, out: &mut Vec<u8>) -> Result<()> {
        for ch in text.chars() {
            let byte = self.char_to_byte(ch).ok_or(WireError::InvalidCharacter {
                ch,
                charset: self.name,
            })?;
            out.push(byte);
        }
        Ok(())
    }
}

const fn build_table(ranges: &[(u32, u32)]) -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut filled = 0usize;
    let mut r = 0usize;
    while r < ranges.len() {
        let (lo, hi) = ranges[r];
        let mut cp = lo;
        while cp <= hi {
            table[filled] = match char::from_u32(cp) {
                Some(ch) => ch,
                None => panic!("charset range contains an invalid code point"),
            };
            filled += 1;
            cp += 1;
        }
        r += 1;
    }
    assert!(filled == 256, "charset must map exactly 256 code points");
    table
}
