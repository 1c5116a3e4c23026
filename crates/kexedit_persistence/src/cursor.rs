// SPDX-License-Identifier: MIT OR Apache-2.0
//! Little-endian primitive reading and writing.
//!
//! [`ByteCursor`] checks every read against the remaining length before it
//! touches the buffer, so corrupt length fields surface as
//! [`FormatError::UnexpectedEndOfBuffer`] instead of a panic.

use crate::error::{FormatError, FormatResult};

/// Bounds-checked reader over a byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Start reading at the beginning of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the buffer is exhausted
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, needed: usize) -> FormatResult<()> {
        if needed > self.remaining() {
            return Err(FormatError::UnexpectedEndOfBuffer {
                offset: self.pos,
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Borrow the next `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> FormatResult<&'a [u8]> {
        self.ensure(n)?;
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> FormatResult<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a `u8`
    pub fn read_u8(&mut self) -> FormatResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a `u8` as a boolean (non-zero is true)
    pub fn read_bool(&mut self) -> FormatResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a little-endian `i32`
    pub fn read_i32(&mut self) -> FormatResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u16`
    pub fn read_u16(&mut self) -> FormatResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u32`
    pub fn read_u32(&mut self) -> FormatResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `u64`
    pub fn read_u64(&mut self) -> FormatResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian `f32`
    pub fn read_f32(&mut self) -> FormatResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read two `f32`
    pub fn read_vec2(&mut self) -> FormatResult<[f32; 2]> {
        self.ensure(8)?;
        Ok([self.read_f32()?, self.read_f32()?])
    }

    /// Read three `f32`
    pub fn read_vec3(&mut self) -> FormatResult<[f32; 3]> {
        self.ensure(12)?;
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read a 4-byte tag, dropping NUL padding
    pub fn read_tag(&mut self) -> FormatResult<String> {
        let raw = self.read_array::<4>()?;
        Ok(raw
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect())
    }

    /// Read an `i32` count, rejecting negative values
    pub fn read_count(&mut self) -> FormatResult<usize> {
        let offset = self.pos;
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| FormatError::NegativeCount { count, offset })
    }

    /// Read a count and make sure `count * record_size` bytes are present
    pub fn read_count_of(&mut self, record_size: usize) -> FormatResult<usize> {
        let count = self.read_count()?;
        self.ensure(count.saturating_mul(record_size))?;
        Ok(count)
    }
}

/// Growable little-endian writer
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `n` zero bytes
    pub fn write_padding(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Write a `u8`
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a boolean as `u8`
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write an `i32`
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u16`
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u32`
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u64`
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `f32`
    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write two `f32`
    pub fn write_vec2(&mut self, value: [f32; 2]) {
        value.iter().for_each(|v| self.write_f32(*v));
    }

    /// Write three `f32`
    pub fn write_vec3(&mut self, value: [f32; 3]) {
        value.iter().for_each(|v| self.write_f32(*v));
    }

    /// Write a tag, truncated or NUL-padded to 4 bytes
    pub fn write_tag(&mut self, tag: &str) {
        let mut raw = [0u8; 4];
        for (dst, src) in raw.iter_mut().zip(tag.bytes()) {
            *dst = src;
        }
        self.write_bytes(&raw);
    }

    /// Write a collection length as `i32`, saturating
    pub fn write_count(&mut self, count: usize) {
        self.write_i32(i32::try_from(count).unwrap_or(i32::MAX));
    }

    /// Overwrite a previously written `u32`
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_primitives_little_endian() {
        let mut w = ByteWriter::new();
        w.write_u32(0x0102_0304);
        w.write_i32(-2);
        w.write_f32(1.5);
        w.write_u64(7);
        w.write_bool(true);
        assert_eq!(&w.as_slice()[..4], &[4, 3, 2, 1]);

        let bytes = w.into_inner();
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(c.read_i32().unwrap(), -2);
        assert_eq!(c.read_f32().unwrap(), 1.5);
        assert_eq!(c.read_u64().unwrap(), 7);
        assert!(c.read_bool().unwrap());
        assert!(c.is_empty());
    }

    #[test]
    fn test_overrun_is_error() {
        let bytes = [1u8, 2, 3];
        let mut c = ByteCursor::new(&bytes);
        let err = c.read_u32().unwrap_err();
        assert_eq!(
            err,
            FormatError::UnexpectedEndOfBuffer {
                offset: 0,
                needed: 4,
                remaining: 3
            }
        );
        // Failed reads do not advance
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_negative_and_hostile_counts() {
        let mut w = ByteWriter::new();
        w.write_i32(-5);
        w.write_i32(i32::MAX);
        let bytes = w.into_inner();
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(
            c.read_count().unwrap_err(),
            FormatError::NegativeCount { count: -5, offset: 0 }
        );
        assert!(matches!(
            c.read_count_of(26),
            Err(FormatError::UnexpectedEndOfBuffer { .. })
        ));
    }

    #[test]
    fn test_tags() {
        let mut w = ByteWriter::new();
        w.write_tag("UI");
        w.write_tag("GRPH");
        assert_eq!(&w.as_slice()[..4], b"UI\0\0");
        let bytes = w.into_inner();
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_tag().unwrap(), "UI");
        assert_eq!(c.read_tag().unwrap(), "GRPH");
    }

    #[test]
    fn test_patch() {
        let mut w = ByteWriter::new();
        w.write_u32(0);
        w.write_u8(9);
        w.patch_u32(0, 42);
        let bytes = w.into_inner();
        assert_eq!(ByteCursor::new(&bytes).read_u32().unwrap(), 42);
    }

    proptest! {
        #[test]
        fn test_arbitrary_reads_stay_in_bounds(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
            ops in proptest::collection::vec(0u8..10, 0..32),
        ) {
            let mut c = ByteCursor::new(&bytes);
            for op in ops {
                let before = c.position();
                let ok = match op {
                    0 => c.read_u8().is_ok(),
                    1 => c.read_u16().is_ok(),
                    2 => c.read_i32().is_ok(),
                    3 => c.read_u64().is_ok(),
                    4 => c.read_f32().is_ok(),
                    5 => c.read_vec2().is_ok(),
                    6 => c.read_vec3().is_ok(),
                    7 => c.read_tag().is_ok(),
                    8 => c.skip(usize::from(op) * 5).is_ok(),
                    _ => c.read_bytes(c.remaining() + 1).is_ok(),
                };
                if !ok {
                    prop_assert_eq!(c.position(), before);
                }
                prop_assert_eq!(c.position() + c.remaining(), bytes.len());
            }
        }

        #[test]
        fn test_counts_never_exceed_buffer(bytes in proptest::collection::vec(any::<u8>(), 4..64)) {
            let mut c = ByteCursor::new(&bytes);
            if let Ok(count) = c.read_count_of(3) {
                prop_assert!(count * 3 <= c.remaining());
            }
        }
    }
}
