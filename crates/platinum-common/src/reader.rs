//! Binary reader for zero-copy parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! fixed-width fields from a byte slice without copying. The archive formats
//! handled by Platinum mix byte orders (BXM is big-endian, PKZ little-endian,
//! and DAT either), so every multi-byte read is available in both orders.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// Byte order selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Decode a u32 from the first four bytes of `bytes`.
    #[inline]
    pub fn u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }
}

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use platinum_common::{BinaryReader, Endian};
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x10];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u32_with(Endian::Big).unwrap(), 0x0010);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a u32 in the given byte order.
    #[inline]
    pub fn read_u32_with(&mut self, endian: Endian) -> Result<u32> {
        self.read_bytes(4).map(|b| endian.u32(b))
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_u32_with(Endian::Little)
    }

    /// Read `count` u32 values in the given byte order.
    pub fn read_u32_array(&mut self, count: usize, endian: Endian) -> Result<Vec<u32>> {
        let needed = count.checked_mul(4).ok_or(Error::UnexpectedEof {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.read_bytes(needed)?;
        Ok(bytes.chunks_exact(4).map(|chunk| endian.u32(chunk)).collect())
    }

    /// Read a null-terminated string, lossily decoded as UTF-8.
    ///
    /// A string running to the end of the buffer without a terminator is
    /// accepted as-is.
    pub fn read_cstring_lossy(&mut self) -> String {
        let remaining = self.remaining_bytes();
        let end = memchr::memchr(0, remaining).unwrap_or(remaining.len());
        let text = String::from_utf8_lossy(&remaining[..end]).into_owned();
        self.position += (end + 1).min(remaining.len());
        text
    }

    /// Read a string from a fixed-size buffer, stopping at the first null.
    pub fn read_string_in_buffer(&mut self, buffer_size: usize) -> Result<String> {
        let bytes = self.read_bytes(buffer_size)?;
        let null_pos = memchr::memchr(0, bytes).unwrap_or(buffer_size);
        Ok(String::from_utf8_lossy(&bytes[..null_pos]).into_owned())
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: size,
            available: bytes.len(),
        })
    }

    /// Expect specific magic bytes.
    pub fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_big_endian() {
        let data = [0x00, 0x00, 0x01, 0x00];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32_with(Endian::Big).unwrap(), 0x0100);
    }

    #[test]
    fn test_u32_array() {
        let data = [1, 0, 0, 0, 0, 0, 0, 2];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_u32_array(1, Endian::Little).unwrap(), vec![1]);
        assert_eq!(reader.read_u32_array(1, Endian::Big).unwrap(), vec![2]);
        assert!(reader.read_u32_array(1, Endian::Big).is_err());
    }

    #[test]
    fn test_read_cstring_lossy_unterminated() {
        let data = b"abc\0tail";
        let mut reader = BinaryReader::new(data);

        assert_eq!(reader.read_cstring_lossy(), "abc");
        assert_eq!(reader.read_cstring_lossy(), "tail");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_string_in_buffer() {
        let data = b"ab\0\0cd\0\0";
        let mut reader = BinaryReader::new(data);
        assert_eq!(reader.read_string_in_buffer(4).unwrap(), "ab");
        assert_eq!(reader.read_string_in_buffer(4).unwrap(), "cd");
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        assert!(reader.read_u32().is_err());
    }
}
