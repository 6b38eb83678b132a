//! Common utilities for Platinum.
//!
//! This crate provides foundational types and utilities used across all Platinum crates:
//!
//! - [`ByteSource`] - Range-limited random access over a buffer or a mapped file
//! - [`BinaryReader`] - Zero-copy binary reading from byte slices
//! - [`Endian`] - Runtime-selected byte order for formats without an endianness flag
//! - [`crc`] - CRC-32 hashing utilities

mod error;
mod reader;
mod source;

pub mod crc;

pub use error::{Error, Result};
pub use reader::{BinaryReader, Endian};
pub use source::ByteSource;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for SIMD-accelerated byte searching
pub use memchr;

/// Round `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Extension of a file name: the final dot-segment, without the dot.
///
/// Returns `None` when the name has no dot.
pub fn extension(name: &str) -> Option<&str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.rsplit_once('.').map(|(_, ext)| ext)
}
