//! Immutable, range-addressable byte sources.
//!
//! A [`ByteSource`] is either an in-memory buffer or a memory-mapped file,
//! viewed through a window. Cloning and windowing share the underlying
//! storage, so nested archive entries never copy their parent's bytes.

use std::fmt;
use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::{Error, Result};

#[derive(Clone)]
enum Storage {
    Memory(Arc<[u8]>),
    Mapped(Arc<Mmap>),
}

impl Storage {
    #[inline]
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Memory(bytes) => bytes,
            Storage::Mapped(mmap) => mmap,
        }
    }
}

/// A named, immutable view over a buffer or a mapped file.
#[derive(Clone)]
pub struct ByteSource {
    name: String,
    storage: Storage,
    window: Range<usize>,
}

impl ByteSource {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let window = 0..bytes.len();
        Self {
            name: name.into(),
            storage: Storage::Memory(bytes),
            window,
        }
    }

    /// Memory-map a file. Pages are only read when a range is accessed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            // Mapping a zero-length file fails on some platforms.
            return Ok(Self::from_bytes(name, Vec::new()));
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let window = 0..mmap.len();
        Ok(Self {
            name,
            storage: Storage::Mapped(Arc::new(mmap)),
            window,
        })
    }

    /// File name of this source (the final path segment for nested entries).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether the source holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// All bytes of this source.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[self.window.clone()]
    }

    /// Read the byte range `[start, end)`.
    pub fn read(&self, start: u64, end: u64) -> Result<&[u8]> {
        let range = self.check(start, end)?;
        Ok(&self.as_bytes()[range])
    }

    /// Read the byte range `[start, end)` as text (lossy UTF-8).
    pub fn read_string(&self, start: u64, end: u64) -> Result<String> {
        self.read(start, end)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// The first four bytes, or fewer if the source is shorter.
    pub fn magic(&self) -> &[u8] {
        let bytes = self.as_bytes();
        &bytes[..bytes.len().min(4)]
    }

    /// A sub-source over `[start, end)` sharing this source's storage.
    pub fn slice(&self, name: impl Into<String>, start: u64, end: u64) -> Result<Self> {
        let range = self.check(start, end)?;
        Ok(Self {
            name: name.into(),
            storage: self.storage.clone(),
            window: self.window.start + range.start..self.window.start + range.end,
        })
    }

    /// Same bytes under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn check(&self, start: u64, end: u64) -> Result<Range<usize>> {
        let len = self.len() as u64;
        if start > end || end > len {
            return Err(Error::OutOfRange { start, end, len });
        }
        Ok(start as usize..end as usize)
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("name", &self.name)
            .field("len", &self.len())
            .field(
                "mapped",
                &matches!(self.storage, Storage::Mapped(_)),
            )
            .finish()
    }
}

impl PartialEq for ByteSource {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.as_bytes() == other.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_ranges() {
        let source = ByteSource::from_bytes("a.bin", b"0123456789".to_vec());
        assert_eq!(source.len(), 10);
        assert_eq!(source.read(2, 5).unwrap(), b"234");
        assert_eq!(source.read_string(0, 3).unwrap(), "012");
        assert_eq!(source.magic(), b"0123");
        assert!(matches!(
            source.read(8, 11),
            Err(Error::OutOfRange { start: 8, end: 11, len: 10 })
        ));
        assert!(source.read(5, 4).is_err());
    }

    #[test]
    fn test_slice_shares_storage() {
        let source = ByteSource::from_bytes("a.bin", b"0123456789".to_vec());
        let inner = source.slice("inner", 3, 8).unwrap();
        assert_eq!(inner.name(), "inner");
        assert_eq!(inner.as_bytes(), b"34567");

        let nested = inner.slice("nested", 1, 3).unwrap();
        assert_eq!(nested.as_bytes(), b"45");
        assert!(inner.slice("bad", 0, 6).is_err());
    }

    #[test]
    fn test_short_magic() {
        let source = ByteSource::from_bytes("tiny", vec![1u8, 2]);
        assert_eq!(source.magic(), &[1, 2]);
    }

    #[test]
    fn test_open_mapped_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"pkzl-test").unwrap();
        file.flush().unwrap();

        let source = ByteSource::open(file.path()).unwrap();
        assert_eq!(source.len(), 9);
        assert_eq!(source.read(0, 4).unwrap(), b"pkzl");
    }

    #[test]
    fn test_open_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = ByteSource::open(file.path()).unwrap();
        assert!(source.is_empty());
    }
}
