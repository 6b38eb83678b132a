//! PKZ on-disk structures. All fields are little-endian.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// PKZ file header (32 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PkzHeader {
    /// `pkzl`
    pub magic: [u8; 4],
    /// Format version
    pub version: u32,
    /// Total archive size in bytes
    pub size: u64,
    /// Number of file descriptors
    pub file_count: u32,
    /// Offset of the descriptor table
    pub descriptors_offset: u32,
    /// Length of the shared name pool following the descriptors
    pub name_pool_length: u32,
    /// Unknown, written as zero
    pub reserved: u32,
}

impl PkzHeader {
    /// PKZ magic.
    pub const MAGIC: [u8; 4] = *b"pkzl";

    /// Header size in bytes.
    pub const SIZE: usize = 32;

    /// Version written by the encoder.
    pub const DEFAULT_VERSION: u32 = 1;
}

/// A file descriptor in the directory table (32 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FileDescriptor {
    /// Offset of the file name in the name pool
    pub name_offset: u32,
    /// Offset of the compression label in the name pool
    pub label_offset: u32,
    /// Uncompressed size
    pub size: u64,
    /// Offset of the stored bytes from the start of the archive
    pub offset: u64,
    /// Stored (compressed) size
    pub compressed_size: u64,
}

impl FileDescriptor {
    /// Descriptor size in bytes.
    pub const SIZE: usize = 32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<PkzHeader>(), PkzHeader::SIZE);
        assert_eq!(std::mem::size_of::<FileDescriptor>(), FileDescriptor::SIZE);
    }

    #[test]
    fn test_header_layout() {
        let header = PkzHeader {
            magic: PkzHeader::MAGIC,
            version: 1,
            size: 0x0102,
            file_count: 3,
            descriptors_offset: 32,
            name_pool_length: 40,
            reserved: 0,
        };
        let bytes = header.as_bytes();
        assert_eq!(&bytes[0..4], b"pkzl");
        assert_eq!(&bytes[8..16], &0x0102u64.to_le_bytes());
        assert_eq!(&bytes[16..20], &3u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &32u32.to_le_bytes());
        assert_eq!(&bytes[24..28], &40u32.to_le_bytes());
    }
}
