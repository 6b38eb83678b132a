//! BXM on-disk structures.
//!
//! Every multi-byte field is big-endian.

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Offset value meaning "no string".
pub const ABSENT: u16 = 0xFFFF;

/// BXM file header (16 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BxmHeader {
    /// `XML\0` or `BXM\0`.
    pub magic: [u8; 4],
    /// Unknown, written as zero.
    pub reserved: [U16<BigEndian>; 2],
    /// Number of node records.
    pub node_count: U16<BigEndian>,
    /// Number of data-offset pairs.
    pub data_count: U16<BigEndian>,
    /// Size of the string pool in bytes.
    pub pool_size: U32<BigEndian>,
}

impl BxmHeader {
    /// Magic written by the encoder.
    pub const MAGIC: [u8; 4] = *b"XML\0";

    /// Alternative magic found in some titles.
    pub const MAGIC_ALT: [u8; 4] = *b"BXM\0";

    /// Header size in bytes.
    pub const SIZE: usize = 16;

    /// Build a header for the encoder.
    pub fn new(node_count: u16, data_count: u16, pool_size: u32) -> Self {
        Self {
            magic: Self::MAGIC,
            reserved: [U16::new(0), U16::new(0)],
            node_count: U16::new(node_count),
            data_count: U16::new(data_count),
            pool_size: U32::new(pool_size),
        }
    }
}

/// A node in the flat node table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct NodeRecord {
    /// Number of child nodes.
    pub child_count: U16<BigEndian>,
    /// Index of the first child; children are contiguous.
    pub first_child_index: U16<BigEndian>,
    /// Number of attributes.
    pub attribute_count: U16<BigEndian>,
    /// Index of this node's name/value pair in the data-offset table.
    /// Attributes follow at `data_index + 1`.
    pub data_index: U16<BigEndian>,
}

impl NodeRecord {
    /// Record size in bytes.
    pub const SIZE: usize = 8;

    pub fn new(child_count: u16, first_child_index: u16, attribute_count: u16, data_index: u16) -> Self {
        Self {
            child_count: U16::new(child_count),
            first_child_index: U16::new(first_child_index),
            attribute_count: U16::new(attribute_count),
            data_index: U16::new(data_index),
        }
    }
}

/// A name/value pair of string-pool offsets.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct DataRecord {
    pub name_offset: U16<BigEndian>,
    pub value_offset: U16<BigEndian>,
}

impl DataRecord {
    /// Record size in bytes.
    pub const SIZE: usize = 4;

    pub fn new(name_offset: u16, value_offset: u16) -> Self {
        Self {
            name_offset: U16::new(name_offset),
            value_offset: U16::new(value_offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<BxmHeader>(), BxmHeader::SIZE);
        assert_eq!(std::mem::size_of::<NodeRecord>(), NodeRecord::SIZE);
        assert_eq!(std::mem::size_of::<DataRecord>(), DataRecord::SIZE);
    }

    #[test]
    fn test_header_is_big_endian() {
        let header = BxmHeader::new(1, 2, 0x0102_0304);
        assert_eq!(
            header.as_bytes(),
            b"XML\0\0\0\0\0\0\x01\0\x02\x01\x02\x03\x04"
        );
    }
}
