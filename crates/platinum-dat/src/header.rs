//! DAT header.

use platinum_common::{BinaryReader, Endian};

use crate::{Error, Result};

/// Little-endian file counts above this mark a big-endian archive.
pub const DEFAULT_BIG_ENDIAN_THRESHOLD: u32 = 100_000;

/// Tunables for DAT decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatOptions {
    /// Switch to big-endian when the little-endian file count exceeds this.
    pub big_endian_threshold: u32,
}

impl Default for DatOptions {
    fn default() -> Self {
        Self {
            big_endian_threshold: DEFAULT_BIG_ENDIAN_THRESHOLD,
        }
    }
}

/// The 32-byte DAT header.
///
/// ```text
/// 0   magic "DAT\0"
/// 4   file count
/// 8   entry offset table
/// 12  extension table
/// 16  name table
/// 20  size table
/// 24  hash map
/// 28  unused
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatHeader {
    pub endian: Endian,
    pub file_count: u32,
    pub offsets_offset: u32,
    pub extensions_offset: u32,
    pub names_offset: u32,
    pub sizes_offset: u32,
    pub hash_map_offset: u32,
}

impl DatHeader {
    /// DAT magic.
    pub const MAGIC: [u8; 4] = *b"DAT\0";

    /// Header size in bytes.
    pub const SIZE: usize = 32;

    /// Parse the header, picking the byte order from the file count.
    pub fn parse(data: &[u8], options: &DatOptions) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::MalformedHeader(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }

        let mut reader = BinaryReader::new(data);
        reader.expect_magic(&Self::MAGIC)?;

        let mut endian = Endian::Little;
        let mut file_count = reader.read_u32()?;
        if file_count > options.big_endian_threshold {
            endian = Endian::Big;
            file_count = Endian::Big.u32(&data[4..8]);
            log::debug!("DAT file count above {}, reading big-endian", options.big_endian_threshold);
        }

        Ok(Self {
            endian,
            file_count,
            offsets_offset: reader.read_u32_with(endian)?,
            extensions_offset: reader.read_u32_with(endian)?,
            names_offset: reader.read_u32_with(endian)?,
            sizes_offset: reader.read_u32_with(endian)?,
            hash_map_offset: reader.read_u32_with(endian)?,
        })
    }

    /// Serialize a little-endian header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&Self::MAGIC);
        out[4..8].copy_from_slice(&self.file_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.offsets_offset.to_le_bytes());
        out[12..16].copy_from_slice(&self.extensions_offset.to_le_bytes());
        out[16..20].copy_from_slice(&self.names_offset.to_le_bytes());
        out[20..24].copy_from_slice(&self.sizes_offset.to_le_bytes());
        out[24..28].copy_from_slice(&self.hash_map_offset.to_le_bytes());
        out
    }
}
