//! DAT directory decoding.

use platinum_common::{BinaryReader, Endian};

use crate::{DatHeader, DatOptions, Error, Result};

/// A file stored in a DAT archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatEntry {
    /// File name as stored in the name table.
    pub name: String,
    /// Payload offset from the start of the archive.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: u64,
}

impl DatEntry {
    /// End of the payload (exclusive).
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// A parsed DAT directory.
///
/// Only the tables are read; payloads are sliced out of the archive bytes on
/// demand with [`DatArchive::data`].
#[derive(Debug, Clone)]
pub struct DatArchive {
    header: DatHeader,
    entries: Vec<DatEntry>,
}

impl DatArchive {
    /// Check whether data starts with the DAT magic.
    pub fn is_dat(data: &[u8]) -> bool {
        data.starts_with(&DatHeader::MAGIC)
    }

    /// Parse a DAT directory with default options.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &DatOptions::default())
    }

    /// Parse a DAT directory.
    pub fn parse_with(data: &[u8], options: &DatOptions) -> Result<Self> {
        let header = DatHeader::parse(data, options)?;
        let count = header.file_count as usize;
        let endian = header.endian;

        let offsets = read_table(data, header.offsets_offset, count, endian, "offset")?;
        let sizes = read_table(data, header.sizes_offset, count, endian, "size")?;
        let names = read_names(data, header.names_offset, count, endian)?;

        let len = data.len() as u64;
        let mut entries = Vec::with_capacity(count);
        for ((name, offset), size) in names.into_iter().zip(offsets).zip(sizes) {
            let entry = DatEntry {
                name,
                offset: offset as u64,
                size: size as u64,
            };
            if entry.end() > len {
                return Err(Error::EntryOutOfBounds {
                    end: entry.end(),
                    name: entry.name,
                    offset: entry.offset,
                    len,
                });
            }
            entries.push(entry);
        }

        log::debug!(
            "parsed DAT: {} entries ({:?} endian)",
            entries.len(),
            endian
        );

        Ok(Self { header, entries })
    }

    /// The parsed header.
    pub fn header(&self) -> &DatHeader {
        &self.header
    }

    /// Entries in on-disk order.
    pub fn entries(&self) -> &[DatEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by exact name.
    pub fn find(&self, name: &str) -> Option<&DatEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Payload of an entry, sliced from the archive bytes it was parsed from.
    pub fn data<'a>(&self, data: &'a [u8], entry: &DatEntry) -> Result<&'a [u8]> {
        data.get(entry.offset as usize..entry.end() as usize)
            .ok_or_else(|| Error::EntryOutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                end: entry.end(),
                len: data.len() as u64,
            })
    }
}

fn read_table(data: &[u8], offset: u32, count: usize, endian: Endian, what: &str) -> Result<Vec<u32>> {
    if offset as usize > data.len() {
        return Err(Error::MalformedHeader(format!(
            "{} table at {} is past the end ({} bytes)",
            what,
            offset,
            data.len()
        )));
    }
    let mut reader = BinaryReader::new_at(data, offset as usize);
    reader.read_u32_array(count, endian).map_err(|_| {
        Error::MalformedHeader(format!(
            "{} table at {} with {} entries exceeds {} bytes",
            what,
            offset,
            count,
            data.len()
        ))
    })
}

/// Name table: a u32 slot stride, then one NUL-padded slot per file.
fn read_names(data: &[u8], offset: u32, count: usize, endian: Endian) -> Result<Vec<String>> {
    let truncated = || {
        Error::MalformedHeader(format!(
            "name table at {} with {} entries exceeds {} bytes",
            offset,
            count,
            data.len()
        ))
    };

    if offset as usize > data.len() {
        return Err(truncated());
    }
    let mut reader = BinaryReader::new_at(data, offset as usize);
    let stride = reader.read_u32_with(endian).map_err(|_| truncated())? as usize;
    match stride.checked_mul(count) {
        Some(total) if total <= reader.remaining() => {}
        _ => return Err(truncated()),
    }

    (0..count)
        .map(|_| reader.read_string_in_buffer(stride).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, DatFile};

    fn sample() -> Vec<u8> {
        encode(&[
            DatFile::new("core.bxm", b"XML\0payload".to_vec()),
            DatFile::new("empty.bin", Vec::new()),
            DatFile::new("sub/tex.wta", vec![7u8; 40]),
        ])
        .unwrap()
    }

    #[test]
    fn test_is_dat() {
        assert!(DatArchive::is_dat(b"DAT\0\x01"));
        assert!(!DatArchive::is_dat(b"pkzl"));
    }

    #[test]
    fn test_parse_entries() {
        let data = sample();
        let archive = DatArchive::parse(&data).unwrap();

        assert_eq!(archive.len(), 3);
        assert_eq!(archive.header().endian, Endian::Little);

        let names: Vec<_> = archive.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["core.bxm", "empty.bin", "sub/tex.wta"]);

        let core = archive.find("core.bxm").unwrap();
        assert_eq!(core.offset % 16, 0);
        assert_eq!(archive.data(&data, core).unwrap(), b"XML\0payload");

        let empty = archive.find("empty.bin").unwrap();
        assert_eq!((empty.offset, empty.size), (0, 0));
        assert!(archive.data(&data, empty).unwrap().is_empty());
    }

    #[test]
    fn test_big_endian_archive() {
        // Rewrite the little-endian sample's header and tables big-endian.
        let mut data = sample();
        let archive = DatArchive::parse(&data).unwrap();
        let header = *archive.header();

        let swap = |data: &mut Vec<u8>, at: usize| {
            let value = u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
            data[at..at + 4].copy_from_slice(&value.to_be_bytes());
        };
        for field in 1..7 {
            swap(&mut data, field * 4);
        }
        for i in 0..3 {
            swap(&mut data, header.offsets_offset as usize + i * 4);
            swap(&mut data, header.sizes_offset as usize + i * 4);
        }
        swap(&mut data, header.names_offset as usize);

        let parsed = DatArchive::parse(&data).unwrap();
        assert_eq!(parsed.header().endian, Endian::Big);
        assert_eq!(parsed.entries(), archive.entries());
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let mut data = sample();
        let archive = DatArchive::parse(&data).unwrap();
        let sizes = archive.header().sizes_offset as usize;
        data[sizes..sizes + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            DatArchive::parse(&data),
            Err(Error::EntryOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_table_past_end() {
        let mut data = sample();
        data[16..20].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());

        assert!(matches!(
            DatArchive::parse(&data),
            Err(Error::MalformedHeader(_))
        ));
    }
}
