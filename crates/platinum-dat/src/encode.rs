//! DAT archive writer.

use platinum_common::{align_up, extension};

use crate::{Crc32BucketHasher, DatHeader, Error, NameHasher, Result};

/// Payload alignment inside the archive.
pub const DATA_ALIGNMENT: usize = 16;

/// A named file to be packed into a DAT archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl DatFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Pack files into a DAT archive with the game's name hash table.
pub fn encode(files: &[DatFile]) -> Result<Vec<u8>> {
    encode_with(files, &Crc32BucketHasher)
}

/// Pack files into a DAT archive using a custom hash-map generator.
///
/// Layout: header, offsets, extensions, names, sizes, hash map, then the
/// payloads aligned to 16 bytes in file order. Empty files get offset 0.
pub fn encode_with(files: &[DatFile], hasher: &dyn NameHasher) -> Result<Vec<u8>> {
    if files.is_empty() {
        return Err(Error::EmptyDirectory);
    }
    let count = files.len();

    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    let hash_map = hasher.hash(&names);

    let stride = names.iter().map(|n| n.len()).max().unwrap_or(0) + 1;

    let offsets_offset = DatHeader::SIZE;
    let extensions_offset = offsets_offset + count * 4;
    let names_offset = extensions_offset + count * 4;
    let sizes_offset = names_offset + 4 + stride * count;
    let hash_map_offset = sizes_offset + count * 4;
    let header_size = hash_map_offset + hash_map.len();

    let mut payload_offsets = Vec::with_capacity(count);
    let mut cursor = header_size;
    for file in files {
        cursor = align_up(cursor, DATA_ALIGNMENT);
        payload_offsets.push(if file.data.is_empty() { 0 } else { cursor });
        cursor += file.data.len();
    }
    let total = cursor.max(header_size);
    to_u32("archive size", total)?;

    let header = DatHeader {
        endian: platinum_common::Endian::Little,
        file_count: to_u32("file count", count)?,
        offsets_offset: offsets_offset as u32,
        extensions_offset: extensions_offset as u32,
        names_offset: names_offset as u32,
        sizes_offset: sizes_offset as u32,
        hash_map_offset: hash_map_offset as u32,
    };

    let mut output = vec![0u8; total];
    output[..DatHeader::SIZE].copy_from_slice(&header.to_bytes());

    for (i, file) in files.iter().enumerate() {
        let at = offsets_offset + i * 4;
        output[at..at + 4].copy_from_slice(&(payload_offsets[i] as u32).to_le_bytes());

        let ext = extension(&file.name).unwrap_or("").as_bytes();
        let ext = &ext[..ext.len().min(4)];
        let at = extensions_offset + i * 4;
        output[at..at + ext.len()].copy_from_slice(ext);

        let at = names_offset + 4 + i * stride;
        output[at..at + file.name.len()].copy_from_slice(file.name.as_bytes());

        let at = sizes_offset + i * 4;
        output[at..at + 4].copy_from_slice(&(file.data.len() as u32).to_le_bytes());

        if !file.data.is_empty() {
            let at = payload_offsets[i];
            output[at..at + file.data.len()].copy_from_slice(&file.data);
        }
    }
    output[names_offset..names_offset + 4].copy_from_slice(&(stride as u32).to_le_bytes());
    output[hash_map_offset..header_size].copy_from_slice(&hash_map);

    log::debug!(
        "encoded DAT: {} files, {} header bytes, {} total",
        count,
        header_size,
        total
    );

    Ok(output)
}

fn to_u32(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Overflow { what, value })
}

/// Read every file of an archive back into owned [`DatFile`]s.
pub fn decode(data: &[u8]) -> Result<Vec<DatFile>> {
    let archive = crate::DatArchive::parse(data)?;
    archive
        .entries()
        .iter()
        .map(|entry| Ok(DatFile::new(entry.name.clone(), archive.data(data, entry)?)))
        .collect()
}
