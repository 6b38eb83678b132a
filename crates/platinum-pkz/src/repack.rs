//! PKZ archive writer.

use std::collections::HashMap;

use platinum_common::align_up;
use zerocopy::IntoBytes;

use crate::{CompressionAlgorithm, Decompressors, Error, FileDescriptor, PkzHeader, Result};

/// Payload alignment inside the archive.
pub const DATA_ALIGNMENT: usize = 16;

/// Options for writing PKZ archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepackOptions {
    /// Version field written into the header.
    pub version: u32,
    /// Zstandard compression level.
    pub zstd_level: i32,
}

impl Default for RepackOptions {
    fn default() -> Self {
        Self {
            version: PkzHeader::DEFAULT_VERSION,
            zstd_level: 3,
        }
    }
}

/// A file to be packed, with the compression it should be stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkzFile {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionAlgorithm,
}

impl PkzFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>, compression: CompressionAlgorithm) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            compression,
        }
    }
}

/// Build a PKZ archive.
///
/// Layout: header, descriptor table at offset 32, the shared name pool
/// (names and compression labels, each stored once), then the stored
/// payloads aligned to 16 bytes in file order. Kraken entries are stored
/// uncompressed when the registered backend cannot compress.
pub fn encode(files: &[PkzFile], decompressors: &Decompressors, options: &RepackOptions) -> Result<Vec<u8>> {
    if files.is_empty() {
        return Err(Error::EmptyDirectory);
    }

    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        stored.push(compress(file, decompressors, options)?);
    }

    let mut pool = NamePool::default();
    let mut name_offsets = Vec::with_capacity(files.len());
    for (file, (algorithm, _)) in files.iter().zip(&stored) {
        name_offsets.push((pool.add(&file.name)?, pool.add(algorithm.label())?));
    }

    let table_start = PkzHeader::SIZE;
    let pool_start = table_start + files.len() * FileDescriptor::SIZE;
    let pool_end = pool_start + pool.bytes.len();

    let mut offsets = Vec::with_capacity(files.len());
    let mut cursor = pool_end;
    for (_, data) in &stored {
        cursor = align_up(cursor, DATA_ALIGNMENT);
        offsets.push(cursor);
        cursor += data.len();
    }
    let total = cursor;

    let header = PkzHeader {
        magic: PkzHeader::MAGIC,
        version: options.version,
        size: total as u64,
        file_count: to_u32("file count", files.len())?,
        descriptors_offset: table_start as u32,
        name_pool_length: to_u32("name pool length", pool.bytes.len())?,
        reserved: 0,
    };

    let mut output = vec![0u8; total];
    output[..PkzHeader::SIZE].copy_from_slice(header.as_bytes());

    for (i, file) in files.iter().enumerate() {
        let (name_offset, label_offset) = name_offsets[i];
        let data = &stored[i].1;
        let descriptor = FileDescriptor {
            name_offset,
            label_offset,
            size: file.data.len() as u64,
            offset: offsets[i] as u64,
            compressed_size: data.len() as u64,
        };
        let at = table_start + i * FileDescriptor::SIZE;
        output[at..at + FileDescriptor::SIZE].copy_from_slice(descriptor.as_bytes());
        output[offsets[i]..offsets[i] + data.len()].copy_from_slice(data);
    }
    output[pool_start..pool_end].copy_from_slice(&pool.bytes);

    log::debug!("encoded PKZ: {} files, {} bytes", files.len(), total);

    Ok(output)
}

fn compress(
    file: &PkzFile,
    decompressors: &Decompressors,
    options: &RepackOptions,
) -> Result<(CompressionAlgorithm, Vec<u8>)> {
    match file.compression {
        CompressionAlgorithm::None => Ok((CompressionAlgorithm::None, file.data.clone())),
        CompressionAlgorithm::ZStandard => {
            let data = zstd::encode_all(&file.data[..], options.zstd_level)?;
            Ok((CompressionAlgorithm::ZStandard, data))
        }
        CompressionAlgorithm::KrakenFamily => {
            let compressed = match decompressors.kraken() {
                Some(kraken) => kraken.compress(&file.data),
                None => Err(Error::CompressionUnsupported("Kraken")),
            };
            match compressed {
                Ok(data) => Ok((CompressionAlgorithm::KrakenFamily, data)),
                Err(Error::CompressionUnsupported(_)) => {
                    log::warn!("{}: Kraken compression unavailable, storing uncompressed", file.name);
                    Ok((CompressionAlgorithm::None, file.data.clone()))
                }
                Err(e) => Err(e),
            }
        }
    }
}

fn to_u32(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Overflow { what, value })
}

/// NUL-terminated strings, each stored once.
#[derive(Default)]
struct NamePool {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl NamePool {
    fn add(&mut self, s: &str) -> Result<u32> {
        if let Some(&offset) = self.offsets.get(s) {
            return Ok(offset);
        }
        let offset = to_u32("name offset", self.bytes.len())?;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), offset);
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use platinum_common::ByteSource;

    use super::*;
    use crate::{KrakenDecoder, PkzArchive};

    fn open(bytes: Vec<u8>) -> PkzArchive {
        PkzArchive::from_source(ByteSource::from_bytes("out.pkz", bytes)).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let files = vec![
            PkzFile::new("pl/pl0000.dat", b"DAT\0player".to_vec(), CompressionAlgorithm::ZStandard),
            PkzFile::new("em/em0000.dat", b"DAT\0enemy".to_vec(), CompressionAlgorithm::None),
            PkzFile::new("empty", Vec::new(), CompressionAlgorithm::None),
        ];
        let decompressors = Decompressors::new();
        let bytes = encode(&files, &decompressors, &RepackOptions::default()).unwrap();
        assert_eq!(&bytes[..4], b"pkzl");
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), bytes.len() as u64);

        let archive = open(bytes);
        assert_eq!(archive.version(), PkzHeader::DEFAULT_VERSION);
        for (entry, file) in archive.entries().iter().zip(&files) {
            assert_eq!(entry.name, file.name);
            assert_eq!(entry.algorithm(), Some(file.compression));
            assert_eq!(entry.offset % DATA_ALIGNMENT as u64, 0);
            let out = archive.read(entry, &decompressors).unwrap();
            assert_eq!(out.data.as_bytes(), &file.data[..]);
        }
    }

    #[test]
    fn test_labels_are_shared() {
        let files = vec![
            PkzFile::new("a", vec![1], CompressionAlgorithm::None),
            PkzFile::new("b", vec![2], CompressionAlgorithm::None),
        ];
        let bytes = encode(&files, &Decompressors::new(), &RepackOptions::default()).unwrap();
        // "a\0" "None\0" "b\0"
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 9);
    }

    #[test]
    fn test_kraken_falls_back_to_none() {
        let files = vec![PkzFile::new("k.dat", b"DAT\0k".to_vec(), CompressionAlgorithm::KrakenFamily)];
        let bytes = encode(&files, &Decompressors::new(), &RepackOptions::default()).unwrap();

        let archive = open(bytes);
        let entry = &archive.entries()[0];
        assert_eq!(entry.label, "None");
        assert_eq!(entry.compressed_size, entry.size);
    }

    struct Reversing;

    impl KrakenDecoder for Reversing {
        fn decompress(&self, input: &[u8], size: usize) -> Result<Vec<u8>> {
            let mut out: Vec<u8> = input.iter().rev().copied().collect();
            out.truncate(size);
            Ok(out)
        }

        fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
            Ok(input.iter().rev().copied().collect())
        }
    }

    #[test]
    fn test_kraken_with_backend() {
        let decompressors = Decompressors::new().with_kraken(Arc::new(Reversing));
        let files = vec![PkzFile::new("k.dat", b"DAT\0kraken".to_vec(), CompressionAlgorithm::KrakenFamily)];
        let bytes = encode(&files, &decompressors, &RepackOptions::default()).unwrap();

        let archive = open(bytes);
        let entry = &archive.entries()[0];
        assert_eq!(entry.label, "OodleKraken");
        let out = archive.read(entry, &decompressors).unwrap();
        assert_eq!(out.data.as_bytes(), b"DAT\0kraken");
    }

    #[test]
    fn test_empty_directory() {
        let result = encode(&[], &Decompressors::new(), &RepackOptions::default());
        assert!(matches!(result, Err(Error::EmptyDirectory)));
    }
}
