//! PKZ archive reader.
//!
//! Opening an archive decodes only the header, the descriptor table and the
//! name pool. Entry payloads are read and decompressed one at a time.

use std::path::Path;

use platinum_common::{BinaryReader, ByteSource};

use crate::decompress::{scan_alignment, Alignment};
use crate::{CompressionAlgorithm, Decompressors, Error, FileDescriptor, PkzHeader, Result};

/// A file stored in a PKZ archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkzEntry {
    /// File name/path within the archive
    pub name: String,
    /// Offset of the stored bytes from the start of the archive
    pub offset: u64,
    /// Uncompressed size
    pub size: u64,
    /// Stored size
    pub compressed_size: u64,
    /// Compression label as written in the archive
    pub label: String,
}

impl PkzEntry {
    /// The compression algorithm, or `None` for an unrecognized label.
    pub fn algorithm(&self) -> Option<CompressionAlgorithm> {
        CompressionAlgorithm::from_label(&self.label)
    }

    /// End of the stored bytes (exclusive).
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.compressed_size)
    }
}

/// Largest decompressed size an entry may declare.
pub const MAX_ENTRY_SIZE: u64 = 1 << 32;

/// A decompressed entry.
#[derive(Debug, Clone)]
pub struct Decompressed {
    /// Payload bytes. Uncompressed entries share the archive's storage.
    pub data: ByteSource,
    /// Set when the payload was returned but may be wrong.
    pub warning: Option<String>,
}

/// A PKZ archive directory over a byte source.
#[derive(Debug, Clone)]
pub struct PkzArchive {
    source: ByteSource,
    header: PkzHeader,
    entries: Vec<PkzEntry>,
    directory_len: usize,
}

impl PkzArchive {
    /// Check whether data starts with the PKZ magic.
    pub fn is_pkz(data: &[u8]) -> bool {
        data.starts_with(&PkzHeader::MAGIC)
    }

    /// Memory-map and open a PKZ archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(ByteSource::open(path)?)
    }

    /// Decode the directory of an archive held by `source`.
    pub fn from_source(source: ByteSource) -> Result<Self> {
        let data = source.as_bytes();
        if data.len() < PkzHeader::SIZE {
            return Err(Error::MalformedHeader(format!(
                "{} bytes is shorter than the header",
                data.len()
            )));
        }

        let mut reader = BinaryReader::new(data);
        let header: PkzHeader = reader.read_struct()?;
        if header.magic != PkzHeader::MAGIC {
            return Err(platinum_common::Error::InvalidMagic {
                expected: PkzHeader::MAGIC.to_vec(),
                actual: header.magic.to_vec(),
            }
            .into());
        }

        let count = { header.file_count } as usize;
        let table_start = { header.descriptors_offset } as usize;
        let table_end = count
            .checked_mul(FileDescriptor::SIZE)
            .and_then(|size| size.checked_add(table_start))
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                Error::MalformedHeader(format!(
                    "{} descriptors at {} exceed {} bytes",
                    count,
                    table_start,
                    data.len()
                ))
            })?;

        let pool_end = table_end + { header.name_pool_length } as usize;
        if pool_end > data.len() {
            return Err(Error::MalformedHeader(format!(
                "name pool {}..{} exceeds {} bytes",
                table_end,
                pool_end,
                data.len()
            )));
        }
        let pool = &data[table_end..pool_end];

        let mut reader = BinaryReader::new_at(data, table_start);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let descriptor: FileDescriptor = reader.read_struct()?;
            entries.push(PkzEntry {
                name: pool_string(pool, descriptor.name_offset)?,
                label: pool_string(pool, descriptor.label_offset)?,
                offset: descriptor.offset,
                size: descriptor.size,
                compressed_size: descriptor.compressed_size,
            });
        }

        log::debug!(
            "opened PKZ {}: version {}, {} entries",
            source.name(),
            { header.version },
            entries.len()
        );

        Ok(Self {
            source,
            header,
            entries,
            directory_len: pool_end.max(PkzHeader::SIZE),
        })
    }

    /// Archive name.
    #[inline]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// The underlying byte source.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// Format version from the header.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Bytes read to decode the directory: header, descriptors and name pool.
    pub fn directory_len(&self) -> usize {
        self.directory_len
    }

    /// Number of entries; always the header's file count.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in directory order.
    pub fn entries(&self) -> &[PkzEntry] {
        &self.entries
    }

    /// Get entry by index.
    pub fn get(&self, index: usize) -> Option<&PkzEntry> {
        self.entries.get(index)
    }

    /// Find an entry by exact name.
    pub fn find(&self, name: &str) -> Option<&PkzEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The stored (possibly compressed) bytes of an entry.
    pub fn raw(&self, entry: &PkzEntry) -> Result<ByteSource> {
        self.source
            .slice(file_name(&entry.name), entry.offset, entry.end())
            .map_err(|_| Error::EntryOutOfBounds {
                name: entry.name.clone(),
                offset: entry.offset,
                end: entry.end(),
                len: self.source.len() as u64,
            })
    }

    /// Read and decompress an entry.
    pub fn read(&self, entry: &PkzEntry, decompressors: &Decompressors) -> Result<Decompressed> {
        let raw = self.raw(entry)?;
        let fail = |reason: String| Error::DecompressionFailure {
            name: entry.name.clone(),
            reason,
        };
        let size = || {
            usize::try_from(entry.size)
                .ok()
                .filter(|&size| size as u64 <= MAX_ENTRY_SIZE)
                .ok_or_else(|| fail(format!("declared size {} exceeds {} bytes", entry.size, MAX_ENTRY_SIZE)))
        };

        let Some(algorithm) = entry.algorithm() else {
            let warning = format!("unknown compression {:?} on {}, returning stored bytes", entry.label, entry.name);
            log::warn!("{}", warning);
            return Ok(Decompressed {
                data: raw,
                warning: Some(warning),
            });
        };

        match algorithm {
            CompressionAlgorithm::None => Ok(Decompressed {
                data: raw,
                warning: None,
            }),
            CompressionAlgorithm::ZStandard => {
                let data = decompressors
                    .zstd(raw.as_bytes(), size()?)
                    .map_err(|e| fail(e.to_string()))?;
                Ok(Decompressed {
                    data: ByteSource::from_bytes(raw.name(), data),
                    warning: None,
                })
            }
            CompressionAlgorithm::KrakenFamily => {
                let kraken = decompressors
                    .kraken()
                    .ok_or_else(|| fail("no Kraken decoder registered".to_string()))?;
                let data = kraken
                    .decompress(raw.as_bytes(), size()?)
                    .map_err(|e| fail(e.to_string()))?;
                let data = ByteSource::from_bytes(raw.name(), data);

                match scan_alignment(data.as_bytes()) {
                    Alignment::Aligned => Ok(Decompressed { data, warning: None }),
                    Alignment::Shifted(k) => {
                        let start = (k * 4) as u64;
                        let end = (start + entry.size).min(data.len() as u64);
                        log::debug!("{}: Kraken output realigned by {} bytes", entry.name, start);
                        Ok(Decompressed {
                            data: data.slice(data.name().to_string(), start, end)?,
                            warning: None,
                        })
                    }
                    Alignment::NotFound => {
                        let warning = format!(
                            "no DAT header in decompressed {}, it may have been extracted wrong",
                            entry.name
                        );
                        log::warn!("{}", warning);
                        Ok(Decompressed {
                            data,
                            warning: Some(warning),
                        })
                    }
                }
            }
        }
    }
}

/// Final path segment of an entry name.
fn file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn pool_string(pool: &[u8], offset: u32) -> Result<String> {
    let start = offset as usize;
    if start >= pool.len() {
        return Err(Error::MalformedHeader(format!(
            "name offset {} outside pool of {} bytes",
            offset,
            pool.len()
        )));
    }
    Ok(BinaryReader::new_at(pool, start).read_cstring_lossy())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{encode, KrakenDecoder, PkzFile, RepackOptions};

    fn pkz(files: &[PkzFile]) -> PkzArchive {
        let bytes = encode(files, &Decompressors::new(), &RepackOptions::default()).unwrap();
        PkzArchive::from_source(ByteSource::from_bytes("test.pkz", bytes)).unwrap()
    }

    #[test]
    fn test_is_pkz() {
        assert!(PkzArchive::is_pkz(b"pkzl\x01\0\0\0"));
        assert!(!PkzArchive::is_pkz(b"DAT\0"));
    }

    #[test]
    fn test_entry_count_matches_header() {
        let archive = pkz(&[
            PkzFile::new("a.dat", b"DAT\0one".to_vec(), CompressionAlgorithm::None),
            PkzFile::new("b/c.dat", b"DAT\0two".to_vec(), CompressionAlgorithm::ZStandard),
            PkzFile::new("d.bin", vec![0; 10], CompressionAlgorithm::None),
        ]);
        let declared = u32::from_le_bytes(archive.source().as_bytes()[16..20].try_into().unwrap());
        assert_eq!(archive.entry_count(), declared as usize);
        assert_eq!(archive.entries()[1].name, "b/c.dat");
        assert_eq!(archive.entries()[1].label, "ZStandard");

        let first_payload = archive.entries().iter().map(|e| e.offset).min().unwrap();
        assert!(archive.directory_len() <= first_payload as usize);
        assert!(archive.directory_len() >= PkzHeader::SIZE + 3 * FileDescriptor::SIZE);
    }

    #[test]
    fn test_none_entry_is_exact_slice() {
        let archive = pkz(&[PkzFile::new("a.dat", b"DAT\0payload".to_vec(), CompressionAlgorithm::None)]);
        let entry = &archive.entries()[0];
        let out = archive.read(entry, &Decompressors::new()).unwrap();

        let expected = archive.source().read(entry.offset, entry.offset + entry.compressed_size).unwrap();
        assert_eq!(out.data.as_bytes(), expected);
        assert_eq!(out.data.as_bytes(), b"DAT\0payload");
        assert_eq!(out.data.name(), "a.dat");
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_zstd_entry() {
        let payload = b"DAT\0".iter().copied().chain(std::iter::repeat(9).take(500)).collect::<Vec<_>>();
        let archive = pkz(&[PkzFile::new("z.dat", payload.clone(), CompressionAlgorithm::ZStandard)]);
        let entry = &archive.entries()[0];
        assert!(entry.compressed_size < entry.size);

        let out = archive.read(entry, &Decompressors::new()).unwrap();
        assert_eq!(out.data.as_bytes(), &payload[..]);
    }

    /// Pretends to decompress by prepending `garbage_words` junk words.
    struct ShiftingKraken {
        garbage_words: usize,
    }

    impl KrakenDecoder for ShiftingKraken {
        fn decompress(&self, input: &[u8], size: usize) -> Result<Vec<u8>> {
            let mut out = vec![0xEE; self.garbage_words * 4];
            out.extend_from_slice(&input[..size.min(input.len())]);
            out.extend_from_slice(&[0xEE; 8]);
            Ok(out)
        }
    }

    fn kraken_archive(payload: &[u8]) -> PkzArchive {
        let mut archive = pkz(&[PkzFile::new("k.dat", payload.to_vec(), CompressionAlgorithm::None)]);
        archive.entries[0].label = "OodleKraken".to_string();
        archive
    }

    #[test]
    fn test_kraken_realignment() {
        let archive = kraken_archive(b"DAT\0body");
        let decompressors = Decompressors::new().with_kraken(Arc::new(ShiftingKraken { garbage_words: 3 }));

        let out = archive.read(&archive.entries()[0], &decompressors).unwrap();
        assert_eq!(out.data.as_bytes(), b"DAT\0body");
        assert!(out.warning.is_none());
    }

    #[test]
    fn test_kraken_already_aligned() {
        let archive = kraken_archive(b"DAT\0body");
        let decompressors = Decompressors::new().with_kraken(Arc::new(ShiftingKraken { garbage_words: 0 }));

        let out = archive.read(&archive.entries()[0], &decompressors).unwrap();
        assert_eq!(&out.data.as_bytes()[..8], b"DAT\0body");
        assert_eq!(out.data.len(), 16);
    }

    #[test]
    fn test_kraken_without_magic_warns() {
        let archive = kraken_archive(b"WEMfile!");
        let decompressors = Decompressors::new().with_kraken(Arc::new(ShiftingKraken { garbage_words: 1 }));

        let out = archive.read(&archive.entries()[0], &decompressors).unwrap();
        assert_eq!(out.data.len(), 4 + 8 + 8);
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_kraken_without_decoder() {
        let archive = kraken_archive(b"DAT\0body");
        let result = archive.read(&archive.entries()[0], &Decompressors::new());
        assert!(matches!(result, Err(Error::DecompressionFailure { .. })));
    }

    #[test]
    fn test_unknown_label_returns_stored_bytes() {
        let mut archive = pkz(&[PkzFile::new("x.bin", b"stored".to_vec(), CompressionAlgorithm::None)]);
        archive.entries[0].label = "LZ4".to_string();

        let out = archive.read(&archive.entries()[0], &Decompressors::new()).unwrap();
        assert_eq!(out.data.as_bytes(), b"stored");
        assert!(out.warning.is_some());
    }

    #[test]
    fn test_oversized_declared_size() {
        let payload = vec![7; 64];
        let mut archive = pkz(&[PkzFile::new("z.dat", payload, CompressionAlgorithm::ZStandard)]);
        archive.entries[0].size = u64::MAX;
        let result = archive.read(&archive.entries()[0], &Decompressors::new());
        assert!(matches!(result, Err(Error::DecompressionFailure { .. })));

        archive.entries[0].size = MAX_ENTRY_SIZE + 1;
        let result = archive.read(&archive.entries()[0], &Decompressors::new());
        assert!(matches!(result, Err(Error::DecompressionFailure { .. })));
    }

    #[test]
    fn test_oversized_kraken_size() {
        let mut archive = kraken_archive(b"DAT\0body");
        archive.entries[0].size = u64::MAX;
        let decompressors = Decompressors::new().with_kraken(Arc::new(ShiftingKraken { garbage_words: 0 }));
        let result = archive.read(&archive.entries()[0], &decompressors);
        assert!(matches!(result, Err(Error::DecompressionFailure { .. })));
    }

    #[test]
    fn test_truncated_header() {
        let result = PkzArchive::from_source(ByteSource::from_bytes("x.pkz", b"pkzl".to_vec()));
        assert!(matches!(result, Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_descriptor_table_out_of_bounds() {
        let mut bytes = encode(
            &[PkzFile::new("a", vec![1], CompressionAlgorithm::None)],
            &Decompressors::new(),
            &RepackOptions::default(),
        )
        .unwrap();
        bytes[16..20].copy_from_slice(&1000u32.to_le_bytes());
        let result = PkzArchive::from_source(ByteSource::from_bytes("x.pkz", bytes));
        assert!(matches!(result, Err(Error::MalformedHeader(_))));
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let mut archive = pkz(&[PkzFile::new("a", vec![1, 2, 3], CompressionAlgorithm::None)]);
        archive.entries[0].compressed_size = 1 << 20;
        let result = archive.read(&archive.entries()[0], &Decompressors::new());
        assert!(matches!(result, Err(Error::EntryOutOfBounds { .. })));
    }

    #[test]
    fn test_open_mapped_file() {
        let bytes = encode(
            &[PkzFile::new("a.dat", b"DAT\0x".to_vec(), CompressionAlgorithm::None)],
            &Decompressors::new(),
            &RepackOptions::default(),
        )
        .unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &bytes).unwrap();

        let archive = PkzArchive::open(file.path()).unwrap();
        assert_eq!(archive.entry_count(), 1);
        let out = archive.read(&archive.entries()[0], &Decompressors::new()).unwrap();
        assert_eq!(out.data.as_bytes(), b"DAT\0x");
    }
}
