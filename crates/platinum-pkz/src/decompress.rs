//! Decompression backends for PKZ entries.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use zstd::bulk::Decompressor;

use crate::{Error, Result};

/// Compression applied to a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Stored as-is.
    None,
    /// A Zstandard frame.
    ZStandard,
    /// Oodle Kraken and its relatives.
    KrakenFamily,
}

impl CompressionAlgorithm {
    /// Map a descriptor label to an algorithm.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "None" => Some(Self::None),
            "ZStandard" => Some(Self::ZStandard),
            "OodleKraken" => Some(Self::KrakenFamily),
            _ => None,
        }
    }

    /// Label written into the name pool.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::ZStandard => "ZStandard",
            Self::KrakenFamily => "OodleKraken",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A Kraken-family codec supplied by the embedding application.
///
/// No Rust implementation of Oodle ships with this crate; callers that need
/// Kraken entries register one on [`Decompressors`].
pub trait KrakenDecoder: Send + Sync {
    /// Decompress `input` into exactly `size` bytes.
    fn decompress(&self, input: &[u8], size: usize) -> Result<Vec<u8>>;

    /// Compress `input`. Backends that only decode keep the default.
    fn compress(&self, _input: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CompressionUnsupported("Kraken"))
    }
}

/// Shared decompression state.
///
/// The Zstandard context is created on first use and reused for every later
/// entry; it is guarded so concurrent readers serialize on it.
#[derive(Default)]
pub struct Decompressors {
    zstd: Mutex<Option<Decompressor<'static>>>,
    kraken: Option<Arc<dyn KrakenDecoder>>,
}

impl Decompressors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Kraken-family backend.
    pub fn with_kraken(mut self, decoder: Arc<dyn KrakenDecoder>) -> Self {
        self.kraken = Some(decoder);
        self
    }

    /// The registered Kraken-family backend, if any.
    pub fn kraken(&self) -> Option<&dyn KrakenDecoder> {
        self.kraken.as_deref()
    }

    /// Decompress one Zstandard frame of known decompressed size.
    pub fn zstd(&self, input: &[u8], size: usize) -> Result<Vec<u8>> {
        let mut guard = self.zstd.lock();
        if let Some(decompressor) = guard.as_mut() {
            return decompressor.decompress(input, size).map_err(Error::Io);
        }

        log::debug!("initializing shared zstd decompressor");
        let mut decompressor = Decompressor::new()?;
        let result = decompressor.decompress(input, size);
        *guard = Some(decompressor);
        result.map_err(Error::Io)
    }
}

impl fmt::Debug for Decompressors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompressors")
            .field("zstd_initialized", &self.zstd.lock().is_some())
            .field("kraken", &self.kraken.is_some())
            .finish()
    }
}

/// The DAT magic read as a little-endian word.
const DAT_MAGIC_WORD: u32 = u32::from_le_bytes(*b"DAT\0");

/// Where a Kraken payload's real content starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// The DAT magic is the first word; the buffer is already aligned.
    Aligned,
    /// The DAT magic was found at this word index.
    Shifted(usize),
    /// No word holds the DAT magic.
    NotFound,
}

/// Locate the DAT magic among the 32-bit little-endian words of `data`.
///
/// Kraken output for PKZ entries sometimes starts with leading garbage; the
/// real payload begins at the first word equal to the DAT magic.
pub fn scan_alignment(data: &[u8]) -> Alignment {
    match data
        .chunks_exact(4)
        .position(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == DAT_MAGIC_WORD)
    {
        Some(0) => Alignment::Aligned,
        Some(k) => Alignment::Shifted(k),
        None => Alignment::NotFound,
    }
}
