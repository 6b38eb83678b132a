//! PKZ archive codec for PlatinumGames files.
//!
//! PKZ is the segmented archive used by Astral Chain and Bayonetta 3. A small
//! directory (header, fixed-size descriptors and a shared string pool) points
//! at independently compressed payloads, usually DAT archives:
//!
//! - Stored entries (`None`)
//! - Zstandard frames (`ZStandard`)
//! - Oodle Kraken (`OodleKraken`), through a caller-supplied [`KrakenDecoder`]
//!
//! Opening an archive never touches payload bytes; each entry is read and
//! decompressed on request.
//!
//! # Example
//!
//! ```no_run
//! use platinum_pkz::{Decompressors, PkzArchive};
//!
//! let archive = PkzArchive::open("Game.pkz")?;
//! let decompressors = Decompressors::new();
//!
//! for entry in archive.entries() {
//!     println!("{}: {} bytes ({})", entry.name, entry.size, entry.label);
//! }
//!
//! if let Some(entry) = archive.get(0) {
//!     let payload = archive.read(entry, &decompressors)?;
//! }
//! # Ok::<(), platinum_pkz::Error>(())
//! ```

mod archive;
mod decompress;
mod error;
mod header;
mod repack;

pub use archive::{Decompressed, PkzArchive, PkzEntry, MAX_ENTRY_SIZE};
pub use decompress::{scan_alignment, Alignment, CompressionAlgorithm, Decompressors, KrakenDecoder};
pub use error::{Error, Result};
pub use header::{FileDescriptor, PkzHeader};
pub use repack::{encode, PkzFile, RepackOptions, DATA_ALIGNMENT};
