//! Platinum - PlatinumGames archive extraction and repacking library.
//!
//! This crate ties the codec crates together: it detects formats, walks
//! nested archives into a folder tree, and encodes edited trees back.
//!
//! # Crates
//!
//! - [`platinum_common`] - Byte sources, binary reading, CRC-32
//! - [`platinum_bxm`] - BXM binary XML
//! - [`platinum_dat`] - DAT/DTT/EVN archives
//! - [`platinum_pkz`] - PKZ compressed archives (Zstandard, Kraken)
//!
//! # Example
//!
//! ```no_run
//! use platinum::prelude::*;
//!
//! let extractor = Extractor::default();
//! let mut extracted = extractor.extract(ByteSource::open("Game.pkz")?)?;
//!
//! // PKZ entries are decompressed on request.
//! if let Some(node) = extracted.find_mut("pl/pl0000.dat") {
//!     extractor.extract_partial(node)?;
//! }
//!
//! let bytes = extractor.repack_extracted(&extracted)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod format;
mod pipeline;
mod tree;
mod worker;

pub use error::{Error, ErrorKind, Result};
pub use format::{resolve, CodecId, FormatDescriptor, FORMATS};
pub use pipeline::{ExtractOptions, Extracted, Extractor, DEFAULT_MAX_DEPTH, DEFAULT_MAX_TOTAL_BYTES};
pub use tree::{materialize, Content, Directory, FileNode, Leaf, ListingEntry, PartialEntry};
pub use worker::{CodecWorker, Request, Response, Ticket};

// Re-export all sub-crates
pub use platinum_bxm as bxm;
pub use platinum_common as common;
pub use platinum_dat as dat;
pub use platinum_pkz as pkz;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{CodecId, CodecWorker, Content, ExtractOptions, Extracted, Extractor, FileNode, Leaf};
    pub use platinum_bxm::{BxmDocument, BxmNode, TextEncoding};
    pub use platinum_common::ByteSource;
    pub use platinum_dat::{DatArchive, DatFile};
    pub use platinum_pkz::{CompressionAlgorithm, PkzArchive};
}
