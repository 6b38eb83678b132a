//! Error types for the PKZ crate.

use thiserror::Error;

/// Errors that can occur when working with PKZ archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] platinum_common::Error),

    /// Header or directory tables do not fit in the archive.
    #[error("malformed PKZ header: {0}")]
    MalformedHeader(String),

    /// An entry's stored bytes lie outside the archive.
    #[error("entry {name:?} ({offset}..{end}) out of bounds (archive size: {len})")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        end: u64,
        len: u64,
    },

    /// A compressed entry could not be decoded.
    #[error("failed to decompress {name:?}: {reason}")]
    DecompressionFailure { name: String, reason: String },

    /// The configured backend cannot produce this compression.
    #[error("{0} compression is not supported by the configured backend")]
    CompressionUnsupported(&'static str),

    /// An archive must contain at least one file.
    #[error("cannot write a PKZ archive with no files")]
    EmptyDirectory,

    /// A value does not fit in its 32-bit field.
    #[error("{what} overflow: {value} does not fit in a 32-bit field")]
    Overflow { what: &'static str, value: usize },
}

/// Result type for PKZ operations.
pub type Result<T> = std::result::Result<T, Error>;
