//! Error types for DAT archives.

use thiserror::Error;

/// Errors that can occur when reading or writing DAT archives.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] platinum_common::Error),

    /// A header field or table points outside the archive.
    #[error("malformed DAT header: {0}")]
    MalformedHeader(String),

    /// An entry's payload lies outside the archive.
    #[error("entry {name:?} ({offset}..{end}) out of bounds (archive size: {len})")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        end: u64,
        len: u64,
    },

    /// An archive must contain at least one file.
    #[error("cannot write a DAT archive with no files")]
    EmptyDirectory,

    /// The archive would exceed the 32-bit offsets of the format.
    #[error("{what} overflow: {value} does not fit in a 32-bit field")]
    Overflow { what: &'static str, value: usize },
}

/// Result type for DAT operations.
pub type Result<T> = std::result::Result<T, Error>;
