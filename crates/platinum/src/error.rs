//! Error types for the extraction pipeline.

use thiserror::Error;

/// Errors that can occur while extracting or repacking.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither the magic nor the extension matches a registered format.
    #[error("unsupported format: {name}")]
    UnsupportedFormat { name: String },

    /// The source holds no bytes.
    #[error("empty input: {name}")]
    EmptyInput { name: String },

    /// An archive would be written without any files.
    #[error("nothing to pack in {name}")]
    EmptyDirectory { name: String },

    /// A recursion-depth or decoded-size ceiling was hit.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The codec worker has shut down.
    #[error("codec worker is no longer running")]
    WorkerGone,

    /// Common library error.
    #[error("{0}")]
    Common(#[from] platinum_common::Error),

    /// BXM codec error.
    #[error("BXM: {0}")]
    Bxm(#[from] platinum_bxm::Error),

    /// DAT codec error.
    #[error("DAT: {0}")]
    Dat(#[from] platinum_dat::Error),

    /// PKZ codec error.
    #[error("PKZ: {0}")]
    Pkz(#[from] platinum_pkz::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedFormat,
    EmptyInput,
    MalformedHeader,
    DecompressionFailure,
    EmptyDirectory,
    LimitExceeded,
    Unencodable,
    Io,
    Worker,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use platinum_bxm::Error as Bxm;
        use platinum_dat::Error as Dat;
        use platinum_pkz::Error as Pkz;

        match self {
            Error::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Error::EmptyInput { .. } => ErrorKind::EmptyInput,
            Error::EmptyDirectory { .. } => ErrorKind::EmptyDirectory,
            Error::LimitExceeded(_) => ErrorKind::LimitExceeded,
            Error::WorkerGone => ErrorKind::Worker,
            Error::Io(_) => ErrorKind::Io,
            Error::Common(e) => common_kind(e),

            Error::Bxm(Bxm::Common(e)) => common_kind(e),
            Error::Bxm(Bxm::Unencodable { .. } | Bxm::Overflow { .. } | Bxm::Xml(_)) => ErrorKind::Unencodable,
            Error::Bxm(_) => ErrorKind::MalformedHeader,

            Error::Dat(Dat::Common(e)) => common_kind(e),
            Error::Dat(Dat::EmptyDirectory) => ErrorKind::EmptyDirectory,
            Error::Dat(Dat::Overflow { .. }) => ErrorKind::Unencodable,
            Error::Dat(_) => ErrorKind::MalformedHeader,

            Error::Pkz(Pkz::Common(e)) => common_kind(e),
            Error::Pkz(Pkz::Io(_)) => ErrorKind::Io,
            Error::Pkz(Pkz::DecompressionFailure { .. }) => ErrorKind::DecompressionFailure,
            Error::Pkz(Pkz::EmptyDirectory) => ErrorKind::EmptyDirectory,
            Error::Pkz(Pkz::CompressionUnsupported(_) | Pkz::Overflow { .. }) => ErrorKind::Unencodable,
            Error::Pkz(_) => ErrorKind::MalformedHeader,
        }
    }
}

fn common_kind(error: &platinum_common::Error) -> ErrorKind {
    match error {
        platinum_common::Error::Io(_) => ErrorKind::Io,
        _ => ErrorKind::MalformedHeader,
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
