//! Error types for BXM decoding and encoding.

use thiserror::Error;

/// Errors that can occur when decoding or encoding BXM files.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] platinum_common::Error),

    /// Declared table sizes do not fit in the buffer.
    #[error("malformed BXM header: {0}")]
    MalformedHeader(String),

    /// String offset points past the string pool.
    #[error("string offset {offset} out of bounds (string pool size: {size})")]
    StringOffsetOutOfBounds { offset: u16, size: usize },

    /// Node index out of bounds.
    #[error("node index {index} out of bounds (total nodes: {count})")]
    NodeIndexOutOfBounds { index: usize, count: usize },

    /// Data-offset index out of bounds.
    #[error("data index {index} out of bounds (total data offsets: {count})")]
    DataIndexOutOfBounds { index: usize, count: usize },

    /// A node is reached from more than one parent, or from itself.
    #[error("node {0} is referenced more than once in the node table")]
    Cycle(usize),

    /// A string cannot be represented in the document's character set.
    #[error("cannot encode {text:?} as {encoding}")]
    Unencodable { text: String, encoding: &'static str },

    /// A table value does not fit in 16 bits.
    #[error("{what} overflow: {value} does not fit in a 16-bit field")]
    Overflow { what: &'static str, value: usize },

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),
}

/// Result type for BXM operations.
pub type Result<T> = std::result::Result<T, Error>;
