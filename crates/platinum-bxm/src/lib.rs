//! BXM binary XML codec for PlatinumGames files.
//!
//! Configuration, quest and route data in these games is stored as BXM, a
//! compact big-endian encoding of an XML tree. This crate decodes BXM into a
//! [`BxmDocument`], encodes documents back to bytes, and converts to and from
//! textual XML.
//!
//! # Example
//!
//! ```no_run
//! use platinum_bxm::BxmDocument;
//!
//! let data = std::fs::read("quest.bxm")?;
//!
//! let doc = BxmDocument::decode(&data)?;
//! println!("{}", doc.to_xml_string()?);
//!
//! let rebuilt = doc.encode()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod decode;
mod encode;
mod encoding;
mod error;
mod header;
mod node;
#[cfg(feature = "xml-output")]
mod xml;

pub use decode::{BxmOptions, DEFAULT_MAX_TREE_DEPTH, DEFAULT_POOL_DOUBLING_THRESHOLD};
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use header::{BxmHeader, DataRecord, NodeRecord, ABSENT};
pub use node::{BxmDocument, BxmNode};
