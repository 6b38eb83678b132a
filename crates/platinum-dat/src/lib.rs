//! DAT archive codec for PlatinumGames files.
//!
//! DAT (also `.dtt` and `.evn`) is the uncompressed container used throughout
//! the games: a table-driven directory followed by 16-byte-aligned payloads.
//!
//! # Example
//!
//! ```no_run
//! use platinum_dat::{DatArchive, DatFile};
//!
//! let data = std::fs::read("core.dat")?;
//! let archive = DatArchive::parse(&data)?;
//!
//! for entry in archive.entries() {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//!
//! let rebuilt = platinum_dat::encode(&[DatFile::new("a.txt", b"foo".to_vec())])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod encode;
mod error;
mod hash;
mod header;

pub use archive::{DatArchive, DatEntry};
pub use encode::{decode, encode, encode_with, DatFile, DATA_ALIGNMENT};
pub use error::{Error, Result};
pub use hash::{Crc32BucketHasher, NameHasher};
pub use header::{DatHeader, DatOptions, DEFAULT_BIG_ENDIAN_THRESHOLD};

/// File extensions used for DAT archives.
pub const EXTENSIONS: &[&str] = &["dat", "dtt", "evn"];
