//! Format detection.
//!
//! Every supported format is registered once in [`FORMATS`]. A source is
//! matched by its first four bytes, then by file extension.

use std::fmt;

/// Identifies a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecId {
    Bxm,
    Dat,
    Pkz,
}

impl CodecId {
    /// Registration entry for this codec.
    pub fn descriptor(self) -> &'static FormatDescriptor {
        match self {
            CodecId::Bxm => &FORMATS[0],
            CodecId::Dat => &FORMATS[1],
            CodecId::Pkz => &FORMATS[2],
        }
    }

    /// Whether a decoded node of this format can be encoded again.
    pub fn is_repackable(self) -> bool {
        self.descriptor().repackable
    }

    /// Whether this format decodes to a directory.
    pub fn is_archive(self) -> bool {
        matches!(self, CodecId::Dat | CodecId::Pkz)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

/// A registered file format.
#[derive(Debug)]
pub struct FormatDescriptor {
    pub codec: CodecId,
    pub name: &'static str,
    pub magics: &'static [[u8; 4]],
    /// Lowercase extensions without the dot.
    pub extensions: &'static [&'static str],
    pub repackable: bool,
}

/// All supported formats, in match priority order.
pub static FORMATS: [FormatDescriptor; 3] = [
    FormatDescriptor {
        codec: CodecId::Bxm,
        name: "BXM",
        magics: &[*b"BXM\0", *b"XML\0"],
        extensions: &["bxm"],
        repackable: true,
    },
    FormatDescriptor {
        codec: CodecId::Dat,
        name: "DAT",
        magics: &[*b"DAT\0"],
        extensions: platinum_dat::EXTENSIONS,
        repackable: true,
    },
    FormatDescriptor {
        codec: CodecId::Pkz,
        name: "PKZ",
        magics: &[*b"pkzl"],
        extensions: &["pkz"],
        repackable: true,
    },
];

/// Pick the codec for a source from its leading bytes and file name.
///
/// Magic matches take priority over extension matches; extensions compare
/// case-insensitively.
pub fn resolve(magic: &[u8], file_name: &str) -> Option<CodecId> {
    if magic.len() >= 4 {
        let head = &magic[..4];
        if let Some(format) = FORMATS.iter().find(|f| f.magics.iter().any(|m| m == head)) {
            return Some(format.codec);
        }
    }

    let ext = platinum_common::extension(file_name)?.to_ascii_lowercase();
    FORMATS
        .iter()
        .find(|f| f.extensions.contains(&ext.as_str()))
        .map(|f| f.codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_order() {
        for format in &FORMATS {
            assert_eq!(format.codec.descriptor().codec, format.codec);
        }
    }

    #[test]
    fn test_resolve_by_magic() {
        assert_eq!(resolve(b"XML\0\0\0", "a.bin"), Some(CodecId::Bxm));
        assert_eq!(resolve(b"BXM\0", "a.bin"), Some(CodecId::Bxm));
        assert_eq!(resolve(b"DAT\0", "a.bxm"), Some(CodecId::Dat));
        assert_eq!(resolve(b"pkzl", "noext"), Some(CodecId::Pkz));
    }

    #[test]
    fn test_resolve_by_extension() {
        assert_eq!(resolve(b"XXXX", "p100.DTT"), Some(CodecId::Dat));
        assert_eq!(resolve(b"XXXX", "ev0010.evn"), Some(CodecId::Dat));
        assert_eq!(resolve(b"", "quest.Bxm"), Some(CodecId::Bxm));
        assert_eq!(resolve(b"XX", "dir.pkz/readme"), None);
    }

    #[test]
    fn test_unsupported() {
        assert_eq!(resolve(b"XXXX", "file.zzz"), None);
        assert_eq!(resolve(b"XXXX", "file"), None);
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(resolve(b"DAT\0", "x.pkz"), Some(CodecId::Dat));
        }
    }

    #[test]
    fn test_flags() {
        assert!(CodecId::Dat.is_archive());
        assert!(!CodecId::Bxm.is_archive());
        assert!(CodecId::Pkz.is_repackable());
        assert_eq!(CodecId::Pkz.to_string(), "PKZ");
    }
}
