//! Character set of a BXM string pool.

use std::borrow::Cow;

use encoding_rs::SHIFT_JIS;

use crate::{Error, Result};

/// The character set used for every string of one BXM file.
///
/// Most files are Shift-JIS; quest data is UTF-8. The choice is made once per
/// file and reused when the document is encoded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    #[default]
    ShiftJis,
    Utf8,
}

impl TextEncoding {
    /// Display name of the character set.
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::ShiftJis => "Shift_JIS",
            TextEncoding::Utf8 => "UTF-8",
        }
    }

    /// Pick the character set for a whole string pool: Shift-JIS unless it
    /// contains a sequence Shift-JIS cannot decode.
    pub fn detect(pool: &[u8]) -> Self {
        let (_, had_errors) = SHIFT_JIS.decode_without_bom_handling(pool);
        if had_errors {
            TextEncoding::Utf8
        } else {
            TextEncoding::ShiftJis
        }
    }

    /// Decode one string.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::ShiftJis => SHIFT_JIS.decode_without_bom_handling(bytes).0.into_owned(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Encode one string.
    pub fn encode(self, text: &str) -> Result<Cow<'_, [u8]>> {
        match self {
            TextEncoding::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
            TextEncoding::ShiftJis => {
                let (bytes, _, unmappable) = SHIFT_JIS.encode(text);
                if unmappable {
                    return Err(Error::Unencodable {
                        text: text.to_string(),
                        encoding: self.label(),
                    });
                }
                Ok(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ascii_is_shift_jis() {
        assert_eq!(TextEncoding::detect(b"root\0name\0"), TextEncoding::ShiftJis);
    }

    #[test]
    fn test_detect_utf8_fallback() {
        // "クエスト" in UTF-8 is not valid Shift-JIS.
        let pool = "クエスト\0".as_bytes();
        assert_eq!(TextEncoding::detect(pool), TextEncoding::Utf8);
    }

    #[test]
    fn test_shift_jis_round_trip() {
        let encoded = TextEncoding::ShiftJis.encode("テスト").unwrap();
        assert_eq!(encoded.as_ref(), &[0x83, 0x65, 0x83, 0x58, 0x83, 0x67]);
        assert_eq!(TextEncoding::ShiftJis.decode(&encoded), "テスト");
    }

    #[test]
    fn test_unencodable() {
        let result = TextEncoding::ShiftJis.encode("\u{1F600}");
        assert!(matches!(result, Err(Error::Unencodable { .. })));
        assert!(TextEncoding::Utf8.encode("\u{1F600}").is_ok());
    }
}
