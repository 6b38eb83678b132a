//! CRC-32 hashing utilities.
//!
//! CRC-32 (IEEE, the zlib polynomial) keys the lookup tables that the games
//! embed in their archives.

use flate2::Crc;

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Compute the CRC-32 of a string's UTF-8 bytes.
#[inline]
pub fn hash_str(s: &str) -> u32 {
    hash_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hash() {
        assert_eq!(hash_bytes(&[]), 0);
    }

    #[test]
    fn test_known_hash() {
        // Standard CRC-32 check value.
        assert_eq!(hash_bytes(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_string_hash() {
        assert_eq!(hash_str("test"), hash_bytes(b"test"));
    }
}
