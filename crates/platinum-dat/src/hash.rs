//! Name lookup table stored at the end of the DAT header.
//!
//! The games locate files by name through a bucketed table of CRC-32 hashes.
//! Readers never need it, writers must regenerate it for every new name list.

use platinum_common::crc;

/// Produces the hash-map section for an ordered list of file names.
pub trait NameHasher {
    fn hash(&self, names: &[&str]) -> Vec<u8>;
}

/// The CRC-32 bucket table used by the game runtimes.
///
/// ```text
/// u32 shift
/// u32 bucket table offset (always 16)
/// u32 hash list offset
/// u32 index list offset
/// i16 buckets[1 << (31 - shift)]   first sorted position per bucket, -1 if empty
/// u32 hashes[n]                    crc32(lowercase name) & 0x7FFFFFFF, sorted by bucket
/// u16 indices[n]                   original file index per sorted position
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32BucketHasher;

impl Crc32BucketHasher {
    /// Bucket shift for `count` names.
    pub fn shift(count: usize) -> u32 {
        let bits = usize::BITS - count.leading_zeros();
        31u32.min(32u32.saturating_sub(bits))
    }
}

impl NameHasher for Crc32BucketHasher {
    fn hash(&self, names: &[&str]) -> Vec<u8> {
        let shift = Self::shift(names.len());
        let bucket_count = 1usize << (31 - shift);

        let mut hashed: Vec<(u32, u16)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (crc::hash_str(&name.to_lowercase()) & 0x7FFF_FFFF, i as u16))
            .collect();
        // Stable, so equal buckets keep file order.
        hashed.sort_by_key(|&(hash, _)| hash >> shift);

        let mut buckets = vec![-1i16; bucket_count];
        for (position, &(hash, _)) in hashed.iter().enumerate() {
            let bucket = &mut buckets[(hash >> shift) as usize];
            if *bucket == -1 {
                *bucket = position as i16;
            }
        }

        let buckets_offset = 16u32;
        let hashes_offset = buckets_offset + bucket_count as u32 * 2;
        let indices_offset = hashes_offset + names.len() as u32 * 4;

        let mut out = Vec::with_capacity(indices_offset as usize + names.len() * 2);
        out.extend_from_slice(&shift.to_le_bytes());
        out.extend_from_slice(&buckets_offset.to_le_bytes());
        out.extend_from_slice(&hashes_offset.to_le_bytes());
        out.extend_from_slice(&indices_offset.to_le_bytes());
        for bucket in &buckets {
            out.extend_from_slice(&bucket.to_le_bytes());
        }
        for (hash, _) in &hashed {
            out.extend_from_slice(&hash.to_le_bytes());
        }
        for (_, index) in &hashed {
            out.extend_from_slice(&index.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift() {
        assert_eq!(Crc32BucketHasher::shift(0), 31);
        assert_eq!(Crc32BucketHasher::shift(1), 31);
        assert_eq!(Crc32BucketHasher::shift(2), 30);
        assert_eq!(Crc32BucketHasher::shift(3), 30);
        assert_eq!(Crc32BucketHasher::shift(4), 29);
        assert_eq!(Crc32BucketHasher::shift(1000), 22);
    }

    #[test]
    fn test_two_names() {
        let table = Crc32BucketHasher.hash(&["a.txt", "b.txt"]);

        let u32_at = |at: usize| u32::from_le_bytes([table[at], table[at + 1], table[at + 2], table[at + 3]]);
        let u16_at = |at: usize| u16::from_le_bytes([table[at], table[at + 1]]);

        assert_eq!(table.len(), 32);
        assert_eq!(u32_at(0), 30);
        assert_eq!(u32_at(4), 16);
        assert_eq!(u32_at(8), 20);
        assert_eq!(u32_at(12), 28);

        // b.txt falls in bucket 0, a.txt in bucket 1.
        assert_eq!(u16_at(16), 0);
        assert_eq!(u16_at(18), 1);
        assert_eq!(u32_at(20), 0x064B_8D6A);
        assert_eq!(u32_at(24), 0x41EB_F7BA);
        assert_eq!(u16_at(28), 1);
        assert_eq!(u16_at(30), 0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            Crc32BucketHasher.hash(&["FOO.DAT"]),
            Crc32BucketHasher.hash(&["foo.dat"])
        );
    }

    #[test]
    fn test_shared_and_empty_buckets() {
        // "c" and "d" land in bucket 0, "a" and "b" in bucket 3.
        let table = Crc32BucketHasher.hash(&["a", "b", "c", "d"]);
        let buckets: Vec<i16> = table[16..24]
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(buckets, vec![0, -1, -1, 2]);

        let indices: Vec<u16> = table[40..48]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(indices, vec![2, 3, 0, 1]);
    }
}
