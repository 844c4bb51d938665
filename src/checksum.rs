//! Rolling Checksums

use std::hash::Hasher;

pub const SEED: u64 = 5381;
pub const MULTIPLIER: u64 = 33;

/// Bernstein's djb2 over raw bytes, `h = h * 33 + byte`.
///
/// This catches accidental writes, it is trivially forgeable by anyone who
/// means to forge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Djb2(u64);

impl Default for Djb2 {
    fn default() -> Self {
        Djb2(SEED)
    }
}

impl Hasher for Djb2 {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(MULTIPLIER).wrapping_add(b as u64);
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

pub fn checksum(bytes: &[u8]) -> u64 {
    let mut h = Djb2::default();
    h.write(bytes);
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_seed() {
        assert_eq!(checksum(&[]), SEED);
    }

    #[test]
    fn known_values() {
        assert_eq!(checksum(b"a"), 5381 * 33 + 97);
        assert_eq!(checksum(b"ab"), (5381 * 33 + 97) * 33 + 98);
        // High bytes count as unsigned
        assert_eq!(checksum(&[0xff]), 5381 * 33 + 255);
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(checksum(b"ab"), checksum(b"ba"));
        assert_ne!(checksum(&[0, 1]), checksum(&[1, 0]));
    }

    #[test]
    fn hasher_matches_slices() {
        let mut h = Djb2::default();
        h.write_u32(0xC0FFEE);
        h.write(b"xyz");
        let mut bytes = 0xC0FFEEu32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"xyz");
        assert_eq!(h.finish(), checksum(&bytes));
    }

    #[test]
    fn wraps_instead_of_overflowing() {
        let long = vec![0xffu8; 4096];
        let _ = checksum(&long);
    }
}
