//! Cache key hashing.
//!
//! Keys are built from object identities (raw handle values) and small
//! enums. [`StateHasher`] is a rolling multiplicative combiner, so the
//! position of each value matters; it is used wherever slots are
//! positional, such as render targets. [`combine_unordered`] folds a set
//! of values so their order does not matter.
//!
//! Identities are stable for a process lifetime because shader modules
//! and image views are created once upstream and reused, so keys are
//! deterministic within a run but are not meant to be persisted.

use std::hash::{Hash, Hasher};

const SEED: u64 = 0xcbf2_9ce4_8422_2325;
const MULTIPLIER: u64 = 0x0000_0100_0000_01b3;

/// Finalizer from splitmix64.
#[inline]
pub fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// Order-sensitive rolling hasher.
#[derive(Clone, Copy, Debug)]
pub struct StateHasher {
    state: u64,
}

impl Default for StateHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHasher {
    pub const fn new() -> Self {
        Self { state: SEED }
    }

    /// Starts a hasher chained from an existing key.
    pub fn chained(key: u64) -> Self {
        let mut hasher = Self::new();
        hasher.write_u64(key);
        hasher
    }

    /// Feeds any `Hash` value.
    pub fn add<T: Hash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.hash(self);
        self
    }
}

impl Hasher for StateHasher {
    fn finish(&self) -> u64 {
        mix64(self.state)
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            self.write_u64(u64::from_le_bytes(word));
        }
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.state = (self.state ^ mix64(value)).wrapping_mul(MULTIPLIER);
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.write_u64(u64::from(value));
    }

    #[inline]
    fn write_u8(&mut self, value: u8) {
        self.write_u64(u64::from(value));
    }

    #[inline]
    fn write_usize(&mut self, value: usize) {
        self.write_u64(value as u64);
    }
}

/// Combines values so that any permutation yields the same key.
pub fn combine_unordered<I: IntoIterator<Item = u64>>(values: I) -> u64 {
    values
        .into_iter()
        .fold(SEED, |acc, value| acc.wrapping_add(mix64(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(values: &[u64]) -> u64 {
        let mut hasher = StateHasher::new();
        for value in values {
            hasher.write_u64(*value);
        }
        hasher.finish()
    }

    #[test]
    fn test_ordered_hash_is_deterministic() {
        assert_eq!(ordered(&[1, 2, 3]), ordered(&[1, 2, 3]));
    }

    #[test]
    fn test_ordered_hash_depends_on_position() {
        assert_ne!(ordered(&[1, 2]), ordered(&[2, 1]));
        // Plain XOR would collide here.
        assert_ne!(ordered(&[5, 5]), ordered(&[7, 7]));
    }

    #[test]
    fn test_unordered_ignores_order() {
        assert_eq!(combine_unordered([1, 2, 3]), combine_unordered([3, 1, 2]));
        assert_ne!(combine_unordered([1, 2]), combine_unordered([1, 3]));
    }

    #[test]
    fn test_unordered_counts_duplicates() {
        assert_ne!(combine_unordered([4, 4]), combine_unordered([4]));
    }

    #[test]
    fn test_chained_differs_from_parent() {
        let parent = ordered(&[9]);
        assert_ne!(StateHasher::chained(parent).finish(), parent);
    }
}
