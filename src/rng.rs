//! Deterministic random number generation for collection sampling
//!
//! Generalizes the xorshift64*-based seeded RNG used for deterministic
//! simulation replay elsewhere in this codebase: seeds the collection
//! sampling policy so that "sample a subset" is reproducible for identical
//! inputs rather than drawing from a process-wide RNG.

use sha2::{Digest, Sha256};

/// Deterministic xorshift64* generator.
///
/// Same seed -> same sequence. Required so that two builds over identical
/// participant/collection inputs expand collections to the same sampled
/// subset, keeping `discover` idempotent.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Derive a seed deterministically from a `(participant, collection)`
    /// pair so sampling is stable without a caller-supplied seed.
    pub fn seed_from_pair(participant: &str, collection: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(participant.as_bytes());
        hasher.update([0u8]);
        hasher.update(collection.as_bytes());
        let digest = hasher.finalize();
        u64::from_le_bytes(digest[0..8].try_into().expect("sha256 digest is >= 8 bytes"))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Value in `[0, bound)`. Panics if `bound == 0`.
    pub fn below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be positive");
        (self.next() % bound as u64) as usize
    }

    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Deterministically select `want` elements out of `items` (or all of
    /// them, if `items.len() <= want`), via a partial Fisher-Yates shuffle
    /// driven by `below`. Same seed and same input order always produce the
    /// same subset, so an oracle that returns more candidates than asked
    /// for still yields a reproducible sample rather than depending on the
    /// oracle's own (possibly unstable) ordering or internal randomness.
    pub fn sample_subset<T>(&mut self, mut items: Vec<T>, want: usize) -> Vec<T> {
        let want = want.min(items.len());
        for i in 0..want {
            let j = i + self.below(items.len() - i);
            items.swap(i, j);
        }
        items.truncate(want);
        items
    }
}
