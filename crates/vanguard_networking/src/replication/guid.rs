//! Network GUID allocation.

use std::collections::HashSet;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Issues random, non-zero, never-repeating 64-bit GUIDs.
#[derive(Debug)]
pub struct GuidSource {
    rng: ChaCha8Rng,
    issued: HashSet<u64>,
}

impl GuidSource {
    /// Creates a source. The same seed yields the same GUID sequence.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    /// Next unused GUID.
    pub fn next_guid(&mut self) -> u64 {
        loop {
            let guid = self.rng.next_u64();
            if guid != 0 && self.issued.insert(guid) {
                return guid;
            }
        }
    }

    /// Number of GUIDs handed out.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.len()
    }
}
