// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Hashing used to derive identifier hashes and cell probe positions.

mod murmurhash;

use std::hash::Hash;

use crate::algebra::XorValue;

/// The default seed shared by every filter and estimator.
///
/// Two structures can only be subtracted or compared when they were built with the same seed,
/// otherwise the same identifier would probe different cells.
pub const DEFAULT_SEED: u32 = 9001;

/// Seeded MurmurHash3 hasher producing identifier hashes and probe sequences.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
///
/// let hasher = IbfHasher::default();
/// let h: u32 = hasher.hash(&"apple");
/// assert_eq!(h, hasher.hash::<_, u32>(&"apple"));
///
/// let mut probes = Vec::new();
/// hasher.probes(h, 3, 100, &mut probes);
/// assert_eq!(probes.len(), 3);
/// assert!(probes.iter().all(|&p| p < 100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IbfHasher {
    seed: u32,
}

impl Default for IbfHasher {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl IbfHasher {
    /// Creates a hasher with the given seed.
    pub fn new(seed: u32) -> Self {
        IbfHasher { seed }
    }

    /// Returns the seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Hashes any value into the hash type `H`.
    ///
    /// This is the identifier hash used by standard filters, and a convenient entity hash for
    /// applications.
    pub fn hash<T: Hash + ?Sized, H: XorValue>(&self, value: &T) -> H {
        let (h1, h2) = murmurhash::murmur128(value, self.seed);
        H::from_hash(h1, h2)
    }

    /// Hashes any value into 64 bits.
    pub fn hash_u64<T: Hash + ?Sized>(&self, value: &T) -> u64 {
        murmurhash::murmur128(value, self.seed).0
    }

    /// Computes `count` probe positions in `[0, block_size)` for a hash value.
    ///
    /// Uses Dillinger-Manolios double hashing: `h_j = primary + j * secondary`, where the
    /// secondary hash is seeded by the primary. Each `h_j` is reduced by absolute value modulo
    /// `block_size`.
    ///
    /// Positions may repeat. Repeats are kept so that a probe into a folded block is always the
    /// fold of the probe into the original block.
    ///
    /// `out` is cleared first.
    pub fn probes<H: XorValue>(&self, hash: H, count: u32, block_size: u64, out: &mut Vec<usize>) {
        out.clear();
        self.probe_sequence(hash, count, block_size, |_, position| out.push(position));
    }

    /// Computes exactly `count` probe positions, one per hash function, each offset into its own
    /// segment of `block_size` cells.
    ///
    /// `out` is cleared first.
    pub fn segmented_probes<H: XorValue>(
        &self,
        hash: H,
        count: u32,
        block_size: u64,
        out: &mut Vec<usize>,
    ) {
        out.clear();
        self.probe_sequence(hash, count, block_size, |j, position| {
            out.push(j as usize * block_size as usize + position);
        });
    }

    fn probe_sequence<H: XorValue>(
        &self,
        hash: H,
        count: u32,
        block_size: u64,
        mut emit: impl FnMut(u32, usize),
    ) {
        debug_assert!(block_size > 0, "block_size must be positive");
        let mut buf = [0u8; 16];
        let key = &mut buf[..H::BYTES.min(16)];
        hash.write_le(key);

        let primary = murmurhash::murmur32(key, self.seed);
        let secondary = murmurhash::murmur32(key, primary);
        for j in 0..count {
            let h = primary.wrapping_add(j.wrapping_mul(secondary)) as i32;
            let position = (i64::from(h).unsigned_abs() % block_size) as usize;
            emit(j, position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probes_are_deterministic() {
        let hasher = IbfHasher::new(17);
        let mut a = Vec::new();
        let mut b = Vec::new();
        hasher.probes(0xabcdef_u32, 4, 1000, &mut a);
        hasher.probes(0xabcdef_u32, 4, 1000, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_probes_keep_repeats_on_tiny_blocks() {
        let hasher = IbfHasher::default();
        let mut out = Vec::new();
        hasher.probes(12345_u64, 4, 1, &mut out);
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_segmented_probes_land_in_own_segment() {
        let hasher = IbfHasher::default();
        let mut out = Vec::new();
        for value in 0..100_u64 {
            let h: u32 = hasher.hash(&value);
            hasher.segmented_probes(h, 3, 50, &mut out);
            assert_eq!(out.len(), 3);
            for (j, &p) in out.iter().enumerate() {
                assert!(p >= j * 50 && p < (j + 1) * 50);
            }
        }
    }

    #[test]
    fn test_probes_fold_consistently() {
        // A position modulo a divisor of the block size equals the probe computed for the
        // smaller block directly, which is what makes folding decodable.
        let hasher = IbfHasher::default();
        let mut big = Vec::new();
        let mut small = Vec::new();
        for value in 0..200_u64 {
            let h: u64 = hasher.hash(&value);
            hasher.segmented_probes(h, 3, 360, &mut big);
            hasher.segmented_probes(h, 3, 120, &mut small);
            for j in 0..3 {
                assert_eq!((big[j] - j * 360) % 120, small[j] - j * 120);
            }
        }
    }
}
