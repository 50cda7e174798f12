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

use std::marker::PhantomData;

use bitvec::prelude::*;
use rayon::prelude::*;

use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;
use crate::hash::IbfHasher;
use crate::ibf::EntityMapping;
use crate::ibf::PARALLEL_MIN_LEN;
use crate::strata::entity_keys;

/// The seed of the hash family when not configured.
pub const DEFAULT_MINWISE_SEED: u64 = 11;

const DEFAULT_BIT_SIZE: u8 = 4;
const DEFAULT_HASH_COUNT: u32 = 8;
/// Mersenne prime 2^31 - 1, the modulus of every hash in the family.
const HASH_BOUND: u64 = (1 << 31) - 1;
const EMPTY_SLOT: u32 = u32::MAX;

/// The random family `h(x) = (a * (x >> 4) + b * x + c) mod p` with `p = 2^31 - 1`.
///
/// Estimators only agree on slots when their families come from the same seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MinwiseHashFamily {
    coefficients: Vec<(u64, u64, u64)>,
}

impl MinwiseHashFamily {
    pub(crate) fn new(seed: u64, hash_count: u32) -> Self {
        let mut rng = XorShift64::seeded(seed);
        let coefficients = (0..hash_count)
            .map(|_| {
                let a = rng.next_in_range(1, HASH_BOUND);
                let b = rng.next_in_range(1, HASH_BOUND);
                let c = rng.next_in_range(0, HASH_BOUND);
                (a, b, c)
            })
            .collect();
        MinwiseHashFamily { coefficients }
    }

    pub(crate) fn hash_count(&self) -> u32 {
        self.coefficients.len() as u32
    }

    fn hash(&self, i: usize, x: u64) -> u32 {
        let (a, b, c) = self.coefficients[i];
        let h = a
            .wrapping_mul(x >> 4)
            .wrapping_add(b.wrapping_mul(x))
            .wrapping_add(c);
        (h % HASH_BOUND) as u32
    }
}

/// The state of a b-bit minwise hash estimator.
///
/// A live estimator keeps the full 32-bit minimum of every slot. Deserialized data only knows
/// the low `bit_size` bits, which is enough to compare but not to fold or update.
#[derive(Debug, Clone, PartialEq)]
pub struct BitMinwiseHashEstimatorData {
    pub(crate) bit_size: u8,
    pub(crate) capacity: u64,
    pub(crate) hash_count: u32,
    pub(crate) item_count: i64,
    pub(crate) occupied: BitVec<u8, Lsb0>,
    /// Slot `i * capacity + bucket` holds the minimum of hash function `i` over the bucket.
    pub(crate) slots: Vec<u32>,
    pub(crate) truncated: bool,
}

impl BitMinwiseHashEstimatorData {
    pub(crate) fn new(bit_size: u8, capacity: u64, hash_count: u32) -> Self {
        BitMinwiseHashEstimatorData {
            bit_size,
            capacity,
            hash_count,
            item_count: 0,
            occupied: bitvec![u8, Lsb0; 0; capacity as usize],
            slots: vec![EMPTY_SLOT; capacity as usize * hash_count as usize],
            truncated: false,
        }
    }

    /// Returns the number of bits kept per slot.
    pub fn bit_size(&self) -> u8 {
        self.bit_size
    }

    /// Returns the number of identifier buckets.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of hash functions.
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Returns the number of entities added.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Returns `true` if only the low `bit_size` bits of each slot are known.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn mask(&self) -> u32 {
        if self.bit_size >= 32 {
            u32::MAX
        } else {
            (1u32 << self.bit_size) - 1
        }
    }

    /// Returns the transmitted bits of slot `index`.
    pub(crate) fn signature(&self, index: usize) -> u32 {
        self.slots[index] & self.mask()
    }

    pub(crate) fn add_hashes(&mut self, family: &MinwiseHashFamily, id_hash: u64, element: u64) {
        debug_assert!(!self.truncated, "truncated minwise data cannot be updated");
        let capacity = self.capacity as usize;
        let bucket = (id_hash % self.capacity) as usize;
        for i in 0..self.hash_count as usize {
            let slot = &mut self.slots[i * capacity + bucket];
            *slot = (*slot).min(family.hash(i, element));
        }
        self.occupied.set(bucket, true);
        self.item_count += 1;
    }

    /// Estimates the Jaccard similarity of the two underlying sets.
    ///
    /// Returns 0 when either side is empty or the estimators are not comparable. Estimators of
    /// different capacities are compared after folding the larger one, which needs its full
    /// slots.
    pub fn similarity(&self, other: &Self) -> f64 {
        if self.item_count <= 0
            || other.item_count <= 0
            || self.bit_size != other.bit_size
            || self.hash_count != other.hash_count
        {
            return 0.0;
        }
        if self.capacity != other.capacity {
            let (small, large) = if self.capacity < other.capacity {
                (self, other)
            } else {
                (other, self)
            };
            if large.capacity % small.capacity != 0 {
                return 0.0;
            }
            return match large.fold(large.capacity / small.capacity) {
                Ok(folded) => small.similarity(&folded),
                Err(_) => 0.0,
            };
        }

        let capacity = self.capacity as usize;
        let (matches, compared) = (0..capacity)
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|bucket| match (self.occupied[bucket], other.occupied[bucket]) {
                (false, false) => (0, 0),
                (true, true) => {
                    let matches = (0..self.hash_count as usize)
                        .filter(|i| {
                            let index = i * capacity + bucket;
                            self.signature(index) == other.signature(index)
                        })
                        .count();
                    (matches, self.hash_count as usize)
                }
                _ => (0, self.hash_count as usize),
            })
            .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));
        if compared == 0 {
            return 0.0;
        }

        // Two different minima still share their low bits with probability 2^-b.
        let raw = matches as f64 / compared as f64;
        let chance = 0.5f64.powi(i32::from(self.bit_size));
        let jaccard = ((raw - chance) / (1.0 - chance)).clamp(0.0, 1.0);

        let (n1, n2) = (self.item_count as f64, other.item_count as f64);
        jaccard.min(n1.min(n2) / n1.max(n2))
    }

    /// Estimates the size of the symmetric difference of the two underlying sets.
    pub fn estimated_difference(&self, other: &Self) -> f64 {
        let jaccard = self.similarity(other);
        let total = (self.item_count.max(0) + other.item_count.max(0)) as f64;
        total / (1.0 + jaccard) * (1.0 - jaccard)
    }

    /// Folds the buckets by `factor`, keeping the minimum of every group of slots.
    ///
    /// Returns an error if `factor` does not divide the capacity or the data is truncated.
    pub fn fold(&self, factor: u64) -> Result<Self, Error> {
        if factor == 0 || self.capacity % factor != 0 {
            return Err(
                Error::invalid_argument("fold factor must divide the capacity")
                    .with_context("capacity", self.capacity)
                    .with_context("factor", factor),
            );
        }
        if self.truncated {
            return Err(Error::unsupported(
                "truncated minwise data cannot be folded",
            ));
        }
        if factor == 1 {
            return Ok(self.clone());
        }

        let capacity = self.capacity as usize;
        let folded = capacity / factor as usize;
        let slots = (0..folded * self.hash_count as usize)
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|o| {
                let (i, bucket) = (o / folded, o % folded);
                (0..factor as usize)
                    .map(|t| self.slots[i * capacity + bucket + t * folded])
                    .min()
                    .unwrap_or(EMPTY_SLOT)
            })
            .collect();
        let occupied = (0..folded)
            .map(|bucket| (0..factor as usize).any(|t| self.occupied[bucket + t * folded]))
            .collect();

        Ok(BitMinwiseHashEstimatorData {
            bit_size: self.bit_size,
            capacity: folded as u64,
            hash_count: self.hash_count,
            item_count: self.item_count,
            occupied,
            slots,
            truncated: false,
        })
    }
}

/// Estimates the similarity of two sets from small signatures.
///
/// The estimator supports additions only.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
/// use ibfsketch::ibf::EntityMapping;
/// use ibfsketch::minwise::BitMinwiseHashEstimatorBuilder;
///
/// struct Keys(IbfHasher);
///
/// impl EntityMapping<u64> for Keys {
///     type Id = u64;
///     type Hash = u32;
///
///     fn id(&self, key: &u64) -> u64 {
///         *key
///     }
///
///     fn entity_hash(&self, key: &u64) -> u32 {
///         self.0.hash(key)
///     }
/// }
///
/// let mut a = BitMinwiseHashEstimatorBuilder::new(64).build(Keys(IbfHasher::default()));
/// let mut b = BitMinwiseHashEstimatorBuilder::new(64).build(Keys(IbfHasher::default()));
/// for key in 0..5000 {
///     a.add(&key);
///     b.add(&(key + 2500));
/// }
/// let similarity = a.similarity(b.data());
/// assert!(similarity > 0.15 && similarity < 0.55);
/// assert_eq!(a.similarity(a.data()), 1.0);
/// ```
pub struct BitMinwiseHashEstimator<E, M: EntityMapping<E>> {
    mapping: M,
    hasher: IbfHasher,
    family: MinwiseHashFamily,
    data: BitMinwiseHashEstimatorData,
    _marker: PhantomData<fn(&E)>,
}

impl<E, M: EntityMapping<E>> BitMinwiseHashEstimator<E, M> {
    /// Returns a builder for `capacity` identifier buckets.
    pub fn builder(capacity: u64) -> BitMinwiseHashEstimatorBuilder {
        BitMinwiseHashEstimatorBuilder::new(capacity)
    }

    /// Returns the estimator's current data.
    pub fn data(&self) -> &BitMinwiseHashEstimatorData {
        &self.data
    }

    /// Adds an entity.
    pub fn add(&mut self, entity: &E) {
        let (id_hash, key) = entity_keys(&self.mapping, &self.hasher, entity);
        self.data.add_hashes(&self.family, id_hash, key);
    }

    /// Estimates the Jaccard similarity with `other`.
    pub fn similarity(&self, other: &BitMinwiseHashEstimatorData) -> f64 {
        self.data.similarity(other)
    }

    /// Returns a copy of the estimator's data.
    pub fn extract(&self) -> BitMinwiseHashEstimatorData {
        self.data.clone()
    }

    /// Replaces the estimator's data with previously extracted data.
    ///
    /// Returns an error for truncated data, whose minima can no longer be updated, or data with
    /// another number of hash functions.
    pub fn rehydrate(&mut self, data: BitMinwiseHashEstimatorData) -> Result<(), Error> {
        if data.truncated {
            return Err(Error::unsupported(
                "deserialized minwise data can be compared but not updated",
            ));
        }
        if data.hash_count != self.family.hash_count() {
            return Err(Error::invalid_argument("hash count differs from the hash family")
                .with_context("hash_count", data.hash_count)
                .with_context("family", self.family.hash_count()));
        }
        self.data = data;
        Ok(())
    }

    /// Returns the estimator's data folded by `factor`.
    pub fn fold(&self, factor: u64) -> Result<BitMinwiseHashEstimatorData, Error> {
        self.data.fold(factor)
    }
}

/// Builder for [`BitMinwiseHashEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct BitMinwiseHashEstimatorBuilder {
    capacity: u64,
    bit_size: u8,
    hash_count: u32,
    seed: u64,
    hasher: IbfHasher,
}

impl BitMinwiseHashEstimatorBuilder {
    /// Creates a builder for `capacity` identifier buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: u64) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        BitMinwiseHashEstimatorBuilder {
            capacity,
            bit_size: DEFAULT_BIT_SIZE,
            hash_count: DEFAULT_HASH_COUNT,
            seed: DEFAULT_MINWISE_SEED,
            hasher: IbfHasher::default(),
        }
    }

    /// Sets the number of identifier buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn capacity(mut self, capacity: u64) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        self.capacity = capacity;
        self
    }

    /// Sets the number of bits transmitted per slot (default: 4).
    ///
    /// One to eight bits is the usual range. At 32 bits the full minima are sent, and the
    /// received data can be folded and rehydrated.
    ///
    /// # Panics
    ///
    /// Panics if `bit_size` is not in [1, 32].
    pub fn bit_size(mut self, bit_size: u8) -> Self {
        assert!(
            (1..=32).contains(&bit_size),
            "bit_size must be in [1, 32], got {bit_size}"
        );
        self.bit_size = bit_size;
        self
    }

    /// Sets the number of hash functions (default: 8).
    ///
    /// # Panics
    ///
    /// Panics if `hash_count` is 0.
    pub fn hash_count(mut self, hash_count: u32) -> Self {
        assert!(hash_count > 0, "hash_count must be at least 1");
        self.hash_count = hash_count;
        self
    }

    /// Sets the seed of the hash family (default: 11).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the hasher used to derive identifier and entity hashes.
    pub fn hasher(mut self, hasher: IbfHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub(crate) fn build_data(&self) -> BitMinwiseHashEstimatorData {
        BitMinwiseHashEstimatorData::new(self.bit_size, self.capacity, self.hash_count)
    }

    pub(crate) fn build_family(&self) -> MinwiseHashFamily {
        MinwiseHashFamily::new(self.seed, self.hash_count)
    }

    /// Builds the estimator.
    pub fn build<E, M: EntityMapping<E>>(self, mapping: M) -> BitMinwiseHashEstimator<E, M> {
        BitMinwiseHashEstimator {
            mapping,
            hasher: self.hasher,
            family: self.build_family(),
            data: self.build_data(),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(range: std::ops::Range<u64>, capacity: u64) -> BitMinwiseHashEstimatorData {
        let builder = BitMinwiseHashEstimatorBuilder::new(capacity);
        let family = builder.build_family();
        let hasher = IbfHasher::default();
        let mut data = builder.build_data();
        for value in range {
            data.add_hashes(&family, hasher.hash_u64(&value), hasher.hash_u64(&(value, 1)));
        }
        data
    }

    #[test]
    #[should_panic(expected = "bit_size must be in [1, 32]")]
    fn test_bit_size_above_slot_width() {
        let _ = BitMinwiseHashEstimatorBuilder::new(16).bit_size(33);
    }

    #[test]
    fn test_family_is_reproducible() {
        assert_eq!(MinwiseHashFamily::new(11, 4), MinwiseHashFamily::new(11, 4));
        assert_ne!(MinwiseHashFamily::new(11, 4), MinwiseHashFamily::new(12, 4));
        let family = MinwiseHashFamily::new(11, 4);
        for x in [0, 1, u64::MAX, 1 << 40] {
            assert!(u64::from(family.hash(3, x)) < HASH_BOUND);
        }
    }

    #[test]
    fn test_similarity_bounds() {
        let a = filled(0..2000, 128);
        let b = filled(1000..3000, 128);
        let c = filled(5000..7000, 128);
        assert_eq!(a.similarity(&a), 1.0);
        assert_eq!(a.similarity(&b), b.similarity(&a));
        assert!(a.similarity(&b) > a.similarity(&c));
        assert!(a.similarity(&c) < 0.1);
    }

    #[test]
    fn test_empty_or_mismatched_is_zero() {
        let a = filled(0..100, 16);
        let empty = filled(0..0, 16);
        assert_eq!(a.similarity(&empty), 0.0);

        let mut other_bits = a.clone();
        other_bits.bit_size = 2;
        assert_eq!(a.similarity(&other_bits), 0.0);
    }

    #[test]
    fn test_fold_matches_smaller_capacity() {
        let large = filled(0..500, 64);
        let small = filled(0..500, 16);
        assert_eq!(large.fold(4).unwrap(), small);
        assert_eq!(large.similarity(&small), 1.0);
        assert!(large.fold(5).is_err());
    }
}
