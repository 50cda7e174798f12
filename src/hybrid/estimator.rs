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

use tracing::debug;
use tracing::trace;

use crate::error::Error;
use crate::hash::IbfHasher;
use crate::ibf::EntityMapping;
use crate::ibf::FoldingStrategy;
use crate::minwise::BitMinwiseHashEstimatorBuilder;
use crate::minwise::BitMinwiseHashEstimatorData;
use crate::minwise::MinwiseHashFamily;
use crate::strata::StrataEstimatorBuilder;
use crate::strata::StrataEstimatorData;
use crate::strata::entity_keys;

/// The number of strata of a hybrid estimator when not configured.
pub const DEFAULT_HYBRID_STRATA: usize = 7;

/// The transmittable state of a hybrid estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridEstimatorData {
    pub(crate) item_count: i64,
    pub(crate) strata: StrataEstimatorData,
    /// Created when the first entity falls beyond the last stratum.
    pub(crate) minwise: Option<BitMinwiseHashEstimatorData>,
    /// Entities beyond the last stratum that the minwise part does not hold.
    pub(crate) replacement_count: i64,
    pub(crate) minwise_disabled: bool,
}

impl HybridEstimatorData {
    /// Returns the net number of entities added.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Returns the strata part.
    pub fn strata(&self) -> &StrataEstimatorData {
        &self.strata
    }

    /// Returns the minwise part, if any entity reached it.
    pub fn minwise(&self) -> Option<&BitMinwiseHashEstimatorData> {
        self.minwise.as_ref()
    }

    /// Returns the number of tail entities only tracked as a count.
    pub fn replacement_count(&self) -> i64 {
        self.replacement_count
    }

    /// Returns `true` once a removal has disabled the minwise part.
    pub fn is_minwise_disabled(&self) -> bool {
        self.minwise_disabled
    }

    fn tail_count(&self) -> i64 {
        self.minwise.as_ref().map_or(0, |m| m.item_count) + self.replacement_count
    }

    /// Estimates the difference in the tail beyond the last stratum.
    fn tail_difference(&self, other: &Self) -> f64 {
        match (&self.minwise, &other.minwise) {
            (Some(a), Some(b)) => {
                a.estimated_difference(b)
                    + (self.replacement_count - other.replacement_count).unsigned_abs() as f64
            }
            _ => (self.tail_count() - other.tail_count()).unsigned_abs() as f64,
        }
    }

    pub(crate) fn estimate_difference(
        &self,
        other: &Self,
        hasher: &IbfHasher,
        folding: FoldingStrategy,
    ) -> Result<f64, Error> {
        let strata = self.strata.estimate_difference(&other.strata, hasher, folding)?;
        let tail = self.tail_difference(other);
        trace!(strata, tail, "hybrid estimate");
        Ok(strata + tail)
    }

    /// Folds the strata by `factor`.
    ///
    /// The minwise part is folded by the same factor when it allows it and kept as is otherwise;
    /// comparisons fold it again as needed.
    pub fn fold(&self, factor: u64) -> Result<Self, Error> {
        let strata = self.strata.fold(factor)?;
        let minwise = self.minwise.as_ref().map(|m| {
            if m.capacity % factor == 0 && !m.truncated {
                m.fold(factor).unwrap_or_else(|_| m.clone())
            } else {
                m.clone()
            }
        });
        Ok(HybridEstimatorData {
            strata,
            minwise,
            ..self.clone()
        })
    }

    /// Compresses the strata as far as their error rate allows, or returns `None` if no fold
    /// qualifies.
    pub fn compress(&self, folding: FoldingStrategy) -> Option<Self> {
        let strata = self.strata.compress(folding)?;
        Some(HybridEstimatorData {
            strata,
            ..self.clone()
        })
    }
}

/// Estimates how many entities two parties' sets differ in, to size an invertible Bloom
/// filter before it is transmitted.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
/// use ibfsketch::hybrid::HybridEstimatorBuilder;
/// use ibfsketch::ibf::EntityMapping;
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
/// let mut a = HybridEstimatorBuilder::new(80).build(Keys(IbfHasher::default()));
/// let mut b = HybridEstimatorBuilder::new(80).build(Keys(IbfHasher::default()));
/// for key in 0..10_000 {
///     a.add(&key);
///     if key % 100 != 0 {
///         b.add(&key);
///     }
/// }
/// let estimate = a.decode(b.data()).unwrap();
/// assert!(estimate > 30 && estimate < 500);
/// ```
pub struct HybridEstimator<E, M: EntityMapping<E>> {
    mapping: M,
    hasher: IbfHasher,
    folding: FoldingStrategy,
    minwise: BitMinwiseHashEstimatorBuilder,
    family: MinwiseHashFamily,
    data: HybridEstimatorData,
    scratch: Vec<usize>,
    _marker: PhantomData<fn(&E)>,
}

impl<E, M: EntityMapping<E>> HybridEstimator<E, M> {
    /// Returns a builder for strata of `block_size` cells.
    pub fn builder(block_size: u64) -> HybridEstimatorBuilder {
        HybridEstimatorBuilder::new(block_size)
    }

    /// Returns the estimator's current data.
    pub fn data(&self) -> &HybridEstimatorData {
        &self.data
    }

    /// Returns the net number of entities added.
    pub fn item_count(&self) -> i64 {
        self.data.item_count
    }

    /// Adds an entity.
    pub fn add(&mut self, entity: &E) {
        let (id_hash, key) = entity_keys(&self.mapping, &self.hasher, entity);
        self.data.item_count += 1;
        if self
            .data
            .strata
            .update_key(key, 1, &self.hasher, &mut self.scratch)
        {
            return;
        }
        if self.data.minwise_disabled {
            self.data.replacement_count += 1;
            return;
        }
        let minwise = &self.minwise;
        self.data
            .minwise
            .get_or_insert_with(|| minwise.build_data())
            .add_hashes(&self.family, id_hash, key);
    }

    /// Removes an entity previously added.
    ///
    /// The first removal disables the minwise part, which cannot forget entities. The entities
    /// it held are kept as a count.
    pub fn remove(&mut self, entity: &E) {
        let (_, key) = entity_keys(&self.mapping, &self.hasher, entity);
        self.data.item_count -= 1;
        if !self.data.minwise_disabled {
            let held = self.data.minwise.take().map_or(0, |m| m.item_count);
            debug!(held, "removal disables the minwise estimator");
            self.data.replacement_count += held;
            self.data.minwise_disabled = true;
        }
        if !self
            .data
            .strata
            .update_key(key, -1, &self.hasher, &mut self.scratch)
        {
            self.data.replacement_count -= 1;
        }
    }

    /// Estimates the number of entities in which this estimator and `other` differ.
    ///
    /// Returns an error if the strata have different shapes.
    pub fn decode(&self, other: &HybridEstimatorData) -> Result<u64, Error> {
        let estimate = self
            .data
            .estimate_difference(other, &self.hasher, self.folding)?;
        Ok(estimate.ceil() as u64)
    }

    /// Returns a copy of the estimator's data for transmission.
    pub fn extract(&self) -> HybridEstimatorData {
        self.data.clone()
    }

    /// Replaces the estimator's data with previously extracted data.
    ///
    /// Returns an error if the minwise part is truncated or was built with another number of
    /// hash functions.
    pub fn rehydrate(&mut self, data: HybridEstimatorData) -> Result<(), Error> {
        if data.strata.block_size == 0 || data.strata.hash_function_count == 0 {
            return Err(Error::invalid_argument(
                "strata data must have positive block size and hash function count",
            ));
        }
        if let Some(minwise) = &data.minwise {
            if minwise.truncated {
                return Err(Error::unsupported(
                    "deserialized minwise data can be compared but not updated",
                ));
            }
            if minwise.hash_count != self.family.hash_count() {
                return Err(
                    Error::invalid_argument("hash count differs from the hash family")
                        .with_context("hash_count", minwise.hash_count)
                        .with_context("family", self.family.hash_count()),
                );
            }
        }
        self.data = data;
        Ok(())
    }

    /// Returns the estimator's data folded by `factor`.
    pub fn fold(&self, factor: u64) -> Result<HybridEstimatorData, Error> {
        self.data.fold(factor)
    }

    /// Returns the estimator's data with strata folded as far as their error rate allows.
    pub fn compress(&self) -> Option<HybridEstimatorData> {
        self.data.compress(self.folding)
    }
}

/// Builder for [`HybridEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct HybridEstimatorBuilder {
    strata: StrataEstimatorBuilder,
    minwise: BitMinwiseHashEstimatorBuilder,
}

impl HybridEstimatorBuilder {
    /// Creates a builder for strata of `block_size` cells. The minwise part gets as many buckets.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is 0.
    pub fn new(block_size: u64) -> Self {
        HybridEstimatorBuilder {
            strata: StrataEstimatorBuilder::new(block_size).max_strata(DEFAULT_HYBRID_STRATA),
            minwise: BitMinwiseHashEstimatorBuilder::new(block_size),
        }
    }

    /// Sets the number of strata (default: 7).
    ///
    /// # Panics
    ///
    /// Panics if `max_strata` is not in [1, 64].
    pub fn max_strata(mut self, max_strata: usize) -> Self {
        self.strata = self.strata.max_strata(max_strata);
        self
    }

    /// Sets the number of hash functions per stratum (default: 3).
    pub fn hash_function_count(mut self, hash_function_count: u32) -> Self {
        self.strata = self.strata.hash_function_count(hash_function_count);
        self
    }

    /// Sets the correction applied to the strata's peeled count.
    pub fn decode_count_factor(mut self, factor: f64) -> Self {
        self.strata = self.strata.decode_count_factor(factor);
        self
    }

    /// Sets the error rate that bounds compression (default: 0.01).
    pub fn error_rate(mut self, error_rate: f64) -> Self {
        self.strata = self.strata.error_rate(error_rate);
        self
    }

    /// Sets how strata of different block sizes are reconciled.
    pub fn folding(mut self, folding: FoldingStrategy) -> Self {
        self.strata = self.strata.folding(folding);
        self
    }

    /// Sets the number of buckets of the minwise part.
    pub fn minwise_capacity(mut self, capacity: u64) -> Self {
        self.minwise = self.minwise.capacity(capacity);
        self
    }

    /// Sets the number of bits transmitted per minwise slot (default: 4).
    pub fn bit_size(mut self, bit_size: u8) -> Self {
        self.minwise = self.minwise.bit_size(bit_size);
        self
    }

    /// Sets the number of minwise hash functions (default: 8).
    pub fn minwise_hash_count(mut self, hash_count: u32) -> Self {
        self.minwise = self.minwise.hash_count(hash_count);
        self
    }

    /// Sets the seed of the minwise hash family (default: 11).
    pub fn seed(mut self, seed: u64) -> Self {
        self.minwise = self.minwise.seed(seed);
        self
    }

    /// Sets the hasher shared by both parts.
    pub fn hasher(mut self, hasher: IbfHasher) -> Self {
        self.strata = self.strata.hasher(hasher);
        self.minwise = self.minwise.hasher(hasher);
        self
    }

    /// Builds the estimator.
    pub fn build<E, M: EntityMapping<E>>(self, mapping: M) -> HybridEstimator<E, M> {
        let (hasher, folding) = self.strata.hasher_and_folding();
        let data = HybridEstimatorData {
            item_count: 0,
            strata: self.strata.build_data(),
            minwise: None,
            replacement_count: 0,
            minwise_disabled: false,
        };
        HybridEstimator {
            mapping,
            hasher,
            folding,
            family: self.minwise.build_family(),
            minwise: self.minwise,
            data,
            scratch: Vec::new(),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keys(IbfHasher);

    impl EntityMapping<u64> for Keys {
        type Id = u64;
        type Hash = u32;

        fn id(&self, key: &u64) -> u64 {
            *key
        }

        fn entity_hash(&self, key: &u64) -> u32 {
            self.0.hash(key)
        }
    }

    fn estimator(max_strata: usize) -> HybridEstimator<u64, Keys> {
        HybridEstimatorBuilder::new(40)
            .max_strata(max_strata)
            .build(Keys(IbfHasher::default()))
    }

    #[test]
    fn test_tail_goes_to_minwise() {
        let mut e = estimator(2);
        for key in 0..2000 {
            e.add(&key);
        }
        let data = e.data();
        let minwise = data.minwise().unwrap().item_count();
        // Only keys with at least two trailing zeros reach the tail.
        assert!((350..650).contains(&minwise), "{minwise}");
        assert_eq!(data.strata().item_count() + minwise, 2000);
        assert_eq!(data.item_count(), 2000);
    }

    #[test]
    fn test_remove_disables_minwise() {
        let mut e = estimator(2);
        for key in 0..2000 {
            e.add(&key);
        }
        let held = e.data().minwise().unwrap().item_count();
        e.remove(&0);
        let data = e.data();
        assert!(data.is_minwise_disabled());
        assert!(data.minwise().is_none());
        assert!(data.replacement_count() == held || data.replacement_count() == held - 1);
        assert_eq!(data.item_count(), 1999);

        e.add(&0);
        assert_eq!(e.data().item_count(), 2000);
    }

    #[test]
    fn test_identical_sets_estimate_zero() {
        let mut a = estimator(3);
        let mut b = estimator(3);
        for key in 0..3000 {
            a.add(&key);
            b.add(&key);
        }
        assert_eq!(a.decode(b.data()).unwrap(), 0);
    }

    #[test]
    fn test_tail_difference_without_minwise() {
        let mut a = estimator(3);
        let mut b = estimator(3);
        for key in 0..3000 {
            a.add(&key);
            b.add(&key);
        }
        b.remove(&1);
        b.add(&1);
        // Both tails hold the same entities, so only the strata can differ.
        assert_eq!(a.decode(b.data()).unwrap(), 0);
    }

    #[test]
    fn test_rehydrate_rejects_truncated_minwise() {
        let mut a = estimator(2);
        for key in 0..500 {
            a.add(&key);
        }
        let bytes = a.extract().serialize();
        let restored = HybridEstimatorData::deserialize(&bytes).unwrap();
        assert!(a.rehydrate(restored).is_err());
        assert!(a.rehydrate(a.extract()).is_ok());
    }
}
