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
use crate::ibf::DEFAULT_HASH_FUNCTION_COUNT;
use crate::ibf::DecodeResult;
use crate::ibf::EntityMapping;
use crate::ibf::FoldingStrategy;
use crate::ibf::InvertibleBloomFilterData;

/// One stratum: a standard filter over 64-bit entity keys.
pub type StratumData = InvertibleBloomFilterData<u64, u32, i32>;

/// The number of strata when not configured, one per possible trailing zero count of a key.
pub const DEFAULT_MAX_STRATA: usize = 64;

const DEFAULT_ERROR_RATE: f64 = 0.01;
const DEFAULT_DECODE_COUNT_FACTOR: f64 = 1.39;
const MIN_BLOCK_SIZE_FOR_FACTOR: u64 = 20;

/// Hashes an entity into its identifier hash and its stratification key.
///
/// The key hashes the XOR of the identifier and value hashes once more, so that the stratum of
/// an entity does not follow any structure in its identifier.
pub(crate) fn entity_keys<E, M: EntityMapping<E>>(
    mapping: &M,
    hasher: &IbfHasher,
    entity: &E,
) -> (u64, u64) {
    let id_hash: u64 = hasher.hash(&mapping.id(entity));
    let value_hash: u64 = hasher.hash(&mapping.entity_hash(entity));
    (id_hash, hasher.hash_u64(&(id_hash ^ value_hash)))
}

/// The transmittable state of a strata estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct StrataEstimatorData {
    pub(crate) block_size: u64,
    pub(crate) hash_function_count: u32,
    pub(crate) decode_count_factor: f64,
    pub(crate) error_rate: f32,
    pub(crate) item_count: i64,
    pub(crate) strata: Vec<Option<StratumData>>,
}

impl StrataEstimatorData {
    pub(crate) fn new(
        block_size: u64,
        hash_function_count: u32,
        max_strata: usize,
        decode_count_factor: f64,
        error_rate: f32,
    ) -> Self {
        StrataEstimatorData {
            block_size,
            hash_function_count,
            decode_count_factor,
            error_rate,
            item_count: 0,
            strata: vec![None; max_strata],
        }
    }

    /// Returns the number of cells in each stratum.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Returns the number of hash functions of each stratum.
    pub fn hash_function_count(&self) -> u32 {
        self.hash_function_count
    }

    /// Returns the number of strata.
    pub fn max_strata(&self) -> usize {
        self.strata.len()
    }

    /// Returns the correction applied to the number of peeled keys.
    pub fn decode_count_factor(&self) -> f64 {
        self.decode_count_factor
    }

    /// Returns the net number of entities held by the strata.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Returns stratum `s`, or `None` if nothing ever landed there.
    pub fn stratum(&self, s: usize) -> Option<&StratumData> {
        self.strata.get(s).and_then(Option::as_ref)
    }

    /// Returns the stratum a key belongs to.
    pub(crate) fn stratum_of(key: u64) -> usize {
        key.trailing_zeros() as usize
    }

    /// Adds `count` copies of a key. Returns `false` if the key's stratum is beyond the last.
    pub(crate) fn update_key(
        &mut self,
        key: u64,
        count: i32,
        hasher: &IbfHasher,
        scratch: &mut Vec<usize>,
    ) -> bool {
        let s = Self::stratum_of(key);
        if s >= self.strata.len() {
            return false;
        }
        let (block_size, k, error_rate) =
            (self.block_size, self.hash_function_count, self.error_rate);
        let stratum = self.strata[s].get_or_insert_with(|| {
            let mut data = StratumData::with_shape(block_size, k, false, false);
            data.capacity = block_size;
            data.error_rate = error_rate;
            data
        });
        stratum.apply(key, hasher.hash(&key), count, hasher, scratch);
        stratum.item_count += i64::from(count);
        self.item_count += i64::from(count);
        true
    }

    fn check_compatible(&self, other: &Self) -> Result<(), Error> {
        if self.strata.len() != other.strata.len()
            || self.hash_function_count != other.hash_function_count
        {
            return Err(Error::invalid_argument("strata estimators have different shapes")
                .with_context("max_strata", self.strata.len())
                .with_context("other_max_strata", other.strata.len())
                .with_context("hash_function_count", self.hash_function_count)
                .with_context("other_hash_function_count", other.hash_function_count));
        }
        Ok(())
    }

    /// Estimates the number of entities in which this estimator and `other` differ.
    pub(crate) fn estimate_difference(
        &self,
        other: &Self,
        hasher: &IbfHasher,
        folding: FoldingStrategy,
    ) -> Result<f64, Error> {
        self.check_compatible(other)?;

        let mut peeled = DecodeResult::default();
        for s in (0..self.strata.len()).rev() {
            let mut difference = match (self.stratum(s), other.stratum(s)) {
                (None, None) => continue,
                (Some(a), Some(b)) => a.subtract(b, hasher, folding, &mut peeled)?,
                (Some(a), None) => {
                    a.subtract(&StratumData::empty_like(a), hasher, folding, &mut peeled)?
                }
                (None, Some(b)) => {
                    StratumData::empty_like(b).subtract(b, hasher, folding, &mut peeled)?
                }
            };
            if !difference.decode(hasher, &mut peeled) {
                let estimate = 2f64.powi(s as i32 + 1)
                    * self.decode_count_factor
                    * peeled.len().max(1) as f64;
                debug!(
                    stratum = s,
                    peeled = peeled.len(),
                    estimate,
                    "strata decode stopped early"
                );
                return Ok(estimate);
            }
        }
        Ok(self.decode_count_factor * peeled.len() as f64)
    }

    /// Folds every stratum by `factor`.
    pub fn fold(&self, factor: u64) -> Result<Self, Error> {
        if factor == 0 || self.block_size % factor != 0 {
            return Err(
                Error::invalid_argument("fold factor must divide the block size")
                    .with_context("block_size", self.block_size)
                    .with_context("factor", factor),
            );
        }
        let strata = self
            .strata
            .iter()
            .map(|stratum| stratum.as_ref().map(|data| data.fold(factor)).transpose())
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(StrataEstimatorData {
            block_size: self.block_size / factor,
            strata,
            ..self.clone_shape()
        })
    }

    /// Folds the strata as far as the fullest stratum stays within the error rate, or returns
    /// `None` if no fold qualifies.
    pub fn compress(&self, folding: FoldingStrategy) -> Option<Self> {
        let fullest = self
            .strata
            .iter()
            .flatten()
            .map(|stratum| stratum.item_count.unsigned_abs())
            .max()
            .unwrap_or(0);
        let factor = folding.find_compression_factor(
            self.hash_function_count,
            self.block_size,
            fullest,
            f64::from(self.error_rate),
        )?;
        trace!(factor, fullest, "compressing strata");
        self.fold(factor).ok()
    }

    fn clone_shape(&self) -> Self {
        StrataEstimatorData {
            block_size: self.block_size,
            hash_function_count: self.hash_function_count,
            decode_count_factor: self.decode_count_factor,
            error_rate: self.error_rate,
            item_count: self.item_count,
            strata: Vec::new(),
        }
    }
}

/// Estimates how many entities two parties' sets differ in.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
/// use ibfsketch::ibf::EntityMapping;
/// use ibfsketch::strata::StrataEstimatorBuilder;
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
/// let mut a = StrataEstimatorBuilder::new(80).build(Keys(IbfHasher::default()));
/// let mut b = StrataEstimatorBuilder::new(80).build(Keys(IbfHasher::default()));
/// for key in 0..10_000 {
///     a.add(&key);
///     if key % 100 != 0 {
///         b.add(&key);
///     }
/// }
/// let estimate = a.decode(b.data()).unwrap();
/// assert!(estimate > 30 && estimate < 400);
/// ```
pub struct StrataEstimator<E, M: EntityMapping<E>> {
    mapping: M,
    hasher: IbfHasher,
    folding: FoldingStrategy,
    data: StrataEstimatorData,
    scratch: Vec<usize>,
    _marker: PhantomData<fn(&E)>,
}

impl<E, M: EntityMapping<E>> StrataEstimator<E, M> {
    /// Returns a builder for strata of `block_size` cells.
    pub fn builder(block_size: u64) -> StrataEstimatorBuilder {
        StrataEstimatorBuilder::new(block_size)
    }

    /// Returns the estimator's current data.
    pub fn data(&self) -> &StrataEstimatorData {
        &self.data
    }

    /// Returns the probe hasher.
    pub fn hasher(&self) -> &IbfHasher {
        &self.hasher
    }

    /// Adds an entity. Entities whose stratum is beyond the last are ignored.
    pub fn add(&mut self, entity: &E) {
        self.conditional_add(entity);
    }

    /// Adds an entity and returns `true`, or returns `false` if its stratum is beyond the last.
    pub fn conditional_add(&mut self, entity: &E) -> bool {
        let (_, key) = entity_keys(&self.mapping, &self.hasher, entity);
        self.data.update_key(key, 1, &self.hasher, &mut self.scratch)
    }

    /// Removes an entity previously added.
    pub fn remove(&mut self, entity: &E) {
        self.conditional_remove(entity);
    }

    /// Removes an entity and returns `true`, or returns `false` if its stratum is beyond the
    /// last.
    pub fn conditional_remove(&mut self, entity: &E) -> bool {
        let (_, key) = entity_keys(&self.mapping, &self.hasher, entity);
        self.data.update_key(key, -1, &self.hasher, &mut self.scratch)
    }

    /// Estimates the number of entities in which this estimator and `other` differ.
    ///
    /// Returns an error if the estimators have different shapes.
    pub fn decode(&self, other: &StrataEstimatorData) -> Result<u64, Error> {
        let estimate = self
            .data
            .estimate_difference(other, &self.hasher, self.folding)?;
        Ok(estimate.ceil() as u64)
    }

    /// Returns a copy of the estimator's data for transmission.
    pub fn extract(&self) -> StrataEstimatorData {
        self.data.clone()
    }

    /// Replaces the estimator's data with previously extracted data.
    pub fn rehydrate(&mut self, data: StrataEstimatorData) -> Result<(), Error> {
        if data.hash_function_count == 0 || data.block_size == 0 {
            return Err(Error::invalid_argument(
                "strata data must have positive block size and hash function count",
            ));
        }
        self.data = data;
        Ok(())
    }

    /// Returns the estimator's data folded by `factor`.
    pub fn fold(&self, factor: u64) -> Result<StrataEstimatorData, Error> {
        self.data.fold(factor)
    }

    /// Returns the estimator's data folded as far as its error rate allows.
    pub fn compress(&self) -> Option<StrataEstimatorData> {
        self.data.compress(self.folding)
    }
}

/// Builder for [`StrataEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct StrataEstimatorBuilder {
    block_size: u64,
    max_strata: usize,
    hash_function_count: u32,
    decode_count_factor: Option<f64>,
    error_rate: f64,
    hasher: IbfHasher,
    folding: FoldingStrategy,
}

impl StrataEstimatorBuilder {
    /// Creates a builder for strata of `block_size` cells.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is 0.
    pub fn new(block_size: u64) -> Self {
        assert!(block_size > 0, "block_size must be greater than 0");
        StrataEstimatorBuilder {
            block_size,
            max_strata: DEFAULT_MAX_STRATA,
            hash_function_count: DEFAULT_HASH_FUNCTION_COUNT,
            decode_count_factor: None,
            error_rate: DEFAULT_ERROR_RATE,
            hasher: IbfHasher::default(),
            folding: FoldingStrategy::default(),
        }
    }

    /// Sets the number of strata (default: 64).
    ///
    /// # Panics
    ///
    /// Panics if `max_strata` is not in [1, 64].
    pub fn max_strata(mut self, max_strata: usize) -> Self {
        assert!(
            (1..=DEFAULT_MAX_STRATA).contains(&max_strata),
            "max_strata must be in [1, 64], got {max_strata}"
        );
        self.max_strata = max_strata;
        self
    }

    /// Sets the number of hash functions per stratum (default: 3).
    ///
    /// # Panics
    ///
    /// Panics if `hash_function_count` is 0.
    pub fn hash_function_count(mut self, hash_function_count: u32) -> Self {
        assert!(
            hash_function_count > 0,
            "hash_function_count must be at least 1"
        );
        self.hash_function_count = hash_function_count;
        self
    }

    /// Sets the correction applied to the peeled count.
    ///
    /// Defaults to 1.39 for blocks of at least 20 cells and 1.0 otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is not positive and finite.
    pub fn decode_count_factor(mut self, factor: f64) -> Self {
        assert!(
            factor.is_finite() && factor > 0.0,
            "decode_count_factor must be positive, got {factor}"
        );
        self.decode_count_factor = Some(factor);
        self
    }

    /// Sets the error rate that bounds compression (default: 0.01).
    ///
    /// # Panics
    ///
    /// Panics if `error_rate` is not in (0.0, 1.0).
    pub fn error_rate(mut self, error_rate: f64) -> Self {
        assert!(
            error_rate > 0.0 && error_rate < 1.0,
            "error_rate must be between 0.0 and 1.0 (exclusive)"
        );
        self.error_rate = error_rate;
        self
    }

    /// Sets the probe hasher.
    pub fn hasher(mut self, hasher: IbfHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Sets how strata of different block sizes are reconciled.
    pub fn folding(mut self, folding: FoldingStrategy) -> Self {
        self.folding = folding;
        self
    }

    pub(crate) fn build_data(&self) -> StrataEstimatorData {
        let factor = self.decode_count_factor.unwrap_or({
            if self.block_size >= MIN_BLOCK_SIZE_FOR_FACTOR {
                DEFAULT_DECODE_COUNT_FACTOR
            } else {
                1.0
            }
        });
        StrataEstimatorData::new(
            self.block_size,
            self.hash_function_count,
            self.max_strata,
            factor,
            self.error_rate as f32,
        )
    }

    pub(crate) fn hasher_and_folding(&self) -> (IbfHasher, FoldingStrategy) {
        (self.hasher, self.folding)
    }

    /// Builds the estimator.
    pub fn build<E, M: EntityMapping<E>>(self, mapping: M) -> StrataEstimator<E, M> {
        StrataEstimator {
            mapping,
            hasher: self.hasher,
            folding: self.folding,
            data: self.build_data(),
            scratch: Vec::with_capacity(self.hash_function_count as usize),
            _marker: PhantomData,
        }
    }
}
