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

use crate::algebra::Count;
use crate::algebra::XorValue;
use crate::error::Error;
use crate::ibf::DecodeResult;
use crate::ibf::EntityMapping;
use crate::ibf::FilterConfig;
use crate::ibf::InvertibleBloomFilterData;
use crate::ibf::actual_error_rate;
use crate::ibf::best_block_size;

/// The default number of hash functions.
pub const DEFAULT_HASH_FUNCTION_COUNT: u32 = 3;

/// The data type held by a filter over entities `E` mapped by `M` with counts `C`.
pub type FilterData<E, M, C> = InvertibleBloomFilterData<
    <M as EntityMapping<E>>::Id,
    <M as EntityMapping<E>>::Hash,
    C,
>;

/// Which cells a filter maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Cells probed by identifier hash; tracks identifier membership only.
    #[default]
    Standard,
    /// Cells probed by entity hash; sees value changes but cannot look up identifiers.
    Reverse,
    /// A standard filter over identifiers plus an embedded reverse filter over values.
    Hybrid,
}

/// An invertible Bloom filter over application entities.
///
/// Two parties build filters with the same configuration and shape, one sends its
/// [`extract`](Self::extract)ed data, and the other calls
/// [`subtract_and_decode`](Self::subtract_and_decode) to learn the difference.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
/// use ibfsketch::ibf::EntityMapping;
/// use ibfsketch::ibf::FilterConfig;
/// use ibfsketch::ibf::InvertibleBloomFilterBuilder;
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
/// let build = || {
///     let config = FilterConfig::<u64, _, i32>::new(Keys(IbfHasher::default()));
///     InvertibleBloomFilterBuilder::with_accuracy(100, 0.01).build(config).unwrap()
/// };
/// let mut a = build();
/// let mut b = build();
/// for key in 0..1000 {
///     a.add(&key).unwrap();
///     b.add(&key).unwrap();
/// }
/// a.add(&5000).unwrap();
/// b.add(&6000).unwrap();
///
/// let result = a.subtract_and_decode(&b.extract()).unwrap();
/// assert!(result.is_complete());
/// assert!(result.only_in_a().contains(&5000));
/// assert!(result.only_in_b().contains(&6000));
/// ```
pub struct InvertibleBloomFilter<E, M: EntityMapping<E>, C: Count> {
    config: FilterConfig<E, M, C>,
    kind: FilterKind,
    data: FilterData<E, M, C>,
    validated: bool,
    scratch: Vec<usize>,
}

impl<E, M: EntityMapping<E>, C: Count> InvertibleBloomFilter<E, M, C> {
    /// Returns a builder sized for `capacity` differences at `error_rate`.
    pub fn builder(capacity: u64, error_rate: f64) -> InvertibleBloomFilterBuilder {
        InvertibleBloomFilterBuilder::with_accuracy(capacity, error_rate)
    }

    /// Restores a filter from extracted data.
    ///
    /// Returns an error if the data does not match the configured count type capacity or has
    /// the wrong layout for its kind.
    pub fn from_data(
        config: FilterConfig<E, M, C>,
        data: FilterData<E, M, C>,
    ) -> Result<Self, Error> {
        let kind = kind_of(&data)?;
        let mut filter = InvertibleBloomFilter {
            config,
            kind,
            data: InvertibleBloomFilterData::empty_like(&data),
            validated: false,
            scratch: Vec::new(),
        };
        filter.rehydrate(data)?;
        Ok(filter)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FilterConfig<E, M, C> {
        &self.config
    }

    /// Returns the filter kind.
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Returns the filter's current data.
    pub fn data(&self) -> &FilterData<E, M, C> {
        &self.data
    }

    /// Returns the net number of entities added.
    pub fn item_count(&self) -> i64 {
        self.data.item_count
    }

    /// Returns the number of cells per hash function.
    pub fn block_size(&self) -> u64 {
        self.data.block_size
    }

    /// Adds an entity.
    ///
    /// For a standard filter the first addition checks that the mapping's entity hash is the
    /// identifier hash, and returns an error otherwise.
    pub fn add(&mut self, entity: &E) -> Result<(), Error> {
        self.update(entity, C::unity())
    }

    /// Removes an entity previously added.
    pub fn remove(&mut self, entity: &E) -> Result<(), Error> {
        self.update(entity, C::identity().decrease())
    }

    fn update(&mut self, entity: &E, count: C) -> Result<(), Error> {
        let id = self.config.mapping().id(entity);
        let hash = self.config.mapping().entity_hash(entity);
        let hasher = *self.config.hasher();
        match self.kind {
            FilterKind::Standard => {
                if !self.validated {
                    if self.config.id_hash(&id) != hash {
                        return Err(Error::invalid_argument(
                            "standard filters require the entity hash to be the identifier hash",
                        )
                        .with_context("id", format!("{id:?}")));
                    }
                    self.validated = true;
                }
                self.data.apply(id, hash, count, &hasher, &mut self.scratch);
            }
            FilterKind::Reverse => {
                self.data.apply(id, hash, count, &hasher, &mut self.scratch);
            }
            FilterKind::Hybrid => {
                let id_hash = self.config.id_hash(&id);
                self.data.apply(id, id_hash, count, &hasher, &mut self.scratch);
                if let Some(sub) = self.data.sub_filter.as_deref_mut() {
                    sub.apply(id, hash, count, &hasher, &mut self.scratch);
                    sub.item_count += if count.is_positive() { 1 } else { -1 };
                }
            }
        }
        self.data.item_count += if count.is_positive() { 1 } else { -1 };
        Ok(())
    }

    /// Returns `false` if the entity is certainly not in the filter.
    pub fn contains(&self, entity: &E) -> bool {
        let id = self.config.mapping().id(entity);
        let hash = self.config.mapping().entity_hash(entity);
        let hasher = self.config.hasher();
        match self.kind {
            FilterKind::Standard | FilterKind::Reverse => self.data.contains(id, hash, hasher),
            FilterKind::Hybrid => {
                self.data.contains(id, self.config.id_hash(&id), hasher)
                    && self
                        .data
                        .sub_filter
                        .as_deref()
                        .is_none_or(|sub| sub.contains(id, hash, hasher))
            }
        }
    }

    /// Returns `false` if no entity with this identifier is in the filter.
    ///
    /// Only standard filters can look up identifiers; other kinds return an error.
    pub fn contains_key(&self, id: &M::Id) -> Result<bool, Error> {
        self.require_standard("contains_key")?;
        let hash = self.config.id_hash(id);
        Ok(self.data.contains(*id, hash, self.config.hasher()))
    }

    /// Removes the entity with this identifier.
    ///
    /// Only standard filters can remove by identifier; other kinds return an error.
    pub fn remove_key(&mut self, id: &M::Id) -> Result<(), Error> {
        self.require_standard("remove_key")?;
        let hash = self.config.id_hash(id);
        let hasher = *self.config.hasher();
        self.data
            .apply(*id, hash, C::identity().decrease(), &hasher, &mut self.scratch);
        self.data.item_count -= 1;
        Ok(())
    }

    fn require_standard(&self, operation: &'static str) -> Result<(), Error> {
        match self.kind {
            FilterKind::Standard => Ok(()),
            kind => Err(Error::unsupported(format!(
                "{operation} is not supported by {kind:?} filters"
            ))),
        }
    }

    /// Computes the difference between this filter and `other`, recording collisions detected
    /// while subtracting into `result`.
    ///
    /// Returns an error if `other` has a different shape or kind.
    pub fn subtract(
        &self,
        other: &FilterData<E, M, C>,
        result: &mut DecodeResult<M::Id>,
    ) -> Result<FilterData<E, M, C>, Error> {
        if kind_of(other)? != self.kind {
            return Err(Error::invalid_argument("cannot subtract filters of different kinds")
                .with_context("kind", format!("{:?}", self.kind)));
        }
        self.data
            .subtract(other, self.config.hasher(), self.config.folding(), result)
    }

    /// Peels a difference computed by [`subtract`](Self::subtract), consuming its cells.
    ///
    /// Returns `true` if the difference decoded completely.
    pub fn decode(
        &self,
        difference: &mut FilterData<E, M, C>,
        result: &mut DecodeResult<M::Id>,
    ) -> bool {
        difference.decode(self.config.hasher(), result)
    }

    /// Subtracts `other` and decodes the difference.
    ///
    /// An undersized filter yields an incomplete result rather than an error.
    pub fn subtract_and_decode(
        &self,
        other: &FilterData<E, M, C>,
    ) -> Result<DecodeResult<M::Id>, Error> {
        let mut result = DecodeResult::default();
        let mut difference = self.subtract(other, &mut result)?;
        self.decode(&mut difference, &mut result);
        Ok(result)
    }

    /// Returns the filter's data folded by `factor`.
    pub fn fold(&self, factor: u64) -> Result<FilterData<E, M, C>, Error> {
        self.data.fold(factor)
    }

    /// Returns the filter's data folded as far as its error rate allows, or `None` if it is
    /// already minimal. With `in_place` the filter keeps the compressed data too.
    pub fn compress(&mut self, in_place: bool) -> Option<FilterData<E, M, C>> {
        let compressed = self.data.compress(self.config.folding())?;
        if in_place {
            self.data = compressed.clone();
        }
        Some(compressed)
    }

    /// Returns a copy of the filter's data for transmission.
    pub fn extract(&self) -> FilterData<E, M, C> {
        self.data.clone()
    }

    /// Serializes the filter's data, storing cells as the configured
    /// [`CompressionStrategy`](crate::ibf::CompressionStrategy) decides.
    pub fn serialize(&self) -> Vec<u8> {
        self.data.serialize_with(self.config.compression())
    }

    /// Replaces the filter's data with previously extracted data of the same kind.
    pub fn rehydrate(&mut self, data: FilterData<E, M, C>) -> Result<(), Error> {
        let kind = kind_of(&data)?;
        if kind != self.kind {
            return Err(Error::invalid_argument("cannot rehydrate from data of another kind")
                .with_context("kind", format!("{:?}", self.kind))
                .with_context("data_kind", format!("{kind:?}")));
        }
        if data.capacity > 0 && !self.config.supports(data.capacity, data.block_size) {
            return Err(capacity_overflow(data.capacity, data.block_size));
        }
        self.data = data;
        Ok(())
    }

    /// Empties the filter.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

fn kind_of<Id, H, C>(data: &InvertibleBloomFilterData<Id, H, C>) -> Result<FilterKind, Error>
where
    Id: XorValue,
    H: XorValue,
    C: Count,
{
    match (data.is_reverse, data.sub_filter.as_deref()) {
        (false, None) => Ok(FilterKind::Standard),
        (true, None) => Ok(FilterKind::Reverse),
        (false, Some(sub)) if sub.is_reverse && sub.sub_filter.is_none() => Ok(FilterKind::Hybrid),
        _ => Err(Error::invalid_argument(
            "sub-filters must be reverse filters without sub-filters of their own",
        )),
    }
}

fn capacity_overflow(capacity: u64, block_size: u64) -> Error {
    Error::capacity_overflow("count type cannot absorb the requested capacity")
        .with_context("capacity", capacity)
        .with_context("block_size", block_size)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Sizing {
    Accuracy { capacity: u64, error_rate: f64 },
    BlockSize(u64),
}

/// Builder for [`InvertibleBloomFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvertibleBloomFilterBuilder {
    sizing: Sizing,
    expected_items: u64,
    hash_function_count: u32,
    split_by_hash: bool,
    kind: FilterKind,
}

impl InvertibleBloomFilterBuilder {
    /// Sizes the filter to decode `capacity` differences with probability of failure about
    /// `error_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `error_rate` is not in (0.0, 1.0).
    pub fn with_accuracy(capacity: u64, error_rate: f64) -> Self {
        assert!(
            error_rate > 0.0 && error_rate < 1.0,
            "error_rate must be between 0.0 and 1.0 (exclusive)"
        );
        InvertibleBloomFilterBuilder {
            sizing: Sizing::Accuracy {
                capacity,
                error_rate,
            },
            expected_items: 0,
            hash_function_count: DEFAULT_HASH_FUNCTION_COUNT,
            split_by_hash: false,
            kind: FilterKind::Standard,
        }
    }

    /// Uses exactly `block_size` cells per hash function.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is 0.
    pub fn with_block_size(block_size: u64) -> Self {
        assert!(block_size > 0, "block_size must be greater than 0");
        InvertibleBloomFilterBuilder {
            sizing: Sizing::BlockSize(block_size),
            expected_items: 0,
            hash_function_count: DEFAULT_HASH_FUNCTION_COUNT,
            split_by_hash: false,
            kind: FilterKind::Standard,
        }
    }

    /// Sets how many entities each party will add.
    ///
    /// Every cell count must absorb these additions, so the count type is checked against the
    /// larger of this and the capacity.
    pub fn expected_items(mut self, expected_items: u64) -> Self {
        self.expected_items = expected_items;
        self
    }

    /// Sets the number of hash functions (default: 3).
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

    /// Gives every hash function its own block of cells.
    pub fn split_by_hash(mut self, split_by_hash: bool) -> Self {
        self.split_by_hash = split_by_hash;
        self
    }

    /// Builds a reverse filter.
    pub fn reverse(mut self) -> Self {
        self.kind = FilterKind::Reverse;
        self
    }

    /// Builds a hybrid filter.
    pub fn hybrid(mut self) -> Self {
        self.kind = FilterKind::Hybrid;
        self
    }

    /// Builds the filter.
    ///
    /// The block size is rounded up to one the configured folding strategy can fold.
    ///
    /// Returns an error if the count type cannot absorb the capacity.
    pub fn build<E, M: EntityMapping<E>, C: Count>(
        self,
        config: FilterConfig<E, M, C>,
    ) -> Result<InvertibleBloomFilter<E, M, C>, Error> {
        let k = self.hash_function_count;
        let (block_size, capacity, error_rate) = match self.sizing {
            Sizing::Accuracy {
                capacity,
                error_rate,
            } => {
                let best = best_block_size(capacity, error_rate, k);
                let block_size = config.folding().compute_foldable_size(best, 1);
                (block_size, capacity, error_rate)
            }
            Sizing::BlockSize(block_size) => (
                block_size,
                block_size,
                actual_error_rate(block_size, block_size, k),
            ),
        };
        let absorbed = capacity.max(self.expected_items);
        if !config.supports(absorbed, block_size) {
            return Err(capacity_overflow(absorbed, block_size));
        }

        let is_reverse = matches!(self.kind, FilterKind::Reverse);
        let mut data =
            InvertibleBloomFilterData::with_shape(block_size, k, self.split_by_hash, is_reverse);
        data.capacity = capacity;
        data.error_rate = error_rate as f32;
        if matches!(self.kind, FilterKind::Hybrid) {
            let mut sub =
                InvertibleBloomFilterData::with_shape(block_size, k, self.split_by_hash, true);
            sub.capacity = capacity;
            sub.error_rate = data.error_rate;
            data.sub_filter = Some(Box::new(sub));
        }

        Ok(InvertibleBloomFilter {
            config,
            kind: self.kind,
            data,
            validated: false,
            scratch: Vec::with_capacity(k as usize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::IbfHasher;

    /// Entities are `(id, value)` pairs.
    struct Pairs(IbfHasher);

    impl EntityMapping<(u64, u64)> for Pairs {
        type Id = u64;
        type Hash = u32;

        fn id(&self, entity: &(u64, u64)) -> u64 {
            entity.0
        }

        fn entity_hash(&self, entity: &(u64, u64)) -> u32 {
            if entity.1 == 0 {
                self.0.hash(&entity.0)
            } else {
                self.0.hash(entity)
            }
        }
    }

    type PairFilter = InvertibleBloomFilter<(u64, u64), Pairs, i32>;

    fn build(builder: InvertibleBloomFilterBuilder) -> PairFilter {
        builder
            .build(FilterConfig::new(Pairs(IbfHasher::default())))
            .unwrap()
    }

    #[test]
    fn test_add_remove_round_trip() {
        let mut filter = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01));
        for id in 0..500 {
            filter.add(&(id, 0)).unwrap();
        }
        assert!(filter.contains(&(7, 0)));
        assert!(filter.contains_key(&7).unwrap());
        for id in (0..500).rev() {
            filter.remove(&(id, 0)).unwrap();
        }
        assert!(filter.data().is_empty());
        assert_eq!(filter.item_count(), 0);
    }

    #[test]
    fn test_standard_rejects_value_hash() {
        let mut filter = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01));
        let err = filter.add(&(1, 99)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_reverse_rejects_key_operations() {
        let mut filter = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01).reverse());
        filter.add(&(1, 99)).unwrap();
        assert_eq!(
            filter.contains_key(&1).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            filter.remove_key(&1).unwrap_err().kind(),
            ErrorKind::Unsupported
        );

        let hybrid = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01).hybrid());
        assert!(hybrid.contains_key(&1).is_err());
    }

    #[test]
    fn test_hybrid_reports_modified() {
        let mut a = build(InvertibleBloomFilterBuilder::with_accuracy(20, 0.01).hybrid());
        let mut b = build(InvertibleBloomFilterBuilder::with_accuracy(20, 0.01).hybrid());
        for id in 0..100 {
            a.add(&(id, id + 1)).unwrap();
            b.add(&(id, id + 1)).unwrap();
        }
        a.add(&(1000, 1)).unwrap();
        b.add(&(2000, 1)).unwrap();
        a.add(&(3000, 1)).unwrap();
        b.add(&(3000, 2)).unwrap();

        let result = a.subtract_and_decode(&b.extract()).unwrap();
        assert!(result.is_complete());
        assert!(result.only_in_a().contains(&1000));
        assert!(result.only_in_b().contains(&2000));
        assert!(result.modified().contains(&3000));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_narrow_count_overflows() {
        let config = FilterConfig::<(u64, u64), _, i8>::new(Pairs(IbfHasher::default()));
        let err = InvertibleBloomFilterBuilder::with_block_size(10)
            .expected_items(5000)
            .build(config)
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityOverflow);

        let config = FilterConfig::<(u64, u64), _, i16>::new(Pairs(IbfHasher::default()));
        assert!(
            InvertibleBloomFilterBuilder::with_block_size(10)
                .expected_items(5000)
                .build(config)
                .is_ok()
        );
    }

    #[test]
    fn test_rehydrate_checks_kind() {
        let reverse = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01).reverse());
        let mut standard = build(InvertibleBloomFilterBuilder::with_accuracy(50, 0.01));
        assert!(standard.rehydrate(reverse.extract()).is_err());
        assert!(standard.subtract_and_decode(&reverse.extract()).is_err());
    }

    #[test]
    fn test_compress_in_place() {
        let mut filter = build(InvertibleBloomFilterBuilder::with_accuracy(1000, 0.01));
        for id in 0..10 {
            filter.add(&(id, 0)).unwrap();
        }
        let before = filter.block_size();
        let compressed = filter.compress(true).unwrap();
        assert!(compressed.block_size() < before);
        assert_eq!(filter.block_size(), compressed.block_size());
        assert!(filter.contains_key(&3).unwrap());
    }
}
