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

use rayon::prelude::*;
use tracing::debug;
use tracing::trace;

use crate::algebra::Count;
use crate::algebra::XorValue;
use crate::error::Error;
use crate::hash::IbfHasher;
use crate::ibf::DecodeResult;
use crate::ibf::FoldingStrategy;

/// Cellwise passes over fewer cells than this stay on the calling thread.
pub(crate) const PARALLEL_MIN_LEN: usize = 4096;

/// The transmittable state of one invertible Bloom filter.
///
/// Every cell holds a signed count, the XOR of the identifiers probed into it and the XOR of
/// their hashes. Cells are laid out as one block of `block_size` cells shared by all hash
/// functions, or, when split by hash, as `hash_function_count` consecutive blocks.
///
/// A standard filter probes by the identifier hash and calls a cell pure when its count is one
/// unity and its hash sum is the hash of its identifier sum. A reverse filter probes by the
/// entity hash and calls a cell pure when its count is one unity and the cell is one of the
/// probe positions of its hash sum.
#[derive(Debug, Clone, PartialEq)]
pub struct InvertibleBloomFilterData<Id: XorValue, H: XorValue, C: Count> {
    pub(crate) block_size: u64,
    pub(crate) hash_function_count: u32,
    pub(crate) split_by_hash: bool,
    pub(crate) id_sums: Vec<Id>,
    pub(crate) hash_sums: Vec<H>,
    pub(crate) counts: Vec<C>,
    pub(crate) item_count: i64,
    pub(crate) capacity: u64,
    pub(crate) error_rate: f32,
    pub(crate) is_reverse: bool,
    pub(crate) sub_filter: Option<Box<InvertibleBloomFilterData<Id, H, C>>>,
}

impl<Id: XorValue, H: XorValue, C: Count> InvertibleBloomFilterData<Id, H, C> {
    /// Creates empty filter data of the given shape.
    pub(crate) fn with_shape(
        block_size: u64,
        hash_function_count: u32,
        split_by_hash: bool,
        is_reverse: bool,
    ) -> Self {
        let segments = if split_by_hash {
            hash_function_count as usize
        } else {
            1
        };
        let len = block_size as usize * segments;
        InvertibleBloomFilterData {
            block_size,
            hash_function_count,
            split_by_hash,
            id_sums: vec![Id::identity(); len],
            hash_sums: vec![H::identity(); len],
            counts: vec![C::identity(); len],
            item_count: 0,
            capacity: 0,
            error_rate: 0.0,
            is_reverse,
            sub_filter: None,
        }
    }

    /// Creates empty data with the same shape and metadata as `other`, including an empty
    /// sub-filter if `other` has one.
    ///
    /// This stands in for a peer that has not sent any data.
    pub fn empty_like(other: &Self) -> Self {
        let mut data = Self::with_shape(
            other.block_size,
            other.hash_function_count,
            other.split_by_hash,
            other.is_reverse,
        );
        data.capacity = other.capacity;
        data.error_rate = other.error_rate;
        data.sub_filter = other
            .sub_filter
            .as_deref()
            .map(|sub| Box::new(Self::empty_like(sub)));
        data
    }

    /// Returns the number of cells per hash function.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Returns the number of hash functions.
    pub fn hash_function_count(&self) -> u32 {
        self.hash_function_count
    }

    /// Returns `true` if every hash function owns its own block of cells.
    pub fn is_split_by_hash(&self) -> bool {
        self.split_by_hash
    }

    /// Returns `true` for reverse filter data.
    pub fn is_reverse(&self) -> bool {
        self.is_reverse
    }

    /// Returns the net number of items added.
    pub fn item_count(&self) -> i64 {
        self.item_count
    }

    /// Returns the capacity the filter was sized for.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the error rate the filter was sized for.
    pub fn error_rate(&self) -> f32 {
        self.error_rate
    }

    /// Returns the embedded reverse filter of a hybrid filter.
    pub fn sub_filter(&self) -> Option<&Self> {
        self.sub_filter.as_deref()
    }

    /// Returns the total number of cells.
    pub fn cell_count(&self) -> usize {
        self.counts.len()
    }

    /// Returns the cell counts.
    pub fn counts(&self) -> &[C] {
        &self.counts
    }

    /// Returns the cell identifier sums.
    pub fn id_sums(&self) -> &[Id] {
        &self.id_sums
    }

    /// Returns the cell hash sums.
    pub fn hash_sums(&self) -> &[H] {
        &self.hash_sums
    }

    /// Returns `true` if nothing has been added and every cell is empty.
    pub fn is_empty(&self) -> bool {
        self.item_count == 0 && self.is_complete_decode()
    }

    /// Returns `true` if every cell, including those of the sub-filter, is empty.
    pub fn is_complete_decode(&self) -> bool {
        self.non_empty_cells() == 0
            && self
                .sub_filter
                .as_deref()
                .is_none_or(|sub| sub.is_complete_decode())
    }

    /// Resets every cell and the item count.
    pub fn clear(&mut self) {
        self.counts
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|c| *c = C::identity());
        self.id_sums
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|id| *id = Id::identity());
        self.hash_sums
            .par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|h| *h = H::identity());
        self.item_count = 0;
        if let Some(sub) = self.sub_filter.as_deref_mut() {
            sub.clear();
        }
    }

    pub(crate) fn is_cell_empty(&self, i: usize) -> bool {
        self.counts[i].is_identity()
            && self.id_sums[i].is_identity()
            && self.hash_sums[i].is_identity()
    }

    fn non_empty_cells(&self) -> usize {
        (0..self.counts.len())
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .filter(|&i| !self.is_cell_empty(i))
            .count()
    }

    /// Computes the cells a hash value is probed into.
    pub(crate) fn probe(&self, hash: H, hasher: &IbfHasher, out: &mut Vec<usize>) {
        if self.split_by_hash {
            hasher.segmented_probes(hash, self.hash_function_count, self.block_size, out);
        } else {
            hasher.probes(hash, self.hash_function_count, self.block_size, out);
        }
    }

    pub(crate) fn is_pure(&self, i: usize, hasher: &IbfHasher, scratch: &mut Vec<usize>) -> bool {
        if !self.counts[i].is_pure() {
            return false;
        }
        if self.is_reverse {
            self.probe(self.hash_sums[i], hasher, scratch);
            scratch.contains(&i)
        } else {
            hasher.hash::<Id, H>(&self.id_sums[i]) == self.hash_sums[i]
        }
    }

    /// Applies `count` copies of `(id, hash)` to every probed cell.
    pub(crate) fn apply(
        &mut self,
        id: Id,
        hash: H,
        count: C,
        hasher: &IbfHasher,
        scratch: &mut Vec<usize>,
    ) {
        self.probe(hash, hasher, scratch);
        for &p in scratch.iter() {
            self.counts[p] = self.counts[p].add(count);
            self.id_sums[p] = self.id_sums[p].xor(id);
            self.hash_sums[p] = self.hash_sums[p].xor(hash);
        }
    }

    /// Returns `false` if `(id, hash)` is certainly absent.
    pub(crate) fn contains(&self, id: Id, hash: H, hasher: &IbfHasher) -> bool {
        let mut probes = Vec::with_capacity(self.hash_function_count as usize);
        let mut scratch = Vec::new();
        self.probe(hash, hasher, &mut probes);
        probes.iter().all(|&p| {
            if self.counts[p].is_identity() {
                return false;
            }
            if self.is_pure(p, hasher, &mut scratch) {
                return self.id_sums[p] == id && self.hash_sums[p] == hash;
            }
            true
        })
    }

    /// Folds the cells by `factor`, producing data with `block_size / factor` cells per hash
    /// function. The sub-filter is folded by the same factor.
    ///
    /// Returns an error if `factor` does not divide the block size.
    pub fn fold(&self, factor: u64) -> Result<Self, Error> {
        self.check_foldable(factor)?;
        Ok(self.fold_cells(factor))
    }

    fn check_foldable(&self, factor: u64) -> Result<(), Error> {
        if factor == 0 || self.block_size % factor != 0 {
            return Err(
                Error::invalid_argument("fold factor must divide the block size")
                    .with_context("block_size", self.block_size)
                    .with_context("factor", factor),
            );
        }
        match self.sub_filter.as_deref() {
            Some(sub) => sub.check_foldable(factor),
            None => Ok(()),
        }
    }

    fn fold_cells(&self, factor: u64) -> Self {
        if factor == 1 {
            return self.clone();
        }
        trace!(factor, block_size = self.block_size, "folding filter data");

        let block = self.block_size as usize;
        let folded_block = block / factor as usize;
        let len = folded_block * (self.counts.len() / block.max(1));
        let sources = move |o: usize| {
            let segment = o / folded_block;
            let offset = o % folded_block;
            (0..factor as usize).map(move |t| segment * block + offset + t * folded_block)
        };

        let counts = (0..len)
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|o| sources(o).fold(C::identity(), |acc, s| acc.add(self.counts[s])))
            .collect();
        let id_sums = (0..len)
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|o| sources(o).fold(Id::identity(), |acc, s| acc.xor(self.id_sums[s])))
            .collect();
        let hash_sums = (0..len)
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|o| sources(o).fold(H::identity(), |acc, s| acc.xor(self.hash_sums[s])))
            .collect();

        InvertibleBloomFilterData {
            block_size: folded_block as u64,
            hash_function_count: self.hash_function_count,
            split_by_hash: self.split_by_hash,
            id_sums,
            hash_sums,
            counts,
            item_count: self.item_count,
            capacity: self.capacity,
            error_rate: self.error_rate,
            is_reverse: self.is_reverse,
            sub_filter: self
                .sub_filter
                .as_deref()
                .map(|sub| Box::new(sub.fold_cells(factor))),
        }
    }

    /// Folds the data by the largest factor that keeps its actual error rate at or below the
    /// error rate it was sized for.
    ///
    /// Returns `None` if no factor qualifies, i.e. the data is already as small as it can be.
    pub fn compress(&self, strategy: FoldingStrategy) -> Option<Self> {
        let factor = strategy.find_compression_factor(
            self.hash_function_count,
            self.block_size,
            self.item_count.unsigned_abs(),
            f64::from(self.error_rate),
        )?;
        if self.check_foldable(factor).is_err() {
            return None;
        }
        trace!(factor, block_size = self.block_size, "compressing filter data");
        Some(self.fold_cells(factor))
    }

    fn check_compatible(&self, other: &Self) -> Result<(), Error> {
        if self.hash_function_count != other.hash_function_count {
            return Err(
                Error::invalid_argument("filters use different hash function counts")
                    .with_context("hash_function_count", self.hash_function_count)
                    .with_context("other_hash_function_count", other.hash_function_count),
            );
        }
        if self.is_reverse != other.is_reverse {
            return Err(Error::invalid_argument(
                "cannot combine reverse and standard filter data",
            ));
        }
        if self.split_by_hash != other.split_by_hash {
            return Err(Error::invalid_argument(
                "filters use different cell layouts",
            ));
        }
        Ok(())
    }

    /// Computes `self - other` cell by cell, folding first if the block sizes differ.
    ///
    /// Pure cells on both sides that cancel into a cell with a zero count but different
    /// identifiers would otherwise hide two differences. They are recorded in `result` and
    /// peeled out of the difference. This detection is best effort.
    ///
    /// Returns an error if the filters cannot be combined.
    pub fn subtract(
        &self,
        other: &Self,
        hasher: &IbfHasher,
        strategy: FoldingStrategy,
        result: &mut DecodeResult<Id>,
    ) -> Result<Self, Error> {
        self.check_compatible(other)?;
        if self.block_size != other.block_size {
            let (f1, f2) = strategy
                .find_fold_factors(self.block_size, other.block_size)
                .ok_or_else(|| {
                    Error::invalid_argument("block sizes cannot be folded to a common size")
                        .with_context("block_size", self.block_size)
                        .with_context("other_block_size", other.block_size)
                })?;
            trace!(f1, f2, "folding filters to a common block size");
            return self
                .fold(f1)?
                .subtract(&other.fold(f2)?, hasher, strategy, result);
        }

        let mut diff = self.subtract_cells(other, hasher, result);
        diff.sub_filter = match (self.sub_filter.as_deref(), other.sub_filter.as_deref()) {
            (None, None) => None,
            (Some(a), Some(b)) => Some(Box::new(a.subtract(b, hasher, strategy, result)?)),
            (Some(a), None) => {
                let b = Self::empty_like(a);
                Some(Box::new(a.subtract(&b, hasher, strategy, result)?))
            }
            (None, Some(b)) => {
                let a = Self::empty_like(b);
                Some(Box::new(a.subtract(b, hasher, strategy, result)?))
            }
        };
        Ok(diff)
    }

    fn subtract_cells(
        &self,
        other: &Self,
        hasher: &IbfHasher,
        result: &mut DecodeResult<Id>,
    ) -> Self {
        let counts: Vec<C> = self
            .counts
            .par_iter()
            .zip(other.counts.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|(a, b)| a.subtract(*b))
            .collect();
        let id_sums = self
            .id_sums
            .par_iter()
            .zip(other.id_sums.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|(a, b)| a.xor(*b))
            .collect();
        let hash_sums = self
            .hash_sums
            .par_iter()
            .zip(other.hash_sums.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|(a, b)| a.xor(*b))
            .collect();

        // Candidates for two pure cells cancelling into a zero count.
        let candidates: Vec<usize> = (0..counts.len())
            .into_par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .filter(|&i| {
                counts[i].is_identity()
                    && self.counts[i].is_pure()
                    && other.counts[i].is_pure()
                    && (self.id_sums[i] != other.id_sums[i]
                        || self.hash_sums[i] != other.hash_sums[i])
            })
            .collect();

        let mut diff = InvertibleBloomFilterData {
            block_size: self.block_size,
            hash_function_count: self.hash_function_count,
            split_by_hash: self.split_by_hash,
            id_sums,
            hash_sums,
            counts,
            item_count: self.item_count.wrapping_sub(other.item_count),
            capacity: self.capacity.max(other.capacity),
            error_rate: self.error_rate,
            is_reverse: self.is_reverse,
            sub_filter: None,
        };

        let mut scratch = Vec::new();
        for i in candidates {
            if !self.is_pure(i, hasher, &mut scratch) || !other.is_pure(i, hasher, &mut scratch) {
                continue;
            }
            let (id_a, hash_a, count_a) = (self.id_sums[i], self.hash_sums[i], self.counts[i]);
            let (id_b, hash_b, count_b) = (other.id_sums[i], other.hash_sums[i], other.counts[i]);
            // An earlier resolution may already have touched this cell.
            if !diff.counts[i].is_identity()
                || diff.id_sums[i] != id_a.xor(id_b)
                || diff.hash_sums[i] != hash_a.xor(hash_b)
            {
                continue;
            }
            debug!(position = i, "subtract found colliding pure cells");

            let negated_b = C::identity().subtract(count_b);
            if id_a == id_b {
                result.record_modified(id_a);
            } else {
                record_signed(result, id_a, count_a);
                record_signed(result, id_b, negated_b);
            }
            diff.apply(id_a, hash_a, C::identity().subtract(count_a), hasher, &mut scratch);
            diff.apply(id_b, hash_b, count_b, hasher, &mut scratch);
        }
        diff
    }

    /// Peels every pure cell, recording the identifiers into `result`.
    ///
    /// The data is consumed by the decode: on success every cell is empty afterwards. An
    /// incomplete decode is reported through [`DecodeResult::is_complete`], and the identifiers
    /// recorded so far remain valid.
    pub fn decode(&mut self, hasher: &IbfHasher, result: &mut DecodeResult<Id>) -> bool {
        let mut complete = self.peel(hasher, result);
        if let Some(sub) = self.sub_filter.as_deref_mut() {
            complete &= sub.peel(hasher, result);
        }
        result.normalize();
        if !complete {
            result.mark_incomplete();
        }
        complete
    }

    fn peel(&mut self, hasher: &IbfHasher, result: &mut DecodeResult<Id>) -> bool {
        let mut scratch = Vec::new();
        let mut probes = Vec::with_capacity(self.hash_function_count as usize);
        let mut pending: Vec<usize> = (0..self.counts.len())
            .filter(|&i| self.is_pure(i, hasher, &mut scratch))
            .collect();

        // A reverse cell can look pure while it mixes several entries, and peeling such a
        // cell may keep producing pure cells. A clean decode never pops more than this.
        let mut budget = self.counts.len() * self.hash_function_count.max(1) as usize;
        while let Some(i) = pending.pop() {
            if !self.is_pure(i, hasher, &mut scratch) {
                continue;
            }
            if budget == 0 {
                debug!(
                    cells = self.counts.len(),
                    "decode stopped without making progress"
                );
                return false;
            }
            budget -= 1;
            let (id, hash, count) = (self.id_sums[i], self.hash_sums[i], self.counts[i]);

            self.probe(hash, hasher, &mut probes);
            for &p in probes.iter() {
                self.counts[p] = self.counts[p].subtract(count);
                self.id_sums[p] = self.id_sums[p].xor(id);
                self.hash_sums[p] = self.hash_sums[p].xor(hash);
                if self.is_pure(p, hasher, &mut scratch) {
                    pending.push(p);
                }
            }
            // Modified identifiers show up on both sides and are merged by the caller.
            record_signed(result, id, count);
        }

        let remaining = self.non_empty_cells();
        if remaining > 0 {
            debug!(
                remaining,
                cells = self.counts.len(),
                "decode ended with non-empty cells"
            );
        }
        remaining == 0
    }
}

fn record_signed<Id: XorValue, C: Count>(result: &mut DecodeResult<Id>, id: Id, count: C) {
    if count.is_positive() {
        result.record_a(id);
    } else {
        result.record_b(id);
    }
}
