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

//! Membership-filtered cell storage used at the serialization boundary.

use std::collections::BTreeMap;

use crate::error::Error;

/// How a [`CompressedArray`] stores its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionStrategy {
    /// Always store every cell.
    Dense,
    /// Store only member cells.
    Sparse,
    /// Store only member cells when fewer than half of the cells are members.
    #[default]
    Auto,
}

impl CompressionStrategy {
    /// Returns `true` if `members` out of `len` cells should be stored sparsely.
    pub fn prefers_sparse(&self, members: usize, len: usize) -> bool {
        match self {
            CompressionStrategy::Dense => false,
            CompressionStrategy::Sparse => members < len,
            CompressionStrategy::Auto => members * 2 < len,
        }
    }
}

/// An array of `len` cells in which cells outside the stored set read as an identity value.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressedArray<T> {
    /// Every cell is stored.
    Dense(Vec<T>),
    /// Only member cells are stored, keyed by position.
    Sparse {
        /// Logical length.
        len: usize,
        /// Value of every cell not present in `values`.
        identity: T,
        /// Member cells.
        values: BTreeMap<usize, T>,
    },
}

impl<T: Copy> CompressedArray<T> {
    /// Builds the storage for `values`, keeping the cells for which `membership` holds.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibfsketch::ibf::CompressedArray;
    /// use ibfsketch::ibf::CompressionStrategy;
    ///
    /// let values = [0, 5, 0, 0, 7, 0];
    /// let array =
    ///     CompressedArray::compress(&values, 0, |i| values[i] != 0, CompressionStrategy::Auto);
    /// assert!(array.is_sparse());
    /// assert_eq!(array.stored().collect::<Vec<_>>(), vec![5, 7]);
    /// assert_eq!(array.to_vec(), values.to_vec());
    /// ```
    pub fn compress(
        values: &[T],
        identity: T,
        membership: impl Fn(usize) -> bool,
        strategy: CompressionStrategy,
    ) -> Self {
        let members = (0..values.len()).filter(|&i| membership(i)).count();
        if !strategy.prefers_sparse(members, values.len()) {
            return CompressedArray::Dense(values.to_vec());
        }
        let stored = values
            .iter()
            .enumerate()
            .filter(|&(i, _)| membership(i))
            .map(|(i, v)| (i, *v))
            .collect();
        CompressedArray::Sparse {
            len: values.len(),
            identity,
            values: stored,
        }
    }

    /// Restores an array of `len` cells from stored values.
    ///
    /// If `values` already holds `len` cells they are used as is. Otherwise each value is placed,
    /// in index order, at the next position for which `membership` holds, and every other cell
    /// reads as `identity`.
    pub fn load(
        values: Vec<T>,
        len: usize,
        identity: T,
        membership: impl Fn(usize) -> bool,
        strategy: CompressionStrategy,
    ) -> Result<Self, Error> {
        if values.len() == len {
            return Ok(CompressedArray::Dense(values));
        }

        let positions = (0..len).filter(|&i| membership(i));
        let mut stored = BTreeMap::new();
        let mut values = values.into_iter();
        for position in positions {
            let Some(value) = values.next() else {
                return Err(Error::insufficient_data("compressed cells")
                    .with_context("len", len)
                    .with_context("stored", stored.len()));
            };
            stored.insert(position, value);
        }
        if values.next().is_some() {
            return Err(Error::deserial(
                "more compressed cells than membership positions",
            ));
        }

        if matches!(strategy, CompressionStrategy::Dense) {
            let mut dense = vec![identity; len];
            for (position, value) in stored {
                dense[position] = value;
            }
            return Ok(CompressedArray::Dense(dense));
        }
        Ok(CompressedArray::Sparse {
            len,
            identity,
            values: stored,
        })
    }

    /// Returns the logical number of cells.
    pub fn len(&self) -> usize {
        match self {
            CompressedArray::Dense(values) => values.len(),
            CompressedArray::Sparse { len, .. } => *len,
        }
    }

    /// Returns `true` if the array has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if only member cells are stored.
    pub fn is_sparse(&self) -> bool {
        matches!(self, CompressedArray::Sparse { .. })
    }

    /// Returns the value of cell `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> T {
        match self {
            CompressedArray::Dense(values) => values[index],
            CompressedArray::Sparse {
                len,
                identity,
                values,
            } => {
                assert!(index < *len, "index {index} out of bounds for {len} cells");
                values.get(&index).copied().unwrap_or(*identity)
            }
        }
    }

    /// Iterates over the stored values in index order.
    pub fn stored(&self) -> Box<dyn Iterator<Item = T> + '_> {
        match self {
            CompressedArray::Dense(values) => Box::new(values.iter().copied()),
            CompressedArray::Sparse { values, .. } => Box::new(values.values().copied()),
        }
    }

    /// Returns the number of stored values.
    pub fn stored_len(&self) -> usize {
        match self {
            CompressedArray::Dense(values) => values.len(),
            CompressedArray::Sparse { values, .. } => values.len(),
        }
    }

    /// Expands the array into one value per cell.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            CompressedArray::Dense(values) => values.clone(),
            CompressedArray::Sparse {
                len,
                identity,
                values,
            } => {
                let mut dense = vec![*identity; *len];
                for (&position, &value) in values {
                    dense[position] = value;
                }
                dense
            }
        }
    }
}
