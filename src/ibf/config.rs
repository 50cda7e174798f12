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

use std::fmt;
use std::marker::PhantomData;

use crate::algebra::Count;
use crate::algebra::XorValue;
use crate::hash::IbfHasher;
use crate::ibf::CompressionStrategy;
use crate::ibf::FoldingStrategy;

/// Maps application entities to the identifier and value hash a filter tracks.
///
/// For a standard filter the entity hash must be the identifier hash, i.e.
/// `entity_hash(e) == hasher.hash(&id(e))` for the filter's [`IbfHasher`]. Reverse and hybrid
/// filters accept any entity hash, which lets them see value changes of a stable identifier.
///
/// # Examples
///
/// ```
/// use ibfsketch::hash::IbfHasher;
/// use ibfsketch::ibf::EntityMapping;
///
/// struct Row {
///     key: u64,
///     payload: String,
/// }
///
/// struct RowMapping(IbfHasher);
///
/// impl EntityMapping<Row> for RowMapping {
///     type Id = u64;
///     type Hash = u32;
///
///     fn id(&self, row: &Row) -> u64 {
///         row.key
///     }
///
///     fn entity_hash(&self, row: &Row) -> u32 {
///         self.0.hash(&(row.key, &row.payload))
///     }
/// }
/// ```
pub trait EntityMapping<E>: Send + Sync {
    /// The identifier type accumulated in the cells.
    type Id: XorValue;
    /// The hash type accumulated in the cells.
    type Hash: XorValue;

    /// Returns the identifier of an entity.
    fn id(&self, entity: &E) -> Self::Id;

    /// Returns the hash of an entity's value.
    fn entity_hash(&self, entity: &E) -> Self::Hash;
}

/// Everything two parties must agree on to exchange filters.
///
/// The count type `C` bounds how many additions a cell can absorb. It is checked against the
/// requested capacity when a filter is built.
pub struct FilterConfig<E, M: EntityMapping<E>, C: Count> {
    mapping: M,
    hasher: IbfHasher,
    folding: FoldingStrategy,
    compression: CompressionStrategy,
    _marker: PhantomData<fn(&E) -> C>,
}

impl<E, M: EntityMapping<E>, C: Count> FilterConfig<E, M, C> {
    /// Creates a configuration with the default hasher and strategies.
    pub fn new(mapping: M) -> Self {
        FilterConfig {
            mapping,
            hasher: IbfHasher::default(),
            folding: FoldingStrategy::default(),
            compression: CompressionStrategy::default(),
            _marker: PhantomData,
        }
    }

    /// Sets the probe hasher.
    pub fn with_hasher(mut self, hasher: IbfHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Sets how block sizes are chosen and reconciled.
    pub fn with_folding(mut self, folding: FoldingStrategy) -> Self {
        self.folding = folding;
        self
    }

    /// Sets how cells are stored when serialized.
    pub fn with_compression(mut self, compression: CompressionStrategy) -> Self {
        self.compression = compression;
        self
    }

    /// Returns the entity mapping.
    pub fn mapping(&self) -> &M {
        &self.mapping
    }

    /// Returns the probe hasher.
    pub fn hasher(&self) -> &IbfHasher {
        &self.hasher
    }

    /// Returns the folding strategy.
    pub fn folding(&self) -> FoldingStrategy {
        self.folding
    }

    /// Returns the compression strategy.
    pub fn compression(&self) -> CompressionStrategy {
        self.compression
    }

    /// Returns the identifier hash a standard filter expects as entity hash.
    pub fn id_hash(&self, id: &M::Id) -> M::Hash {
        self.hasher.hash(id)
    }

    /// Returns `true` if the count type can absorb `capacity` additions spread over
    /// `block_size` cells.
    pub fn supports(&self, capacity: u64, block_size: u64) -> bool {
        C::supports(capacity, block_size)
    }
}

impl<E, M: EntityMapping<E> + Clone, C: Count> Clone for FilterConfig<E, M, C> {
    fn clone(&self) -> Self {
        FilterConfig {
            mapping: self.mapping.clone(),
            hasher: self.hasher,
            folding: self.folding,
            compression: self.compression,
            _marker: PhantomData,
        }
    }
}

impl<E, M: EntityMapping<E> + fmt::Debug, C: Count> fmt::Debug for FilterConfig<E, M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterConfig")
            .field("mapping", &self.mapping)
            .field("hasher", &self.hasher)
            .field("folding", &self.folding)
            .field("compression", &self.compression)
            .field("count", &std::any::type_name::<C>())
            .finish()
    }
}
