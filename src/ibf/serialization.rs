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

//! Binary layout of filter data.
//!
//! ```text
//! preamble      4 bytes   serial version, family, flags, reserved
//! widths        4 bytes   id, hash and count widths in bytes, reserved
//! block_size    i64
//! hash_count    u32
//! membership    u32 bit count + packed bits      (only when FLAG_SPARSE)
//! id_sums       stored cells * id width
//! hash_sums     stored cells * hash width
//! counts        stored cells * count width
//! item_count    i64
//! capacity      i64
//! error_rate    f32
//! is_reverse    u8
//! has_sub       u8
//! sub_filter    nested filter data               (only when has_sub)
//! ```
//!
//! When sparse, only the non-empty cells are stored and every other cell decodes as empty.

use bitvec::prelude::*;

use crate::algebra::Count;
use crate::algebra::XorValue;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::ensure_consumed;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_bits;
use crate::codec::write_bits;
use crate::error::Error;
use crate::ibf::CompressedArray;
use crate::ibf::CompressionStrategy;
use crate::ibf::InvertibleBloomFilterData;

const FLAG_SPARSE: u8 = 1 << 0;
const FLAG_SPLIT: u8 = 1 << 1;

impl<Id: XorValue, H: XorValue, C: Count> InvertibleBloomFilterData<Id, H, C> {
    /// Serializes the data, storing cells sparsely when fewer than half are occupied.
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with(CompressionStrategy::default())
    }

    /// Serializes the data with the given cell storage strategy.
    pub fn serialize_with(&self, strategy: CompressionStrategy) -> Vec<u8> {
        let stored = self.counts.len() * (Id::BYTES + H::BYTES + C::BYTES);
        let mut bytes = SketchBytes::with_capacity(64 + stored);
        self.write_into(&mut bytes, strategy);
        bytes.into_bytes()
    }

    pub(crate) fn write_into(&self, bytes: &mut SketchBytes, strategy: CompressionStrategy) {
        let member = |i: usize| !self.is_cell_empty(i);
        let counts = CompressedArray::compress(&self.counts, C::identity(), member, strategy);
        let id_sums = CompressedArray::compress(&self.id_sums, Id::identity(), member, strategy);
        let hash_sums =
            CompressedArray::compress(&self.hash_sums, H::identity(), member, strategy);

        let mut flags = 0;
        if counts.is_sparse() {
            flags |= FLAG_SPARSE;
        }
        if self.split_by_hash {
            flags |= FLAG_SPLIT;
        }
        Family::IBF.write_preamble(bytes, flags);
        bytes.write_u8(Id::BYTES as u8);
        bytes.write_u8(H::BYTES as u8);
        bytes.write_u8(C::BYTES as u8);
        bytes.write_u8(0);

        bytes.write_i64_le(self.block_size as i64);
        bytes.write_u32_le(self.hash_function_count);
        if counts.is_sparse() {
            let membership: BitVec<u8, Lsb0> = (0..self.counts.len()).map(member).collect();
            write_bits(bytes, &membership);
        }

        let mut buf = [0u8; 16];
        for id in id_sums.stored() {
            id.write_le(&mut buf[..Id::BYTES]);
            bytes.write(&buf[..Id::BYTES]);
        }
        for hash in hash_sums.stored() {
            hash.write_le(&mut buf[..H::BYTES]);
            bytes.write(&buf[..H::BYTES]);
        }
        for count in counts.stored() {
            count.write_le(&mut buf[..C::BYTES]);
            bytes.write(&buf[..C::BYTES]);
        }

        bytes.write_i64_le(self.item_count);
        bytes.write_i64_le(self.capacity as i64);
        bytes.write_f32_le(self.error_rate);
        bytes.write_u8(u8::from(self.is_reverse));
        match self.sub_filter.as_deref() {
            Some(sub) => {
                bytes.write_u8(1);
                sub.write_into(bytes, strategy);
            }
            None => bytes.write_u8(0),
        }
    }

    /// Deserializes data written by [`serialize`](Self::serialize).
    ///
    /// Returns an error if the bytes are malformed or were written with other element widths.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut slice = SketchSlice::new(bytes);
        let data = Self::read_from(&mut slice, true)?;
        ensure_consumed(&slice, "filter data")?;
        Ok(data)
    }

    pub(crate) fn read_from(slice: &mut SketchSlice<'_>, allow_sub: bool) -> Result<Self, Error> {
        let flags = Family::IBF.read_preamble(slice)?;
        let id_bytes = slice.read_u8().map_err(make_error("id_bytes"))?;
        let hash_bytes = slice.read_u8().map_err(make_error("hash_bytes"))?;
        let count_bytes = slice.read_u8().map_err(make_error("count_bytes"))?;
        slice.read_u8().map_err(make_error("widths_reserved"))?;
        check_width("id", Id::BYTES, id_bytes)?;
        check_width("hash", H::BYTES, hash_bytes)?;
        check_width("count", C::BYTES, count_bytes)?;

        let block_size = slice.read_i64_le().map_err(make_error("block_size"))?;
        let hash_function_count = slice
            .read_u32_le()
            .map_err(make_error("hash_function_count"))?;
        if block_size <= 0 || hash_function_count == 0 {
            return Err(Error::deserial("block_size and hash_function_count must be positive")
                .with_context("block_size", block_size)
                .with_context("hash_function_count", hash_function_count));
        }
        let split_by_hash = flags & FLAG_SPLIT != 0;
        let segments = if split_by_hash {
            u64::from(hash_function_count)
        } else {
            1
        };
        let cell_count = (block_size as u64)
            .checked_mul(segments)
            .filter(|&n| n <= usize::MAX as u64)
            .ok_or_else(|| Error::deserial("cell count overflows"))? as usize;

        let membership = if flags & FLAG_SPARSE != 0 {
            let bits = read_bits(slice, "membership")?;
            if bits.len() != cell_count {
                return Err(Error::deserial("membership does not cover every cell")
                    .with_context("cells", cell_count)
                    .with_context("membership", bits.len()));
            }
            Some(bits)
        } else {
            None
        };
        let stored = membership
            .as_ref()
            .map_or(cell_count, |bits| bits.count_ones());
        let needed = stored.saturating_mul(Id::BYTES + H::BYTES + C::BYTES);
        if slice.remaining() < needed {
            return Err(Error::insufficient_data("cells")
                .with_context("needed", needed)
                .with_context("remaining", slice.remaining()));
        }

        let id_sums = read_cells(slice, stored, "id_sums", Id::BYTES, Id::read_le)?;
        let hash_sums = read_cells(slice, stored, "hash_sums", H::BYTES, H::read_le)?;
        let counts = read_cells(slice, stored, "counts", C::BYTES, C::read_le)?;
        let member = |i: usize| membership.as_ref().is_some_and(|bits| bits[i]);
        let id_sums = expand(id_sums, cell_count, Id::identity(), member)?;
        let hash_sums = expand(hash_sums, cell_count, H::identity(), member)?;
        let counts = expand(counts, cell_count, C::identity(), member)?;

        let item_count = slice.read_i64_le().map_err(make_error("item_count"))?;
        let capacity = slice.read_i64_le().map_err(make_error("capacity"))?;
        let error_rate = slice.read_f32_le().map_err(make_error("error_rate"))?;
        let is_reverse = slice.read_u8().map_err(make_error("is_reverse"))? != 0;
        let has_sub = slice.read_u8().map_err(make_error("has_sub_filter"))? != 0;
        let sub_filter = if has_sub {
            if !allow_sub {
                return Err(Error::deserial("sub-filters cannot be nested"));
            }
            Some(Box::new(Self::read_from(slice, false)?))
        } else {
            None
        };

        Ok(InvertibleBloomFilterData {
            block_size: block_size as u64,
            hash_function_count,
            split_by_hash,
            id_sums,
            hash_sums,
            counts,
            item_count,
            capacity: capacity.max(0) as u64,
            error_rate,
            is_reverse,
            sub_filter,
        })
    }
}

fn check_width(name: &'static str, expected: usize, actual: u8) -> Result<(), Error> {
    if usize::from(actual) != expected {
        return Err(Error::deserial(format!(
            "{name} width mismatch: expected {expected} bytes, got {actual}"
        )));
    }
    Ok(())
}

fn read_cells<T>(
    slice: &mut SketchSlice<'_>,
    stored: usize,
    tag: &'static str,
    width: usize,
    read: impl Fn(&[u8]) -> T,
) -> Result<Vec<T>, Error> {
    let mut buf = [0u8; 16];
    let mut values = Vec::with_capacity(stored);
    for _ in 0..stored {
        slice
            .read_exact(&mut buf[..width])
            .map_err(make_error(tag))?;
        values.push(read(&buf[..width]));
    }
    Ok(values)
}

fn expand<T: Copy>(
    values: Vec<T>,
    len: usize,
    identity: T,
    member: impl Fn(usize) -> bool,
) -> Result<Vec<T>, Error> {
    let array = CompressedArray::load(values, len, identity, member, CompressionStrategy::Dense)?;
    Ok(array.to_vec())
}
