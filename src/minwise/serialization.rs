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

//! ```text
//! preamble      4 bytes   serial version, family, flags, reserved
//! bit_size      u8
//! hash_count    u32
//! capacity      i64
//! item_count    i64
//! occupied      u32 bit count + packed bits, one per bucket
//! signatures    u32 bit count + packed bits, bit_size per slot
//! ```

use bitvec::prelude::*;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::ensure_consumed;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_bits;
use crate::codec::write_bits;
use crate::error::Error;
use crate::minwise::BitMinwiseHashEstimatorData;

impl BitMinwiseHashEstimatorData {
    /// Serializes the data, keeping only the low `bit_size` bits of every slot.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(
            32 + self.capacity as usize / 8 + self.slots.len() * self.bit_size as usize / 8,
        );
        self.write_into(&mut bytes);
        bytes.into_bytes()
    }

    pub(crate) fn write_into(&self, bytes: &mut SketchBytes) {
        Family::MINWISE.write_preamble(bytes, 0);
        bytes.write_u8(self.bit_size);
        bytes.write_u32_le(self.hash_count);
        bytes.write_i64_le(self.capacity as i64);
        bytes.write_i64_le(self.item_count);
        write_bits(bytes, &self.occupied);

        let mut signatures = BitVec::<u8, Lsb0>::with_capacity(
            self.slots.len() * self.bit_size as usize,
        );
        for index in 0..self.slots.len() {
            let signature = self.signature(index);
            for bit in 0..self.bit_size {
                signatures.push((signature >> bit) & 1 == 1);
            }
        }
        write_bits(bytes, &signatures);
    }

    /// Deserializes data written by [`serialize`](Self::serialize).
    ///
    /// Unless `bit_size` is 32 the result is truncated: it compares like the original but cannot
    /// be folded or updated.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut slice = SketchSlice::new(bytes);
        let data = Self::read_from(&mut slice)?;
        ensure_consumed(&slice, "minwise estimator")?;
        Ok(data)
    }

    pub(crate) fn read_from(slice: &mut SketchSlice<'_>) -> Result<Self, Error> {
        Family::MINWISE.read_preamble(slice)?;
        let bit_size = slice.read_u8().map_err(make_error("bit_size"))?;
        let hash_count = slice.read_u32_le().map_err(make_error("hash_count"))?;
        let capacity = slice.read_i64_le().map_err(make_error("capacity"))?;
        let item_count = slice.read_i64_le().map_err(make_error("item_count"))?;
        if !(1..=32).contains(&bit_size) || hash_count == 0 || capacity <= 0 {
            return Err(Error::deserial("invalid minwise shape")
                .with_context("bit_size", bit_size)
                .with_context("hash_count", hash_count)
                .with_context("capacity", capacity));
        }

        let occupied = read_bits(slice, "occupied")?;
        if occupied.len() != capacity as usize {
            return Err(Error::deserial("occupied bitmap does not match the capacity")
                .with_context("expected", capacity)
                .with_context("actual", occupied.len()));
        }

        let slot_count = capacity as usize * hash_count as usize;
        let signatures = read_bits(slice, "signatures")?;
        if signatures.len() != slot_count * bit_size as usize {
            return Err(Error::deserial("signature bits do not match the shape")
                .with_context("expected", slot_count * bit_size as usize)
                .with_context("actual", signatures.len()));
        }
        let slots = signatures
            .chunks(bit_size as usize)
            .map(|chunk| {
                chunk
                    .iter()
                    .by_vals()
                    .enumerate()
                    .fold(0u32, |acc, (bit, set)| acc | (u32::from(set) << bit))
            })
            .collect();

        Ok(BitMinwiseHashEstimatorData {
            bit_size,
            capacity: capacity as u64,
            hash_count,
            item_count,
            occupied,
            slots,
            truncated: bit_size < 32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hash::IbfHasher;
    use crate::minwise::BitMinwiseHashEstimatorBuilder;

    fn filled(bit_size: u8) -> BitMinwiseHashEstimatorData {
        let builder = BitMinwiseHashEstimatorBuilder::new(40).bit_size(bit_size);
        let family = builder.build_family();
        let hasher = IbfHasher::default();
        let mut data = builder.build_data();
        for value in 0..300u64 {
            data.add_hashes(&family, hasher.hash_u64(&value), hasher.hash_u64(&!value));
        }
        data
    }

    #[test]
    fn test_truncated_round_trip_compares_like_original() {
        let data = filled(4);
        let other = filled(4);
        let restored = BitMinwiseHashEstimatorData::deserialize(&data.serialize()).unwrap();
        assert!(restored.is_truncated());
        assert_eq!(restored.item_count(), 300);
        assert_eq!(restored.similarity(&other), data.similarity(&other));

        let err = restored.fold(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_full_width_round_trip_is_exact() {
        let data = filled(32);
        let restored = BitMinwiseHashEstimatorData::deserialize(&data.serialize()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_rejects_truncated_bytes() {
        let bytes = filled(4).serialize();
        let err = BitMinwiseHashEstimatorData::deserialize(&bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_out_of_range_bit_size() {
        let mut bytes = filled(4).serialize();
        for bit_size in [0u8, 33, 255] {
            bytes[4] = bit_size;
            let err = BitMinwiseHashEstimatorData::deserialize(&bytes).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
            assert_eq!(err.message(), "invalid minwise shape");
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = filled(8).serialize();
        bytes.extend_from_slice(&[0, 0]);
        let err = BitMinwiseHashEstimatorData::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().starts_with("trailing bytes"));
    }
}
