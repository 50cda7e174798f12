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

use bitvec::prelude::*;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::ensure_consumed;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::codec::read_bits;
use crate::codec::write_bits;
use crate::error::Error;
use crate::ibf::CompressionStrategy;
use crate::strata::DEFAULT_MAX_STRATA;
use crate::strata::StrataEstimatorData;
use crate::strata::StratumData;

impl StrataEstimatorData {
    /// Serializes the estimator data.
    ///
    /// Only strata that received entities are written; a bitmap records which.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = SketchBytes::with_capacity(64);
        self.write_into(&mut bytes);
        bytes.into_bytes()
    }

    pub(crate) fn write_into(&self, bytes: &mut SketchBytes) {
        Family::STRATA.write_preamble(bytes, 0);
        bytes.write_i64_le(self.block_size as i64);
        bytes.write_u32_le(self.hash_function_count);
        bytes.write_f64_le(self.decode_count_factor);
        bytes.write_f32_le(self.error_rate);
        bytes.write_i64_le(self.item_count);

        let present: BitVec<u8, Lsb0> = self.strata.iter().map(Option::is_some).collect();
        write_bits(bytes, &present);
        for stratum in self.strata.iter().flatten() {
            stratum.write_into(bytes, CompressionStrategy::Auto);
        }
    }

    /// Deserializes data written by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut slice = SketchSlice::new(bytes);
        let data = Self::read_from(&mut slice)?;
        ensure_consumed(&slice, "strata estimator")?;
        Ok(data)
    }

    pub(crate) fn read_from(slice: &mut SketchSlice<'_>) -> Result<Self, Error> {
        Family::STRATA.read_preamble(slice)?;
        let block_size = slice.read_i64_le().map_err(make_error("block_size"))?;
        let hash_function_count = slice
            .read_u32_le()
            .map_err(make_error("hash_function_count"))?;
        let decode_count_factor = slice
            .read_f64_le()
            .map_err(make_error("decode_count_factor"))?;
        let error_rate = slice.read_f32_le().map_err(make_error("error_rate"))?;
        let item_count = slice.read_i64_le().map_err(make_error("item_count"))?;
        if block_size <= 0 || hash_function_count == 0 {
            return Err(Error::deserial("block_size and hash_function_count must be positive")
                .with_context("block_size", block_size)
                .with_context("hash_function_count", hash_function_count));
        }

        let present = read_bits(slice, "strata")?;
        if present.is_empty() || present.len() > DEFAULT_MAX_STRATA {
            return Err(Error::deserial(format!(
                "strata count must be in [1, {DEFAULT_MAX_STRATA}], got {}",
                present.len()
            )));
        }
        let mut strata = Vec::with_capacity(present.len());
        for s in 0..present.len() {
            if !present[s] {
                strata.push(None);
                continue;
            }
            let stratum = StratumData::read_from(slice, false)?;
            if stratum.block_size != block_size as u64
                || stratum.hash_function_count != hash_function_count
                || stratum.is_reverse
            {
                return Err(Error::deserial("stratum shape differs from the estimator")
                    .with_context("stratum", s));
            }
            strata.push(Some(stratum));
        }

        Ok(StrataEstimatorData {
            block_size: block_size as u64,
            hash_function_count,
            decode_count_factor,
            error_rate,
            item_count,
            strata,
        })
    }
}
