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

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::ensure_consumed;
use crate::codec::family::Family;
use crate::codec::make_error;
use crate::error::Error;
use crate::hybrid::HybridEstimatorData;
use crate::minwise::BitMinwiseHashEstimatorData;
use crate::strata::StrataEstimatorData;

const FLAG_HAS_MINWISE: u8 = 1 << 0;
const FLAG_MINWISE_DISABLED: u8 = 1 << 1;

impl HybridEstimatorData {
    /// Serializes the estimator data: a preamble, the item and replacement counts, the strata
    /// and, when present, the minwise part.
    pub fn serialize(&self) -> Vec<u8> {
        let mut flags = 0;
        if self.minwise.is_some() {
            flags |= FLAG_HAS_MINWISE;
        }
        if self.minwise_disabled {
            flags |= FLAG_MINWISE_DISABLED;
        }

        let mut bytes = SketchBytes::with_capacity(128);
        Family::HYBRID.write_preamble(&mut bytes, flags);
        bytes.write_i64_le(self.item_count);
        bytes.write_i64_le(self.replacement_count);
        self.strata.write_into(&mut bytes);
        if let Some(minwise) = &self.minwise {
            minwise.write_into(&mut bytes);
        }
        bytes.into_bytes()
    }

    /// Deserializes data written by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut slice = SketchSlice::new(bytes);
        let flags = Family::HYBRID.read_preamble(&mut slice)?;
        let item_count = slice.read_i64_le().map_err(make_error("item_count"))?;
        let replacement_count = slice
            .read_i64_le()
            .map_err(make_error("replacement_count"))?;
        let strata = StrataEstimatorData::read_from(&mut slice)?;
        let minwise = if flags & FLAG_HAS_MINWISE != 0 {
            Some(BitMinwiseHashEstimatorData::read_from(&mut slice)?)
        } else {
            None
        };
        let minwise_disabled = flags & FLAG_MINWISE_DISABLED != 0;
        if minwise_disabled && minwise.is_some() {
            return Err(Error::deserial("disabled minwise estimator must not be present"));
        }
        ensure_consumed(&slice, "hybrid estimator")?;

        Ok(HybridEstimatorData {
            item_count,
            strata,
            minwise,
            replacement_count,
            minwise_disabled,
        })
    }
}
