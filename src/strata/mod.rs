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

//! Strata estimator for the size of a set difference.
//!
//! Every entity is hashed to a 64-bit key and placed in stratum `s`, the number of trailing
//! zeros of the key, so stratum `s` receives about `1 / 2^(s+1)` of all entities. Each stratum is
//! a small invertible Bloom filter. Decoding the difference from the top stratum down, the
//! first stratum that fails to decode tells how many times the peeled count must be doubled.

mod estimator;
mod serialization;

pub use self::estimator::DEFAULT_MAX_STRATA;
pub use self::estimator::StrataEstimator;
pub use self::estimator::StrataEstimatorBuilder;
pub use self::estimator::StrataEstimatorData;
pub use self::estimator::StratumData;
pub(crate) use self::estimator::entity_keys;
