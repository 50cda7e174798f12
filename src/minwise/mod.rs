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

//! b-bit minwise hashing.
//!
//! Entities are spread over buckets by identifier hash. For every bucket and every hash function
//! of a fixed random family, the estimator keeps the minimum hash of the entities in that
//! bucket. Two estimators built over overlapping sets agree on a slot with a probability that
//! grows with the overlap, which yields an estimate of their Jaccard similarity. Only the low
//! `bit_size` bits of each minimum are transmitted.

mod estimator;
mod serialization;

pub use self::estimator::BitMinwiseHashEstimator;
pub use self::estimator::BitMinwiseHashEstimatorBuilder;
pub use self::estimator::BitMinwiseHashEstimatorData;
pub use self::estimator::DEFAULT_MINWISE_SEED;
pub(crate) use self::estimator::MinwiseHashFamily;
