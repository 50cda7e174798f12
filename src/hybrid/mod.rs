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

//! Hybrid difference estimator.
//!
//! A [`HybridEstimator`] keeps a strata estimator with only a few strata. Entities whose stratum
//! lies beyond the last one go to a b-bit minwise estimator instead, whose similarity estimate
//! covers that sparse tail of the key space. The two estimates are added on decode.
//!
//! The minwise part cannot remove entities. The first removal disables it for good, and from
//! then on the tail is only tracked as a count.

mod estimator;
mod serialization;

pub use self::estimator::DEFAULT_HYBRID_STRATA;
pub use self::estimator::HybridEstimator;
pub use self::estimator::HybridEstimatorBuilder;
pub use self::estimator::HybridEstimatorData;
