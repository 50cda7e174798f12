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

//! Invertible Bloom filters.
//!
//! An invertible Bloom filter (IBF) is a Bloom filter whose cells keep a count plus the XOR of
//! the identifiers and hashes probed into them. Subtracting one party's filter from another's
//! cancels every entity both hold, and the few entities left can be peeled out one pure cell
//! at a time. The filter only needs to be sized for the expected difference, not for the sets.
//!
//! # Usage
//!
//! 1. Agree on a [`FilterConfig`]: the [`EntityMapping`], the seed and the count type.
//! 2. Estimate the difference size, e.g. with a
//!    [`HybridEstimator`](crate::hybrid::HybridEstimator).
//! 3. Build filters with [`InvertibleBloomFilterBuilder`] and add every entity.
//! 4. Send the [`extract`](InvertibleBloomFilter::extract)ed, optionally
//!    [`compress`](InvertibleBloomFilter::compress)ed and serialized data.
//! 5. Call [`subtract_and_decode`](InvertibleBloomFilter::subtract_and_decode) on the receiver.
//!
//! Filters of different block sizes are folded to a common size first, as decided by the
//! [`FoldingStrategy`].

mod compressed;
mod config;
mod data;
mod filter;
mod folding;
mod result;
mod serialization;
mod sizing;

pub use self::compressed::CompressedArray;
pub use self::compressed::CompressionStrategy;
pub use self::config::EntityMapping;
pub use self::config::FilterConfig;
pub use self::data::InvertibleBloomFilterData;
pub(crate) use self::data::PARALLEL_MIN_LEN;
pub use self::filter::DEFAULT_HASH_FUNCTION_COUNT;
pub use self::filter::FilterData;
pub use self::filter::FilterKind;
pub use self::filter::InvertibleBloomFilter;
pub use self::filter::InvertibleBloomFilterBuilder;
pub use self::folding::FoldingStrategy;
pub use self::result::DecodeResult;
pub use self::sizing::actual_error_rate;
pub use self::sizing::best_block_size;
