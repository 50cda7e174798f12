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

//! Error-rate model used to size and compress filters.
//!
//! With `n` items, `m` cells per hash function and `k` hash functions, the probability that all
//! probes of an absent item hit occupied cells is `(1 - e^(-n/m))^k`. The same quantity bounds
//! how often peeling stalls, so it drives both initial sizing and compression.

/// Returns the actual error rate of a block of `block_size` cells holding `item_count` items.
///
/// # Examples
///
/// ```
/// use ibfsketch::ibf::actual_error_rate;
///
/// assert_eq!(actual_error_rate(100, 0, 3), 0.0);
/// assert!(actual_error_rate(100, 10, 3) < actual_error_rate(100, 50, 3));
/// ```
pub fn actual_error_rate(block_size: u64, item_count: u64, hash_function_count: u32) -> f64 {
    if item_count == 0 {
        return 0.0;
    }
    if block_size == 0 {
        return 1.0;
    }
    let load = item_count as f64 / block_size as f64;
    (1.0 - (-load).exp()).powi(hash_function_count as i32)
}

/// Returns the smallest block size whose actual error rate at `capacity` items does not exceed
/// `error_rate`.
///
/// # Panics
///
/// Panics if `error_rate` is not in (0.0, 1.0) or `hash_function_count` is 0.
///
/// # Examples
///
/// ```
/// use ibfsketch::ibf::actual_error_rate;
/// use ibfsketch::ibf::best_block_size;
///
/// let size = best_block_size(1000, 0.01, 3);
/// assert!(actual_error_rate(size, 1000, 3) <= 0.01);
/// assert!(actual_error_rate(size - 1, 1000, 3) > 0.01);
/// ```
pub fn best_block_size(capacity: u64, error_rate: f64, hash_function_count: u32) -> u64 {
    assert!(
        error_rate > 0.0 && error_rate < 1.0,
        "error_rate must be between 0.0 and 1.0 (exclusive)"
    );
    assert!(
        hash_function_count > 0,
        "hash_function_count must be at least 1"
    );
    if capacity == 0 {
        return 1;
    }

    // (1 - e^(-n/m))^k <= p  <=>  m >= -n / ln(1 - p^(1/k))
    let per_hash = error_rate.powf(1.0 / f64::from(hash_function_count));
    let estimate = (-(capacity as f64) / (1.0 - per_hash).ln()).ceil().max(1.0) as u64;

    // Floating point may land one off either way.
    let mut size = estimate.saturating_sub(1).max(1);
    while actual_error_rate(size, capacity, hash_function_count) > error_rate {
        size += 1;
    }
    size
}
