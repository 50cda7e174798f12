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

use crate::ibf::sizing::actual_error_rate;

/// Primes that may appear in a block size chosen by [`FoldingStrategy::SmoothNumbers`].
const SMOOTH_PRIMES: [u64; 4] = [2, 3, 5, 7];

/// Decides how filters of different block sizes are brought to a common size.
///
/// Folding a block of `m` cells by factor `f` produces `m / f` cells, where folded cell `i`
/// aggregates the source cells `i, i + m/f, i + 2m/f, ...`. Because probe positions are reduced
/// modulo the block size, a folded filter decodes exactly like a filter built at the smaller
/// size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldingStrategy {
    /// Block sizes are rounded to 7-smooth numbers, so any two sizes share many divisors.
    #[default]
    SmoothNumbers,
    /// Block sizes are rounded to multiples of a power of two and fold factors are powers of two.
    PowerOfTwo,
    /// Block sizes are used as given and filters only combine when sizes are equal.
    Disabled,
}

impl FoldingStrategy {
    /// Rounds `size` up to a block size this strategy can later fold by `min_factor`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibfsketch::ibf::FoldingStrategy;
    ///
    /// assert_eq!(FoldingStrategy::PowerOfTwo.compute_foldable_size(100, 4), 128);
    /// assert_eq!(FoldingStrategy::SmoothNumbers.compute_foldable_size(100, 4), 100);
    /// assert_eq!(FoldingStrategy::SmoothNumbers.compute_foldable_size(101, 4), 108);
    /// assert_eq!(FoldingStrategy::Disabled.compute_foldable_size(101, 4), 101);
    /// ```
    pub fn compute_foldable_size(&self, size: u64, min_factor: u64) -> u64 {
        let size = size.max(1);
        let min_factor = min_factor.max(1);
        match self {
            FoldingStrategy::SmoothNumbers => {
                let unit = smallest_smooth_at_least(min_factor);
                unit * smallest_smooth_at_least(size.div_ceil(unit))
            }
            FoldingStrategy::PowerOfTwo => {
                let unit = min_factor.next_power_of_two();
                size.max(unit).next_power_of_two()
            }
            FoldingStrategy::Disabled => size,
        }
    }

    /// Finds the smallest pair of factors `(f1, f2)` with `size1 / f1 == size2 / f2`.
    ///
    /// Returns `None` when the sizes cannot be reconciled under this strategy, or when they
    /// share no factor and would only meet at a single cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use ibfsketch::ibf::FoldingStrategy;
    ///
    /// assert_eq!(FoldingStrategy::SmoothNumbers.find_fold_factors(360, 120), Some((3, 1)));
    /// assert_eq!(FoldingStrategy::SmoothNumbers.find_fold_factors(96, 120), Some((4, 5)));
    /// assert_eq!(FoldingStrategy::PowerOfTwo.find_fold_factors(96, 120), None);
    /// assert_eq!(FoldingStrategy::Disabled.find_fold_factors(64, 32), None);
    /// assert_eq!(FoldingStrategy::Disabled.find_fold_factors(64, 64), Some((1, 1)));
    /// ```
    pub fn find_fold_factors(&self, size1: u64, size2: u64) -> Option<(u64, u64)> {
        if size1 == 0 || size2 == 0 {
            return None;
        }
        if size1 == size2 {
            return Some((1, 1));
        }
        let common = gcd(size1, size2);
        // Sizes without a common factor would meet at a single cell.
        if common == 1 {
            return None;
        }
        let factors = (size1 / common, size2 / common);
        match self {
            FoldingStrategy::SmoothNumbers => Some(factors),
            FoldingStrategy::PowerOfTwo => {
                (factors.0.is_power_of_two() && factors.1.is_power_of_two()).then_some(factors)
            }
            FoldingStrategy::Disabled => None,
        }
    }

    /// Finds the largest factor by which a block can be folded while the filter's actual error
    /// rate stays at or below `error_rate`.
    ///
    /// Returns `None` when no factor greater than one qualifies.
    pub fn find_compression_factor(
        &self,
        hash_function_count: u32,
        block_size: u64,
        item_count: u64,
        error_rate: f64,
    ) -> Option<u64> {
        if matches!(self, FoldingStrategy::Disabled) || block_size < 2 {
            return None;
        }
        // Divisors in ascending order; the folded size shrinks as the factor grows.
        let mut best = None;
        for factor in divisors(block_size).into_iter().skip(1) {
            if matches!(self, FoldingStrategy::PowerOfTwo) && !factor.is_power_of_two() {
                continue;
            }
            let folded = block_size / factor;
            if actual_error_rate(folded, item_count, hash_function_count) > error_rate {
                break;
            }
            best = Some(factor);
        }
        best
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn divisors(n: u64) -> Vec<u64> {
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            low.push(i);
            if i != n / i {
                high.push(n / i);
            }
        }
        i += 1;
    }
    low.extend(high.into_iter().rev());
    low
}

fn is_smooth(mut n: u64) -> bool {
    if n == 0 {
        return false;
    }
    for p in SMOOTH_PRIMES {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

fn smallest_smooth_at_least(n: u64) -> u64 {
    let mut candidate = n.max(1);
    while !is_smooth(candidate) {
        candidate += 1;
    }
    candidate
}
