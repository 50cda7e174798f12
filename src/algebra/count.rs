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

use std::cmp::Ordering;
use std::fmt;

/// Headroom kept free below the counter maximum when validating a capacity.
const COUNT_HEADROOM: i128 = 15;

/// Per-cell occurrence counter.
///
/// The sign of a counter is always determined by comparing against [`Count::identity`], never
/// by inspecting the bit pattern, so implementations are free to use any ordered representation.
pub trait Count: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Number of bytes in the little-endian wire encoding.
    const BYTES: usize;

    /// The empty counter.
    fn identity() -> Self;

    /// The counter contribution of a single addition.
    fn unity() -> Self;

    /// Adds two counters, wrapping on overflow.
    fn add(self, other: Self) -> Self;

    /// Subtracts `other` from `self`, wrapping on overflow.
    fn subtract(self, other: Self) -> Self;

    /// Returns `true` if the counter's magnitude equals one unity.
    fn is_pure(self) -> bool;

    /// Returns the counter's magnitude as a plain number of items.
    fn estimated_count(self) -> u64;

    /// Returns `true` if a filter of `block_size` cells per hash function can absorb
    /// `capacity` additions without overflowing this counter type.
    fn supports(capacity: u64, block_size: u64) -> bool;

    /// Writes the counter into `buf`, which is exactly [`Count::BYTES`] long.
    fn write_le(self, buf: &mut [u8]);

    /// Reads a counter from `buf`, which is exactly [`Count::BYTES`] long.
    fn read_le(buf: &[u8]) -> Self;

    /// Adds one unity.
    fn increase(self) -> Self {
        self.add(Self::unity())
    }

    /// Removes one unity.
    fn decrease(self) -> Self {
        self.subtract(Self::unity())
    }

    /// Orders two counters.
    fn compare(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    /// Returns `true` if the counter is the identity.
    fn is_identity(self) -> bool {
        self.compare(Self::identity()) == Ordering::Equal
    }

    /// Returns `true` if the counter lies above the identity.
    fn is_positive(self) -> bool {
        self.compare(Self::identity()) == Ordering::Greater
    }
}

macro_rules! impl_signed_count {
    ($($t:ty),*) => {
        $(
            impl Count for $t {
                const BYTES: usize = std::mem::size_of::<$t>();

                fn identity() -> Self {
                    0
                }

                fn unity() -> Self {
                    1
                }

                fn add(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }

                fn subtract(self, other: Self) -> Self {
                    self.wrapping_sub(other)
                }

                fn is_pure(self) -> bool {
                    self == 1 || self == -1
                }

                fn estimated_count(self) -> u64 {
                    self.unsigned_abs() as u64
                }

                fn supports(capacity: u64, block_size: u64) -> bool {
                    let usable = <$t>::MAX as i128 - COUNT_HEADROOM;
                    usable > 0 && usable * block_size as i128 > capacity as i128
                }

                fn write_le(self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(buf);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_signed_count!(i8, i16, i32, i64);
