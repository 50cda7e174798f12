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

use std::fmt;
use std::hash::Hash;

/// Identifier and hash values accumulated into cells by XOR.
///
/// The operation must be commutative and self-inverse: `a.xor(a) == identity()`.
pub trait XorValue: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Number of bytes in the little-endian wire encoding.
    const BYTES: usize;

    /// The neutral element of [`XorValue::xor`].
    fn identity() -> Self;

    /// Combines two values.
    fn xor(self, other: Self) -> Self;

    /// Truncates a 128-bit hash (low word first) into this type.
    fn from_hash(h1: u64, h2: u64) -> Self;

    /// Writes the value into `buf`, which is exactly [`XorValue::BYTES`] long.
    fn write_le(self, buf: &mut [u8]);

    /// Reads a value from `buf`, which is exactly [`XorValue::BYTES`] long.
    fn read_le(buf: &[u8]) -> Self;

    /// Returns `true` if the value is the identity.
    fn is_identity(self) -> bool {
        self == Self::identity()
    }
}

macro_rules! impl_xor_value {
    ($($t:ty),*) => {
        $(
            impl XorValue for $t {
                const BYTES: usize = std::mem::size_of::<$t>();

                fn identity() -> Self {
                    0
                }

                fn xor(self, other: Self) -> Self {
                    self ^ other
                }

                fn from_hash(h1: u64, _h2: u64) -> Self {
                    h1 as $t
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

impl_xor_value!(u16, u32, u64, i32, i64);

impl XorValue for u128 {
    const BYTES: usize = 16;

    fn identity() -> Self {
        0
    }

    fn xor(self, other: Self) -> Self {
        self ^ other
    }

    fn from_hash(h1: u64, h2: u64) -> Self {
        (u128::from(h2) << 64) | u128::from(h1)
    }

    fn write_le(self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(buf: &[u8]) -> Self {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(buf);
        u128::from_le_bytes(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_inverse() {
        let a = 0x1234_5678_u32;
        let b = 0x0f0f_0f0f_u32;
        assert_eq!(a.xor(a), u32::identity());
        assert_eq!(a.xor(b).xor(b), a);
        assert_eq!(a.xor(b), b.xor(a));
    }

    #[test]
    fn test_from_hash_truncates() {
        assert_eq!(u32::from_hash(0x1_0000_0002, 7), 2);
        assert_eq!(i64::from_hash(u64::MAX, 0), -1);
        assert_eq!(u128::from_hash(1, 2), (2u128 << 64) | 1);
    }
}
