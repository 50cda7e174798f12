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

use std::hash::Hash;

/// Hashes any `Hash` value with MurmurHash3 x64 128.
pub(crate) fn murmur128<T: Hash + ?Sized>(value: &T, seed: u32) -> (u64, u64) {
    let mut hasher = mur3::Hasher128::with_seed(seed);
    value.hash(&mut hasher);
    hasher.finish128()
}

/// Hashes raw bytes with MurmurHash3 x86 32.
pub(crate) fn murmur32(bytes: &[u8], seed: u32) -> u32 {
    mur3::murmurhash3_x86_32(bytes, seed)
}
