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

//! Cell algebra shared by all filters and estimators.
//!
//! Every filter cell holds three values:
//!
//! - a signed occurrence counter, described by [`Count`];
//! - an XOR-accumulated identifier sum and an XOR-accumulated hash sum, both described by
//!   [`XorValue`].
//!
//! The counter width is a type parameter rather than a runtime setting. Choosing a type that is
//! too narrow for the expected number of additions makes decodes fail through silent
//! wrap-around, so [`Count::supports`] is checked when a filter is constructed.
//!
//! ```
//! use ibfsketch::algebra::Count;
//! use ibfsketch::algebra::XorValue;
//!
//! let c = i16::identity().increase().increase().decrease();
//! assert!(c.is_pure());
//!
//! let id = 0xdead_u64;
//! assert_eq!(id.xor(id), u64::identity());
//!
//! // An 8-bit counter cannot track a million additions over 64 cells.
//! assert!(!i8::supports(1_000_000, 64));
//! assert!(i32::supports(1_000_000, 64));
//! ```

mod count;
mod xor;

pub use self::count::Count;
pub use self::xor::XorValue;
