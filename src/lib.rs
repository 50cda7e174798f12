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

//! Set reconciliation with invertible Bloom filters.
//!
//! Two parties each hold a large set of entities and want to learn which entities only one of
//! them holds, or holds with a different value. This crate provides:
//!
//! * [`ibf`]: invertible Bloom filters, sized for the difference rather than the sets, that can
//!   be subtracted from each other and decoded into the differing identifiers.
//! * [`strata`], [`minwise`] and [`hybrid`]: small estimators of the difference size, exchanged
//!   first so the filters can be sized.
//! * [`algebra`] and [`hash`]: the count and XOR types cells are built from, and the seeded
//!   probe hasher both parties must share.
//!
//! Every transmittable structure has a compact binary form via `serialize` and `deserialize`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod algebra;
pub mod error;
pub mod hash;
pub mod hybrid;
pub mod ibf;
pub mod minwise;
pub mod strata;

mod codec;
mod common;
