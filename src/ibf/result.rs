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

use std::collections::HashSet;
use std::hash::Hash;

/// The identifiers recovered by decoding the difference of two filters.
///
/// An incomplete result from a standard filter is still useful: every identifier it reports is
/// a real difference, but some differences may be missing. A reverse cell can pass the purity
/// test while it still mixes several entries, so an incomplete result from a reverse or hybrid
/// filter may also hold identifiers that are not differences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeResult<Id: Eq + Hash> {
    only_in_a: HashSet<Id>,
    only_in_b: HashSet<Id>,
    modified: HashSet<Id>,
    complete: bool,
}

impl<Id: Eq + Hash> Default for DecodeResult<Id> {
    fn default() -> Self {
        DecodeResult {
            only_in_a: HashSet::new(),
            only_in_b: HashSet::new(),
            modified: HashSet::new(),
            complete: true,
        }
    }
}

impl<Id: Copy + Eq + Hash> DecodeResult<Id> {
    /// Identifiers present only in the minuend.
    pub fn only_in_a(&self) -> &HashSet<Id> {
        &self.only_in_a
    }

    /// Identifiers present only in the subtrahend.
    pub fn only_in_b(&self) -> &HashSet<Id> {
        &self.only_in_b
    }

    /// Identifiers present in both with different values.
    pub fn modified(&self) -> &HashSet<Id> {
        &self.modified
    }

    /// Returns `true` if every cell was peeled back to empty.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the total number of differences found.
    pub fn len(&self) -> usize {
        self.only_in_a.len() + self.only_in_b.len() + self.modified.len()
    }

    /// Returns `true` if no difference was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every identifier found, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Id> {
        self.only_in_a
            .iter()
            .chain(self.only_in_b.iter())
            .chain(self.modified.iter())
    }

    pub(crate) fn record_a(&mut self, id: Id) {
        self.only_in_a.insert(id);
    }

    pub(crate) fn record_b(&mut self, id: Id) {
        self.only_in_b.insert(id);
    }

    pub(crate) fn record_modified(&mut self, id: Id) {
        self.modified.insert(id);
    }

    pub(crate) fn mark_incomplete(&mut self) {
        self.complete = false;
    }

    /// Moves identifiers reported on both sides into the modified set.
    pub(crate) fn normalize(&mut self) {
        let both: Vec<Id> = self
            .only_in_a
            .iter()
            .filter(|id| self.only_in_b.contains(id))
            .copied()
            .collect();
        for id in both {
            self.only_in_a.remove(&id);
            self.only_in_b.remove(&id);
            self.modified.insert(id);
        }
        self.only_in_a.retain(|id| !self.modified.contains(id));
        self.only_in_b.retain(|id| !self.modified.contains(id));
    }
}
