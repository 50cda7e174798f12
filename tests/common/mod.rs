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

#![allow(dead_code)]

use std::collections::HashSet;

use ibfsketch::hash::IbfHasher;
use ibfsketch::ibf::DecodeResult;
use ibfsketch::ibf::EntityMapping;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// A keyed record with a mutable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub id: u64,
    pub value: u64,
}

/// Tracks identifiers only: the entity hash is the identifier hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdMapping(pub IbfHasher);

impl EntityMapping<Entity> for IdMapping {
    type Id = u64;
    type Hash = u32;

    fn id(&self, entity: &Entity) -> u64 {
        entity.id
    }

    fn entity_hash(&self, entity: &Entity) -> u32 {
        self.0.hash(&entity.id)
    }
}

/// Tracks identifiers and payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueMapping(pub IbfHasher);

impl EntityMapping<Entity> for ValueMapping {
    type Id = u64;
    type Hash = u32;

    fn id(&self, entity: &Entity) -> u64 {
        entity.id
    }

    fn entity_hash(&self, entity: &Entity) -> u32 {
        self.0.hash(&(entity.id, entity.value))
    }
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates `n` entities with distinct random identifiers.
pub fn generate(rng: &mut StdRng, n: usize) -> Vec<Entity> {
    let mut seen = HashSet::with_capacity(n);
    let mut entities = Vec::with_capacity(n);
    while entities.len() < n {
        let id = rng.r#gen::<u64>();
        if seen.insert(id) {
            entities.push(Entity {
                id,
                value: rng.r#gen(),
            });
        }
    }
    entities
}

/// The true difference between a base set and its mutation.
#[derive(Debug, Default)]
pub struct Changes {
    pub only_in_a: HashSet<u64>,
    pub only_in_b: HashSet<u64>,
    pub modified: HashSet<u64>,
}

impl Changes {
    pub fn len(&self) -> usize {
        self.only_in_a.len() + self.only_in_b.len() + self.modified.len()
    }

    pub fn all(&self) -> HashSet<u64> {
        self.only_in_a
            .iter()
            .chain(&self.only_in_b)
            .chain(&self.modified)
            .copied()
            .collect()
    }
}

/// Copies `base`, then drops `removed` entities, changes the payload of `modified` others and
/// appends `added` new ones.
pub fn mutate(
    rng: &mut StdRng,
    base: &[Entity],
    added: usize,
    removed: usize,
    modified: usize,
) -> (Vec<Entity>, Changes) {
    let mut order: Vec<usize> = (0..base.len()).collect();
    order.shuffle(rng);

    let mut changes = Changes::default();
    let mut mutated = base.to_vec();
    for &i in &order[removed..removed + modified] {
        mutated[i].value = mutated[i].value.wrapping_add(1);
        changes.modified.insert(mutated[i].id);
    }
    let dropped: HashSet<u64> = order[..removed].iter().map(|&i| base[i].id).collect();
    mutated.retain(|e| !dropped.contains(&e.id));
    changes.only_in_a = dropped;

    let existing: HashSet<u64> = base.iter().map(|e| e.id).collect();
    while changes.only_in_b.len() < added {
        let entity = Entity {
            id: rng.r#gen(),
            value: rng.r#gen(),
        };
        if !existing.contains(&entity.id) && changes.only_in_b.insert(entity.id) {
            mutated.push(entity);
        }
    }
    (mutated, changes)
}

/// Compares a decode result with the true difference and returns
/// `(found, false positives, false negatives)`.
pub fn score(result: &DecodeResult<u64>, expected: &Changes) -> (usize, usize, usize) {
    let found: HashSet<u64> = result.iter().copied().collect();
    let truth = expected.all();
    let false_positives = found.difference(&truth).count();
    let false_negatives = truth.difference(&found).count();
    (found.len(), false_positives, false_negatives)
}
