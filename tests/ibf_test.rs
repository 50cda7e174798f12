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

mod common;

use common::Entity;
use common::IdMapping;
use common::ValueMapping;
use common::generate;
use common::mutate;
use common::rng;
use common::score;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::ge;
use googletest::prelude::lt;
use ibfsketch::hash::IbfHasher;
use ibfsketch::ibf::EntityMapping;
use ibfsketch::ibf::FilterConfig;
use ibfsketch::ibf::InvertibleBloomFilter;
use ibfsketch::ibf::InvertibleBloomFilterBuilder;
use rand::seq::SliceRandom;

fn build<M: EntityMapping<Entity>>(
    builder: InvertibleBloomFilterBuilder,
    mapping: M,
) -> InvertibleBloomFilter<Entity, M, i32> {
    builder.build(FilterConfig::new(mapping)).unwrap()
}

#[test]
fn test_add_then_remove_in_any_order_is_identity() {
    let mut rng = rng(1);
    let mut entities = generate(&mut rng, 5_000);
    let mut filter = build(
        InvertibleBloomFilterBuilder::with_accuracy(500, 0.01),
        IdMapping::default(),
    );
    for entity in &entities {
        filter.add(entity).unwrap();
    }
    assert_eq!(filter.item_count(), 5_000);

    entities.shuffle(&mut rng);
    for entity in &entities {
        filter.remove(entity).unwrap();
    }
    let data = filter.data();
    assert!(data.counts().iter().all(|&c| c == 0));
    assert!(data.id_sums().iter().all(|&id| id == 0));
    assert!(data.hash_sums().iter().all(|&h| h == 0));
    assert!(data.is_empty());

    let result = filter.subtract_and_decode(&filter.extract()).unwrap();
    assert!(result.is_complete());
    assert!(result.is_empty());
}

#[test]
fn test_self_difference_is_empty() {
    let mut rng = rng(2);
    let entities = generate(&mut rng, 2_000);
    let mut filter = build(
        InvertibleBloomFilterBuilder::with_accuracy(100, 0.01),
        IdMapping::default(),
    );
    for entity in &entities {
        filter.add(entity).unwrap();
    }
    let result = filter.subtract_and_decode(&filter.extract()).unwrap();
    assert!(result.is_complete());
    assert!(result.is_empty());
}

#[test]
fn test_large_sets_recover_most_differences() {
    let mut rng = rng(3);
    let a = generate(&mut rng, 100_000);
    let (b, changes) = mutate(&mut rng, &a, 5_000, 5_000, 0);
    assert_eq!(b.len(), 100_000);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(20_000, 0.01).expected_items(100_000);
    let mut filter_a = build(builder.clone(), IdMapping::default());
    let mut filter_b = build(builder, IdMapping::default());
    for entity in &a {
        filter_a.add(entity).unwrap();
    }
    for entity in &b {
        filter_b.add(entity).unwrap();
    }

    let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
    let (found, false_positives, _) = score(&result, &changes);
    assert_that!(found, ge(9_500));
    assert_that!(false_positives, lt(25));
    assert!(result.only_in_a().is_subset(&changes.only_in_a));
    assert!(result.only_in_b().is_subset(&changes.only_in_b));
}

#[test]
fn test_split_layout_decodes() {
    let mut rng = rng(4);
    let a = generate(&mut rng, 3_000);
    let (b, changes) = mutate(&mut rng, &a, 60, 40, 0);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(200, 0.01).split_by_hash(true);
    let mut filter_a = build(builder.clone(), IdMapping::default());
    let mut filter_b = build(builder, IdMapping::default());
    for entity in &a {
        filter_a.add(entity).unwrap();
    }
    for entity in &b {
        filter_b.add(entity).unwrap();
    }
    assert_eq!(
        filter_a.data().cell_count(),
        3 * filter_a.block_size() as usize
    );

    let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
    assert!(result.is_complete());
    assert_that!(result.only_in_a(), eq(&changes.only_in_a));
    assert_that!(result.only_in_b(), eq(&changes.only_in_b));
}

#[test]
fn test_reverse_filter_sees_value_changes() {
    let mut rng = rng(5);
    let a = generate(&mut rng, 2_000);
    let (b, changes) = mutate(&mut rng, &a, 0, 0, 30);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(200, 0.01).reverse();
    let mut filter_a = build(builder.clone(), ValueMapping::default());
    let mut filter_b = build(builder, ValueMapping::default());
    for entity in &a {
        filter_a.add(entity).unwrap();
    }
    for entity in &b {
        filter_b.add(entity).unwrap();
    }

    let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
    assert!(result.is_complete());
    assert_that!(result.modified(), eq(&changes.modified));
    assert!(result.only_in_a().is_empty());
    assert!(result.only_in_b().is_empty());

    // A standard filter over the same identifiers cannot see the changes.
    let builder = InvertibleBloomFilterBuilder::with_accuracy(200, 0.01);
    let mut ids_a = build(builder.clone(), IdMapping::default());
    let mut ids_b = build(builder, IdMapping::default());
    for (x, y) in a.iter().zip(&b) {
        ids_a.add(x).unwrap();
        ids_b.add(y).unwrap();
    }
    assert!(ids_a.subtract_and_decode(&ids_b.extract()).unwrap().is_empty());
}

#[test]
fn test_hybrid_filter_separates_changes() {
    let mut rng = rng(6);
    let a = generate(&mut rng, 4_000);
    let (b, changes) = mutate(&mut rng, &a, 25, 25, 25);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(300, 0.01).hybrid();
    let mut filter_a = build(builder.clone(), ValueMapping::default());
    let mut filter_b = build(builder, ValueMapping::default());
    for entity in &a {
        filter_a.add(entity).unwrap();
    }
    for entity in &b {
        filter_b.add(entity).unwrap();
    }
    assert!(filter_a.contains(&a[0]));

    let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
    assert!(result.is_complete());
    assert_that!(result.only_in_a(), eq(&changes.only_in_a));
    assert_that!(result.only_in_b(), eq(&changes.only_in_b));
    assert_that!(result.modified(), eq(&changes.modified));
}

#[test]
fn test_small_value_aware_filters_always_return() {
    let mut complete = 0;
    for seed in 0..300 {
        let mut rng = rng(1_000 + seed);
        let a = generate(&mut rng, 40);
        let (b, changes) = mutate(&mut rng, &a, 2, 2, 2);

        let builder = if seed % 2 == 0 {
            InvertibleBloomFilterBuilder::with_block_size(30).reverse()
        } else {
            InvertibleBloomFilterBuilder::with_block_size(30).hybrid()
        };
        let mut filter_a = build(builder.clone(), ValueMapping::default());
        let mut filter_b = build(builder, ValueMapping::default());
        for entity in &a {
            filter_a.add(entity).unwrap();
        }
        for entity in &b {
            filter_b.add(entity).unwrap();
        }

        let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
        assert!(result.only_in_a().is_disjoint(result.only_in_b()));
        assert!(result.only_in_a().is_disjoint(result.modified()));
        assert!(result.only_in_b().is_disjoint(result.modified()));
        if !result.is_complete() {
            continue;
        }
        complete += 1;
        assert_eq!(result.only_in_a(), &changes.only_in_a, "seed {seed}");
        assert_eq!(result.only_in_b(), &changes.only_in_b, "seed {seed}");
        assert_eq!(result.modified(), &changes.modified, "seed {seed}");
    }
    assert_that!(complete, ge(200));
}

#[test]
fn test_undersized_filter_reports_incomplete() {
    let mut rng = rng(7);
    let a = generate(&mut rng, 2_000);
    let (b, changes) = mutate(&mut rng, &a, 500, 500, 0);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(20, 0.01);
    let mut filter_a = build(builder.clone(), IdMapping::default());
    let mut filter_b = build(builder, IdMapping::default());
    for entity in &a {
        filter_a.add(entity).unwrap();
    }
    for entity in &b {
        filter_b.add(entity).unwrap();
    }

    let result = filter_a.subtract_and_decode(&filter_b.extract()).unwrap();
    assert!(!result.is_complete());
    assert_that!(result.len(), lt(changes.len()));
}

#[test]
fn test_remove_key_matches_remove() {
    let hasher = IbfHasher::new(77);
    let mut rng = rng(8);
    let entities = generate(&mut rng, 100);
    let config = FilterConfig::<Entity, _, i64>::new(IdMapping(hasher)).with_hasher(hasher);
    let mut filter = InvertibleBloomFilterBuilder::with_accuracy(10, 0.01)
        .build(config)
        .unwrap();
    for entity in &entities {
        filter.add(entity).unwrap();
    }
    for entity in &entities[..50] {
        filter.remove_key(&entity.id).unwrap();
    }
    for entity in &entities[50..] {
        filter.remove(entity).unwrap();
    }
    assert!(filter.data().is_empty());
}
