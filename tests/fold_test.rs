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
use common::generate;
use common::mutate;
use common::rng;
use googletest::assert_that;
use googletest::prelude::eq;
use ibfsketch::error::ErrorKind;
use ibfsketch::ibf::FilterConfig;
use ibfsketch::ibf::FoldingStrategy;
use ibfsketch::ibf::InvertibleBloomFilter;
use ibfsketch::ibf::InvertibleBloomFilterBuilder;

fn filled(builder: InvertibleBloomFilterBuilder, entities: &[Entity]) -> Filter {
    filled_with(builder, entities, FoldingStrategy::default())
}

type Filter = InvertibleBloomFilter<Entity, IdMapping, i32>;

fn filled_with(
    builder: InvertibleBloomFilterBuilder,
    entities: &[Entity],
    folding: FoldingStrategy,
) -> Filter {
    let config = FilterConfig::new(IdMapping::default()).with_folding(folding);
    let mut filter = builder.build(config).unwrap();
    for entity in entities {
        filter.add(entity).unwrap();
    }
    filter
}

#[test]
fn test_fold_chain_equals_single_fold() {
    let mut rng = rng(11);
    let entities = generate(&mut rng, 400);
    for split in [false, true] {
        let filter = filled(
            InvertibleBloomFilterBuilder::with_block_size(360).split_by_hash(split),
            &entities,
        );
        let chained = filter.fold(3).unwrap().fold(4).unwrap();
        let direct = filter.fold(12).unwrap();
        assert_eq!(chained, direct);
        assert_eq!(direct.block_size(), 30);
        assert_eq!(direct.item_count(), 400);

        let other_order = filter.fold(6).unwrap().fold(2).unwrap();
        assert_eq!(other_order, direct);
    }
}

#[test]
fn test_fold_rejects_non_divisors() {
    let filter = filled(InvertibleBloomFilterBuilder::with_block_size(360), &[]);
    assert_eq!(filter.fold(7).unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(filter.fold(0).unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_subtract_folds_to_common_size() {
    let mut rng = rng(12);
    let a = generate(&mut rng, 1_000);
    let (b, changes) = mutate(&mut rng, &a, 15, 15, 0);

    let large = filled(InvertibleBloomFilterBuilder::with_block_size(360), &a);
    let small = filled(InvertibleBloomFilterBuilder::with_block_size(120), &b);

    let result = large.subtract_and_decode(&small.extract()).unwrap();
    assert!(result.is_complete());
    assert_that!(result.only_in_a(), eq(&changes.only_in_a));
    assert_that!(result.only_in_b(), eq(&changes.only_in_b));

    // 360 and 96 still meet at 24 cells, even if that is too small to decode.
    let odd = filled(InvertibleBloomFilterBuilder::with_block_size(96), &b);
    assert!(large.subtract_and_decode(&odd.extract()).is_ok());
}

#[test]
fn test_subtract_rejects_coprime_sizes() {
    let mut rng = rng(16);
    let a = generate(&mut rng, 50);
    let prime = filled(InvertibleBloomFilterBuilder::with_block_size(97), &a);
    let other = filled(InvertibleBloomFilterBuilder::with_block_size(120), &a);

    let err = prime.subtract_and_decode(&other.extract()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = other.subtract_and_decode(&prime.extract()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_disabled_folding_requires_equal_sizes() {
    let large = filled_with(
        InvertibleBloomFilterBuilder::with_block_size(360),
        &[],
        FoldingStrategy::Disabled,
    );
    let small = filled_with(
        InvertibleBloomFilterBuilder::with_block_size(120),
        &[],
        FoldingStrategy::Disabled,
    );
    let err = large.subtract_and_decode(&small.extract()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_compressed_filter_still_decodes() {
    let mut rng = rng(13);
    let a = generate(&mut rng, 10);
    let (b, changes) = mutate(&mut rng, &a, 2, 2, 0);

    let builder = InvertibleBloomFilterBuilder::with_accuracy(1_000, 0.01);
    let mut sender = filled(builder.clone(), &a);
    let receiver = filled(builder, &b);

    let before = sender.block_size();
    let compressed = sender.compress(true).unwrap();
    assert!(compressed.block_size() < before);
    assert_eq!(before % compressed.block_size(), 0);

    let result = receiver.subtract_and_decode(&compressed).unwrap();
    assert!(result.is_complete());
    assert_that!(result.only_in_a(), eq(&changes.only_in_b));
    assert_that!(result.only_in_b(), eq(&changes.only_in_a));
}

#[test]
fn test_compress_is_idempotent() {
    let mut rng = rng(14);
    let entities = generate(&mut rng, 10);
    let mut filter = filled(InvertibleBloomFilterBuilder::with_accuracy(1_000, 0.01), &entities);
    assert!(filter.compress(true).is_some());

    let minimal = filter.extract();
    assert!(filter.compress(true).is_none());
    assert_eq!(filter.extract(), minimal);
}

#[test]
fn test_full_filter_does_not_compress() {
    let mut rng = rng(15);
    let entities = generate(&mut rng, 500);
    let mut filter = filled(InvertibleBloomFilterBuilder::with_block_size(64), &entities);
    let before = filter.extract();
    assert!(filter.compress(true).is_none());
    assert_eq!(filter.extract(), before);
}
