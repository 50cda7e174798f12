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
use common::rng;
use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::lt;
use ibfsketch::error::ErrorKind;
use ibfsketch::ibf::CompressionStrategy;
use ibfsketch::ibf::EntityMapping;
use ibfsketch::ibf::FilterConfig;
use ibfsketch::ibf::InvertibleBloomFilter;
use ibfsketch::ibf::InvertibleBloomFilterBuilder;
use ibfsketch::ibf::InvertibleBloomFilterData;
use ibfsketch::minwise::BitMinwiseHashEstimatorData;
use ibfsketch::strata::StrataEstimatorBuilder;
use ibfsketch::strata::StrataEstimatorData;
use insta::assert_snapshot;

fn filled<M: EntityMapping<Entity, Id = u64, Hash = u32>>(
    builder: InvertibleBloomFilterBuilder,
    mapping: M,
    entities: &[Entity],
) -> InvertibleBloomFilter<Entity, M, i32> {
    let mut filter = builder.build(FilterConfig::new(mapping)).unwrap();
    for entity in entities {
        filter.add(entity).unwrap();
    }
    filter
}

#[test]
fn test_sparse_filter_is_smaller() {
    let mut rng = rng(41);
    let entities = generate(&mut rng, 20);
    let filter = filled(
        InvertibleBloomFilterBuilder::with_accuracy(1_000, 0.01),
        IdMapping::default(),
        &entities,
    );
    let data = filter.extract();

    let sparse = data.serialize();
    let dense = data.serialize_with(CompressionStrategy::Dense);
    assert_that!(sparse.len(), lt(dense.len() / 4));

    let config = FilterConfig::<Entity, _, i32>::new(IdMapping::default())
        .with_compression(CompressionStrategy::Dense);
    let dense_filter = InvertibleBloomFilter::from_data(config, data.clone()).unwrap();
    assert_eq!(dense_filter.serialize(), dense);
    assert_eq!(filter.serialize(), sparse);

    for bytes in [sparse, dense] {
        let restored = InvertibleBloomFilterData::<u64, u32, i32>::deserialize(&bytes).unwrap();
        assert_eq!(restored, data);
    }
}

#[test]
fn test_hybrid_filter_round_trip() {
    let mut rng = rng(42);
    let entities = generate(&mut rng, 500);
    let filter = filled(
        InvertibleBloomFilterBuilder::with_accuracy(100, 0.01)
            .hybrid()
            .split_by_hash(true),
        ValueMapping::default(),
        &entities,
    );
    let data = filter.extract();
    let restored = InvertibleBloomFilterData::deserialize(&data.serialize()).unwrap();
    assert_eq!(restored, data);
    assert!(restored.sub_filter().unwrap().is_reverse());
    assert!(restored.is_split_by_hash());

    let config = FilterConfig::<Entity, _, i32>::new(ValueMapping::default());
    let rebuilt = InvertibleBloomFilter::from_data(config, restored).unwrap();
    assert!(rebuilt.contains(&entities[0]));
}

#[test]
fn test_rejects_other_widths() {
    let filter = filled(
        InvertibleBloomFilterBuilder::with_accuracy(10, 0.01),
        IdMapping::default(),
        &[],
    );
    let bytes = filter.extract().serialize();
    let err = InvertibleBloomFilterData::<u64, u64, i32>::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    let err = InvertibleBloomFilterData::<u64, u32, i16>::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn test_rejects_other_families() {
    let strata = StrataEstimatorBuilder::new(16).build::<Entity, _>(IdMapping::default());
    let bytes = strata.extract().serialize();
    let err = InvertibleBloomFilterData::<u64, u32, i32>::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => invalid family: expected 40 (IBF), got 41");

    let err = BitMinwiseHashEstimatorData::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData => invalid family: expected 42 (MINWISE), got 41");
}

#[test]
fn test_truncated_bytes() {
    let mut rng = rng(43);
    let entities = generate(&mut rng, 50);
    let mut strata = StrataEstimatorBuilder::new(16).build(IdMapping::default());
    for entity in &entities {
        strata.add(entity);
    }
    let bytes = strata.extract().serialize();
    for len in [0, 3, 10, bytes.len() / 2, bytes.len() - 1] {
        let err = StrataEstimatorData::deserialize(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_that!(err.message(), contains_substring("insufficient data"));
    }
}

#[test]
fn test_rejects_trailing_bytes() {
    let mut rng = rng(44);
    let entities = generate(&mut rng, 30);
    let filter = filled(
        InvertibleBloomFilterBuilder::with_accuracy(50, 0.01).hybrid(),
        ValueMapping::default(),
        &entities,
    );
    let mut bytes = filter.serialize();
    bytes.push(0);
    let err = InvertibleBloomFilterData::<u64, u32, i32>::deserialize(&bytes).unwrap_err();
    assert_snapshot!(err, @"InvalidData, context: { remaining: 1 } => trailing bytes after filter data");

    let mut strata = StrataEstimatorBuilder::new(16).build(IdMapping::default());
    for entity in &entities {
        strata.add(entity);
    }
    let mut bytes = strata.extract().serialize();
    bytes.extend_from_slice(&[1, 2, 3]);
    let err = StrataEstimatorData::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert_that!(err.message(), contains_substring("trailing bytes"));
}
