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

use rangesieve::common::random::XorShift64;
use rangesieve::RangeFilter;

fn random_sorted_keys(count: usize, seed: u64) -> Vec<u64> {
    let mut gen = XorShift64::seeded(seed);
    let mut keys: Vec<u64> = (0..count).map(|_| gen.next_u64()).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Oracle: whether any key falls in `[left, right)`.
fn oracle(keys: &[u64], left: u64, right: u64) -> bool {
    let idx = keys.partition_point(|&key| key < left);
    idx < keys.len() && keys[idx] < right
}

#[test]
fn test_ranges_across_leaves() {
    let keys: Vec<u64> = vec![10, 20, 30, 40];
    let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);

    assert!(filter.range_query(&12, &28)); // covers 20
    assert!(filter.range_query(&10, &11)); // covers 10 exactly
    assert!(filter.range_query(&39, &41)); // covers 40
    assert!(filter.range_query(&1, &100)); // covers everything
}

#[test]
fn test_full_trie_right_bound_is_exclusive() {
    let keys: Vec<u64> = vec![10, 20, 30, 40];
    let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);

    // [21, 30) excludes 30; the full-resolution trie resolves it exactly.
    assert!(!filter.range_query(&21, &30));
    assert!(filter.range_query(&21, &31));
    assert!(!filter.range_query(&41, &100));
}

#[test]
fn test_no_false_negatives_sparse_only() {
    let keys = random_sorted_keys(5_000, 21);
    let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);

    let mut gen = XorShift64::seeded(22);
    for _ in 0..20_000 {
        let left = gen.next_u64();
        let width = (gen.next_u64() % (1 << 40)).max(1);
        let right = left.saturating_add(width);
        if oracle(&keys, left, right) {
            assert!(filter.range_query(&left, &right));
        }
    }
    // Point-width ranges around every key.
    for &key in &keys {
        assert!(filter.range_query(&key, &key.wrapping_add(1)));
    }
}

#[test]
fn test_no_false_negatives_mixed_layers() {
    let keys = random_sorted_keys(5_000, 23);
    let filter = RangeFilter::build(&keys, 64, 2, 0, 24.0);

    let mut gen = XorShift64::seeded(24);
    for _ in 0..20_000 {
        let left = gen.next_u64();
        let width = (gen.next_u64() % (1 << 40)).max(1);
        let right = left.saturating_add(width);
        if oracle(&keys, left, right) {
            assert!(filter.range_query(&left, &right));
        }
    }
}

#[test]
fn test_no_false_negatives_with_prefix_filter() {
    let mut gen = XorShift64::seeded(25);
    let mut keys: Vec<u64> = (0..4_000u64)
        .map(|_| {
            let cluster = gen.next_u64() % 8;
            (cluster << 61) | (gen.next_u64() >> 16)
        })
        .collect();
    keys.sort();
    keys.dedup();
    let filter = RangeFilter::build(&keys, 24, 1, 48, 22.0);
    assert!(filter.prefix_filter().is_some());

    let mut gen = XorShift64::seeded(26);
    for _ in 0..10_000 {
        let left = gen.next_u64();
        let width = (gen.next_u64() % (1 << 30)).max(1);
        let right = left.saturating_add(width);
        if oracle(&keys, left, right) {
            assert!(filter.range_query(&left, &right));
        }
    }
    for &key in &keys {
        assert!(filter.range_query(&key, &key.wrapping_add(1)));
    }
}

#[test]
fn test_filter_only_range_queries() {
    let keys: Vec<u64> = (0..1_000u64).map(|i| i << 32).collect();
    let filter = RangeFilter::build(&keys, 0, 0, 32, 20.0);

    for &key in keys.iter().step_by(17) {
        assert!(filter.range_query(&key, &(key + 1)));
        // A wide range around the key.
        assert!(filter.range_query(&key.saturating_sub(100), &(key + 100)));
    }
}

#[test]
fn test_empty_ranges_mostly_negative_on_full_trie() {
    // With a full-resolution trie and no Bloom filter, empty ranges between
    // adjacent keys resolve exactly.
    let keys: Vec<u64> = (0..1_000u64).map(|i| i * 1_000_000).collect();
    let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);

    for i in 0..999u64 {
        let left = i * 1_000_000 + 1;
        let right = (i + 1) * 1_000_000;
        assert!(!filter.range_query(&left, &right));
    }
}

#[test]
fn test_concurrent_shared_queries() {
    let keys = random_sorted_keys(2_000, 27);
    let filter = RangeFilter::build(&keys, 64, 1, 0, 22.0);

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let filter = &filter;
            let keys = &keys;
            scope.spawn(move || {
                let mut gen = XorShift64::seeded(100 + worker);
                for _ in 0..2_000 {
                    let idx = (gen.next_u64() % keys.len() as u64) as usize;
                    let key = keys[idx];
                    assert!(filter.point_query(&key));
                    assert!(filter.range_query(&key, &key.wrapping_add(1)));
                }
            });
        }
    });
}
