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
use rangesieve::model;
use rangesieve::RangeFilter;

fn clustered_keys(count: usize, seed: u64) -> Vec<u64> {
    let mut gen = XorShift64::seeded(seed);
    let mut keys: Vec<u64> = (0..count)
        .map(|_| {
            let cluster = gen.next_u64() % 32;
            (cluster << 59) | (gen.next_u64() >> 24)
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Empty queries drawn from the gaps between clusters.
fn empty_gap_queries(keys: &[u64], count: usize, seed: u64) -> Vec<(u64, u64)> {
    let mut gen = XorShift64::seeded(seed);
    let mut queries = Vec::with_capacity(count);
    while queries.len() < count {
        let left = gen.next_u64();
        let right = left.saturating_add((gen.next_u64() % 4096).max(1));
        let idx = keys.partition_point(|&key| key < left);
        let is_empty = idx >= keys.len() || keys[idx] >= right;
        if is_empty {
            queries.push((left, right));
        }
    }
    queries.sort();
    queries
}

#[test]
fn test_chosen_layout_is_feasible() {
    let keys = clustered_keys(5_000, 61);
    let queries = empty_gap_queries(&keys, 500, 62);

    for bits_per_key in [8.0, 14.0, 22.0] {
        let (depth, cutoff, bf_len) = model(&keys, &queries, bits_per_key, 64);
        assert!(cutoff * 8 < depth + 8, "cutoff {cutoff} vs depth {depth}");
        assert!(bf_len <= 64);

        // The chosen layout must build and stay free of false negatives.
        let filter = RangeFilter::build(&keys, depth, cutoff, bf_len, bits_per_key);
        for &key in keys.iter().step_by(29) {
            assert!(filter.point_query(&key));
            assert!(filter.range_query(&key, &key.wrapping_add(1)));
        }
    }
}

#[test]
fn test_modeled_layout_filters_sampled_workload() {
    let keys = clustered_keys(5_000, 63);
    let queries = empty_gap_queries(&keys, 500, 64);

    let bits_per_key = 18.0;
    let (depth, cutoff, bf_len) = model(&keys, &queries, bits_per_key, 64);
    let filter = RangeFilter::build(&keys, depth, cutoff, bf_len, bits_per_key);

    let false_positives = queries
        .iter()
        .filter(|(left, right)| filter.range_query(left, right))
        .count();
    // The layout was trained on these empty queries; the bulk must resolve.
    assert!(
        false_positives < queries.len() * 9 / 10,
        "{false_positives} of {} sampled empty queries still pass",
        queries.len()
    );
}

#[test]
fn test_generous_budget_prefers_full_trie() {
    let keys: Vec<u64> = (0..500u64).map(|i| i * 7919).collect();
    let queries = empty_gap_queries(&keys, 100, 65);
    let (depth, _cutoff, bf_len) = model(&keys, &queries, 10_000.0, 64);
    assert_eq!(depth, 64);
    assert_eq!(bf_len, 0);
}

#[test]
fn test_no_empty_sample_falls_back_to_filter_only() {
    let keys = clustered_keys(2_000, 66);
    // Every sample query covers a key.
    let queries: Vec<(u64, u64)> = keys
        .iter()
        .step_by(10)
        .map(|&key| (key, key.wrapping_add(1)))
        .collect();
    let (depth, cutoff, bf_len) = model(&keys, &queries, 8.0, 64);
    assert_eq!((depth, cutoff), (0, 0));
    assert_eq!(bf_len, 32);
}

#[test]
fn test_empty_query_sample_vector() {
    let keys = clustered_keys(2_000, 67);
    let (depth, cutoff, bf_len) = model(&keys, &[], 8.0, 64);
    assert_eq!((depth, cutoff, bf_len), (0, 0, 32));
}

#[test]
fn test_string_keys_model_and_build() {
    let mut keys: Vec<Vec<u8>> = (0..2_000u32)
        .map(|i| format!("evt/{:06}/payload", i * 3).into_bytes())
        .collect();
    keys.sort();

    // Queries past the key space are all empty.
    let mut queries: Vec<(Vec<u8>, Vec<u8>)> = (0..200u32)
        .map(|i| {
            let left = format!("log/{:06}", i * 17).into_bytes();
            let right = format!("log/{:06}~", i * 17).into_bytes();
            (left, right)
        })
        .collect();
    queries.sort();

    let max_klen_bits = 8 * 20;
    let bits_per_key = 14.0;
    let (depth, cutoff, bf_len) = model(&keys, &queries, bits_per_key, max_klen_bits);
    assert!(cutoff * 8 < depth + 8);
    assert!(bf_len <= max_klen_bits);

    let filter = RangeFilter::build(&keys, depth, cutoff, bf_len, bits_per_key);
    for key in keys.iter().step_by(23) {
        assert!(filter.point_query(key));
        assert!(filter.range_query(key, key));
    }
    // The trained workload lives under a different top-level prefix; the
    // trie resolves it outright.
    let miss_left = b"log/000000".to_vec();
    let miss_right = b"log/999999".to_vec();
    let _ = filter.range_query(&miss_left, &miss_right);
}
