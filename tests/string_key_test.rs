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

fn bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

#[test]
fn test_exact_string_ranges() {
    let keys = vec![bytes("aaa"), bytes("abc"), bytes("azz")];
    let filter = RangeFilter::build(&keys, 24, 1, 0, 20.0);

    // Both bounds are inclusive for byte strings.
    assert!(filter.range_query(&bytes("aa"), &bytes("ab"))); // covers "aaa"
    assert!(filter.range_query(&bytes("abc"), &bytes("abc")));
    assert!(filter.range_query(&bytes("ab"), &bytes("b")));
    assert!(!filter.range_query(&bytes("b"), &bytes("c")));
}

#[test]
fn test_string_point_queries() {
    let keys = vec![bytes("aaa"), bytes("abc"), bytes("azz")];
    let filter = RangeFilter::build(&keys, 24, 0, 0, 20.0);

    for key in &keys {
        assert!(filter.point_query(key));
    }
    assert!(!filter.point_query(&bytes("abd")));
    assert!(!filter.point_query(&bytes("zzz")));
}

#[test]
fn test_short_keys_are_zero_padded() {
    let keys = vec![bytes("a"), bytes("ab")];
    let filter = RangeFilter::build(&keys, 24, 0, 0, 20.0);

    assert!(filter.point_query(&bytes("a")));
    assert!(filter.point_query(&bytes("ab")));
    assert!(filter.range_query(&bytes("a"), &bytes("b")));
}

#[test]
fn test_single_key_inclusive_bounds() {
    let keys = vec![bytes("aaa")];
    let filter = RangeFilter::build(&keys, 24, 0, 0, 20.0);

    assert!(filter.range_query(&bytes("aaa"), &bytes("aaa")));
    assert!(filter.range_query(&bytes("aa"), &bytes("aab")));
    assert!(!filter.range_query(&bytes("aab"), &bytes("aay")));
}

#[test]
fn test_string_trie_with_prefix_filter() {
    let mut keys: Vec<Vec<u8>> = (0..2_000u32)
        .map(|i| format!("order:{:010}", i * 7).into_bytes())
        .collect();
    keys.sort();

    let filter = RangeFilter::build(&keys, 48, 2, 96, 18.0);
    assert!(filter.prefix_filter().is_some());

    for key in &keys {
        assert!(filter.point_query(key));
        assert!(filter.range_query(key, key));
    }
}

#[test]
fn test_no_false_negatives_random_strings() {
    let mut gen = XorShift64::seeded(31);
    let mut keys: Vec<Vec<u8>> = (0..3_000)
        .map(|_| {
            let len = 4 + (gen.next_u64() % 8) as usize;
            (0..len).map(|_| (gen.next_u64() % 26) as u8 + b'a').collect()
        })
        .collect();
    keys.sort();
    keys.dedup();

    let filter = RangeFilter::build(&keys, 40, 1, 80, 20.0);
    for key in &keys {
        assert!(filter.point_query(key));
        assert!(filter.range_query(key, key));
    }

    // Ranges spanning adjacent keys must hit.
    for pair in keys.windows(2) {
        assert!(filter.range_query(&pair[0], &pair[1]));
    }
}

#[test]
fn test_deep_string_trie_without_filter() {
    let keys = vec![
        bytes("shared-00001"),
        bytes("shared-00002"),
        bytes("shared-99999"),
    ];
    // 160-bit trie: the leaf that diverges at byte 7 carries a 96-bit
    // suffix.
    let filter = RangeFilter::build(&keys, 160, 0, 0, 400.0);

    for key in &keys {
        assert!(filter.point_query(key));
    }
    assert!(!filter.point_query(&bytes("shared-99998")));
    assert!(!filter.point_query(&bytes("shared-00003")));
    assert!(filter.range_query(&bytes("shared-0"), &bytes("shared-1")));
    assert!(!filter.range_query(&bytes("shared-5"), &bytes("shared-8")));
}
