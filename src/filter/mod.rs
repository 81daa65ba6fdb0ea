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

//! The top-level learned range filter.
//!
//! A [`RangeFilter`] glues the dense and sparse trie layers with an
//! optional prefix Bloom filter over the residual bit budget. Range queries
//! move a composite iterator to the first trie branch not less than the
//! left bound; a branch that matches the bound exactly defers to the Bloom
//! filter for the bits below the trie depth.

mod serialization;

use std::marker::PhantomData;

use crate::bloom::PrefixBloom;
use crate::key::FilterKey;
use crate::trie::dense::DenseIter;
use crate::trie::dense::DenseLookup;
use crate::trie::sparse::SparseIter;
use crate::trie::DenseLayer;
use crate::trie::SparseLayer;
use crate::trie::TrieBuilder;

/// Outcome of comparing the query iterator against a range bound.
///
/// `Equal` means the dense prefix matched but the comparison must continue
/// in the sparse layer; `CouldBePositive` means the bound matches a stored
/// prefix exactly and only the Bloom filter (or nothing) separates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundCompare {
    Less,
    Equal,
    Greater,
    CouldBePositive,
}

/// An immutable learned range filter over a sorted key set.
///
/// Answers point and range emptiness queries with no false negatives.
/// Construction parameters are usually chosen by [`model`](crate::model::model).
///
/// # Examples
///
/// ```
/// use rangesieve::RangeFilter;
///
/// let keys: Vec<u64> = vec![10, 20, 30, 40];
/// let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);
///
/// assert!(filter.point_query(&30));
/// assert!(!filter.point_query(&15));
/// assert!(filter.range_query(&12, &28));
/// ```
#[derive(Debug)]
pub struct RangeFilter<K: FilterKey> {
    trie_depth: u32,
    sparse_dense_cutoff: u32,
    dense: Option<DenseLayer>,
    sparse: Option<SparseLayer>,
    prefix_filter: Option<PrefixBloom>,
    _key: PhantomData<K>,
}

/// Composite iterator for one range query: the dense iterator hands off to
/// the sparse iterator at the cutoff via `send_out_node_num`.
pub(crate) struct FilterIter {
    dense: Option<DenseIter>,
    sparse: Option<SparseIter>,
}

impl FilterIter {
    fn new<K: FilterKey>(filter: &RangeFilter<K>) -> Self {
        FilterIter {
            dense: filter.dense.as_ref().map(|layer| layer.new_iter()),
            sparse: filter.sparse.as_ref().map(|layer| layer.new_iter()),
        }
    }

    fn is_valid(&self) -> bool {
        match (&self.dense, &self.sparse) {
            (Some(dense), Some(sparse)) => {
                dense.is_valid && (dense.is_complete() || sparse.is_valid)
            }
            (Some(dense), None) => dense.is_valid,
            (None, Some(sparse)) => sparse.is_valid,
            (None, None) => unreachable!("iterator over a filter with no trie"),
        }
    }

    fn prefix_filter_true(&self) -> bool {
        self.dense.as_ref().is_some_and(|d| d.prefix_filter_true)
            || self.sparse.as_ref().is_some_and(|s| s.is_done)
    }

    fn pass_to_sparse(&mut self) {
        let node_num = self.dense.as_ref().expect("no dense iterator").send_out_node_num;
        self.sparse
            .as_mut()
            .expect("no sparse iterator")
            .start_node_num = node_num;
    }
}

impl<K: FilterKey> RangeFilter<K> {
    /// Builds a filter from sorted keys.
    ///
    /// `trie_depth` is in bits, `sparse_dense_cutoff` in byte levels,
    /// `bf_prefix_len` in bits; `bits_per_key` sets the total budget. A
    /// prefix Bloom filter is attached over the bits the trie does not
    /// consume, unless the trie already stores full-resolution fixed-width
    /// keys.
    ///
    /// # Panics
    ///
    /// Panics if `sparse_dense_cutoff * 8 >= trie_depth + 8`, or if
    /// `trie_depth` exceeds the key width for fixed-width keys. Input keys
    /// must be sorted; duplicates are collapsed.
    pub fn build(
        keys: &[K],
        trie_depth: u32,
        sparse_dense_cutoff: u32,
        bf_prefix_len: u32,
        bits_per_key: f64,
    ) -> Self {
        if let Some(width) = K::FIXED_WIDTH_BITS {
            assert!(trie_depth <= width, "trie depth exceeds the key width");
        }
        assert!(
            sparse_dense_cutoff * 8 < trie_depth + 8,
            "sparse/dense cutoff is deeper than the trie"
        );
        debug_assert!(
            keys.windows(2).all(|pair| pair[0] <= pair[1]),
            "input keys must be sorted"
        );

        let total_bits = (bits_per_key * keys.len() as f64).round() as u64;
        let mut filter = RangeFilter {
            trie_depth,
            sparse_dense_cutoff,
            dense: None,
            sparse: None,
            prefix_filter: None,
            _key: PhantomData,
        };

        if trie_depth > 0 {
            let mut builder = TrieBuilder::new(sparse_dense_cutoff, trie_depth);
            builder.build(keys);
            if filter.has_dense() {
                filter.dense = Some(DenseLayer::from_builder(&builder));
            }
            if filter.has_sparse() {
                filter.sparse = Some(SparseLayer::from_builder(&builder));
            }

            // Metadata plus the prefix-filter flag byte count against the
            // budget; the residue goes to the Bloom filter.
            let bits_used = (filter.trie_serialized_size() + 4 + 1) * 8;
            if bits_used < total_bits
                && bf_prefix_len > 0
                && K::FIXED_WIDTH_BITS != Some(trie_depth)
            {
                filter.prefix_filter = Some(K::build_prefix_bloom(
                    keys,
                    bf_prefix_len,
                    total_bits - bits_used,
                ));
            }
        } else if bf_prefix_len > 0 {
            // No trie: the Bloom filter gets the whole budget.
            filter.prefix_filter = Some(K::build_prefix_bloom(keys, bf_prefix_len, total_bits));
        }

        filter
    }

    /// Whether any stored key matches `key`. Never false for a stored key.
    pub fn point_query(&self, key: &K) -> bool {
        if self.trie_depth == 0 {
            return match &self.prefix_filter {
                Some(filter) => key.bloom_contains(filter),
                None => true,
            };
        }

        let prefix_filter = self.prefix_filter.as_ref();
        if let Some(dense) = &self.dense {
            match dense.lookup_key(key, prefix_filter) {
                DenseLookup::Miss => false,
                DenseLookup::Hit => true,
                DenseLookup::Continue(node_num) => self
                    .sparse
                    .as_ref()
                    .expect("descent left the dense levels without a sparse layer")
                    .lookup_key(key, prefix_filter, node_num),
            }
        } else {
            self.sparse
                .as_ref()
                .map_or(true, |sparse| sparse.lookup_key(key, prefix_filter, 0))
        }
    }

    /// Whether any stored key falls in the queried range.
    ///
    /// The right bound is **exclusive for integer keys** and **inclusive
    /// for byte-string keys**; see [`FilterKey::RIGHT_EXCLUSIVE`]. Never
    /// false when the range contains a stored key.
    pub fn range_query(&self, left: &K, right: &K) -> bool {
        if self.trie_depth == 0 {
            return match &self.prefix_filter {
                Some(filter) => K::bloom_range(filter, left, right),
                None => true,
            };
        }

        let prefix_filter = self.prefix_filter.as_ref();
        let mut iter = FilterIter::new(self);

        if let Some(dense) = &self.dense {
            let dense_iter = iter.dense.as_mut().expect("no dense iterator");
            dense.move_to_key_greater_than(left, right, dense_iter, prefix_filter);
            let is_valid = dense_iter.is_valid;
            let is_complete = dense_iter.is_complete();
            let is_search_complete = dense_iter.is_search_complete;
            let is_move_left_complete = dense_iter.is_move_left_complete;
            if !is_valid {
                return false;
            }
            if !is_complete {
                if !is_search_complete && self.sparse.is_some() {
                    iter.pass_to_sparse();
                    let sparse = self.sparse.as_ref().expect("no sparse layer");
                    sparse.move_to_key_greater_than(
                        left,
                        right,
                        iter.sparse.as_mut().expect("no sparse iterator"),
                        prefix_filter,
                    );
                    if !iter.sparse.as_ref().expect("no sparse iterator").is_valid {
                        self.increment_dense_iter(&mut iter);
                    }
                } else if !is_move_left_complete && self.sparse.is_some() {
                    iter.pass_to_sparse();
                    let sparse = self.sparse.as_ref().expect("no sparse layer");
                    sparse.move_to_left_most_key(iter.sparse.as_mut().expect("no sparse iterator"));
                }
            }
        } else if let Some(sparse) = &self.sparse {
            sparse.move_to_key_greater_than(
                left,
                right,
                iter.sparse.as_mut().expect("no sparse iterator"),
                prefix_filter,
            );
        }

        if !iter.is_valid() {
            return false;
        }

        // A prefix-filter hit during the move decides the query.
        if iter.prefix_filter_true() {
            return true;
        }

        let edited_right = match &self.prefix_filter {
            Some(filter) => right.edit(filter.prefix_len(), false),
            None => right.clone(),
        };
        match self.iter_compare(&iter, &edited_right) {
            BoundCompare::Less => true,
            // A full-resolution fixed-width trie compares whole keys, and
            // the right bound is exclusive there.
            BoundCompare::CouldBePositive => K::FIXED_WIDTH_BITS != Some(self.trie_depth),
            BoundCompare::Equal | BoundCompare::Greater => false,
        }
    }

    fn iter_compare(&self, iter: &FilterIter, key: &K) -> BoundCompare {
        let prefix_filter = self.prefix_filter.as_ref();
        if let (Some(dense), Some(dense_iter)) = (&self.dense, &iter.dense) {
            let compare = dense.iter_compare(dense_iter, key, prefix_filter);
            if dense_iter.is_complete() || compare != BoundCompare::Equal {
                return compare;
            }
            return match (&self.sparse, &iter.sparse) {
                (Some(sparse), Some(sparse_iter)) => sparse.iter_compare(
                    sparse_iter,
                    key,
                    prefix_filter,
                    dense_iter.key_bytes(),
                ),
                _ => BoundCompare::CouldBePositive,
            };
        }
        match (&self.sparse, &iter.sparse) {
            (Some(sparse), Some(sparse_iter)) => {
                sparse.iter_compare(sparse_iter, key, prefix_filter, &[])
            }
            _ => unreachable!("comparing an iterator over a filter with no trie"),
        }
    }

    /// Advances the dense iterator and restarts the leftmost descent in the
    /// sparse layer when it crosses the cutoff. Only called when both
    /// layers exist.
    fn increment_dense_iter(&self, iter: &mut FilterIter) {
        let dense = self.dense.as_ref().expect("no dense layer");
        {
            let dense_iter = iter.dense.as_mut().expect("no dense iterator");
            if !dense_iter.is_valid {
                return;
            }
            dense.iter_increment(dense_iter);
            if !dense_iter.is_valid || dense_iter.is_move_left_complete {
                return;
            }
        }
        iter.pass_to_sparse();
        let sparse = self.sparse.as_ref().expect("no sparse layer");
        sparse.move_to_left_most_key(iter.sparse.as_mut().expect("no sparse iterator"));
    }

    fn has_dense(&self) -> bool {
        self.trie_depth > 0 && self.sparse_dense_cutoff > 0
    }

    fn has_sparse(&self) -> bool {
        self.trie_depth > 0 && self.sparse_dense_cutoff < self.trie_depth.div_ceil(8)
    }

    pub fn trie_depth(&self) -> u32 {
        self.trie_depth
    }

    pub fn sparse_dense_cutoff(&self) -> u32 {
        self.sparse_dense_cutoff
    }

    /// Trie height in byte levels.
    pub fn height(&self) -> u32 {
        self.sparse
            .as_ref()
            .map(|sparse| sparse.height())
            .or_else(|| self.dense.as_ref().map(|dense| dense.height()))
            .unwrap_or(0)
    }

    /// First byte level encoded sparse.
    pub fn sparse_start_level(&self) -> u32 {
        self.sparse.as_ref().map_or(0, |sparse| sparse.start_level())
    }

    pub fn prefix_filter(&self) -> Option<&PrefixBloom> {
        self.prefix_filter.as_ref()
    }

    /// Size in bytes of the serialized trie blocks.
    pub fn trie_serialized_size(&self) -> u64 {
        let dense = self.dense.as_ref().map_or(0, |d| d.serialized_size());
        let sparse = self.sparse.as_ref().map_or(0, |s| s.serialized_size());
        dense + sparse
    }

    /// Approximate in-memory footprint in bytes, excluding the prefix
    /// filter's seeds.
    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.dense.as_ref().map_or(0, |d| d.memory_usage())
            + self.sparse.as_ref().map_or(0, |s| s.memory_usage())
            + self
                .prefix_filter
                .as_ref()
                .map_or(0, |f| (f.num_bits() / 8) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_only_point_queries() {
        let keys: Vec<u64> = vec![10, 20, 30, 40];
        let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);
        for &key in &keys {
            assert!(filter.point_query(&key));
        }
        assert!(!filter.point_query(&15));
        assert!(!filter.point_query(&41));
    }

    #[test]
    fn test_dense_only_point_queries() {
        let keys: Vec<u64> = vec![
            0x0102_0000_0000_0000,
            0x0103_0000_0000_0000,
            0x0203_0000_0000_0000,
        ];
        let filter = RangeFilter::build(&keys, 16, 2, 0, 20.0);
        assert!(filter.dense.is_some());
        assert!(filter.sparse.is_none());
        for &key in &keys {
            assert!(filter.point_query(&key));
        }
        assert!(!filter.point_query(&0x0104_0000_0000_0000));
    }

    #[test]
    fn test_mixed_layer_range_query() {
        let keys: Vec<u64> = (0..256u64).map(|i| i << 40 | 0xAB << 32).collect();
        let filter = RangeFilter::build(&keys, 24, 1, 0, 20.0);
        assert!(filter.dense.is_some());
        assert!(filter.sparse.is_some());
        for &key in &keys {
            assert!(filter.point_query(&key));
            assert!(filter.range_query(&key, &(key + 1)));
        }
    }

    #[test]
    fn test_full_trie_right_bound_exclusive() {
        let keys: Vec<u64> = vec![10, 20, 30, 40];
        let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);
        assert!(filter.range_query(&12, &28));
        // [21, 30) excludes 30 and the full-resolution trie knows it.
        assert!(!filter.range_query(&21, &30));
        assert!(filter.range_query(&21, &31));
    }

    #[test]
    #[should_panic(expected = "sparse/dense cutoff is deeper than the trie")]
    fn test_invalid_cutoff_panics() {
        let keys: Vec<u64> = vec![1, 2];
        let _ = RangeFilter::build(&keys, 8, 2, 0, 20.0);
    }
}
