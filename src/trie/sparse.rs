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

use std::io;

use crate::bits::labels::LabelVector;
use crate::bits::rank::RankBitVector;
use crate::bits::select::SelectBitVector;
use crate::bits::suffix::SuffixCompare;
use crate::bits::suffix::SuffixVector;
use crate::bloom::PrefixBloom;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::filter::BoundCompare;
use crate::key::FilterKey;
use crate::trie::builder::TrieBuilder;

/// The LOUDS-encoded bottom levels of the trie, starting at byte level
/// `start_level`.
///
/// A node is a run of sorted label bytes with a parallel child-indicator bit
/// per label and a LOUDS bit set only at the node's first label. Node
/// boundaries come from select-1 over the LOUDS bits; a node's size is the
/// distance to the next set LOUDS bit.
#[derive(Debug)]
pub struct SparseLayer {
    height: u32,
    start_level: u32,
    /// Number of trie nodes in the dense encoding above this layer.
    node_count_dense: u32,
    /// Number of children (set child-indicator bits) in the dense encoding.
    child_count_dense: u32,
    trie_depth: u32,
    labels: LabelVector,
    child_indicator_bits: RankBitVector,
    louds_bits: SelectBitVector,
    suffixes: SuffixVector,
}

/// Iterator state over the sparse levels. `is_done` means a prefix-filter
/// hit already decided the range query positively.
pub(crate) struct SparseIter {
    pub(crate) is_valid: bool,
    pub(crate) is_done: bool,
    pub(crate) start_node_num: u32,
    key_len: u32,
    key: Vec<u8>,
    pos_in_trie: Vec<u32>,
}

impl SparseIter {
    pub(crate) fn new(start_level: u32, height: u32) -> Self {
        let levels = height.saturating_sub(start_level) as usize;
        SparseIter {
            is_valid: false,
            is_done: false,
            start_node_num: 0,
            key_len: 0,
            key: vec![0; levels],
            pos_in_trie: vec![0; levels],
        }
    }

    /// The key bytes accumulated from `start_level` down, without a suffix.
    pub(crate) fn key_bytes(&self) -> &[u8] {
        if self.is_valid {
            &self.key[..self.key_len as usize]
        } else {
            &[]
        }
    }

    fn append(&mut self, label: u8, pos: u32) {
        let idx = self.key_len as usize;
        self.key[idx] = label;
        self.pos_in_trie[idx] = pos;
        self.key_len += 1;
    }

    fn set(&mut self, level: u32, label: u8, pos: u32) {
        let idx = level as usize;
        self.key[idx] = label;
        self.pos_in_trie[idx] = pos;
    }
}

impl SparseLayer {
    pub(crate) fn from_builder(builder: &TrieBuilder) -> Self {
        let height = builder.tree_height();
        let start_level = builder.sparse_dense_cutoff().min(height);
        let trie_depth = builder.trie_depth();

        let node_count_dense: u32 = builder.node_counts()[..start_level as usize].iter().sum();
        let child_count_dense = if start_level == 0 || start_level >= height {
            0
        } else {
            node_count_dense + builder.node_counts()[start_level as usize] - 1
        };

        let labels = LabelVector::from_levels(builder.labels(), start_level as usize, height as usize);

        let mut num_items_per_level = Vec::with_capacity(height as usize);
        for level in 0..height as usize {
            num_items_per_level.push(builder.labels()[level].len() as u32);
        }
        let child_indicator_bits = RankBitVector::from_levels(
            builder.child_indicator_bits(),
            &num_items_per_level,
            start_level as usize,
            height as usize,
        );
        let louds_bits = SelectBitVector::from_levels(
            builder.louds_bits(),
            &num_items_per_level,
            start_level as usize,
            height as usize,
        );

        let mut num_suffix_bits_per_level = Vec::with_capacity(height as usize);
        let mut num_suffixes_per_level = Vec::with_capacity(height as usize);
        for level in 0..height {
            let count = builder.suffix_counts()[level as usize];
            num_suffix_bits_per_level.push(count * builder.suffix_len_at(level + 1));
            num_suffixes_per_level.push(count);
        }
        let suffixes = SuffixVector::from_levels(
            builder.suffixes(),
            &num_suffix_bits_per_level,
            &num_suffixes_per_level,
            start_level as usize,
            height as usize,
        );

        SparseLayer {
            height,
            start_level,
            node_count_dense,
            child_count_dense,
            trie_depth,
            labels,
            child_indicator_bits,
            louds_bits,
            suffixes,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn start_level(&self) -> u32 {
        self.start_level
    }

    pub(crate) fn new_iter(&self) -> SparseIter {
        SparseIter::new(self.start_level, self.height)
    }

    /// Point lookup starting at `in_node_num` (0 when there is no dense
    /// layer above).
    pub(crate) fn lookup_key<K: FilterKey>(
        &self,
        key: &K,
        prefix_filter: Option<&PrefixBloom>,
        in_node_num: u32,
    ) -> bool {
        let truncated = key.trie_bytes(self.trie_depth);
        let mut node_num = in_node_num;
        let mut pos = self.first_label_pos(node_num);
        for level in self.start_level..truncated.len() as u32 {
            let node_size = self.node_size(pos);
            match self
                .labels
                .search(truncated[level as usize], pos, node_size)
            {
                None => return false,
                Some(found) => {
                    // A clear child indicator terminates the branch.
                    if !self.child_indicator_bits.read_bit(found) {
                        return self.suffixes.check_equality(
                            self.suffix_pos(found),
                            &truncated,
                            level + 1,
                            self.trie_depth,
                        ) && prefix_filter.map_or(true, |f| key.bloom_contains(f));
                    }
                    node_num = self.child_node_num(found);
                    pos = self.first_label_pos(node_num);
                }
            }
        }
        false
    }

    /// Moves `iter` to the first trie branch not less than `lq` within the
    /// sparse levels, starting from `iter.start_node_num`.
    pub(crate) fn move_to_key_greater_than<K: FilterKey>(
        &self,
        lq: &K,
        rq: &K,
        iter: &mut SparseIter,
        prefix_filter: Option<&PrefixBloom>,
    ) -> bool {
        let edited_lq = lq.trie_bytes(self.trie_depth);
        let mut node_num = iter.start_node_num;
        let mut pos = self.first_label_pos(node_num);

        for level in self.start_level..edited_lq.len() as u32 {
            let node_size = self.node_size(pos);
            let query_label = edited_lq[level as usize];

            match self.labels.search(query_label, pos, node_size) {
                None => {
                    self.move_to_left_in_next_subtrie(pos, node_size, query_label, iter);
                    return false;
                }
                Some(found) => {
                    iter.append(query_label, found);

                    if !self.child_indicator_bits.read_bit(found) {
                        return self.compare_suffix_greater_than(
                            found,
                            level + 1,
                            lq,
                            rq,
                            &edited_lq,
                            iter,
                            prefix_filter,
                        );
                    }

                    node_num = self.child_node_num(found);
                    pos = self.first_label_pos(node_num);
                }
            }
        }

        self.move_to_left_most_key(iter);
        false
    }

    fn move_to_left_in_next_subtrie(
        &self,
        pos: u32,
        node_size: u32,
        label: u8,
        iter: &mut SparseIter,
    ) {
        match self.labels.search_greater_than(label, pos, node_size) {
            None => {
                // No greater label in this node: advance past it.
                let last = pos + node_size - 1;
                iter.append(self.labels.read(last), last);
                self.iter_increment(iter);
            }
            Some(found) => {
                iter.append(self.labels.read(found), found);
                self.move_to_left_most_key(iter);
            }
        }
    }

    fn compare_suffix_greater_than<K: FilterKey>(
        &self,
        pos: u32,
        level: u32,
        lq: &K,
        rq: &K,
        edited_lq: &[u8],
        iter: &mut SparseIter,
        prefix_filter: Option<&PrefixBloom>,
    ) -> bool {
        match self
            .suffixes
            .compare(self.suffix_pos(pos), edited_lq, level, self.trie_depth)
        {
            SuffixCompare::Less => {
                // The left bound is beyond this branch; advance.
                self.iter_increment(iter);
                false
            }
            SuffixCompare::Greater => {
                iter.is_valid = true;
                true
            }
            SuffixCompare::CouldBePositive => match prefix_filter {
                None => {
                    iter.is_valid = true;
                    true
                }
                Some(filter) => {
                    if K::bloom_branch_query(filter, lq, rq, edited_lq, self.trie_depth) {
                        iter.is_done = true;
                        iter.is_valid = true;
                        true
                    } else {
                        self.iter_increment(iter);
                        false
                    }
                }
            },
        }
    }

    /// Compares the iterator's current key (prefixed by the dense layer's
    /// accumulated bytes) against `key`.
    pub(crate) fn iter_compare<K: FilterKey>(
        &self,
        iter: &SparseIter,
        key: &K,
        prefix_filter: Option<&PrefixBloom>,
        dense_prefix: &[u8],
    ) -> BoundCompare {
        let skey = key.stringify();
        let iter_key = iter.key_bytes();
        let key_sparse = &skey[(self.start_level as usize).min(skey.len())..];
        let key_sparse_same_length = &key_sparse[..iter_key.len().min(key_sparse.len())];
        match iter_key.cmp(key_sparse_same_length) {
            std::cmp::Ordering::Less => return BoundCompare::Less,
            std::cmp::Ordering::Greater => return BoundCompare::Greater,
            std::cmp::Ordering::Equal => {}
        }

        let suffix_pos = self.suffix_pos(iter.pos_in_trie[(iter.key_len - 1) as usize]);
        let suffix_level = self.start_level + iter_key.len() as u32;
        match self
            .suffixes
            .compare(suffix_pos, &skey, suffix_level, self.trie_depth)
        {
            SuffixCompare::Less => BoundCompare::Less,
            SuffixCompare::Greater => BoundCompare::Greater,
            SuffixCompare::CouldBePositive => match prefix_filter {
                None => BoundCompare::CouldBePositive,
                Some(filter) => {
                    let mut lower = dense_prefix.to_vec();
                    lower.extend_from_slice(iter_key);
                    if K::bloom_range_with_lower_bytes(filter, lower, key) {
                        BoundCompare::CouldBePositive
                    } else {
                        BoundCompare::Greater
                    }
                }
            },
        }
    }

    /// Advances to the next leaf: forward within the node, popping up a
    /// level at node boundaries, then descending leftmost.
    pub(crate) fn iter_increment(&self, iter: &mut SparseIter) {
        debug_assert!(iter.key_len > 0);
        let mut pos = iter.pos_in_trie[(iter.key_len - 1) as usize] + 1;
        while pos >= self.louds_bits.num_bits() || self.louds_bits.read_bit(pos) {
            iter.key_len -= 1;
            if iter.key_len == 0 {
                iter.is_valid = false;
                return;
            }
            pos = iter.pos_in_trie[(iter.key_len - 1) as usize] + 1;
        }
        iter.set(iter.key_len - 1, self.labels.read(pos), pos);
        self.move_to_left_most_key(iter);
    }

    /// Retreats to the previous leaf, descending rightmost.
    pub(crate) fn iter_decrement(&self, iter: &mut SparseIter) {
        debug_assert!(iter.key_len > 0);
        let mut pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
        if pos == 0 {
            iter.is_valid = false;
            return;
        }
        while self.louds_bits.read_bit(pos) {
            iter.key_len -= 1;
            if iter.key_len == 0 {
                iter.is_valid = false;
                return;
            }
            pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
        }
        pos -= 1;
        iter.set(iter.key_len - 1, self.labels.read(pos), pos);
        self.move_to_right_most_key(iter);
    }

    pub(crate) fn move_to_left_most_key(&self, iter: &mut SparseIter) {
        if iter.key_len == 0 {
            let pos = self.first_label_pos(iter.start_node_num);
            iter.append(self.labels.read(pos), pos);
        }
        let mut level = iter.key_len - 1;
        let mut pos = iter.pos_in_trie[level as usize];

        if !self.child_indicator_bits.read_bit(pos) {
            iter.is_valid = true;
            return;
        }

        while level < self.height {
            let node_num = self.child_node_num(pos);
            pos = self.first_label_pos(node_num);
            let label = self.labels.read(pos);
            iter.append(label, pos);
            if !self.child_indicator_bits.read_bit(pos) {
                iter.is_valid = true;
                return;
            }
            level += 1;
        }
        unreachable!("trie branch did not terminate");
    }

    pub(crate) fn move_to_right_most_key(&self, iter: &mut SparseIter) {
        if iter.key_len == 0 {
            let pos = self.last_label_pos(iter.start_node_num);
            iter.append(self.labels.read(pos), pos);
        }
        let mut level = iter.key_len - 1;
        let mut pos = iter.pos_in_trie[level as usize];

        if !self.child_indicator_bits.read_bit(pos) {
            iter.is_valid = true;
            return;
        }

        while level < self.height {
            let node_num = self.child_node_num(pos);
            pos = self.last_label_pos(node_num);
            let label = self.labels.read(pos);
            iter.append(label, pos);
            if !self.child_indicator_bits.read_bit(pos) {
                iter.is_valid = true;
                return;
            }
            level += 1;
        }
        unreachable!("trie branch did not terminate");
    }

    fn child_node_num(&self, pos: u32) -> u32 {
        self.child_indicator_bits.rank(pos) + self.child_count_dense
    }

    fn first_label_pos(&self, node_num: u32) -> u32 {
        self.louds_bits.select(node_num + 1 - self.node_count_dense)
    }

    fn last_label_pos(&self, node_num: u32) -> u32 {
        let next_rank = node_num + 2 - self.node_count_dense;
        if next_rank > self.louds_bits.num_ones() {
            return self.louds_bits.num_bits() - 1;
        }
        self.louds_bits.select(next_rank) - 1
    }

    fn suffix_pos(&self, pos: u32) -> u32 {
        pos - self.child_indicator_bits.rank(pos)
    }

    fn node_size(&self, pos: u32) -> u32 {
        debug_assert!(self.louds_bits.read_bit(pos));
        self.louds_bits.distance_to_next_set_bit(pos)
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.labels.memory_usage()
            + self.child_indicator_bits.memory_usage()
            + self.louds_bits.memory_usage()
            + self.suffixes.memory_usage()
    }

    pub(crate) fn serialized_size(&self) -> u64 {
        16 + self.labels.serialized_size()
            + self.child_indicator_bits.serialized_size()
            + self.louds_bits.serialized_size()
            + self.suffixes.serialized_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        out.write_u32_le(self.height);
        out.write_u32_le(self.start_level);
        out.write_u32_le(self.node_count_dense);
        out.write_u32_le(self.child_count_dense);
        self.labels.serialize_into(out);
        self.child_indicator_bits.serialize_into(out);
        self.louds_bits.serialize_into(out);
        self.suffixes.serialize_into(out);
        out.pad_to_align();
    }

    pub(crate) fn deserialize_from(
        cursor: &mut FilterSlice<'_>,
        trie_depth: u32,
    ) -> io::Result<Self> {
        let height = cursor.read_u32_le()?;
        let start_level = cursor.read_u32_le()?;
        let node_count_dense = cursor.read_u32_le()?;
        let child_count_dense = cursor.read_u32_le()?;
        let labels = LabelVector::deserialize_from(cursor)?;
        let child_indicator_bits = RankBitVector::deserialize_from(cursor)?;
        let louds_bits = SelectBitVector::deserialize_from(cursor)?;
        let suffixes = SuffixVector::deserialize_from(cursor)?;
        cursor.skip_to_align()?;
        Ok(SparseLayer {
            height,
            start_level,
            node_count_dense,
            child_count_dense,
            trie_depth,
            labels,
            child_indicator_bits,
            louds_bits,
            suffixes,
        })
    }
}
