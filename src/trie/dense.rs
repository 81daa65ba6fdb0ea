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

use crate::bits::rank::RankBitVector;
use crate::bits::suffix::SuffixCompare;
use crate::bits::suffix::SuffixVector;
use crate::bloom::PrefixBloom;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::filter::BoundCompare;
use crate::key::FilterKey;
use crate::trie::builder::TrieBuilder;
use crate::trie::FANOUT;

/// Result of a point lookup in the dense levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DenseLookup {
    /// The key is definitely absent.
    Miss,
    /// The key's prefix terminated at a matching dense leaf.
    Hit,
    /// The descent left the last dense level; the sparse layer continues
    /// from this node number.
    Continue(u32),
}

/// The dense-bitmap top levels of the trie.
///
/// Each node is a pair of 256-bit bitmaps: `labels` (bit `i` set iff edge
/// byte `i` exists) and `child_indicator` (bit `i` set iff that edge leads
/// to a non-leaf child). Positions are `node_num * 256 + byte`, global
/// across levels; child node numbers come from rank-1 over the child
/// bitmap.
#[derive(Debug)]
pub struct DenseLayer {
    height: u32,
    trie_depth: u32,
    label_bitmaps: RankBitVector,
    child_indicator_bitmaps: RankBitVector,
    suffixes: SuffixVector,
}

/// Iterator state over the dense levels.
///
/// `is_search_complete`, `is_move_left_complete`, and
/// `is_move_right_complete` tell the caller whether the sparse layer must
/// continue the corresponding operation; `prefix_filter_true` short-circuits
/// the whole range query to true.
pub(crate) struct DenseIter {
    pub(crate) is_valid: bool,
    pub(crate) is_search_complete: bool,
    pub(crate) is_move_left_complete: bool,
    pub(crate) is_move_right_complete: bool,
    pub(crate) prefix_filter_true: bool,
    pub(crate) send_out_node_num: u32,
    key_len: u32,
    key: Vec<u8>,
    pos_in_trie: Vec<u32>,
}

impl DenseIter {
    pub(crate) fn new(height: u32) -> Self {
        DenseIter {
            is_valid: false,
            is_search_complete: false,
            is_move_left_complete: false,
            is_move_right_complete: false,
            prefix_filter_true: false,
            send_out_node_num: 0,
            key_len: 0,
            key: vec![0; height as usize],
            pos_in_trie: vec![0; height as usize],
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.is_search_complete && self.is_move_left_complete && self.is_move_right_complete
    }

    /// The key bytes accumulated so far, without any suffix.
    pub(crate) fn key_bytes(&self) -> &[u8] {
        if self.is_valid {
            &self.key[..self.key_len as usize]
        } else {
            &[]
        }
    }

    fn append(&mut self, pos: u32) {
        let idx = self.key_len as usize;
        self.key[idx] = (pos % FANOUT) as u8;
        self.pos_in_trie[idx] = pos;
        self.key_len += 1;
    }

    fn set(&mut self, level: u32, pos: u32) {
        let idx = level as usize;
        self.key[idx] = (pos % FANOUT) as u8;
        self.pos_in_trie[idx] = pos;
    }

    fn set_flags(
        &mut self,
        is_valid: bool,
        is_search_complete: bool,
        is_move_left_complete: bool,
        is_move_right_complete: bool,
        prefix_filter_true: bool,
    ) {
        self.is_valid = is_valid;
        self.is_search_complete = is_search_complete;
        self.is_move_left_complete = is_move_left_complete;
        self.is_move_right_complete = is_move_right_complete;
        self.prefix_filter_true = prefix_filter_true;
    }
}

impl DenseLayer {
    pub(crate) fn from_builder(builder: &TrieBuilder) -> Self {
        let height = builder.sparse_dense_cutoff().min(builder.tree_height());
        let trie_depth = builder.trie_depth();

        let mut num_bits_per_level = Vec::with_capacity(height as usize);
        for level in 0..height as usize {
            num_bits_per_level.push(builder.bitmap_labels()[level].len() as u32 * 64);
        }

        let label_bitmaps = RankBitVector::from_levels(
            builder.bitmap_labels(),
            &num_bits_per_level,
            0,
            height as usize,
        );
        let child_indicator_bitmaps = RankBitVector::from_levels(
            builder.bitmap_child_indicator_bits(),
            &num_bits_per_level,
            0,
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
            0,
            height as usize,
        );

        DenseLayer {
            height,
            trie_depth,
            label_bitmaps,
            child_indicator_bitmaps,
            suffixes,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn new_iter(&self) -> DenseIter {
        DenseIter::new(self.height)
    }

    /// Point lookup: descends byte by byte through the dense levels.
    pub(crate) fn lookup_key<K: FilterKey>(
        &self,
        key: &K,
        prefix_filter: Option<&PrefixBloom>,
    ) -> DenseLookup {
        let edited_key = key.trie_bytes(self.trie_depth);
        let mut node_num = 0u32;
        for level in 0..self.height {
            let pos = node_num * FANOUT + edited_key[level as usize] as u32;

            if !self.label_bitmaps.read_bit(pos) {
                return DenseLookup::Miss;
            }

            // A clear child indicator means the trie branch terminates here.
            if !self.child_indicator_bitmaps.read_bit(pos) {
                let matched = self.suffixes.check_equality(
                    self.suffix_pos(pos),
                    &edited_key,
                    level + 1,
                    self.trie_depth,
                ) && prefix_filter.map_or(true, |f| key.bloom_contains(f));
                return if matched {
                    DenseLookup::Hit
                } else {
                    DenseLookup::Miss
                };
            }

            node_num = self.child_node_num(pos);
        }

        DenseLookup::Continue(node_num)
    }

    /// Moves `iter` to the first trie branch not less than `lq`, consulting
    /// the prefix filter when a branch matches `lq` exactly. Returns true
    /// when a candidate (or filter hit) was found in the dense levels.
    pub(crate) fn move_to_key_greater_than<K: FilterKey>(
        &self,
        lq: &K,
        rq: &K,
        iter: &mut DenseIter,
        prefix_filter: Option<&PrefixBloom>,
    ) -> bool {
        let edited_lq = lq.trie_bytes(self.trie_depth);
        let mut node_num = 0u32;
        for level in 0..self.height {
            let pos = node_num * FANOUT + edited_lq[level as usize] as u32;
            iter.append(pos);

            if !self.label_bitmaps.read_bit(pos) {
                self.iter_increment(iter);
                return false;
            }

            if !self.child_indicator_bitmaps.read_bit(pos) {
                return self.compare_suffix_greater_than(
                    pos,
                    level + 1,
                    lq,
                    rq,
                    &edited_lq,
                    iter,
                    prefix_filter,
                );
            }

            node_num = self.child_node_num(pos);
        }

        // The search continues in the sparse layer.
        iter.send_out_node_num = node_num;
        iter.set_flags(true, false, true, true, false);
        true
    }

    fn compare_suffix_greater_than<K: FilterKey>(
        &self,
        pos: u32,
        level: u32,
        lq: &K,
        rq: &K,
        edited_lq: &[u8],
        iter: &mut DenseIter,
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
                iter.set_flags(true, true, true, true, false);
                true
            }
            SuffixCompare::CouldBePositive => match prefix_filter {
                None => {
                    iter.set_flags(true, true, true, true, false);
                    true
                }
                Some(filter) => {
                    if K::bloom_branch_query(filter, lq, rq, edited_lq, self.trie_depth) {
                        iter.set_flags(true, true, true, true, true);
                        true
                    } else {
                        self.iter_increment(iter);
                        false
                    }
                }
            },
        }
    }

    /// Compares the iterator's current key against `key`. `Equal` means the
    /// dense prefix matched but resolution must continue in the sparse
    /// layer.
    pub(crate) fn iter_compare<K: FilterKey>(
        &self,
        iter: &DenseIter,
        key: &K,
        prefix_filter: Option<&PrefixBloom>,
    ) -> BoundCompare {
        let skey = key.stringify();
        let iter_key = iter.key_bytes();
        let truncated = &skey[..iter_key.len().min(skey.len())];
        match iter_key.cmp(truncated) {
            std::cmp::Ordering::Less => return BoundCompare::Less,
            std::cmp::Ordering::Greater => return BoundCompare::Greater,
            std::cmp::Ordering::Equal => {}
        }
        if !iter.is_complete() {
            return BoundCompare::Equal;
        }

        let suffix_pos = self.suffix_pos(iter.pos_in_trie[(iter.key_len - 1) as usize]);
        match self
            .suffixes
            .compare(suffix_pos, &skey, iter.key_len, self.trie_depth)
        {
            SuffixCompare::Less => BoundCompare::Less,
            SuffixCompare::Greater => BoundCompare::Greater,
            SuffixCompare::CouldBePositive => match prefix_filter {
                None => BoundCompare::CouldBePositive,
                Some(filter) => {
                    let lower = iter_key.to_vec();
                    if K::bloom_range_with_lower_bytes(filter, lower, key) {
                        BoundCompare::CouldBePositive
                    } else {
                        BoundCompare::Greater
                    }
                }
            },
        }
    }

    /// Advances to the next leaf in key order, descending leftmost.
    pub(crate) fn iter_increment(&self, iter: &mut DenseIter) {
        debug_assert!(iter.key_len > 0);
        let mut pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
        let mut next_pos = self.next_pos(pos);
        // Crossing a node boundary pops up one level.
        while next_pos / FANOUT > pos / FANOUT {
            iter.key_len -= 1;
            if iter.key_len == 0 {
                iter.is_valid = false;
                return;
            }
            pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
            next_pos = self.next_pos(pos);
        }
        iter.set(iter.key_len - 1, next_pos);
        self.move_to_left_most_key(iter);
    }

    /// Retreats to the previous leaf in key order, descending rightmost.
    pub(crate) fn iter_decrement(&self, iter: &mut DenseIter) {
        debug_assert!(iter.key_len > 0);
        let mut pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
        let mut prev_pos = match self.prev_pos(pos) {
            Some(prev) => prev,
            None => {
                iter.is_valid = false;
                return;
            }
        };
        while prev_pos / FANOUT < pos / FANOUT {
            iter.key_len -= 1;
            if iter.key_len == 0 {
                iter.is_valid = false;
                return;
            }
            pos = iter.pos_in_trie[(iter.key_len - 1) as usize];
            prev_pos = match self.prev_pos(pos) {
                Some(prev) => prev,
                None => {
                    iter.is_valid = false;
                    return;
                }
            };
        }
        iter.set(iter.key_len - 1, prev_pos);
        self.move_to_right_most_key(iter);
    }

    pub(crate) fn move_to_left_most_key(&self, iter: &mut DenseIter) {
        debug_assert!(iter.key_len > 0);
        let mut level = iter.key_len - 1;
        let mut pos = iter.pos_in_trie[level as usize];
        if !self.child_indicator_bitmaps.read_bit(pos) {
            return iter.set_flags(true, true, true, true, false);
        }

        while level < self.height - 1 {
            let node_num = self.child_node_num(pos);
            pos = self.next_pos(node_num * FANOUT - 1);
            iter.append(pos);

            if !self.child_indicator_bitmaps.read_bit(pos) {
                return iter.set_flags(true, true, true, true, false);
            }
            level += 1;
        }
        iter.send_out_node_num = self.child_node_num(pos);
        // The leftmost descent continues in the sparse layer.
        iter.set_flags(true, true, false, true, false);
    }

    pub(crate) fn move_to_right_most_key(&self, iter: &mut DenseIter) {
        debug_assert!(iter.key_len > 0);
        let mut level = iter.key_len - 1;
        let mut pos = iter.pos_in_trie[level as usize];
        if !self.child_indicator_bitmaps.read_bit(pos) {
            return iter.set_flags(true, true, true, true, false);
        }

        while level < self.height - 1 {
            let node_num = self.child_node_num(pos);
            pos = match self.prev_pos((node_num + 1) * FANOUT) {
                Some(prev) => prev,
                None => {
                    iter.is_valid = false;
                    return;
                }
            };
            iter.append(pos);

            if !self.child_indicator_bitmaps.read_bit(pos) {
                return iter.set_flags(true, true, true, true, false);
            }
            level += 1;
        }
        iter.send_out_node_num = self.child_node_num(pos);
        // The rightmost descent continues in the sparse layer.
        iter.set_flags(true, true, true, false, false);
    }

    fn child_node_num(&self, pos: u32) -> u32 {
        self.child_indicator_bitmaps.rank(pos)
    }

    fn suffix_pos(&self, pos: u32) -> u32 {
        self.label_bitmaps.rank(pos) - self.child_indicator_bitmaps.rank(pos) - 1
    }

    fn next_pos(&self, pos: u32) -> u32 {
        pos + self.label_bitmaps.distance_to_next_set_bit(pos)
    }

    fn prev_pos(&self, pos: u32) -> Option<u32> {
        let distance = self.label_bitmaps.distance_to_prev_set_bit(pos);
        if pos <= distance {
            None
        } else {
            Some(pos - distance)
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.label_bitmaps.memory_usage()
            + self.child_indicator_bitmaps.memory_usage()
            + self.suffixes.memory_usage()
    }

    pub(crate) fn serialized_size(&self) -> u64 {
        8 + self.label_bitmaps.serialized_size()
            + self.child_indicator_bitmaps.serialized_size()
            + self.suffixes.serialized_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        out.write_u32_le(self.height);
        out.pad_to_align();
        self.label_bitmaps.serialize_into(out);
        self.child_indicator_bitmaps.serialize_into(out);
        self.suffixes.serialize_into(out);
        out.pad_to_align();
    }

    pub(crate) fn deserialize_from(
        cursor: &mut FilterSlice<'_>,
        trie_depth: u32,
    ) -> io::Result<Self> {
        let height = cursor.read_u32_le()?;
        cursor.skip_to_align()?;
        let label_bitmaps = RankBitVector::deserialize_from(cursor)?;
        let child_indicator_bitmaps = RankBitVector::deserialize_from(cursor)?;
        let suffixes = SuffixVector::deserialize_from(cursor)?;
        cursor.skip_to_align()?;
        Ok(DenseLayer {
            height,
            trie_depth,
            label_bitmaps,
            child_indicator_bitmaps,
            suffixes,
        })
    }
}
