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

use crate::codec::size_align;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;

/// Outcome of comparing a stored leaf suffix to a querying key's suffix.
///
/// `CouldBePositive` covers both an exact suffix match and an empty stored
/// suffix (the leaf sits at the trie depth, every prefix bit already
/// matched); resolution then continues in the prefix Bloom filter when one
/// is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixCompare {
    Less,
    Greater,
    CouldBePositive,
}

/// Packed leaf suffixes, concatenated level by level.
///
/// A leaf terminating at byte level `L` (0-indexed) stores the
/// `trie_depth - 8·(L+1)` bits that extend its path down to the trie depth.
/// All suffixes of one level share a length, so a per-level count index is
/// enough to locate any suffix. Values are read as `u128` because extreme
/// configurations can require suffixes longer than 64 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct SuffixVector {
    start_level: u32,
    num_suffixes_per_level: Vec<u32>,
    num_bits: u32,
    words: Vec<u64>,
}

/// Suffix length for a node terminating at `level` (the number of key bytes
/// consumed), given the trie depth in bits.
pub(crate) fn suffix_len(level: u32, trie_depth: u32) -> u32 {
    if level * 8 < trie_depth {
        trie_depth - level * 8
    } else {
        0
    }
}

/// Extracts `len` suffix bits of `key` starting at byte `level`, reading
/// missing bytes as zero padding.
pub(crate) fn construct_suffix(key: &[u8], level: u32, len: u32) -> u128 {
    let level = level as usize;
    let mut suffix: u128 = 0;
    let num_complete_bytes = (len / 8) as usize;
    for i in 0..num_complete_bytes {
        suffix = (suffix << 8) | key.get(level + i).copied().unwrap_or(0) as u128;
    }
    let offset = len % 8;
    if offset > 0 {
        let byte = key.get(level + num_complete_bytes).copied().unwrap_or(0);
        suffix = (suffix << offset) | (byte >> (8 - offset)) as u128;
    }
    suffix
}

impl SuffixVector {
    /// Builds the layer's suffix vector from the builder's per-level
    /// streams. `counts_per_level` is absolute-indexed over all trie levels;
    /// only levels `start_level..end_level` contribute bits.
    pub(crate) fn from_levels(
        streams: &[Vec<u64>],
        bits_per_level: &[u32],
        counts_per_level: &[u32],
        start_level: usize,
        end_level: usize,
    ) -> Self {
        let flat = crate::bits::BitVector::from_levels(streams, bits_per_level, start_level, end_level);
        let num_bits = flat.num_bits();
        SuffixVector {
            start_level: start_level as u32,
            num_suffixes_per_level: counts_per_level[..end_level].to_vec(),
            num_bits,
            words: flat.words().to_vec(),
        }
    }

    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Bit position of suffix `idx` for a node terminating at `level`.
    fn bit_pos(&self, idx: u32, level: u32, trie_depth: u32) -> u32 {
        let mut bit_pos = 0u32;
        let mut preceding = 0u32;
        for l in self.start_level..level.saturating_sub(1) {
            let count = self.num_suffixes_per_level[l as usize];
            bit_pos += count * suffix_len(l + 1, trie_depth);
            preceding += count;
        }
        bit_pos + (idx - preceding) * suffix_len(level, trie_depth)
    }

    /// Reads `len` bits starting at `bit_pos`.
    pub fn read(&self, bit_pos: u32, len: u32) -> u128 {
        if len == 0 || bit_pos >= self.num_bits {
            return 0;
        }
        let mut value: u128 = 0;
        let mut pos = bit_pos;
        let mut remaining = len;
        while remaining > 0 {
            let offset = pos % 64;
            let take = (64 - offset).min(remaining);
            let word = self.words[(pos / 64) as usize];
            let chunk = (word << offset) >> (64 - take);
            value = (value << take) | chunk as u128;
            pos += take;
            remaining -= take;
        }
        value
    }

    /// Whether the stored suffix at `idx` equals the suffix of `key` at the
    /// given level. An empty stored suffix means every bit of the key prefix
    /// has already been matched by the trie, so the lookup may continue in
    /// the prefix Bloom filter.
    pub fn check_equality(&self, idx: u32, key: &[u8], level: u32, trie_depth: u32) -> bool {
        let bit_pos = self.bit_pos(idx, level, trie_depth);
        if bit_pos >= self.num_bits {
            return true;
        }
        let len = suffix_len(level, trie_depth);
        self.read(bit_pos, len) == construct_suffix(key, level, len)
    }

    /// Compares the stored suffix at `idx` against the suffix of `key`.
    pub fn compare(&self, idx: u32, key: &[u8], level: u32, trie_depth: u32) -> SuffixCompare {
        let bit_pos = self.bit_pos(idx, level, trie_depth);
        if bit_pos >= self.num_bits {
            return SuffixCompare::CouldBePositive;
        }
        let len = suffix_len(level, trie_depth);
        let stored = self.read(bit_pos, len);
        let querying = construct_suffix(key, level, len);
        if stored == querying {
            SuffixCompare::CouldBePositive
        } else if stored < querying {
            SuffixCompare::Less
        } else {
            SuffixCompare::Greater
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.words.len() * 8 + self.num_suffixes_per_level.len() * 4
    }

    pub(crate) fn serialized_size(&self) -> u64 {
        size_align(4 + 4 + 4 * self.num_suffixes_per_level.len() as u64 + 4)
            + self.words.len() as u64 * 8
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        out.write_u32_le(self.start_level);
        out.write_u32_le(self.num_suffixes_per_level.len() as u32);
        for &count in &self.num_suffixes_per_level {
            out.write_u32_le(count);
        }
        out.write_u32_le(self.num_bits);
        out.pad_to_align();
        out.write_words(&self.words);
    }

    pub(crate) fn deserialize_from(cursor: &mut FilterSlice<'_>) -> io::Result<Self> {
        let start_level = cursor.read_u32_le()?;
        let num_levels = cursor.read_u32_le()?;
        let mut num_suffixes_per_level = Vec::with_capacity(num_levels as usize);
        for _ in 0..num_levels {
            num_suffixes_per_level.push(cursor.read_u32_le()?);
        }
        let num_bits = cursor.read_u32_le()?;
        cursor.skip_to_align()?;
        let words = cursor.read_words(num_bits.div_ceil(64) as usize)?;
        Ok(SuffixVector {
            start_level,
            num_suffixes_per_level,
            num_bits,
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_len() {
        assert_eq!(suffix_len(1, 16), 8);
        assert_eq!(suffix_len(2, 16), 0);
        assert_eq!(suffix_len(1, 12), 4);
        assert_eq!(suffix_len(8, 64), 0);
        assert_eq!(suffix_len(1, 100), 92);
    }

    #[test]
    fn test_construct_suffix() {
        let key = [0xAB, 0xCD, 0xEF];
        assert_eq!(construct_suffix(&key, 1, 16), 0xCDEF);
        assert_eq!(construct_suffix(&key, 1, 12), 0xCDE);
        assert_eq!(construct_suffix(&key, 1, 4), 0xC);
        // Missing bytes read as zero.
        assert_eq!(construct_suffix(&key, 2, 16), 0xEF00);
        assert_eq!(construct_suffix(&key, 0, 0), 0);
    }

    fn hand_built() -> SuffixVector {
        // Two suffixes of 8 bits at level 1 (trie depth 16): 0xCD, 0x01.
        let mut stream = vec![0u64];
        stream[0] = (0xCDu64 << 56) | (0x01u64 << 48);
        SuffixVector::from_levels(&[stream], &[16], &[2], 0, 1)
    }

    #[test]
    fn test_read_packed() {
        let sv = hand_built();
        assert_eq!(sv.read(0, 8), 0xCD);
        assert_eq!(sv.read(8, 8), 0x01);
    }

    #[test]
    fn test_compare_and_equality() {
        let sv = hand_built();
        // Stored suffix 0xCD at idx 0 vs key byte 0xCD.
        let key = [0xAA, 0xCD];
        assert!(sv.check_equality(0, &key, 1, 16));
        assert_eq!(sv.compare(0, &key, 1, 16), SuffixCompare::CouldBePositive);
        assert_eq!(sv.compare(0, &[0xAA, 0xFF], 1, 16), SuffixCompare::Less);
        assert_eq!(sv.compare(0, &[0xAA, 0x01], 1, 16), SuffixCompare::Greater);
        // Out-of-stream position: empty suffix, resolution moves on.
        assert_eq!(sv.compare(2, &key, 2, 16), SuffixCompare::CouldBePositive);
    }

    #[test]
    fn test_read_beyond_64_bits() {
        // One 80-bit suffix spanning two words.
        let value: u128 = 0xAABB_CCDD_EEFF_0011_2233;
        let mut stream = vec![0u64, 0];
        stream[0] = (value >> 16) as u64;
        stream[1] = ((value & 0xFFFF) as u64) << 48;
        let sv = SuffixVector::from_levels(&[stream], &[80], &[1], 0, 1);
        assert_eq!(sv.read(0, 80), value);
    }

    #[test]
    fn test_serialize_round_trip() {
        let sv = hand_built();
        let mut out = FilterBytes::new();
        sv.serialize_into(&mut out);
        let bytes = out.into_bytes();
        assert_eq!(bytes.len() as u64, sv.serialized_size());
        let mut cursor = FilterSlice::new(&bytes);
        assert_eq!(SuffixVector::deserialize_from(&mut cursor).unwrap(), sv);
    }
}
