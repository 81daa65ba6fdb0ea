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

use crate::bits::BitVector;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;

/// Rank LUT sampling interval in bits.
const BASIC_BLOCK_SIZE: u32 = 512;

/// A [`BitVector`] with a precomputed rank-1 directory.
///
/// `rank(pos)` counts the set bits in `[0, pos]` in constant time from one
/// LUT entry plus at most eight word popcounts. The directory costs four
/// bytes per 512 bits and is rebuilt on deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct RankBitVector {
    bits: BitVector,
    rank_lut: Vec<u32>,
}

impl RankBitVector {
    pub(crate) fn new(bits: BitVector) -> Self {
        let words = bits.words();
        let words_per_block = (BASIC_BLOCK_SIZE / 64) as usize;
        let num_blocks = words.len().div_ceil(words_per_block);
        let mut rank_lut = Vec::with_capacity(num_blocks);
        let mut cumulative = 0u32;
        for block in 0..num_blocks {
            rank_lut.push(cumulative);
            let start = block * words_per_block;
            let end = (start + words_per_block).min(words.len());
            for word in &words[start..end] {
                cumulative += word.count_ones();
            }
        }
        RankBitVector { bits, rank_lut }
    }

    pub(crate) fn from_levels(
        levels: &[Vec<u64>],
        bits_per_level: &[u32],
        start_level: usize,
        end_level: usize,
    ) -> Self {
        Self::new(BitVector::from_levels(
            levels,
            bits_per_level,
            start_level,
            end_level,
        ))
    }

    /// Number of set bits in `[0, pos]`.
    pub fn rank(&self, pos: u32) -> u32 {
        let words = self.bits.words();
        let block = (pos / BASIC_BLOCK_SIZE) as usize;
        let mut count = self.rank_lut[block];
        let word_id = (pos / 64) as usize;
        for word in &words[block * (BASIC_BLOCK_SIZE / 64) as usize..word_id] {
            count += word.count_ones();
        }
        count + (words[word_id] >> (63 - pos % 64)).count_ones()
    }

    pub fn read_bit(&self, pos: u32) -> bool {
        self.bits.read_bit(pos)
    }

    pub fn distance_to_next_set_bit(&self, pos: u32) -> u32 {
        self.bits.distance_to_next_set_bit(pos)
    }

    pub fn distance_to_prev_set_bit(&self, pos: u32) -> u32 {
        self.bits.distance_to_prev_set_bit(pos)
    }

    pub fn num_bits(&self) -> u32 {
        self.bits.num_bits()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.bits.num_words() * 8 + self.rank_lut.len() * 4
    }

    pub(crate) fn serialized_size(&self) -> u64 {
        self.bits.serialized_size()
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        self.bits.serialize_into(out);
    }

    pub(crate) fn deserialize_from(cursor: &mut FilterSlice<'_>) -> io::Result<Self> {
        Ok(Self::new(BitVector::deserialize_from(cursor)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::set_word_bit;
    use crate::common::random::XorShift64;

    fn random_bits(num_bits: u32, seed: u64) -> (RankBitVector, Vec<bool>) {
        let mut gen = XorShift64::seeded(seed);
        let mut words = vec![0u64; num_bits.div_ceil(64) as usize];
        let mut reference = vec![false; num_bits as usize];
        for pos in 0..num_bits {
            if gen.next_u64() % 3 == 0 {
                set_word_bit(&mut words, pos);
                reference[pos as usize] = true;
            }
        }
        (
            RankBitVector::new(BitVector::from_words(num_bits, words)),
            reference,
        )
    }

    #[test]
    fn test_rank_matches_naive_popcount() {
        let (rbv, reference) = random_bits(3000, 42);
        let mut naive = 0u32;
        for pos in 0..3000u32 {
            if reference[pos as usize] {
                naive += 1;
            }
            assert_eq!(rbv.rank(pos), naive, "rank({pos})");
        }
    }

    #[test]
    fn test_rank_across_block_boundary() {
        let mut words = vec![0u64; 16];
        set_word_bit(&mut words, 511);
        set_word_bit(&mut words, 512);
        let rbv = RankBitVector::new(BitVector::from_words(1024, words));
        assert_eq!(rbv.rank(510), 0);
        assert_eq!(rbv.rank(511), 1);
        assert_eq!(rbv.rank(512), 2);
        assert_eq!(rbv.rank(1023), 2);
    }
}
