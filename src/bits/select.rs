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

/// Every how many set bits a position is sampled.
const SAMPLE_INTERVAL: u32 = 64;

/// A [`BitVector`] with a sampled select-1 directory.
///
/// The directory stores the position of every 64th set bit; `select(k)`
/// seeks the nearest sample and scans forward. It costs four bytes per 64
/// set bits and is rebuilt on deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectBitVector {
    bits: BitVector,
    num_ones: u32,
    select_lut: Vec<u32>,
}

impl SelectBitVector {
    pub(crate) fn new(bits: BitVector) -> Self {
        let mut select_lut = Vec::new();
        let mut cumulative = 0u32;
        let mut next_sample = 1u32;
        for (word_id, word) in bits.words().iter().enumerate() {
            let ones_in_word = word.count_ones();
            while cumulative + ones_in_word >= next_sample {
                let nth = next_sample - cumulative;
                select_lut.push((word_id as u32) * 64 + nth_set_bit(*word, nth));
                next_sample += SAMPLE_INTERVAL;
            }
            cumulative += ones_in_word;
        }
        SelectBitVector {
            bits,
            num_ones: cumulative,
            select_lut,
        }
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

    /// Position of the `rank`-th set bit, 1-indexed.
    pub fn select(&self, rank: u32) -> u32 {
        debug_assert!(rank >= 1 && rank <= self.num_ones);
        let lut_idx = ((rank - 1) / SAMPLE_INTERVAL) as usize;
        let mut pos = self.select_lut[lut_idx];
        let mut remaining = rank - ((lut_idx as u32) * SAMPLE_INTERVAL + 1);
        while remaining > 0 {
            pos += self.bits.distance_to_next_set_bit(pos);
            remaining -= 1;
        }
        pos
    }

    pub fn num_ones(&self) -> u32 {
        self.num_ones
    }

    pub fn read_bit(&self, pos: u32) -> bool {
        self.bits.read_bit(pos)
    }

    pub fn distance_to_next_set_bit(&self, pos: u32) -> u32 {
        self.bits.distance_to_next_set_bit(pos)
    }

    pub fn num_bits(&self) -> u32 {
        self.bits.num_bits()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.bits.num_words() * 8 + self.select_lut.len() * 4
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

/// Position of the `nth` set bit within a word, 1-indexed, MSB-first.
fn nth_set_bit(word: u64, nth: u32) -> u32 {
    debug_assert!(nth >= 1 && nth <= word.count_ones());
    let mut seen = 0;
    for bit in 0..64 {
        if word & (crate::bits::MSB_MASK >> bit) != 0 {
            seen += 1;
            if seen == nth {
                return bit;
            }
        }
    }
    unreachable!("word has fewer than {nth} set bits")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::set_word_bit;
    use crate::common::random::XorShift64;

    #[test]
    fn test_nth_set_bit() {
        let word = (1u64 << 63) | (1 << 60) | 1;
        assert_eq!(nth_set_bit(word, 1), 0);
        assert_eq!(nth_set_bit(word, 2), 3);
        assert_eq!(nth_set_bit(word, 3), 63);
    }

    #[test]
    fn test_select_matches_naive_scan() {
        let mut gen = XorShift64::seeded(7);
        let num_bits = 5000u32;
        let mut words = vec![0u64; num_bits.div_ceil(64) as usize];
        let mut positions = Vec::new();
        // Bit 0 is always set, as for LOUDS node boundaries.
        set_word_bit(&mut words, 0);
        positions.push(0u32);
        for pos in 1..num_bits {
            if gen.next_u64() % 5 == 0 {
                set_word_bit(&mut words, pos);
                positions.push(pos);
            }
        }
        let sbv = SelectBitVector::new(BitVector::from_words(num_bits, words));
        assert_eq!(sbv.num_ones() as usize, positions.len());
        for (i, &pos) in positions.iter().enumerate() {
            assert_eq!(sbv.select(i as u32 + 1), pos, "select({})", i + 1);
        }
    }
}
