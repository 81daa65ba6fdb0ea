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

//! Prefix Bloom filter.
//!
//! A classical Bloom filter over the distinct fixed-length prefixes of the
//! key set. Point queries hash the query's prefix; range queries enumerate
//! every prefix value overlapping the shifted query range and point-query
//! each, short-circuiting on the first hit. There are no false negatives.
//!
//! Integer and byte-string keys share the bit array but use different hash
//! paths: integers a 32-bit MurmurHash3 under `u32` seeds, strings a
//! 128-bit hash keyed by persisted `(u64, u64)` seed pairs.

use std::io;

use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::common::random::XorShift64;
use crate::common::random::SEED_DERIVATION_CONSTANT;
use crate::hash::hash128;
use crate::hash::murmur3_x86_32;
use crate::key::compare_bytes_at;
use crate::key::count_prefixes_bytes;
use crate::key::edit_bytes;

/// Hash-function cap, bounding filter latency when the element count is
/// small relative to the bit budget.
pub(crate) const MAX_HASH_FUNCS: u32 = 32;

/// A Bloom filter over fixed-length key prefixes.
///
/// Immutable once built. The number of hash functions is
/// `min(32, max(1, round(ln2 · nbits / distinct_prefixes)))`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixBloom {
    /// Prefix length in bits.
    prefix_len: u32,
    /// Bit-array size, rounded up to a whole byte.
    nmod: u64,
    /// Seeds for the integer hash path; empty for string filters.
    seeds32: Vec<u32>,
    /// Seed pairs for the string hash path; empty for integer filters.
    seeds64: Vec<(u64, u64)>,
    data: Vec<u8>,
}

impl PrefixBloom {
    /// Builds the filter over the distinct `prefix_len`-bit prefixes of a
    /// sorted integer key set.
    ///
    /// The bit count is clamped to `u32::MAX` because the integer path uses
    /// a 32-bit hash; exceeding that would take an extreme bits-per-key
    /// budget.
    pub fn from_int_keys(prefix_len: u32, nbits: u64, keys: &[u64]) -> Self {
        assert!(nbits > 0, "prefix Bloom filter needs a positive bit budget");
        assert!((1..=64).contains(&prefix_len));
        // The 32-bit hash cannot address more than u32::MAX bits; the clamp
        // stays on a byte boundary so every index lands in the array.
        let nmod = (u32::MAX as u64 / 8 * 8).min((nbits + 7) / 8 * 8);
        let shift = 64 - prefix_len;

        let mut unique_idxs = vec![0usize];
        let mut prev_prefix = keys[0] >> shift;
        for (i, &key) in keys.iter().enumerate() {
            let prefix = key >> shift;
            if prefix != prev_prefix {
                unique_idxs.push(i);
                prev_prefix = prefix;
            }
        }

        let num_hashes = Self::optimal_num_hashes(nmod, unique_idxs.len() as u64);
        let mut gen = XorShift64::seeded(SEED_DERIVATION_CONSTANT);
        let seeds32: Vec<u32> = (0..num_hashes).map(|_| gen.next_u32()).collect();

        let mut filter = PrefixBloom {
            prefix_len,
            nmod,
            seeds32,
            seeds64: Vec::new(),
            data: vec![0u8; (nmod / 8) as usize],
        };
        for &idx in &unique_idxs {
            let prefix = keys[idx] >> shift;
            for i in 0..filter.seeds32.len() {
                filter.set(filter.hash_int(prefix, filter.seeds32[i]));
            }
        }
        filter
    }

    /// Builds the filter over the distinct `prefix_len`-bit prefixes of a
    /// sorted byte-string key set.
    pub fn from_string_keys(prefix_len: u32, nbits: u64, keys: &[Vec<u8>]) -> Self {
        assert!(nbits > 0, "prefix Bloom filter needs a positive bit budget");
        assert!(prefix_len >= 1);
        let nmod = (nbits + 7) / 8 * 8;

        let mut unique_idxs = vec![0usize];
        let mut prev_key: &[u8] = &keys[0];
        for (i, key) in keys.iter().enumerate() {
            if compare_bytes_at(key, prev_key, prefix_len) != std::cmp::Ordering::Equal {
                unique_idxs.push(i);
                prev_key = key;
            }
        }

        let num_hashes = Self::optimal_num_hashes(nmod, unique_idxs.len() as u64);
        let mut gen = XorShift64::seeded(SEED_DERIVATION_CONSTANT);
        let seeds64: Vec<(u64, u64)> = (0..num_hashes)
            .map(|_| (gen.next_u64(), gen.next_u64()))
            .collect();

        let mut filter = PrefixBloom {
            prefix_len,
            nmod,
            seeds32: Vec::new(),
            seeds64,
            data: vec![0u8; (nmod / 8) as usize],
        };
        let prefix_byte_len = ((prefix_len + 7) / 8) as usize;
        for &idx in &unique_idxs {
            let edited = edit_bytes(&keys[idx], prefix_len, false);
            for i in 0..filter.seeds64.len() {
                let (s1, s2) = filter.seeds64[i];
                filter.set(filter.hash_bytes(&edited[..prefix_byte_len], s1, s2));
            }
        }
        filter
    }

    fn optimal_num_hashes(nmod: u64, distinct_prefixes: u64) -> u32 {
        let k = (std::f64::consts::LN_2 * nmod as f64 / distinct_prefixes as f64).round() as u32;
        k.clamp(1, MAX_HASH_FUNCS)
    }

    pub fn prefix_len(&self) -> u32 {
        self.prefix_len
    }

    /// Total number of bits in the filter.
    pub fn num_bits(&self) -> u64 {
        self.nmod
    }

    /// Number of hash functions.
    pub fn num_hashes(&self) -> usize {
        self.seeds32.len().max(self.seeds64.len())
    }

    pub(crate) fn get(&self, i: u64) -> bool {
        (self.data[(i / 8) as usize] >> (7 - i % 8)) & 1 != 0
    }

    fn set(&mut self, i: u64) {
        self.data[(i / 8) as usize] |= 1 << (7 - i % 8);
    }

    fn hash_int(&self, shifted_prefix: u64, seed: u32) -> u64 {
        murmur3_x86_32(&shifted_prefix.to_le_bytes(), seed) as u64 % self.nmod
    }

    fn hash_bytes(&self, prefix: &[u8], seed1: u64, seed2: u64) -> u64 {
        (hash128(prefix, seed1, seed2) % self.nmod as u128) as u64
    }

    // ========================================================================
    // Integer path
    // ========================================================================

    /// Point query for an integer key's prefix.
    pub fn contains_int(&self, key: u64) -> bool {
        self.contains_shifted_int(key >> (64 - self.prefix_len))
    }

    fn contains_shifted_int(&self, shifted_prefix: u64) -> bool {
        self.seeds32
            .iter()
            .all(|&seed| self.get(self.hash_int(shifted_prefix, seed)))
    }

    /// Range query over `[from, to)`: point-queries every prefix value in
    /// the shifted range, short-circuiting on the first hit.
    pub fn query_int_range(&self, from: u64, to: u64) -> bool {
        let shift = 64 - self.prefix_len;
        let mut cursor = from >> shift;
        let upper_bound = to.wrapping_sub(1) >> shift;
        while cursor <= upper_bound {
            if self.contains_shifted_int(cursor) {
                return true;
            }
            if cursor == upper_bound {
                break;
            }
            cursor += 1;
        }
        false
    }

    // ========================================================================
    // String path
    // ========================================================================

    /// Point query for a byte-string key's prefix.
    pub fn contains_bytes(&self, key: &[u8]) -> bool {
        let prefix_byte_len = ((self.prefix_len + 7) / 8) as usize;
        let edited = edit_bytes(key, self.prefix_len, false);
        self.seeds64
            .iter()
            .all(|&(s1, s2)| self.get(self.hash_bytes(&edited[..prefix_byte_len], s1, s2)))
    }

    /// Range query over the inclusive byte-string range `[from, to]`.
    ///
    /// The prefix enumeration is pre-sized with `count_prefixes`; the
    /// iterator increments the last prefix byte with carry propagation. A
    /// prefix count that overflows is treated as a guaranteed positive.
    pub fn query_byte_range(&self, from: &[u8], to: &[u8]) -> bool {
        let prefix_byte_len = ((self.prefix_len + 7) / 8) as usize;
        let shift_bits = (8 - self.prefix_len % 8) % 8;

        let mut cursor = edit_bytes(from, self.prefix_len, false);
        let padded_to = edit_bytes(to, self.prefix_len, false);

        let total_queries = count_prefixes_bytes(&cursor, &padded_to, self.prefix_len);
        if total_queries == 0 {
            return true;
        }

        for _ in 0..total_queries {
            if self.contains_bytes(&cursor) {
                return true;
            }

            // Increment by one prefix step; the prefix length may fall
            // inside the last byte.
            let mut idx = prefix_byte_len - 1;
            let shifted_last = cursor[idx] >> shift_bits;
            let mut carry = shifted_last == u8::MAX >> shift_bits;
            if carry {
                cursor[idx] = 0;
            } else {
                cursor[idx] = (shifted_last + 1) << shift_bits;
            }

            while carry && idx > 0 {
                idx -= 1;
                if cursor[idx] == u8::MAX {
                    cursor[idx] = 0;
                } else {
                    cursor[idx] += 1;
                    carry = false;
                }
            }
        }

        false
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub(crate) fn serialized_size(&self) -> u64 {
        4 + 8
            + 8
            + self.seeds32.len() as u64 * 4
            + 8
            + self.seeds64.len() as u64 * 16
            + self.nmod / 8
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        out.write_u32_le(self.prefix_len);
        out.write_u64_le(self.nmod);
        out.write_u64_le(self.seeds32.len() as u64);
        for &seed in &self.seeds32 {
            out.write_u32_le(seed);
        }
        out.write_u64_le(self.seeds64.len() as u64);
        for &(s1, s2) in &self.seeds64 {
            out.write_u64_le(s1);
            out.write_u64_le(s2);
        }
        out.write(&self.data);
    }

    pub(crate) fn deserialize_from(cursor: &mut FilterSlice<'_>) -> io::Result<Self> {
        let prefix_len = cursor.read_u32_le()?;
        let nmod = cursor.read_u64_le()?;
        if prefix_len == 0 || nmod < 8 {
            return Err(io::ErrorKind::InvalidData.into());
        }
        let n_int_seeds = cursor.read_u64_le()?;
        let mut seeds32 = Vec::with_capacity(n_int_seeds as usize);
        for _ in 0..n_int_seeds {
            seeds32.push(cursor.read_u32_le()?);
        }
        let n_str_seeds = cursor.read_u64_le()?;
        let mut seeds64 = Vec::with_capacity(n_str_seeds as usize);
        for _ in 0..n_str_seeds {
            let s1 = cursor.read_u64_le()?;
            let s2 = cursor.read_u64_le()?;
            seeds64.push((s1, s2));
        }
        let data = cursor.read_bytes((nmod / 8) as usize)?;
        Ok(PrefixBloom {
            prefix_len,
            nmod,
            seeds32,
            seeds64,
            data,
        })
    }
}
