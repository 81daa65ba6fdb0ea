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

//! Workload-driven layout modeling.
//!
//! Given the sorted key set, a sorted sample of empty range queries, and a
//! bits-per-key budget, [`model`] picks the `(trie_depth,
//! sparse_dense_cutoff, bf_prefix_len)` triple minimizing the modeled
//! expected false-positive rate:
//!
//! 1. Count the distinct key prefixes at every prefix length from pairwise
//!    LCPs and a rolling sum.
//! 2. For every candidate trie depth, find the cheapest sparse/dense cutoff
//!    under the trie cost model; the budget left over is the Bloom
//!    filter's.
//! 3. For every sample query, derive the key/query LCPs and, per candidate
//!    pair, the number of Bloom prefix queries it would induce; bucket
//!    queries by `log2` of that count.
//! 4. Combine the per-bin populations with the standard Bloom
//!    false-positive formula and keep the best pair, preferring deeper
//!    tries and longer prefixes on ties.

use crate::bloom::MAX_HASH_FUNCS;
use crate::key::FilterKey;

type BinArray = [(u64, u64); 64];

struct BestConf {
    empty_queries: u64,
    trie_depth: u32,
    bf_len: u32,
    efpr: f64,
    trconf_idx: usize,
    bfconf_idx: isize,
}

/// Chooses `(trie_depth_bits, sparse_dense_cutoff_bytes,
/// bf_prefix_len_bits)` for [`RangeFilter::build`](crate::RangeFilter::build).
///
/// `keys` must be sorted and non-empty; `sample_queries` must be sorted by
/// left bound. Queries that hit the key set are dropped from the sample.
/// With no empty sample query the model falls back to a filter-only layout
/// with a prefix of half the key length; when the budget fits a
/// full-resolution trie, it returns one with no Bloom filter.
///
/// # Examples
///
/// ```
/// use rangesieve::{model, RangeFilter};
///
/// let keys: Vec<u64> = (0..1000u64).map(|i| i * 1_000_003).collect();
/// let queries: Vec<(u64, u64)> = (0..100u64)
///     .map(|i| (i * 10_000_019 + 1, i * 10_000_019 + 5))
///     .collect();
///
/// let (depth, cutoff, bf_len) = model(&keys, &queries, 16.0, 64);
/// let filter = RangeFilter::build(&keys, depth, cutoff, bf_len, 16.0);
/// assert!(filter.point_query(&keys[0]));
/// ```
pub fn model<K: FilterKey>(
    keys: &[K],
    sample_queries: &[(K, K)],
    bits_per_key: f64,
    max_klen_bits: u32,
) -> (u32, u32, u32) {
    assert!(max_klen_bits > 0, "maximum key length must be positive");
    assert!(!keys.is_empty(), "cannot model an empty key set");
    debug_assert!(
        sample_queries.windows(2).all(|pair| pair[0].0 <= pair[1].0),
        "sample queries must be sorted by left bound"
    );
    let max_klen = max_klen_bits as usize;

    let key_prefixes = count_unique_key_prefixes(keys, max_klen_bits);
    let mut bf_mem = vec![0.0f64; max_klen + 1];
    let mut sd_cutoffs = vec![0u32; max_klen + 1];
    let max_trie_depth = calc_mem_dist(&mut bf_mem, &mut sd_cutoffs, &key_prefixes, bits_per_key);

    // Enough memory for a full trie: just use it.
    if max_trie_depth == max_klen {
        return (max_klen_bits, sd_cutoffs[max_klen], 0);
    }

    // Integer keys enumerate every feasible depth and all 64 prefix
    // lengths. String keys stride both grids so the candidate count stays
    // bounded for long keys.
    let (trconfs, bfconfs): (Vec<u32>, Vec<u32>) = if K::FIXED_WIDTH_BITS.is_none() {
        let trstep = 1 + max_trie_depth / 64;
        let bfstep = 1 + (max_klen - 1) / 64;
        (
            (0..=max_trie_depth).step_by(trstep).map(|d| d as u32).collect(),
            (1..=max_klen).step_by(bfstep).map(|p| p as u32).collect(),
        )
    } else {
        ((0..=max_trie_depth as u32).collect(), (1..=64).collect())
    };

    let mut best = find_best_conf(
        &trconfs,
        &bfconfs,
        keys,
        sample_queries,
        &key_prefixes,
        &bf_mem,
        max_klen_bits,
    );

    // No usable sample: no trie, and a filter prefix of half the maximum
    // key length.
    if best.empty_queries == 0 {
        return (0, 0, (max_klen / 2) as u32);
    }

    // For long string keys the strided grid is coarse; refine around the
    // winner.
    if K::FIXED_WIDTH_BITS.is_none() && max_klen > 64 && best.bfconf_idx > 0 {
        let bfconf_idx = best.bfconf_idx as usize;
        let trstart = if best.trconf_idx == 0 {
            trconfs[0]
        } else {
            trconfs[best.trconf_idx - 1] + 1
        };
        let trend = if best.trconf_idx == trconfs.len() - 1 {
            max_trie_depth as u32 + 1
        } else {
            trconfs[best.trconf_idx + 1] - 1
        };
        let bfstart = bfconfs[bfconf_idx - 1] + 1;
        let bfend = if bfconf_idx == bfconfs.len() - 1 {
            max_klen as u32
        } else {
            bfconfs[bfconf_idx + 1] - 1
        };

        let mut fine_trconfs = Vec::new();
        if trend > trstart {
            let trstep = (1 + ((trend - trstart) - 1) / 64) as usize;
            fine_trconfs.extend((trstart..trend).step_by(trstep));
        } else {
            fine_trconfs.push(trstart);
        }
        let mut fine_bfconfs = Vec::new();
        if bfend > bfstart {
            let bfstep = (1 + ((bfend - bfstart) - 1) / 64) as usize;
            fine_bfconfs.extend((bfstart..bfend).step_by(bfstep));
        } else {
            fine_bfconfs.push(bfstart);
        }

        if fine_trconfs.len() > 1 || fine_bfconfs.len() > 1 {
            let refined = find_best_conf(
                &fine_trconfs,
                &fine_bfconfs,
                keys,
                sample_queries,
                &key_prefixes,
                &bf_mem,
                max_klen_bits,
            );
            if refined.efpr < best.efpr {
                best = refined;
            }
        }
    }

    (
        best.trie_depth,
        sd_cutoffs[best.trie_depth as usize],
        best.bf_len,
    )
}

/// Counts the distinct key prefixes at every prefix length.
///
/// The LCP of consecutive keys is the length at which the later key becomes
/// unique, so accumulating LCP counts with a rolling sum yields
/// `result[len - 1]` = number of distinct prefixes of `len` bits. The final
/// slot collects duplicate-key LCPs and stays outside the rolling sum.
fn count_unique_key_prefixes<K: FilterKey>(keys: &[K], max_klen_bits: u32) -> Vec<u64> {
    let mut key_prefixes = vec![0u64; max_klen_bits as usize + 1];
    key_prefixes[0] = 1;
    for i in 1..keys.len() {
        let lcp = keys[i].lcp_bits(&keys[i - 1], max_klen_bits) as usize;
        key_prefixes[lcp] += 1;
    }
    let last = key_prefixes.len() - 1;
    for i in 1..last {
        key_prefixes[i] += key_prefixes[i - 1];
    }
    key_prefixes
}

/// Bit cost of a trie of `depth` bits with `cutoff` dense byte levels.
///
/// Dense levels cost two 256-bit bitmaps per node; sparse levels cost 10
/// bits per label (8 label + 1 child indicator + 1 LOUDS). A dense last
/// byte level is already paid for by the level above. Rank and select
/// directory overhead is proportional to the level sizes.
fn calc_trie_mem(cutoff: usize, depth: usize, dense_mem: &[u64], sparse_mem: &[u64]) -> u64 {
    let mut dmem = 0u64;
    let mut smem = 0u64;
    for level in 0..cutoff {
        dmem += dense_mem[level];
    }
    for level in cutoff..(depth - 1) / 8 {
        smem += sparse_mem[(level + 1) * 8];
    }
    if cutoff < (depth - 1) / 8 + 1 {
        smem += sparse_mem[depth];
    }

    dmem += (dmem / 512 + 1) * 4; // rank LUTs over both dense bitmaps
    let mut luts = (smem / 10 / 512 + 1) * 4; // sparse rank LUT
    luts += (smem / 10 / 64 + 1) * 4; // LOUDS select LUT
    dmem + smem + luts
}

/// Distributes the bit budget: for every trie depth, picks the cheapest
/// cutoff and assigns the remainder to the Bloom filter. Returns the
/// largest feasible depth.
fn calc_mem_dist(
    bf_mem: &mut [f64],
    sd_cutoffs: &mut [u32],
    key_prefixes: &[u64],
    bits_per_key: f64,
) -> usize {
    const DENSE_NODE_SIZE: u64 = 2 * 256;
    const SPARSE_NODE_SIZE: u64 = 8 + 2;
    let trie_depths = bf_mem.len();

    // Cost of each byte level when encoded dense: constant per node, so
    // driven by the prefix count one byte above.
    let mut dense_mem = vec![0u64; (trie_depths + 7) / 8];
    dense_mem[0] = DENSE_NODE_SIZE;
    for i in 1..dense_mem.len() {
        dense_mem[i] = key_prefixes[i * 8 - 1] * DENSE_NODE_SIZE;
    }

    // Cost of each possible sparse level, per trie depth, driven by the
    // label count at that depth.
    let mut sparse_mem = vec![0u64; trie_depths];
    for i in 1..trie_depths {
        sparse_mem[i] = key_prefixes[i - 1] * SPARSE_NODE_SIZE;
    }

    let mut trie_mem = vec![u64::MAX; trie_depths];
    trie_mem[0] = 0;
    for depth in 1..trie_depths {
        for cutoff in 0..=((depth - 1) / 8 + 1) {
            let mem = calc_trie_mem(cutoff, depth, &dense_mem, &sparse_mem);
            if mem < trie_mem[depth] {
                trie_mem[depth] = mem;
                sd_cutoffs[depth] = cutoff as u32;
            }
        }
        // Fixed per-instance metadata words of the filter, the layers, and
        // their rank/select/label/suffix headers.
        trie_mem[depth] += (23 + ((depth - 1) / 8 + 1) as u64) * 4 * 8;
    }

    let total_bits = (bits_per_key * key_prefixes[trie_depths - 2] as f64) as u64;
    let mut max_trie_depth = trie_depths - 1;
    for depth in 0..trie_depths {
        if trie_mem[depth] <= total_bits {
            bf_mem[depth] = (total_bits - trie_mem[depth]) as f64;
        } else {
            max_trie_depth = depth.saturating_sub(1);
            break;
        }
    }
    max_trie_depth
}

/// Bit-length LCPs of an empty query with its nearest keys on either side,
/// or `(-1, -1)` when the query actually hits the key set. `kstart` is a
/// monotone cursor over the sorted keys, advanced across the sorted query
/// sample.
fn kq_lcp<K: FilterKey>(
    keys: &[K],
    max_klen_bits: u32,
    kstart: &mut usize,
    qleft: &K,
    qright: &K,
) -> (i64, i64) {
    *kstart += keys[*kstart..].partition_point(|key| key < qleft);
    let ks = *kstart;

    // A key inside [qleft, qright) makes the query positive.
    if ks < keys.len() && &keys[ks] < qright {
        return (-1, -1);
    }

    let kleft = if ks > 0 { ks - 1 } else { ks };

    if qleft >= &keys[kleft] && ks < keys.len() && qright <= &keys[ks] {
        (
            keys[kleft].lcp_bits(qleft, max_klen_bits) as i64,
            keys[ks].lcp_bits(&qright.right_edge(), max_klen_bits) as i64,
        )
    } else if qleft < &keys[kleft] && qright <= &keys[kleft] {
        (
            -1,
            keys[kleft].lcp_bits(&qright.right_edge(), max_klen_bits) as i64,
        )
    } else if ks == keys.len() && keys.last().expect("keys are non-empty") < qleft {
        (
            keys.last().expect("keys are non-empty").lcp_bits(qleft, max_klen_bits) as i64,
            -1,
        )
    } else {
        unreachable!("query bounds are inconsistent with the sorted key set");
    }
}

fn find_best_conf<K: FilterKey>(
    trconfs: &[u32],
    bfconfs: &[u32],
    keys: &[K],
    sample_queries: &[(K, K)],
    key_prefixes: &[u64],
    bf_mem: &[f64],
    max_klen_bits: u32,
) -> BestConf {
    let mut resolved_in_trie = vec![0u64; trconfs.len()];
    let mut conf_counters: Vec<Vec<BinArray>> =
        vec![vec![[(0u64, 0u64); 64]; bfconfs.len()]; trconfs.len()];
    let mut pq_cache = vec![0u64; bfconfs.len()];

    let mut empty_queries = 0u64;
    let mut kstart = 0usize;

    for (qleft, qright) in sample_queries {
        let (lcp_left, lcp_right) = kq_lcp(keys, max_klen_bits, &mut kstart, qleft, qright);
        if lcp_left < 0 && lcp_right < 0 {
            continue;
        }
        empty_queries += 1;

        // Smallest prefix length at which all query prefixes and key
        // prefixes are distinct.
        let min_resolvable_len = (lcp_left.max(lcp_right) + 1) as u32;
        let qlcp = qleft.lcp_bits(qright, max_klen_bits);

        let last_trit = trconfs.partition_point(|&depth| depth < min_resolvable_len);

        // Cache the prefix counts for configurations where the whole query
        // runs in the Bloom filter.
        if trconfs[0] == 0 || trconfs[0] <= qlcp {
            let min_prefix_len = if trconfs[0] == 0 {
                min_resolvable_len
            } else {
                (trconfs[0] + 1).max(min_resolvable_len)
            };
            for bfconf_idx in bfconfs.partition_point(|&len| len < min_prefix_len)..bfconfs.len() {
                pq_cache[bfconf_idx] = qleft.count_prefixes(qright, bfconfs[bfconf_idx]);
            }
        }

        // Depth 0: no trie, the filter takes the whole query.
        if trconfs[0] == 0 {
            for bfconf_idx in
                bfconfs.partition_point(|&len| len < min_resolvable_len)..bfconfs.len()
            {
                let prefix_queries = pq_cache[bfconf_idx];
                // A zero count overflowed: guaranteed false positive.
                if prefix_queries != 0 {
                    let bin = prefix_queries.leading_zeros() as usize;
                    conf_counters[0][bfconf_idx][bin].0 += prefix_queries;
                    conf_counters[0][bfconf_idx][bin].1 += 1;
                }
            }
        }

        // Depths where the query is unresolved in the trie but resolvable
        // in the filter.
        let first_trit = if trconfs[0] == 0 { 1 } else { 0 };
        for trconf_idx in first_trit..last_trit {
            let depth = trconfs[trconf_idx];
            let bf_start =
                bfconfs.partition_point(|&len| len < (depth + 1).max(min_resolvable_len));
            'bfconf: for bfconf_idx in bf_start..bfconfs.len() {
                let bf_len = bfconfs[bfconf_idx];
                if depth > qlcp {
                    // The query spans two trie branches; an empty query can
                    // overlap at most the branch matching each bound, and at
                    // least one side does overlap below its key LCP.
                    let mut bf_prefix_queries = 0u64;
                    if (depth as i64) < lcp_left + 1 {
                        let max_left_prefix = qleft.edit(depth, true);
                        let count = qleft.count_prefixes(&max_left_prefix, bf_len);
                        if count == 0 {
                            continue 'bfconf;
                        }
                        bf_prefix_queries += count;
                    }
                    if (depth as i64) < lcp_right + 1 {
                        let min_right_prefix = qright.edit(depth, false);
                        let count = min_right_prefix.count_prefixes(qright, bf_len);
                        if count == 0 {
                            continue 'bfconf;
                        }
                        bf_prefix_queries += count;
                    }
                    if bf_prefix_queries != 0 {
                        let bin = bf_prefix_queries.leading_zeros() as usize;
                        conf_counters[trconf_idx][bfconf_idx][bin].0 += bf_prefix_queries;
                        conf_counters[trconf_idx][bfconf_idx][bin].1 += 1;
                    }
                } else {
                    // The whole query lives under one trie branch; the trie
                    // contributes nothing.
                    let prefix_queries = pq_cache[bfconf_idx];
                    if prefix_queries != 0 {
                        let bin = prefix_queries.leading_zeros() as usize;
                        conf_counters[trconf_idx][bfconf_idx][bin].0 += prefix_queries;
                        conf_counters[trconf_idx][bfconf_idx][bin].1 += 1;
                    }
                }
            }
        }

        // Depths that resolve this query entirely in the trie.
        for counter in resolved_in_trie.iter_mut().skip(last_trit) {
            *counter += 1;
        }
    }

    if empty_queries == 0 {
        return BestConf {
            empty_queries: 0,
            trie_depth: 0,
            bf_len: 0,
            efpr: 0.0,
            trconf_idx: 0,
            bfconf_idx: 0,
        };
    }

    let mut best = BestConf {
        empty_queries,
        trie_depth: 0,
        bf_len: 0,
        efpr: 1.0,
        trconf_idx: 0,
        bfconf_idx: 0,
    };

    for (trconf_idx, &depth) in trconfs.iter().enumerate() {
        // Trie-only candidate for this depth.
        let unresolved = empty_queries - resolved_in_trie[trconf_idx];
        let trie_efpr = unresolved as f64 / empty_queries as f64;
        if trie_efpr <= best.efpr {
            best.trie_depth = depth;
            best.bf_len = 0;
            best.efpr = trie_efpr;
            best.trconf_idx = trconf_idx;
            best.bfconf_idx = -1;
            if unresolved == 0 {
                // The trie resolves every sampled query; still keep a
                // filter prefix for robustness against unseen queries.
                best.bf_len = (depth + max_klen_bits) / 2;
                continue;
            }
        }

        // The filter prefix is always at least one bit longer than the
        // trie depth.
        for bfconf_idx in bfconfs.partition_point(|&len| len < depth + 1)..bfconfs.len() {
            let bf_len = bfconfs[bfconf_idx];
            let n = key_prefixes[(bf_len - 1) as usize] as f64;
            let m = bf_mem[depth as usize];
            let nhf = (std::f64::consts::LN_2 * m / n)
                .round()
                .clamp(1.0, MAX_HASH_FUNCS as f64);
            let prefix_query_fpr = (1.0 - (-(nhf * n / m)).exp()).powf(nhf);

            // Expected false-positive probability summed over the bins.
            let mut cumulative_fpp = 0.0f64;
            let mut resolved_in_bf = 0u64;
            for &(query_sum, query_count) in &conf_counters[trconf_idx][bfconf_idx] {
                if query_count > 0 {
                    resolved_in_bf += query_count;
                    let avg_prefix_queries = query_sum as f64 / query_count as f64;
                    cumulative_fpp += query_count as f64
                        * (1.0 - (1.0 - prefix_query_fpr).powf(avg_prefix_queries));
                }
            }
            // Queries resolvable in neither structure are certain false
            // positives.
            cumulative_fpp +=
                (empty_queries - resolved_in_bf - resolved_in_trie[trconf_idx]) as f64;

            let efpr = cumulative_fpp / empty_queries as f64;
            if efpr <= best.efpr {
                best = BestConf {
                    empty_queries,
                    trie_depth: depth,
                    bf_len,
                    efpr,
                    trconf_idx,
                    bfconf_idx: bfconf_idx as isize,
                };
            }
        }
    }

    best
}
