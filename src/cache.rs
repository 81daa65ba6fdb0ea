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

//! FIFO cache of sampled range queries.
//!
//! The cache feeds [`model`](crate::model::model) with a recent workload
//! sample at rebuild time. It is the only mutable shared state around the
//! filter: inserts admit every `sample_rate`-th query under a mutex and
//! overwrite the ring round-robin; readers take a snapshot.

use std::sync::Mutex;

use crate::key::FilterKey;

/// A fixed-capacity FIFO ring of sampled range queries.
pub struct SampleQueryCache<K> {
    sample_rate: usize,
    inner: Mutex<Inner<K>>,
}

struct Inner<K> {
    sample_queries: Vec<(K, K)>,
    /// Slot of the next overwrite.
    pos: usize,
    counter: usize,
}

impl<K: FilterKey> SampleQueryCache<K> {
    /// Creates a cache seeded with `initial_sample`; its length fixes the
    /// capacity. Every `sample_rate`-th added query is admitted.
    pub fn new(initial_sample: Vec<(K, K)>, sample_rate: usize) -> Self {
        assert!(sample_rate >= 1, "sample rate must be at least 1");
        SampleQueryCache {
            sample_rate,
            inner: Mutex::new(Inner {
                sample_queries: initial_sample,
                pos: 0,
                counter: 0,
            }),
        }
    }

    /// Records a range query, admitting every `sample_rate`-th call.
    pub fn add(&self, query: (K, K)) {
        let mut inner = self.inner.lock().expect("sample cache poisoned");
        inner.counter = if inner.counter == self.sample_rate - 1 {
            0
        } else {
            inner.counter + 1
        };
        if inner.counter == 0 && !inner.sample_queries.is_empty() {
            let pos = inner.pos;
            inner.sample_queries[pos] = query;
            inner.pos = if pos == inner.sample_queries.len() - 1 {
                0
            } else {
                pos + 1
            };
        }
    }

    /// Snapshot of the sample, sorted by left bound, ready for the modeler.
    pub fn sample(&self) -> Vec<(K, K)> {
        let inner = self.inner.lock().expect("sample cache poisoned");
        let mut sample = inner.sample_queries.clone();
        sample.sort();
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_every_nth_query() {
        let cache = SampleQueryCache::new(vec![(0u64, 0u64); 4], 3);
        for i in 1..=12u64 {
            cache.add((i, i + 1));
        }
        // Every 3rd query lands: 3, 6, 9, 12.
        let sample = cache.sample();
        assert_eq!(sample, vec![(3, 4), (6, 7), (9, 10), (12, 13)]);
    }

    #[test]
    fn test_ring_overwrites_oldest_first() {
        let cache = SampleQueryCache::new(vec![(0u64, 0u64); 2], 1);
        cache.add((1, 2));
        cache.add((3, 4));
        cache.add((5, 6));
        let sample = cache.sample();
        assert_eq!(sample, vec![(3, 4), (5, 6)]);
    }

    #[test]
    fn test_sample_rate_one_admits_all() {
        let cache = SampleQueryCache::new(vec![(0u64, 0u64); 3], 1);
        cache.add((9, 10));
        assert!(cache.sample().contains(&(9, 10)));
    }

    #[test]
    fn test_empty_cache_ignores_adds() {
        let cache = SampleQueryCache::new(Vec::<(u64, u64)>::new(), 1);
        cache.add((1, 2));
        assert!(cache.sample().is_empty());
    }
}
