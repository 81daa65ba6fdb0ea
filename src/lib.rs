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

//! A learned range filter for sorted key sets.
//!
//! A [`RangeFilter`] is an immutable, space-bounded structure that answers
//! range-emptiness queries — "does any stored key fall in this interval?" —
//! with no false negatives and a tunable false-positive rate. Internally it
//! combines a succinct trie over fixed-length key prefixes (dense bitmaps for
//! the top levels, LOUDS encoding below) with a prefix Bloom filter sized to
//! the residual bit budget. The [`model`](model::model) function picks the
//! trie depth, sparse/dense cutoff, and Bloom prefix length that minimize the
//! expected false-positive rate for a sampled workload of empty queries.
//!
//! # Usage
//!
//! ```rust
//! use rangesieve::RangeFilter;
//!
//! let keys: Vec<u64> = vec![10, 20, 30, 40];
//! let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);
//!
//! assert!(filter.point_query(&20));
//! assert!(filter.range_query(&12, &28)); // covers 20
//! ```
//!
//! # Notes
//!
//! - Input keys must be sorted. Duplicates are collapsed silently.
//! - Integer range queries take `[l, r)`; byte-string range queries take
//!   `[l, r]`.
//! - Filters are immutable once built and safe to share across threads by
//!   shared reference.

pub mod bits;
pub mod bloom;
pub mod cache;
pub mod codec;
pub mod common;
pub mod error;
pub mod filter;
pub mod hash;
pub mod key;
pub mod model;
pub mod trie;

pub use self::cache::SampleQueryCache;
pub use self::error::Error;
pub use self::error::ErrorKind;
pub use self::filter::RangeFilter;
pub use self::key::FilterKey;
pub use self::model::model;
