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

//! The succinct trie over fixed-length key prefixes.
//!
//! The trie encodes every distinct `trie_depth`-bit prefix of the key set
//! across `ceil(trie_depth / 8)` byte levels with fanout 256. The top
//! `sparse_dense_cutoff` byte levels use one pair of 256-bit bitmaps per
//! node ([`DenseLayer`]); the remaining levels use a LOUDS encoding of
//! label bytes with parallel child-indicator and node-boundary bits
//! ([`SparseLayer`]). Leaves carry real suffixes that extend the stored
//! prefix up to the trie depth.
//!
//! [`TrieBuilder`] fills the per-level vectors in a single pass over the
//! sorted keys; the layers then take immutable, rank/select-indexed copies.
//! All navigation is by rank and select over bit arrays; there are no
//! parent pointers.

pub mod builder;
pub mod dense;
pub mod sparse;

pub use self::builder::TrieBuilder;
pub use self::dense::DenseLayer;
pub use self::sparse::SparseLayer;

/// Node fanout: one edge per byte value.
pub(crate) const FANOUT: u32 = 256;
