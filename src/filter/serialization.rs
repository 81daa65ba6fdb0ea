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

//! Byte-exact serialization of the whole filter.
//!
//! Layout (all little-endian):
//!
//! ```text
//! u32 trie_depth_bits
//! u32 sparse_dense_cutoff_bytes
//! if trie_depth_bits > 0:
//!   dense_block   (if sparse_dense_cutoff_bytes > 0)
//!   sparse_block  (if sparse_dense_cutoff_bytes < ceil(trie_depth_bits/8))
//! u8 has_prefix_filter  ('0' or '1')
//! prefix filter block   (if '1')
//! ```
//!
//! Bit-vector sub-blocks are `num_bits` metadata plus packed words on
//! 8-byte boundaries; rank and select directories are rebuilt at load.
//! Deserialization copies into owned buffers and validates structure; a
//! malformed image yields [`ErrorKind::MalformedDeserializeData`] and never
//! a partially constructed filter.

use std::marker::PhantomData;

use crate::bloom::PrefixBloom;
use crate::codec::FilterBytes;
use crate::codec::FilterSlice;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::filter::RangeFilter;
use crate::key::FilterKey;
use crate::trie::DenseLayer;
use crate::trie::SparseLayer;

impl<K: FilterKey> RangeFilter<K> {
    /// Serializes the filter to a contiguous byte image.
    ///
    /// # Examples
    ///
    /// ```
    /// use rangesieve::RangeFilter;
    ///
    /// let keys: Vec<u64> = vec![10, 20, 30];
    /// let filter = RangeFilter::build(&keys, 64, 0, 0, 20.0);
    /// let image = filter.serialize();
    ///
    /// let restored = RangeFilter::<u64>::deserialize(&image).unwrap();
    /// assert!(restored.point_query(&20));
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        let capacity = 8
            + self.trie_serialized_size()
            + 1
            + self.prefix_filter().map_or(0, |f| f.serialized_size());
        let mut out = FilterBytes::with_capacity(capacity as usize);

        out.write_u32_le(self.trie_depth());
        out.write_u32_le(self.sparse_dense_cutoff());
        out.pad_to_align();

        if self.trie_depth() > 0 {
            if let Some(dense) = &self.dense {
                dense.serialize_into(&mut out);
            }
            if let Some(sparse) = &self.sparse {
                sparse.serialize_into(&mut out);
            }
        }

        match &self.prefix_filter {
            Some(filter) => {
                out.write_u8(b'1');
                filter.serialize_into(&mut out);
            }
            None => out.write_u8(b'0'),
        }

        out.into_bytes()
    }

    /// Deserializes a filter from a byte image produced by
    /// [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`] when the image is
    /// truncated, its parameters are inconsistent, or the prefix-filter
    /// flag is not `'0'`/`'1'`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = FilterSlice::new(bytes);

        let trie_depth = cursor
            .read_u32_le()
            .map_err(|_| Error::truncated("trie_depth"))?;
        let sparse_dense_cutoff = cursor
            .read_u32_le()
            .map_err(|_| Error::truncated("sparse_dense_cutoff"))?;
        if trie_depth > 0 && sparse_dense_cutoff * 8 >= trie_depth + 8 {
            return Err(Error::new(
                ErrorKind::MalformedDeserializeData,
                "sparse/dense cutoff is deeper than the trie",
            )
            .with_context("trie_depth", trie_depth)
            .with_context("sparse_dense_cutoff", sparse_dense_cutoff));
        }
        cursor
            .skip_to_align()
            .map_err(|_| Error::truncated("metadata padding"))?;

        let mut filter = RangeFilter {
            trie_depth,
            sparse_dense_cutoff,
            dense: None,
            sparse: None,
            prefix_filter: None,
            _key: PhantomData,
        };

        if trie_depth > 0 {
            if sparse_dense_cutoff > 0 {
                let dense = DenseLayer::deserialize_from(&mut cursor, trie_depth)
                    .map_err(|_| Error::truncated("dense_block"))?;
                filter.dense = Some(dense);
            }
            if sparse_dense_cutoff < trie_depth.div_ceil(8) {
                let sparse = SparseLayer::deserialize_from(&mut cursor, trie_depth)
                    .map_err(|_| Error::truncated("sparse_block"))?;
                filter.sparse = Some(sparse);
            }
        }

        let flag = cursor
            .read_u8()
            .map_err(|_| Error::truncated("has_prefix_filter"))?;
        match flag {
            b'0' => {}
            b'1' => {
                let bloom = PrefixBloom::deserialize_from(&mut cursor)
                    .map_err(|_| Error::truncated("prefix_filter"))?;
                filter.prefix_filter = Some(bloom);
            }
            other => {
                return Err(Error::new(
                    ErrorKind::MalformedDeserializeData,
                    "invalid prefix-filter flag",
                )
                .with_context("flag", other));
            }
        }

        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_trie_only() {
        let keys: Vec<u64> = (0..1000u64).map(|i| i * 7919).collect();
        let filter = RangeFilter::build(&keys, 64, 1, 0, 20.0);
        let image = filter.serialize();
        let restored = RangeFilter::<u64>::deserialize(&image).unwrap();

        for &key in &keys {
            assert!(restored.point_query(&key));
        }
        assert_eq!(restored.serialize(), image);
    }

    #[test]
    fn test_round_trip_with_prefix_filter() {
        let keys: Vec<u64> = (0..500u64).map(|i| i << 20).collect();
        let filter = RangeFilter::build(&keys, 16, 1, 40, 18.0);
        assert!(filter.prefix_filter().is_some());
        let image = filter.serialize();
        let restored = RangeFilter::<u64>::deserialize(&image).unwrap();
        assert_eq!(restored.serialize(), image);
        for &key in &keys {
            assert!(restored.point_query(&key));
        }
    }

    #[test]
    fn test_truncated_image_fails() {
        let keys: Vec<u64> = vec![1, 2, 3];
        let image = RangeFilter::build(&keys, 64, 0, 0, 20.0).serialize();
        for len in 0..image.len().min(16) {
            let err = RangeFilter::<u64>::deserialize(&image[..len]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        }
    }

    #[test]
    fn test_invalid_flag_fails() {
        let keys: Vec<u64> = vec![1, 2, 3];
        let mut image = RangeFilter::build(&keys, 64, 0, 0, 20.0).serialize();
        let last = image.len() - 1;
        image[last] = b'9';
        let err = RangeFilter::<u64>::deserialize(&image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }
}
