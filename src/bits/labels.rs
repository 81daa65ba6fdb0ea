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

/// Sparse-node edge labels in level order, one byte per edge.
///
/// Labels within a node are strictly ascending, and a node spans at most 256
/// positions, so the bounded linear scans below stay cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVector {
    labels: Vec<u8>,
}

impl LabelVector {
    pub(crate) fn from_levels(levels: &[Vec<u8>], start_level: usize, end_level: usize) -> Self {
        let num_bytes = levels[start_level..end_level]
            .iter()
            .map(|level| level.len())
            .sum();
        let mut labels = Vec::with_capacity(num_bytes);
        for level in &levels[start_level..end_level] {
            labels.extend_from_slice(level);
        }
        LabelVector { labels }
    }

    pub fn len(&self) -> u32 {
        self.labels.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn read(&self, pos: u32) -> u8 {
        self.labels[pos as usize]
    }

    /// Finds `label` within the `node_size` labels starting at `start_pos`.
    pub fn search(&self, label: u8, start_pos: u32, node_size: u32) -> Option<u32> {
        let end = (start_pos + node_size).min(self.len());
        (start_pos..end).find(|&pos| self.labels[pos as usize] == label)
    }

    /// Finds the first label strictly greater than `label` within the
    /// `node_size` labels starting at `start_pos`.
    pub fn search_greater_than(&self, label: u8, start_pos: u32, node_size: u32) -> Option<u32> {
        let end = (start_pos + node_size).min(self.len());
        (start_pos..end).find(|&pos| self.labels[pos as usize] > label)
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.labels.len()
    }

    pub(crate) fn serialized_size(&self) -> u64 {
        size_align(4 + self.labels.len() as u64)
    }

    pub(crate) fn serialize_into(&self, out: &mut FilterBytes) {
        out.write_u32_le(self.labels.len() as u32);
        out.write(&self.labels);
        out.pad_to_align();
    }

    pub(crate) fn deserialize_from(cursor: &mut FilterSlice<'_>) -> io::Result<Self> {
        let num_bytes = cursor.read_u32_le()?;
        let labels = cursor.read_bytes(num_bytes as usize)?;
        cursor.skip_to_align()?;
        Ok(LabelVector { labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LabelVector {
        LabelVector::from_levels(&[vec![b'a', b'c', b'f'], vec![b'b', b'z']], 0, 2)
    }

    #[test]
    fn test_search_exact() {
        let lv = sample();
        assert_eq!(lv.search(b'c', 0, 3), Some(1));
        assert_eq!(lv.search(b'd', 0, 3), None);
        // Bounded by node size: 'z' lives in the next node.
        assert_eq!(lv.search(b'z', 0, 3), None);
        assert_eq!(lv.search(b'z', 3, 2), Some(4));
    }

    #[test]
    fn test_search_greater_than() {
        let lv = sample();
        assert_eq!(lv.search_greater_than(b'a', 0, 3), Some(1));
        assert_eq!(lv.search_greater_than(b'c', 0, 3), Some(2));
        assert_eq!(lv.search_greater_than(b'f', 0, 3), None);
    }

    #[test]
    fn test_search_clamps_to_length() {
        let lv = sample();
        assert_eq!(lv.search(b'z', 3, 256), Some(4));
        assert_eq!(lv.search_greater_than(b'z', 3, 256), None);
    }

    #[test]
    fn test_serialize_round_trip() {
        let lv = sample();
        let mut out = FilterBytes::new();
        lv.serialize_into(&mut out);
        let bytes = out.into_bytes();
        assert_eq!(bytes.len() as u64, lv.serialized_size());
        let mut cursor = FilterSlice::new(&bytes);
        assert_eq!(LabelVector::deserialize_from(&mut cursor).unwrap(), lv);
    }
}
