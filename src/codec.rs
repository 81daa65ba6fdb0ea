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

//! Little-endian byte writer/cursor for the serialized filter format.
//!
//! All multi-byte fields in the image are little-endian. Bit-array blocks
//! are padded to 8-byte boundaries; both sides of the codec track the
//! absolute offset so the pads line up.

use std::io;
use std::io::Read;

/// Rounds a byte size up to the next 8-byte boundary.
pub(crate) fn size_align(size: u64) -> u64 {
    (size + 7) & !7u64
}

pub(crate) struct FilterBytes {
    bytes: Vec<u8>,
}

impl FilterBytes {
    pub fn new() -> Self {
        Self { bytes: vec![] }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn write(&mut self, buf: &[u8]) {
        self.bytes.extend_from_slice(buf);
    }

    pub fn write_u8(&mut self, n: u8) {
        self.bytes.push(n);
    }

    pub fn write_u32_le(&mut self, n: u32) {
        self.write(&n.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }

    /// Writes a packed word vector, one little-endian `u64` per word.
    pub fn write_words(&mut self, words: &[u64]) {
        for &word in words {
            self.write_u64_le(word);
        }
    }

    /// Pads with zero bytes to the next 8-byte boundary.
    pub fn pad_to_align(&mut self) {
        while self.bytes.len() % 8 != 0 {
            self.bytes.push(0);
        }
    }
}

pub(crate) struct FilterSlice<'a> {
    slice: &'a [u8],
    pos: usize,
}

impl<'a> FilterSlice<'a> {
    pub fn new(slice: &'a [u8]) -> FilterSlice<'a> {
        FilterSlice { slice, pos: 0 }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut rest = &self.slice[self.pos.min(self.slice.len())..];
        rest.read_exact(buf)?;
        self.pos += buf.len();
        Ok(())
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_words(&mut self, num_words: usize) -> io::Result<Vec<u64>> {
        let mut words = vec![0u64; num_words];
        for word in &mut words {
            *word = self.read_u64_le()?;
        }
        Ok(words)
    }

    /// Skips pad bytes up to the next 8-byte boundary.
    pub fn skip_to_align(&mut self) -> io::Result<()> {
        let target = size_align(self.pos as u64) as usize;
        if target > self.slice.len() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.pos = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_align() {
        assert_eq!(size_align(0), 0);
        assert_eq!(size_align(1), 8);
        assert_eq!(size_align(8), 8);
        assert_eq!(size_align(13), 16);
    }

    #[test]
    fn test_round_trip_with_padding() {
        let mut out = FilterBytes::new();
        out.write_u32_le(7);
        out.pad_to_align();
        out.write_words(&[0xDEAD_BEEF_u64, 42]);
        out.write_u8(b'1');
        let bytes = out.into_bytes();
        assert_eq!(bytes.len(), 8 + 16 + 1);

        let mut cur = FilterSlice::new(&bytes);
        assert_eq!(cur.read_u32_le().unwrap(), 7);
        cur.skip_to_align().unwrap();
        assert_eq!(cur.read_words(2).unwrap(), vec![0xDEAD_BEEF_u64, 42]);
        assert_eq!(cur.read_u8().unwrap(), b'1');
        assert!(cur.read_u8().is_err());
    }

    #[test]
    fn test_truncated_read() {
        let bytes = [1u8, 2, 3];
        let mut cur = FilterSlice::new(&bytes);
        assert!(cur.read_u32_le().is_err());
    }
}
