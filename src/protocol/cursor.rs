// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Buffer cursor pair used by the wire codec.
//!
//! `WriteCursor` never allocates: every encode writes into a caller-supplied
//! buffer and advances a position. `ReadCursor` tracks a remaining-byte
//! counter and fails cleanly instead of reading out of bounds.

use thiserror::Error;

/// Errors produced while decoding a byte buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes remained in the buffer than the field required.
    #[error("buffer underrun")]
    Underrun,
    /// The version byte did not match the protocol constant.
    #[error("protocol version mismatch")]
    BadVersion,
    /// The low bits of `flags` did not name a known packet type.
    #[error("unknown packet type")]
    UnknownPacketType,
    /// A socket's family tag was neither the IPv4 nor the IPv6 marker.
    #[error("bad socket family")]
    BadSocketFamily,
    /// The caller's output buffer was too small to hold the encoded bytes.
    #[error("output buffer too small")]
    BufferTooSmall,
}

/// Cursor over a mutable buffer used only for encoding.
pub struct WriteCursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Wrap `buf` for encoding, starting at offset 0.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pos
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn require(&self, n: usize) -> Result<(), WireError> {
        if self.pos + n > self.buf.len() {
            return Err(WireError::BufferTooSmall);
        }
        Ok(())
    }

    /// Write a single byte and advance.
    pub fn put_u8(&mut self, v: u8) -> Result<usize, WireError> {
        self.require(1)?;
        self.buf[self.pos] = v;
        self.pos += 1;
        Ok(1)
    }

    /// Write a big-endian u16 and advance.
    pub fn put_u16(&mut self, v: u16) -> Result<usize, WireError> {
        self.require(2)?;
        self.buf[self.pos..self.pos + 2].copy_from_slice(&v.to_be_bytes());
        self.pos += 2;
        Ok(2)
    }

    /// Write a big-endian u32 and advance.
    pub fn put_u32(&mut self, v: u32) -> Result<usize, WireError> {
        self.require(4)?;
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_be_bytes());
        self.pos += 4;
        Ok(4)
    }

    /// Write a big-endian u64 and advance.
    pub fn put_u64(&mut self, v: u64) -> Result<usize, WireError> {
        self.require(8)?;
        self.buf[self.pos..self.pos + 8].copy_from_slice(&v.to_be_bytes());
        self.pos += 8;
        Ok(8)
    }

    /// Copy `src` verbatim and advance.
    pub fn put_buf(&mut self, src: &[u8]) -> Result<usize, WireError> {
        self.require(src.len())?;
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
        Ok(src.len())
    }

    /// Remaining writable slice, for callers that append raw ciphertext.
    pub fn remaining_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.pos..]
    }

    /// Advance past bytes written directly into `remaining_mut()`.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }
}

/// Cursor over an immutable buffer used only for decoding.
pub struct ReadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    remaining: usize,
}

impl<'a> ReadCursor<'a> {
    /// Wrap `buf` for decoding, starting at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, remaining: buf.len() }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn need(&mut self, n: usize) -> Result<(), WireError> {
        if self.remaining < n {
            return Err(WireError::Underrun);
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        self.remaining -= 1;
        Ok(v)
    }

    /// Read a big-endian u16.
    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        self.remaining -= 2;
        Ok(v)
    }

    /// Read a big-endian u32.
    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        self.need(4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        self.remaining -= 4;
        Ok(u32::from_be_bytes(b))
    }

    /// Read a big-endian u64 as a plain byte-offset read (not pointer arithmetic).
    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        self.need(8)?;
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        self.remaining -= 8;
        Ok(u64::from_be_bytes(b))
    }

    /// Read exactly `n` bytes into a freshly allocated `Vec`.
    pub fn get_vec(&mut self, n: usize) -> Result<Vec<u8>, WireError> {
        self.need(n)?;
        let v = self.buf[self.pos..self.pos + n].to_vec();
        self.pos += n;
        self.remaining -= n;
        Ok(v)
    }

    /// Read exactly `out.len()` bytes into `out`.
    pub fn get_exact(&mut self, out: &mut [u8]) -> Result<(), WireError> {
        self.need(out.len())?;
        out.copy_from_slice(&self.buf[self.pos..self.pos + out.len()]);
        self.pos += out.len();
        self.remaining -= out.len();
        Ok(())
    }

    /// Borrow the remaining bytes without consuming them; the PACKET body's
    /// ciphertext payload runs to the end of the datagram.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let mut buf = [0u8; 32];
        let mut w = WriteCursor::new(&mut buf);
        w.put_u8(0x7f).unwrap();
        w.put_u16(0xbeef).unwrap();
        w.put_u32(0xdead_beef).unwrap();
        w.put_u64(0x0102_0304_0506_0708).unwrap();
        w.put_buf(b"hello").unwrap();
        let n = w.len();

        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(r.get_u8().unwrap(), 0x7f);
        assert_eq!(r.get_u16().unwrap(), 0xbeef);
        assert_eq!(r.get_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.get_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.get_vec(5).unwrap(), b"hello");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn underrun_is_clean() {
        let buf = [0u8; 1];
        let mut r = ReadCursor::new(&buf);
        assert_eq!(r.get_u32(), Err(WireError::Underrun));
    }
}
