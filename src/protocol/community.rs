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

//! Community names: a bounded ASCII identifier, NUL-padded to a fixed width
//! on the wire and used as the header-encryption and KDF salt.

use super::cursor::{ReadCursor, WriteCursor, WireError};

/// Wire size of the community field, including the terminator.
pub const COMMUNITY_SIZE: usize = 20;

/// A community name, stored NUL-padded to `COMMUNITY_SIZE` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Community([u8; COMMUNITY_SIZE]);

impl Community {
    /// Build from an ASCII name, truncating (never panicking) at
    /// `COMMUNITY_SIZE - 1` bytes to leave room for the terminator.
    pub fn new(name: &str) -> Self {
        let mut buf = [0u8; COMMUNITY_SIZE];
        let bytes = name.as_bytes();
        let n = bytes.len().min(COMMUNITY_SIZE - 1);
        buf[..n].copy_from_slice(&bytes[..n]);
        Community(buf)
    }

    /// Raw NUL-padded bytes as they appear on the wire.
    pub fn as_bytes(&self) -> &[u8; COMMUNITY_SIZE] {
        &self.0
    }

    /// The name up to the first NUL, as a lossy UTF-8 string (names are
    /// ASCII by contract; lossy conversion only matters for malformed input).
    pub fn name(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(COMMUNITY_SIZE);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }

    pub(crate) fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        w.put_buf(&self.0)
    }

    pub(crate) fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let mut out = [0u8; COMMUNITY_SIZE];
        r.get_exact(&mut out)?;
        Ok(Community(out))
    }
}

impl std::fmt::Debug for Community {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Community({:?})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_padded() {
        let c = Community::new("acme");
        assert_eq!(&c.as_bytes()[..5], b"acme\0");
        assert_eq!(c.name(), "acme");
    }

    #[test]
    fn truncates_oversized_names() {
        let long = "x".repeat(64);
        let c = Community::new(&long);
        assert_eq!(c.name().len(), COMMUNITY_SIZE - 1);
    }
}
