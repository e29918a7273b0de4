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

//! Optional header encryption (spec §4.2).
//!
//! A community that enables header encryption encrypts the fixed 16-byte
//! prefix of every packet — version, ttl, flags, and the first 12 bytes of
//! the community name — as a single Speck128/128 block keyed from the
//! community name alone (so a receiver with no prior knowledge of which
//! community a datagram belongs to can still try its candidate keys). The
//! plaintext's leading byte is always [`crate::protocol::PROTOCOL_VERSION`];
//! a receiver uses that as the magic marker confirming it picked the right
//! key before committing to the rest of the dispatch.

use crate::protocol::PROTOCOL_VERSION;

use super::kdf::derive_header_key;
use super::speck::SpeckKey;

/// Size of the encrypted header block: version + ttl + flags + 12-byte
/// community prefix.
pub const HEADER_BLOCK_SIZE: usize = 16;

/// A community's header-encryption key, derived once and reused for every
/// packet it sends or receives.
pub struct HeaderCipher {
    key: SpeckKey,
}

impl HeaderCipher {
    /// Derive the header cipher for `community`.
    pub fn new(community: &[u8]) -> Self {
        let key_bytes = derive_header_key(community);
        Self { key: SpeckKey::new(&key_bytes) }
    }

    /// Encrypt the leading [`HEADER_BLOCK_SIZE`] bytes of `packet` in place.
    ///
    /// Panics if `packet` is shorter than [`HEADER_BLOCK_SIZE`]; callers
    /// never invoke this on anything shorter than a common header.
    pub fn encrypt_prefix(&self, packet: &mut [u8]) {
        let mut block: [u8; HEADER_BLOCK_SIZE] =
            packet[..HEADER_BLOCK_SIZE].try_into().expect("packet shorter than header block");
        self.key.encrypt_block(&mut block);
        packet[..HEADER_BLOCK_SIZE].copy_from_slice(&block);
    }

    /// Attempt to decrypt the leading block of `packet`, returning the
    /// plaintext iff its first byte matches [`PROTOCOL_VERSION`]. A `None`
    /// result means either the wrong key was tried or the packet never had
    /// its header encrypted.
    pub fn try_decrypt_prefix(&self, packet: &[u8]) -> Option<[u8; HEADER_BLOCK_SIZE]> {
        if packet.len() < HEADER_BLOCK_SIZE {
            return None;
        }
        let mut block: [u8; HEADER_BLOCK_SIZE] =
            packet[..HEADER_BLOCK_SIZE].try_into().unwrap();
        self.key.decrypt_block(&mut block);
        if block[0] == PROTOCOL_VERSION {
            Some(block)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_and_recognizes_own_community() {
        let cipher = HeaderCipher::new(b"acme");
        let mut packet = vec![0u8; 64];
        packet[0] = PROTOCOL_VERSION;
        packet[1] = 32;
        packet[4..16].copy_from_slice(b"acme\0\0\0\0\0\0\0\0");
        let original_prefix = packet[..HEADER_BLOCK_SIZE].to_vec();

        cipher.encrypt_prefix(&mut packet);
        assert_ne!(&packet[..HEADER_BLOCK_SIZE], &original_prefix[..]);

        let recovered = cipher.try_decrypt_prefix(&packet).unwrap();
        assert_eq!(&recovered[..], &original_prefix[..]);
    }

    #[test]
    fn wrong_community_key_does_not_match_marker() {
        let sender = HeaderCipher::new(b"acme");
        let wrong = HeaderCipher::new(b"other");
        let mut packet = vec![0u8; 64];
        packet[0] = PROTOCOL_VERSION;
        sender.encrypt_prefix(&mut packet);
        assert!(wrong.try_decrypt_prefix(&packet).is_none());
    }
}
