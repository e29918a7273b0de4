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

//! Symmetric key derivation from a community name and an ASCII encryption key
//! (spec §4.2). Grounded in the teacher's `core::security::keystore` use of a
//! digest to bind material to a context instead of using the raw passphrase.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Derive `out.len()` key bytes from `community` and `ascii_key`.
///
/// `out.len()` must be <= 32 (the digest size); longer keys are not
/// supported by any transform this crate implements.
pub fn derive_key(community: &[u8], ascii_key: &[u8], out: &mut [u8]) {
    assert!(out.len() <= 32, "derive_key: requested key longer than SHA-256 digest");
    let mut hasher = Sha256::new();
    hasher.update(community);
    hasher.update([0u8]);
    hasher.update(ascii_key);
    let mut digest = hasher.finalize();
    out.copy_from_slice(&digest[..out.len()]);
    digest.zeroize();
}

/// Derive the 16-byte key used for optional header encryption, salted
/// distinctly from the payload transform key so the two never collide.
pub fn derive_header_key(community: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(b"n2n-header-enc");
    hasher.update(community);
    let digest = hasher.finalize();
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}
