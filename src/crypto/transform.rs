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

//! Per-community symmetric transforms (spec C2).
//!
//! Every non-null transform prepends an 8-byte big-endian wire timestamp
//! (spec §4.2, see [`super::replay`]) ahead of its ciphertext and derives
//! the stream cipher's IV/nonce from it, so two frames from the same sender
//! never reuse a keystream. [`TransformId::Null`] carries the payload in
//! the clear, matching the reference implementation's pass-through mode
//! used for debugging and for communities with `encryption off`.

use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr64BE;
use thiserror::Error;
use twofish::Twofish;

use super::replay::ReplayWindow;
use super::speck::SpeckKey;
use crate::protocol::MacAddr;

const TS_SIZE: usize = 8;

/// Failures that cause a single frame to be dropped; they never tear down
/// the connection they arrived on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// Ciphertext shorter than the mandatory timestamp prefix.
    #[error("ciphertext shorter than the timestamp prefix")]
    Truncated,
    /// The embedded timestamp failed the replay window check.
    #[error("timestamp rejected by replay window")]
    Replayed,
}

/// The five transforms a community may select, plus the sentinel used
/// before a cipher has been chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransformId {
    /// No transform selected yet.
    Invalid = 0,
    /// Payload carried in the clear.
    Null = 1,
    /// Twofish in CTR mode.
    Twofish = 2,
    /// AES-256 in CTR mode.
    Aes = 3,
    /// ChaCha20.
    ChaCha20 = 4,
    /// Speck128/128 in CTR mode.
    Speck = 5,
}

impl TransformId {
    /// Map the wire byte used in [`crate::protocol::packet::DataPacket`] to
    /// a transform id.
    pub fn from_wire(b: u8) -> Option<Self> {
        Some(match b {
            0 => TransformId::Invalid,
            1 => TransformId::Null,
            2 => TransformId::Twofish,
            3 => TransformId::Aes,
            4 => TransformId::ChaCha20,
            5 => TransformId::Speck,
            _ => return None,
        })
    }

    /// The wire byte for this transform.
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

fn iv_from_timestamp(ts: u64, len: usize) -> Vec<u8> {
    let mut iv = vec![0u8; len];
    iv[len - TS_SIZE..].copy_from_slice(&ts.to_be_bytes());
    iv
}

fn speck_ctr_apply(key: &SpeckKey, iv: &[u8; 16], data: &mut [u8]) {
    let mut counter_block = *iv;
    let mut keystream = [0u8; 16];
    for chunk in data.chunks_mut(16) {
        keystream = counter_block;
        key.encrypt_block(&mut keystream);
        for (b, k) in chunk.iter_mut().zip(keystream.iter()) {
            *b ^= k;
        }
        let ctr = u64::from_be_bytes(counter_block[8..16].try_into().unwrap());
        counter_block[8..16].copy_from_slice(&ctr.wrapping_add(1).to_be_bytes());
    }
}

/// A keyed, selected transform ready to encode or decode payloads.
pub enum Transform {
    /// Pass-through; no replay timestamp is added.
    Null,
    /// AES-256-CTR, keyed by a 32-byte key derived via [`super::kdf`].
    Aes(Box<[u8; 32]>),
    /// Twofish-CTR, 32-byte key.
    Twofish(Box<[u8; 32]>),
    /// ChaCha20, 32-byte key.
    ChaCha20(Box<[u8; 32]>),
    /// Speck128/128-CTR, 16-byte key.
    Speck(Box<[u8; 16]>),
}

impl Transform {
    /// Which [`TransformId`] this instance implements.
    pub fn id(&self) -> TransformId {
        match self {
            Transform::Null => TransformId::Null,
            Transform::Aes(_) => TransformId::Aes,
            Transform::Twofish(_) => TransformId::Twofish,
            Transform::ChaCha20(_) => TransformId::ChaCha20,
            Transform::Speck(_) => TransformId::Speck,
        }
    }

    /// Encrypt (or pass through) `plaintext`, producing the bytes that go
    /// on the wire as the payload of a [`crate::protocol::packet::DataPacket`].
    pub fn encode(&self, now_wire_ts: u64, plaintext: &[u8]) -> Vec<u8> {
        match self {
            Transform::Null => plaintext.to_vec(),
            Transform::Aes(key) => {
                let mut out = Vec::with_capacity(TS_SIZE + plaintext.len());
                out.extend_from_slice(&now_wire_ts.to_be_bytes());
                let mut body = plaintext.to_vec();
                let iv = iv_from_timestamp(now_wire_ts, 16);
                let mut cipher = Ctr64BE::<Aes256>::new(key.as_slice().into(), iv.as_slice().into());
                cipher.apply_keystream(&mut body);
                out.extend_from_slice(&body);
                out
            }
            Transform::Twofish(key) => {
                let mut out = Vec::with_capacity(TS_SIZE + plaintext.len());
                out.extend_from_slice(&now_wire_ts.to_be_bytes());
                let mut body = plaintext.to_vec();
                let iv = iv_from_timestamp(now_wire_ts, 16);
                let mut cipher = Ctr64BE::<Twofish>::new(key.as_slice().into(), iv.as_slice().into());
                cipher.apply_keystream(&mut body);
                out.extend_from_slice(&body);
                out
            }
            Transform::ChaCha20(key) => {
                let mut out = Vec::with_capacity(TS_SIZE + plaintext.len());
                out.extend_from_slice(&now_wire_ts.to_be_bytes());
                let mut body = plaintext.to_vec();
                let mut nonce = [0u8; 12];
                nonce[4..].copy_from_slice(&now_wire_ts.to_be_bytes());
                let mut cipher = chacha20::ChaCha20::new(key.as_slice().into(), (&nonce).into());
                cipher.apply_keystream(&mut body);
                out.extend_from_slice(&body);
                out
            }
            Transform::Speck(key) => {
                let mut out = Vec::with_capacity(TS_SIZE + plaintext.len());
                out.extend_from_slice(&now_wire_ts.to_be_bytes());
                let mut body = plaintext.to_vec();
                let iv: [u8; 16] = iv_from_timestamp(now_wire_ts, 16).try_into().unwrap();
                let sk = SpeckKey::new(key);
                speck_ctr_apply(&sk, &iv, &mut body);
                out.extend_from_slice(&body);
                out
            }
        }
    }

    /// Decrypt a payload received from `sender`, validating its replay
    /// timestamp through `replay` against `now_micros`.
    pub fn decode(
        &self,
        sender: MacAddr,
        ciphertext: &[u8],
        replay: &mut ReplayWindow,
        now_micros: u64,
    ) -> Result<Vec<u8>, TransformError> {
        if matches!(self, Transform::Null) {
            return Ok(ciphertext.to_vec());
        }

        if ciphertext.len() < TS_SIZE {
            return Err(TransformError::Truncated);
        }
        let wire_ts = u64::from_be_bytes(ciphertext[..TS_SIZE].try_into().unwrap());
        if !replay.accept(sender, wire_ts, now_micros) {
            return Err(TransformError::Replayed);
        }
        let mut body = ciphertext[TS_SIZE..].to_vec();

        match self {
            Transform::Null => unreachable!(),
            Transform::Aes(key) => {
                let iv = iv_from_timestamp(wire_ts, 16);
                let mut cipher = Ctr64BE::<Aes256>::new(key.as_slice().into(), iv.as_slice().into());
                cipher.apply_keystream(&mut body);
            }
            Transform::Twofish(key) => {
                let iv = iv_from_timestamp(wire_ts, 16);
                let mut cipher = Ctr64BE::<Twofish>::new(key.as_slice().into(), iv.as_slice().into());
                cipher.apply_keystream(&mut body);
            }
            Transform::ChaCha20(key) => {
                let mut nonce = [0u8; 12];
                nonce[4..].copy_from_slice(&wire_ts.to_be_bytes());
                let mut cipher = chacha20::ChaCha20::new(key.as_slice().into(), (&nonce).into());
                cipher.apply_keystream(&mut body);
            }
            Transform::Speck(key) => {
                let iv: [u8; 16] = iv_from_timestamp(wire_ts, 16).try_into().unwrap();
                let sk = SpeckKey::new(key);
                speck_ctr_apply(&sk, &iv, &mut body);
            }
        }
        Ok(body)
    }
}

/// Derive a keyed [`Transform`] for `id` from a community and ASCII key
/// (spec §4.2's KDF).
pub fn keyed_transform(id: TransformId, community: &[u8], ascii_key: &[u8]) -> Transform {
    match id {
        TransformId::Invalid | TransformId::Null => Transform::Null,
        TransformId::Aes => {
            let mut key = Box::new([0u8; 32]);
            super::kdf::derive_key(community, ascii_key, key.as_mut_slice());
            Transform::Aes(key)
        }
        TransformId::Twofish => {
            let mut key = Box::new([0u8; 32]);
            super::kdf::derive_key(community, ascii_key, key.as_mut_slice());
            Transform::Twofish(key)
        }
        TransformId::ChaCha20 => {
            let mut key = Box::new([0u8; 32]);
            super::kdf::derive_key(community, ascii_key, key.as_mut_slice());
            Transform::ChaCha20(key)
        }
        TransformId::Speck => {
            let mut key = Box::new([0u8; 16]);
            super::kdf::derive_key(community, ascii_key, key.as_mut_slice());
            Transform::Speck(key)
        }
    }
}
