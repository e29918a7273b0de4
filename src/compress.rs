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

//! Payload compression (spec C3).
//!
//! Compression applies only to the plaintext Ethernet frame carried by a
//! [`crate::protocol::packet::DataPacket`], never to control packets. LZO is
//! the mandatory baseline every edge understands; ZSTD is an optional,
//! higher-ratio alternative a community may select instead. On egress a
//! frame is only sent compressed if doing so actually shrank it; on ingress
//! a compression failure drops the one frame rather than the connection.

use thiserror::Error;

/// The four values carried in [`crate::protocol::packet::DataPacket::compression`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionId {
    /// No compression selected yet.
    Invalid = 0,
    /// Frame carried uncompressed.
    None = 1,
    /// LZO1X, the mandatory baseline codec.
    Lzo = 2,
    /// ZSTD, an optional higher-ratio codec.
    Zstd = 3,
}

impl CompressionId {
    /// Map the wire byte to a compression id.
    pub fn from_wire(b: u8) -> Option<Self> {
        Some(match b {
            0 => CompressionId::Invalid,
            1 => CompressionId::None,
            2 => CompressionId::Lzo,
            3 => CompressionId::Zstd,
            _ => return None,
        })
    }

    /// The wire byte for this compression id.
    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Ways compression or decompression of a single frame can fail.
#[derive(Debug, Error)]
pub enum CompressError {
    /// The codec rejected the input as malformed.
    #[error("{codec} rejected the frame: {reason}")]
    Codec {
        /// Which codec reported the failure.
        codec: &'static str,
        /// The underlying codec's error text.
        reason: String,
    },
}

/// Compress `frame` with `preferred`, returning the codec actually used (it
/// falls back to [`CompressionId::None`] when compression does not shrink
/// the frame) and the bytes to carry on the wire.
pub fn compress_for_egress(
    preferred: CompressionId,
    frame: &[u8],
) -> Result<(CompressionId, Vec<u8>), CompressError> {
    let compressed = match preferred {
        CompressionId::Invalid | CompressionId::None => None,
        CompressionId::Lzo => Some(compress_lzo(frame)?),
        CompressionId::Zstd => Some(compress_zstd(frame)?),
    };

    match compressed {
        Some(bytes) if bytes.len() < frame.len() => Ok((preferred, bytes)),
        _ => Ok((CompressionId::None, frame.to_vec())),
    }
}

/// Decompress a frame received with compression `id`.
pub fn decompress_for_ingress(id: CompressionId, payload: &[u8]) -> Result<Vec<u8>, CompressError> {
    match id {
        CompressionId::Invalid => Err(CompressError::Codec {
            codec: "none",
            reason: "no compression id negotiated".to_string(),
        }),
        CompressionId::None => Ok(payload.to_vec()),
        CompressionId::Lzo => decompress_lzo(payload),
        CompressionId::Zstd => decompress_zstd(payload),
    }
}

fn compress_lzo(frame: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut lzo = minilzo_rs::LZO::init()
        .map_err(|e| CompressError::Codec { codec: "lzo", reason: e.to_string() })?;
    lzo.compress(frame).map_err(|e| CompressError::Codec { codec: "lzo", reason: e.to_string() })
}

fn decompress_lzo(payload: &[u8]) -> Result<Vec<u8>, CompressError> {
    let lzo = minilzo_rs::LZO::init()
        .map_err(|e| CompressError::Codec { codec: "lzo", reason: e.to_string() })?;
    lzo.decompress_safe(payload, payload.len() * 16)
        .map_err(|e| CompressError::Codec { codec: "lzo", reason: e.to_string() })
}

fn compress_zstd(frame: &[u8]) -> Result<Vec<u8>, CompressError> {
    zstd::stream::encode_all(frame, 0)
        .map_err(|e| CompressError::Codec { codec: "zstd", reason: e.to_string() })
}

fn decompress_zstd(payload: &[u8]) -> Result<Vec<u8>, CompressError> {
    zstd::stream::decode_all(payload)
        .map_err(|e| CompressError::Codec { codec: "zstd", reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lzo_roundtrips() {
        let frame = vec![7u8; 4096];
        let (id, wire) = compress_for_egress(CompressionId::Lzo, &frame).unwrap();
        assert_eq!(id, CompressionId::Lzo);
        assert!(wire.len() < frame.len());
        let back = decompress_for_ingress(id, &wire).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn zstd_roundtrips() {
        let frame = vec![9u8; 4096];
        let (id, wire) = compress_for_egress(CompressionId::Zstd, &frame).unwrap();
        assert_eq!(id, CompressionId::Zstd);
        let back = decompress_for_ingress(id, &wire).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn falls_back_to_none_when_compression_does_not_shrink() {
        let frame: Vec<u8> = (0..64u32).map(|i| (i * 2654435761) as u8).collect();
        let (id, wire) = compress_for_egress(CompressionId::Lzo, &frame).unwrap();
        if id == CompressionId::None {
            assert_eq!(wire, frame);
        }
    }

    #[test]
    fn none_is_passthrough() {
        let frame = vec![1, 2, 3, 4, 5];
        let (id, wire) = compress_for_egress(CompressionId::None, &frame).unwrap();
        assert_eq!(id, CompressionId::None);
        assert_eq!(wire, frame);
        assert_eq!(decompress_for_ingress(id, &wire).unwrap(), frame);
    }
}
