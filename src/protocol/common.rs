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

//! The fixed prefix shared by every control and data packet (spec §4.1).

use super::community::Community;
use super::cursor::{ReadCursor, WriteCursor, WireError};

/// Protocol version carried in every packet; a mismatch fails decode.
pub const PROTOCOL_VERSION: u8 = 3;

/// Low bits of `flags`: the packet type.
pub const MASK_TYPE: u16 = 0x001f;
/// High bits of `flags`: option bits, including [`SOCKET_FLAG`].
pub const MASK_BITS: u16 = !MASK_TYPE;
/// Set iff an explicit source/return socket follows the fixed body fields.
pub const SOCKET_FLAG: u16 = 0x0020;

/// The ten packet types carried in the low bits of `flags`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    /// Edge asks a peer (via the supernode) to learn its socket.
    Register = 0,
    /// Edge tells a supernode or peer to forget it.
    Deregister = 1,
    /// Encrypted, compressed Ethernet frame.
    Packet = 2,
    /// Reply to [`PacketType::Register`].
    RegisterAck = 3,
    /// Edge registers itself with a supernode.
    RegisterSuper = 4,
    /// Supernode accepts a [`PacketType::RegisterSuper`].
    RegisterSuperAck = 5,
    /// Supernode rejects a [`PacketType::RegisterSuper`].
    RegisterSuperNak = 6,
    /// Reserved for supernode-to-supernode federation.
    Federation = 7,
    /// Supernode's answer to [`PacketType::QueryPeer`].
    PeerInfo = 8,
    /// Edge asks the supernode where a MAC can be found.
    QueryPeer = 9,
}

impl PacketType {
    /// Map the low bits of `flags` to a packet type.
    pub fn from_bits(bits: u16) -> Result<Self, WireError> {
        Ok(match bits {
            0 => PacketType::Register,
            1 => PacketType::Deregister,
            2 => PacketType::Packet,
            3 => PacketType::RegisterAck,
            4 => PacketType::RegisterSuper,
            5 => PacketType::RegisterSuperAck,
            6 => PacketType::RegisterSuperNak,
            7 => PacketType::Federation,
            8 => PacketType::PeerInfo,
            9 => PacketType::QueryPeer,
            _ => return Err(WireError::UnknownPacketType),
        })
    }

    /// The bit pattern this type occupies in `flags`.
    pub fn to_bits(self) -> u16 {
        self as u16
    }
}

/// The fixed prefix of every packet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommonHeader {
    /// Always [`PROTOCOL_VERSION`] on the wire; checked on decode.
    pub version: u8,
    /// Hop count, decremented by relays.
    pub ttl: u8,
    /// Packet type plus option bits (e.g. [`SOCKET_FLAG`]).
    pub flags: u16,
    /// Community this packet belongs to.
    pub community: Community,
}

impl CommonHeader {
    /// Fixed wire size of the common header.
    pub const SIZE: usize = 1 + 1 + 2 + super::community::COMMUNITY_SIZE;

    /// Build a header for `pkt_type`, with `socket_present` setting
    /// [`SOCKET_FLAG`] appropriately.
    pub fn new(pkt_type: PacketType, ttl: u8, community: Community, socket_present: bool) -> Self {
        let mut flags = pkt_type.to_bits() & MASK_TYPE;
        if socket_present {
            flags |= SOCKET_FLAG;
        }
        Self { version: PROTOCOL_VERSION, ttl, flags, community }
    }

    /// Packet type named by the low bits of `flags`.
    pub fn packet_type(&self) -> Result<PacketType, WireError> {
        PacketType::from_bits(self.flags & MASK_TYPE)
    }

    /// True iff [`SOCKET_FLAG`] is set.
    pub fn has_socket(&self) -> bool {
        self.flags & SOCKET_FLAG != 0
    }

    /// Encode the fixed prefix; returns the number of bytes written.
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_u8(self.version)?;
        n += w.put_u8(self.ttl)?;
        n += w.put_u16(self.flags)?;
        n += self.community.encode(w)?;
        Ok(n)
    }

    /// Decode the fixed prefix, rejecting a version mismatch.
    pub fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let version = r.get_u8()?;
        if version != PROTOCOL_VERSION {
            return Err(WireError::BadVersion);
        }
        let ttl = r.get_u8()?;
        let flags = r.get_u16()?;
        let community = Community::decode(r)?;
        Ok(Self { version, ttl, flags, community })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_and_type() {
        let h = CommonHeader::new(PacketType::RegisterSuper, 32, Community::new("acme"), true);
        let mut buf = [0u8; CommonHeader::SIZE];
        let mut w = WriteCursor::new(&mut buf);
        let n = h.encode(&mut w).unwrap();
        assert_eq!(n, CommonHeader::SIZE);

        let mut r = ReadCursor::new(&buf);
        let h2 = CommonHeader::decode(&mut r).unwrap();
        assert_eq!(h2.packet_type().unwrap(), PacketType::RegisterSuper);
        assert!(h2.has_socket());
        assert_eq!(h2.community.name(), "acme");
    }

    #[test]
    fn rejects_bad_version() {
        let mut buf = [0u8; CommonHeader::SIZE];
        buf[0] = PROTOCOL_VERSION.wrapping_add(1);
        let mut r = ReadCursor::new(&buf);
        assert_eq!(CommonHeader::decode(&mut r), Err(WireError::BadVersion));
    }

    #[test]
    fn truncated_header_fails_cleanly() {
        let buf = [PROTOCOL_VERSION, 5, 0];
        let mut r = ReadCursor::new(&buf);
        assert_eq!(CommonHeader::decode(&mut r), Err(WireError::Underrun));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut buf = [0u8; CommonHeader::SIZE];
        buf[0] = PROTOCOL_VERSION;
        buf[2..4].copy_from_slice(&31u16.to_be_bytes());
        let mut r = ReadCursor::new(&buf);
        let h = CommonHeader::decode(&mut r).unwrap();
        assert_eq!(h.packet_type(), Err(WireError::UnknownPacketType));
    }
}
