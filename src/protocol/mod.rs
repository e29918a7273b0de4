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
#![allow(missing_docs)]

//! Wire codec (spec C1): the fixed common header plus one body per packet
//! type, encoded/decoded over a caller-supplied buffer with no allocation
//! beyond what a body's variable-length fields (an auth token, a payload)
//! genuinely need.

pub mod common;
pub mod community;
pub mod cursor;
pub mod mac;
pub mod packet;
pub mod sock;

pub use common::{CommonHeader, PacketType, MASK_BITS, MASK_TYPE, PROTOCOL_VERSION, SOCKET_FLAG};
pub use community::Community;
pub use cursor::{ReadCursor, WireError, WriteCursor};
pub use mac::MacAddr;
pub use sock::SockAddr;

use packet::{
    DataPacket, Deregister, PeerInfo, QueryPeer, Register, RegisterAck, RegisterSuper,
    RegisterSuperAck, RegisterSuperNak,
};

/// A fully decoded packet: header plus typed body.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Register(CommonHeader, Register),
    Deregister(CommonHeader, Deregister),
    Packet(CommonHeader, DataPacket),
    RegisterAck(CommonHeader, RegisterAck),
    RegisterSuper(CommonHeader, RegisterSuper),
    RegisterSuperAck(CommonHeader, RegisterSuperAck),
    RegisterSuperNak(CommonHeader, RegisterSuperNak),
    PeerInfo(CommonHeader, PeerInfo),
    QueryPeer(CommonHeader, QueryPeer),
}

impl Message {
    /// The common header shared by every variant.
    pub fn header(&self) -> &CommonHeader {
        match self {
            Message::Register(h, _)
            | Message::Deregister(h, _)
            | Message::Packet(h, _)
            | Message::RegisterAck(h, _)
            | Message::RegisterSuper(h, _)
            | Message::RegisterSuperAck(h, _)
            | Message::RegisterSuperNak(h, _)
            | Message::PeerInfo(h, _)
            | Message::QueryPeer(h, _) => h,
        }
    }

    /// Encode header + body into `buf`, returning the total bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        let mut w = WriteCursor::new(buf);
        let n = match self {
            Message::Register(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::Deregister(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::Packet(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::RegisterAck(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::RegisterSuper(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::RegisterSuperAck(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::RegisterSuperNak(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::PeerInfo(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
            Message::QueryPeer(h, b) => {
                let n = h.encode(&mut w)?;
                n + b.encode(&mut w)?
            }
        };
        Ok(n)
    }

    /// Decode a header and dispatch to the matching body decoder.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let mut r = ReadCursor::new(buf);
        let header = CommonHeader::decode(&mut r)?;
        let pt = header.packet_type()?;
        Ok(match pt {
            PacketType::Register => Message::Register(header, Register::decode(&mut r, &header)?),
            PacketType::Deregister => {
                Message::Deregister(header, Deregister::decode(&mut r, &header)?)
            }
            PacketType::Packet => Message::Packet(header, DataPacket::decode(&mut r, &header)?),
            PacketType::RegisterAck => {
                Message::RegisterAck(header, RegisterAck::decode(&mut r, &header)?)
            }
            PacketType::RegisterSuper => {
                Message::RegisterSuper(header, RegisterSuper::decode(&mut r, &header)?)
            }
            PacketType::RegisterSuperAck => {
                Message::RegisterSuperAck(header, RegisterSuperAck::decode(&mut r, &header)?)
            }
            PacketType::RegisterSuperNak => {
                Message::RegisterSuperNak(header, RegisterSuperNak::decode(&mut r, &header)?)
            }
            PacketType::Federation => return Err(WireError::UnknownPacketType),
            PacketType::PeerInfo => Message::PeerInfo(header, PeerInfo::decode(&mut r, &header)?),
            PacketType::QueryPeer => {
                Message::QueryPeer(header, QueryPeer::decode(&mut r, &header)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet::{Auth, DevAddr, DevDesc};

    #[test]
    fn register_super_end_to_end() {
        let cmn = CommonHeader::new(PacketType::RegisterSuper, 32, Community::new("acme"), false);
        let body = RegisterSuper {
            cookie: [1, 2, 3, 4],
            edge_mac: MacAddr([2, 1, 1, 1, 1, 1]),
            sock: None,
            dev_addr: DevAddr { net_addr: 0, net_bitlen: 0 },
            dev_desc: DevDesc::new("edge1"),
            auth: Auth::none(),
        };
        let msg = Message::RegisterSuper(cmn, body);
        let mut buf = [0u8; 256];
        let n = msg.encode(&mut buf).unwrap();
        let decoded = Message::decode(&buf[..n]).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn scenario_1_boot_and_register_bytes() {
        // spec.md §8 scenario 1: community "acme" padded starting 61 63 6d 65 00...
        let cmn = CommonHeader::new(PacketType::RegisterSuper, 32, Community::new("acme"), false);
        let mut buf = [0u8; CommonHeader::SIZE];
        let mut w = WriteCursor::new(&mut buf);
        cmn.encode(&mut w).unwrap();
        assert_eq!(buf[0], PROTOCOL_VERSION);
        assert_eq!(buf[0], 3);
        assert_eq!(&buf[4..9], &[0x61, 0x63, 0x6d, 0x65, 0x00]);
    }

    #[test]
    fn short_buffer_never_panics() {
        for n in 0..CommonHeader::SIZE {
            let buf = vec![0u8; n];
            assert!(Message::decode(&buf).is_err());
        }
    }
}
