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

//! Per-type packet bodies (spec §4.1). Each body's `encode`/`decode` is
//! called after the [`CommonHeader`] has already been handled by the caller;
//! `decode` is told whether [`SOCKET_FLAG`] was set so it knows whether to
//! expect the optional socket field.

use super::common::{CommonHeader, SOCKET_FLAG};
use super::cursor::{ReadCursor, WriteCursor, WireError};
use super::mac::MacAddr;
use super::sock::SockAddr;

/// Size in bytes of a cookie.
pub const COOKIE_SIZE: usize = 4;
/// Size in bytes of the free-form device description field.
pub const DESC_SIZE: usize = 16;

/// A short per-request nonce correlating replies to requests.
pub type Cookie = [u8; COOKIE_SIZE];

/// Advertised or granted overlay IPv4 address plus prefix length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevAddr {
    /// Overlay IPv4 address, host byte order in memory / big-endian on the wire.
    pub net_addr: u32,
    /// Prefix length, 0..32.
    pub net_bitlen: u8,
}

impl DevAddr {
    fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_u32(self.net_addr)?;
        n += w.put_u8(self.net_bitlen)?;
        Ok(n)
    }

    fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let net_addr = r.get_u32()?;
        let net_bitlen = r.get_u8()?;
        Ok(Self { net_addr, net_bitlen })
    }
}

/// Free-form 16-byte NUL-padded device description.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DevDesc(pub [u8; DESC_SIZE]);

impl DevDesc {
    /// Build from a string, truncating to fit, NUL-padded.
    pub fn new(s: &str) -> Self {
        let mut b = [0u8; DESC_SIZE];
        let bytes = s.as_bytes();
        let n = bytes.len().min(DESC_SIZE);
        b[..n].copy_from_slice(&bytes[..n]);
        DevDesc(b)
    }

    fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        w.put_buf(&self.0)
    }

    fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let mut b = [0u8; DESC_SIZE];
        r.get_exact(&mut b)?;
        Ok(DevDesc(b))
    }
}

/// Authentication scheme plus opaque token, used by REGISTER_SUPER/DEREGISTER.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Auth {
    /// Authentication scheme identifier; 0 means "none".
    pub scheme: u16,
    /// Opaque token bytes.
    pub token: Vec<u8>,
}

impl Auth {
    /// No authentication.
    pub fn none() -> Self {
        Self { scheme: 0, token: Vec::new() }
    }

    fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_u16(self.scheme)?;
        n += w.put_u16(self.token.len() as u16)?;
        n += w.put_buf(&self.token)?;
        Ok(n)
    }

    fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let scheme = r.get_u16()?;
        let toksize = r.get_u16()? as usize;
        let token = r.get_vec(toksize)?;
        Ok(Self { scheme, token })
    }
}

/// One backup supernode entry embedded in REGISTER_SUPER_ACK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupernodeEntry {
    /// Reachable socket.
    pub sock: SockAddr,
    /// Supernode's MAC identity.
    pub mac: MacAddr,
    /// Selection metric; smaller is preferred.
    pub metric: u32,
}

impl SupernodeEntry {
    fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = self.sock.encode(w)?;
        n += self.mac.encode(w)?;
        n += w.put_u32(self.metric)?;
        Ok(n)
    }

    fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let sock = SockAddr::decode(r)?;
        let mac = MacAddr::decode(r)?;
        let metric = r.get_u32()?;
        Ok(Self { sock, mac, metric })
    }
}

fn encode_opt_sock(w: &mut WriteCursor<'_>, sock: &Option<SockAddr>) -> Result<usize, WireError> {
    match sock {
        Some(s) => s.encode(w),
        None => Ok(0),
    }
}

fn decode_opt_sock(r: &mut ReadCursor<'_>, flags: u16) -> Result<Option<SockAddr>, WireError> {
    if flags & SOCKET_FLAG != 0 {
        Ok(Some(SockAddr::decode(r)?))
    } else {
        Ok(None)
    }
}

/// REGISTER body: ask a peer (via the supernode) to learn this edge's socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Register {
    pub cookie: Cookie,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub sock: Option<SockAddr>,
    pub dev_addr: DevAddr,
    pub dev_desc: DevDesc,
}

impl Register {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_buf(&self.cookie)?;
        n += self.src_mac.encode(w)?;
        n += self.dst_mac.encode(w)?;
        n += encode_opt_sock(w, &self.sock)?;
        n += self.dev_addr.encode(w)?;
        n += self.dev_desc.encode(w)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, cmn: &CommonHeader) -> Result<Self, WireError> {
        let mut cookie = [0u8; COOKIE_SIZE];
        r.get_exact(&mut cookie)?;
        let src_mac = MacAddr::decode(r)?;
        let dst_mac = MacAddr::decode(r)?;
        let sock = decode_opt_sock(r, cmn.flags)?;
        let dev_addr = DevAddr::decode(r)?;
        let dev_desc = DevDesc::decode(r)?;
        Ok(Self { cookie, src_mac, dst_mac, sock, dev_addr, dev_desc })
    }
}

/// REGISTER_ACK body: confirms a REGISTER, returning the sender's own socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterAck {
    pub cookie: Cookie,
    pub dst_mac: MacAddr,
    pub src_mac: MacAddr,
    pub sock: Option<SockAddr>,
}

impl RegisterAck {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_buf(&self.cookie)?;
        n += self.dst_mac.encode(w)?;
        n += self.src_mac.encode(w)?;
        n += encode_opt_sock(w, &self.sock)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, cmn: &CommonHeader) -> Result<Self, WireError> {
        let mut cookie = [0u8; COOKIE_SIZE];
        r.get_exact(&mut cookie)?;
        let dst_mac = MacAddr::decode(r)?;
        let src_mac = MacAddr::decode(r)?;
        let sock = decode_opt_sock(r, cmn.flags)?;
        Ok(Self { cookie, dst_mac, src_mac, sock })
    }
}

/// REGISTER_SUPER body: edge registers itself with a supernode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterSuper {
    pub cookie: Cookie,
    pub edge_mac: MacAddr,
    pub sock: Option<SockAddr>,
    pub dev_addr: DevAddr,
    pub dev_desc: DevDesc,
    pub auth: Auth,
}

impl RegisterSuper {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_buf(&self.cookie)?;
        n += self.edge_mac.encode(w)?;
        n += encode_opt_sock(w, &self.sock)?;
        n += self.dev_addr.encode(w)?;
        n += self.dev_desc.encode(w)?;
        n += self.auth.encode(w)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, cmn: &CommonHeader) -> Result<Self, WireError> {
        let mut cookie = [0u8; COOKIE_SIZE];
        r.get_exact(&mut cookie)?;
        let edge_mac = MacAddr::decode(r)?;
        let sock = decode_opt_sock(r, cmn.flags)?;
        let dev_addr = DevAddr::decode(r)?;
        let dev_desc = DevDesc::decode(r)?;
        let auth = Auth::decode(r)?;
        Ok(Self { cookie, edge_mac, sock, dev_addr, dev_desc, auth })
    }
}

/// REGISTER_SUPER_ACK body: the socket field is mandatory (it tells the edge
/// its own public address), unlike the optional socket elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterSuperAck {
    pub cookie: Cookie,
    pub edge_mac: MacAddr,
    pub dev_addr: DevAddr,
    pub lifetime: u16,
    pub sock: SockAddr,
    pub supernodes: Vec<SupernodeEntry>,
}

impl RegisterSuperAck {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_buf(&self.cookie)?;
        n += self.edge_mac.encode(w)?;
        n += self.dev_addr.encode(w)?;
        n += w.put_u16(self.lifetime)?;
        n += self.sock.encode(w)?;
        n += w.put_u8(self.supernodes.len() as u8)?;
        for sn in &self.supernodes {
            n += sn.encode(w)?;
        }
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, _cmn: &CommonHeader) -> Result<Self, WireError> {
        let mut cookie = [0u8; COOKIE_SIZE];
        r.get_exact(&mut cookie)?;
        let edge_mac = MacAddr::decode(r)?;
        let dev_addr = DevAddr::decode(r)?;
        let lifetime = r.get_u16()?;
        let sock = SockAddr::decode(r)?;
        let num_sn = r.get_u8()?;
        let mut supernodes = Vec::with_capacity(num_sn as usize);
        for _ in 0..num_sn {
            supernodes.push(SupernodeEntry::decode(r)?);
        }
        Ok(Self { cookie, edge_mac, dev_addr, lifetime, sock, supernodes })
    }
}

/// REGISTER_SUPER_NAK body: a supernode rejects registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterSuperNak {
    pub cookie: Cookie,
    pub src_mac: MacAddr,
}

impl RegisterSuperNak {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_buf(&self.cookie)?;
        n += self.src_mac.encode(w)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, _cmn: &CommonHeader) -> Result<Self, WireError> {
        let mut cookie = [0u8; COOKIE_SIZE];
        r.get_exact(&mut cookie)?;
        let src_mac = MacAddr::decode(r)?;
        Ok(Self { cookie, src_mac })
    }
}

/// DEREGISTER body (doubles as n2n's UNREGISTER_SUPER): tell a supernode or
/// peer this edge (or the named MAC) is going away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deregister {
    pub auth: Auth,
    pub src_mac: MacAddr,
}

impl Deregister {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = self.auth.encode(w)?;
        n += self.src_mac.encode(w)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, _cmn: &CommonHeader) -> Result<Self, WireError> {
        let auth = Auth::decode(r)?;
        let src_mac = MacAddr::decode(r)?;
        Ok(Self { auth, src_mac })
    }
}

/// PACKET body: an encrypted, (possibly) compressed Ethernet frame. The
/// ciphertext runs to the end of the datagram and is never length-prefixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPacket {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub sock: Option<SockAddr>,
    pub compression: u8,
    pub transform: u8,
    pub payload: Vec<u8>,
}

impl DataPacket {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = self.src_mac.encode(w)?;
        n += self.dst_mac.encode(w)?;
        n += encode_opt_sock(w, &self.sock)?;
        n += w.put_u8(self.compression)?;
        n += w.put_u8(self.transform)?;
        n += w.put_buf(&self.payload)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, cmn: &CommonHeader) -> Result<Self, WireError> {
        let src_mac = MacAddr::decode(r)?;
        let dst_mac = MacAddr::decode(r)?;
        let sock = decode_opt_sock(r, cmn.flags)?;
        let compression = r.get_u8()?;
        let transform = r.get_u8()?;
        let payload = r.rest().to_vec();
        Ok(Self { src_mac, dst_mac, sock, compression, transform, payload })
    }
}

/// PEER_INFO body: a supernode's answer to QUERY_PEER, or an unsolicited
/// metric update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub aflags: u16,
    pub src_mac: MacAddr,
    pub mac: MacAddr,
    pub sock: SockAddr,
    pub metric: u32,
}

impl PeerInfo {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = w.put_u16(self.aflags)?;
        n += self.src_mac.encode(w)?;
        n += self.mac.encode(w)?;
        n += self.sock.encode(w)?;
        n += w.put_u32(self.metric)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, _cmn: &CommonHeader) -> Result<Self, WireError> {
        let aflags = r.get_u16()?;
        let src_mac = MacAddr::decode(r)?;
        let mac = MacAddr::decode(r)?;
        let sock = SockAddr::decode(r)?;
        let metric = r.get_u32()?;
        Ok(Self { aflags, src_mac, mac, sock, metric })
    }
}

/// QUERY_PEER body: ask the supernode where `target_mac` can be found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryPeer {
    pub src_mac: MacAddr,
    pub target_mac: MacAddr,
}

impl QueryPeer {
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        let mut n = self.src_mac.encode(w)?;
        n += self.target_mac.encode(w)?;
        Ok(n)
    }

    pub fn decode(r: &mut ReadCursor<'_>, _cmn: &CommonHeader) -> Result<Self, WireError> {
        let src_mac = MacAddr::decode(r)?;
        let target_mac = MacAddr::decode(r)?;
        Ok(Self { src_mac, target_mac })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::common::PacketType;
    use crate::protocol::community::Community;

    fn header(pt: PacketType, socket: bool) -> CommonHeader {
        CommonHeader::new(pt, 32, Community::new("acme"), socket)
    }

    #[test]
    fn register_roundtrip_with_socket() {
        let body = Register {
            cookie: [1, 2, 3, 4],
            src_mac: MacAddr([2, 1, 1, 1, 1, 1]),
            dst_mac: MacAddr([2, 2, 2, 2, 2, 2]),
            sock: Some(SockAddr::V4 { addr: [10, 0, 0, 1], port: 50000 }),
            dev_addr: DevAddr { net_addr: 0x0a000011, net_bitlen: 24 },
            dev_desc: DevDesc::new("edge1"),
        };
        let mut buf = [0u8; 256];
        let mut w = WriteCursor::new(&mut buf);
        let n = body.encode(&mut w).unwrap();
        let cmn = header(PacketType::Register, true);
        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(Register::decode(&mut r, &cmn).unwrap(), body);
    }

    #[test]
    fn register_roundtrip_without_socket() {
        let body = Register {
            cookie: [9, 9, 9, 9],
            src_mac: MacAddr([2, 1, 1, 1, 1, 1]),
            dst_mac: MacAddr([2, 2, 2, 2, 2, 2]),
            sock: None,
            dev_addr: DevAddr { net_addr: 0, net_bitlen: 0 },
            dev_desc: DevDesc::new(""),
        };
        let mut buf = [0u8; 256];
        let mut w = WriteCursor::new(&mut buf);
        let n = body.encode(&mut w).unwrap();
        let cmn = header(PacketType::Register, false);
        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(Register::decode(&mut r, &cmn).unwrap(), body);
    }

    #[test]
    fn register_super_ack_roundtrip() {
        let body = RegisterSuperAck {
            cookie: [1, 2, 3, 4],
            edge_mac: MacAddr([2, 1, 1, 1, 1, 1]),
            dev_addr: DevAddr { net_addr: 0x0a000011, net_bitlen: 24 },
            lifetime: 120,
            sock: SockAddr::V4 { addr: [203, 0, 113, 5], port: 7654 },
            supernodes: vec![SupernodeEntry {
                sock: SockAddr::V4 { addr: [203, 0, 113, 6], port: 7654 },
                mac: MacAddr([2, 9, 9, 9, 9, 9]),
                metric: 10,
            }],
        };
        let mut buf = [0u8; 256];
        let mut w = WriteCursor::new(&mut buf);
        let n = body.encode(&mut w).unwrap();
        let cmn = header(PacketType::RegisterSuperAck, false);
        let mut r = ReadCursor::new(&buf[..n]);
        assert_eq!(RegisterSuperAck::decode(&mut r, &cmn).unwrap(), body);
    }

    #[test]
    fn data_packet_truncated_under_fixed_fields_fails_cleanly() {
        let buf = [0u8; 3];
        let cmn = header(PacketType::Packet, false);
        let mut r = ReadCursor::new(&buf);
        assert_eq!(DataPacket::decode(&mut r, &cmn), Err(WireError::Underrun));
    }
}
