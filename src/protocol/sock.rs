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

//! The tagged socket-address variant carried in REGISTER/PACKET/REGISTER_SUPER_ACK
//! bodies. IPv6 encoding is implemented (the wire format reserves the family bit)
//! but is never exercised on the data path — see `SPEC_FULL.md` Non-goals.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr as StdSocketAddr, SocketAddrV4, SocketAddrV6};

use super::cursor::{ReadCursor, WriteCursor, WireError};

/// Top bit of the family/flags field marks IPv6.
const FAMILY_V6_BIT: u16 = 0x8000;

/// A peer- or supernode-reachable endpoint as carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SockAddr {
    /// IPv4 address and port.
    V4 { addr: [u8; 4], port: u16 },
    /// IPv6 address and port. Reserved on the wire, unused on the data path.
    V6 { addr: [u8; 16], port: u16 },
}

impl SockAddr {
    /// Encode as `{family/flags u16}{port u16}{addr bytes}`.
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        match self {
            SockAddr::V4 { addr, port } => {
                let mut n = w.put_u16(0)?;
                n += w.put_u16(*port)?;
                n += w.put_buf(addr)?;
                Ok(n)
            }
            SockAddr::V6 { addr, port } => {
                let mut n = w.put_u16(FAMILY_V6_BIT)?;
                n += w.put_u16(*port)?;
                n += w.put_buf(addr)?;
                Ok(n)
            }
        }
    }

    /// Decode using the top bit of the leading u16 to pick the family.
    pub fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let f = r.get_u16()?;
        let port = r.get_u16()?;
        if f & FAMILY_V6_BIT != 0 {
            let mut addr = [0u8; 16];
            r.get_exact(&mut addr)?;
            Ok(SockAddr::V6 { addr, port })
        } else {
            let mut addr = [0u8; 4];
            r.get_exact(&mut addr)?;
            Ok(SockAddr::V4 { addr, port })
        }
    }

    /// Port regardless of family.
    pub fn port(&self) -> u16 {
        match self {
            SockAddr::V4 { port, .. } | SockAddr::V6 { port, .. } => *port,
        }
    }
}

impl From<StdSocketAddr> for SockAddr {
    fn from(a: StdSocketAddr) -> Self {
        match a {
            StdSocketAddr::V4(v4) => SockAddr::V4 { addr: v4.ip().octets(), port: v4.port() },
            StdSocketAddr::V6(v6) => SockAddr::V6 { addr: v6.ip().octets(), port: v6.port() },
        }
    }
}

impl From<SockAddr> for StdSocketAddr {
    fn from(s: SockAddr) -> Self {
        match s {
            SockAddr::V4 { addr, port } => {
                StdSocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(addr), port))
            }
            SockAddr::V6 { addr, port } => {
                StdSocketAddr::V6(SocketAddrV6::new(Ipv6Addr::from(addr), port, 0, 0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_roundtrip() {
        let s = SockAddr::V4 { addr: [127, 0, 0, 1], port: 7654 };
        let mut buf = [0u8; 8];
        let mut w = WriteCursor::new(&mut buf);
        let n = s.encode(&mut w).unwrap();
        assert_eq!(n, 8);
        let mut r = ReadCursor::new(&buf);
        assert_eq!(SockAddr::decode(&mut r).unwrap(), s);
    }

    #[test]
    fn v6_roundtrip() {
        let s = SockAddr::V6 { addr: [1u8; 16], port: 4242 };
        let mut buf = [0u8; 20];
        let mut w = WriteCursor::new(&mut buf);
        s.encode(&mut w).unwrap();
        let mut r = ReadCursor::new(&buf);
        assert_eq!(SockAddr::decode(&mut r).unwrap(), s);
    }

    #[test]
    fn truncated_decode_fails_cleanly() {
        let buf = [0u8, 0u8, 0x1d, 0xe6, 127, 0];
        let mut r = ReadCursor::new(&buf);
        assert_eq!(SockAddr::decode(&mut r), Err(WireError::Underrun));
    }
}
