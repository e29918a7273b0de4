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

//! Overlay MAC addresses: the identity the forwarding plane keys on.

use std::fmt;

use super::cursor::{ReadCursor, WriteCursor, WireError};

/// Size in bytes of a MAC address on the wire.
pub const MAC_SIZE: usize = 6;

/// A 6-byte Ethernet MAC address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; MAC_SIZE]);

/// The all-ones broadcast address.
pub const BROADCAST: MacAddr = MacAddr([0xff; MAC_SIZE]);

impl MacAddr {
    /// The all-zero MAC, used as a sentinel for "no peer yet".
    pub const ZERO: MacAddr = MacAddr([0u8; MAC_SIZE]);

    /// Encode to the wire (fixed 6 bytes, no length prefix).
    pub fn encode(&self, w: &mut WriteCursor<'_>) -> Result<usize, WireError> {
        w.put_buf(&self.0)
    }

    /// Decode from the wire (fixed 6 bytes).
    pub fn decode(r: &mut ReadCursor<'_>) -> Result<Self, WireError> {
        let mut out = [0u8; MAC_SIZE];
        r.get_exact(&mut out)?;
        Ok(MacAddr(out))
    }

    /// True for the broadcast address or either multicast prefix (§3).
    pub fn is_multi_or_broadcast(&self) -> bool {
        self.is_broadcast() || self.is_ipv4_multicast() || self.is_ipv6_multicast()
    }

    /// `FF:FF:FF:FF:FF:FF`.
    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST.0
    }

    /// `01:00:5E:xx:xx:xx` (IPv4 multicast-mapped range).
    pub fn is_ipv4_multicast(&self) -> bool {
        self.0[0] == 0x01 && self.0[1] == 0x00 && self.0[2] == 0x5e
    }

    /// `33:33:xx:xx:xx:xx` (IPv6 multicast-mapped range).
    pub fn is_ipv6_multicast(&self) -> bool {
        self.0[0] == 0x33 && self.0[1] == 0x33
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
