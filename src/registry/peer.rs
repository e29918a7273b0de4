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

//! The known/pending peer table (spec C4): a MAC-keyed registry of every
//! edge this process has learned a socket for, plus the registration state
//! that socket is trusted at.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::MacAddr;

/// How trustworthy a peer's socket currently is for sending data directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    /// Learned (e.g. from a `PEER_INFO`) but never confirmed.
    Unknown,
    /// A `REGISTER` was sent and we are waiting on `REGISTER_ACK`.
    Pending,
    /// `REGISTER_ACK` received; frames may go straight to this socket.
    Direct,
    /// Direct registration did not complete; frames route via a supernode.
    ViaSupernode,
}

/// One entry in the peer table.
#[derive(Clone, Debug)]
pub struct PeerEntry {
    /// The peer's MAC address, also the table's key.
    pub mac: MacAddr,
    /// Last socket this peer was seen from or was told to use.
    pub sock: SocketAddr,
    /// Current trust level of `sock`.
    pub state: PeerState,
    /// Last time this entry was touched by any traffic or registration event.
    pub last_seen: Instant,
    /// Number of `REGISTER` attempts sent since the last `REGISTER_ACK`.
    pub register_attempts: u8,
}

impl PeerEntry {
    fn new(mac: MacAddr, sock: SocketAddr, now: Instant) -> Self {
        Self { mac, sock, state: PeerState::Unknown, last_seen: now, register_attempts: 0 }
    }
}

/// The peer table: MAC-keyed, with a secondary index from socket back to
/// MAC so an inbound datagram's source can be matched to a known peer
/// without a linear scan.
#[derive(Default)]
pub struct PeerTable {
    by_mac: HashMap<MacAddr, PeerEntry>,
    by_sock: HashMap<SocketAddr, MacAddr>,
}

impl PeerTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a peer without creating it.
    pub fn get(&self, mac: MacAddr) -> Option<&PeerEntry> {
        self.by_mac.get(&mac)
    }

    /// Resolve a socket back to the peer currently registered at it.
    pub fn lookup_by_sock(&self, sock: SocketAddr) -> Option<&PeerEntry> {
        self.by_sock.get(&sock).and_then(|mac| self.by_mac.get(mac))
    }

    /// Find `mac`'s entry, creating a fresh [`PeerState::Unknown`] one at
    /// `sock` if it did not already exist. If the peer existed at a
    /// different socket, the index is moved to the new one.
    pub fn find_or_insert(&mut self, mac: MacAddr, sock: SocketAddr, now: Instant) -> &mut PeerEntry {
        if let Some(entry) = self.by_mac.get(&mac) {
            if entry.sock != sock {
                self.by_sock.remove(&entry.sock);
                self.by_sock.insert(sock, mac);
            }
        } else {
            self.by_sock.insert(sock, mac);
        }
        let entry = self.by_mac.entry(mac).or_insert_with(|| PeerEntry::new(mac, sock, now));
        entry.sock = sock;
        entry
    }

    /// Move `mac` to `state`, resetting its registration-attempt counter on
    /// reaching [`PeerState::Direct`].
    pub fn promote(&mut self, mac: MacAddr, state: PeerState) {
        if let Some(entry) = self.by_mac.get_mut(&mac) {
            entry.state = state;
            if state == PeerState::Direct {
                entry.register_attempts = 0;
            }
        }
    }

    /// Refresh `mac`'s last-seen time, e.g. on receipt of any traffic from it.
    pub fn touch(&mut self, mac: MacAddr, now: Instant) {
        if let Some(entry) = self.by_mac.get_mut(&mac) {
            entry.last_seen = now;
        }
    }

    /// Record one more `REGISTER` sent without a matching `REGISTER_ACK`.
    pub fn record_register_attempt(&mut self, mac: MacAddr) -> u8 {
        match self.by_mac.get_mut(&mac) {
            Some(entry) => {
                entry.register_attempts += 1;
                entry.register_attempts
            }
            None => 0,
        }
    }

    /// Remove every entry whose `last_seen` is older than `ttl`, returning
    /// the MACs purged so callers can also drop replay-window state for them.
    pub fn purge_stale(&mut self, now: Instant, ttl: Duration) -> Vec<MacAddr> {
        let stale: Vec<MacAddr> = self
            .by_mac
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_seen) > ttl)
            .map(|(mac, _)| *mac)
            .collect();
        for mac in &stale {
            if let Some(entry) = self.by_mac.remove(mac) {
                self.by_sock.remove(&entry.sock);
            }
        }
        stale
    }

    /// Number of peers currently tracked.
    pub fn len(&self) -> usize {
        self.by_mac.len()
    }

    /// True iff no peers are tracked.
    pub fn is_empty(&self) -> bool {
        self.by_mac.is_empty()
    }

    /// Iterate every tracked peer, e.g. for the management channel's `peers`
    /// command.
    pub fn iter(&self) -> impl Iterator<Item = &PeerEntry> {
        self.by_mac.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sock(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn insert_then_promote_then_lookup() {
        let mut table = PeerTable::new();
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let now = Instant::now();
        table.find_or_insert(mac, sock(1234), now);
        assert_eq!(table.get(mac).unwrap().state, PeerState::Unknown);

        table.promote(mac, PeerState::Direct);
        assert_eq!(table.get(mac).unwrap().state, PeerState::Direct);
        assert_eq!(table.lookup_by_sock(sock(1234)).unwrap().mac, mac);
    }

    #[test]
    fn moving_socket_updates_secondary_index() {
        let mut table = PeerTable::new();
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let now = Instant::now();
        table.find_or_insert(mac, sock(1), now);
        table.find_or_insert(mac, sock(2), now);
        assert!(table.lookup_by_sock(sock(1)).is_none());
        assert_eq!(table.lookup_by_sock(sock(2)).unwrap().mac, mac);
    }

    #[test]
    fn purge_removes_only_stale_entries() {
        let mut table = PeerTable::new();
        let mac_a = MacAddr([1, 1, 1, 1, 1, 1]);
        let mac_b = MacAddr([2, 2, 2, 2, 2, 2]);
        let t0 = Instant::now();
        table.find_or_insert(mac_a, sock(1), t0);
        table.find_or_insert(mac_b, sock(2), t0);
        table.touch(mac_b, t0 + Duration::from_secs(100));

        let purged = table.purge_stale(t0 + Duration::from_secs(100), Duration::from_secs(60));
        assert_eq!(purged, vec![mac_a]);
        assert!(table.get(mac_a).is_none());
        assert!(table.get(mac_b).is_some());
    }

    #[test]
    fn register_attempts_reset_on_direct_promotion() {
        let mut table = PeerTable::new();
        let mac = MacAddr([3, 3, 3, 3, 3, 3]);
        table.find_or_insert(mac, sock(1), Instant::now());
        table.record_register_attempt(mac);
        table.record_register_attempt(mac);
        assert_eq!(table.get(mac).unwrap().register_attempts, 2);
        table.promote(mac, PeerState::Direct);
        assert_eq!(table.get(mac).unwrap().register_attempts, 0);
    }
}
