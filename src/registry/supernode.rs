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

//! The supernode list an edge registers against (spec C4/C5): ordered by
//! metric, with rotation to the next candidate on a `REGISTER_SUPER_NAK` or
//! a registration timeout so one unreachable supernode never wedges an
//! edge indefinitely.

use std::net::SocketAddr;

use crate::protocol::MacAddr;

/// One supernode an edge knows about, either from its own configuration or
/// learned from a `REGISTER_SUPER_ACK`'s supernode list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupernodeEntry {
    /// Address to send `REGISTER_SUPER` to.
    pub sock: SocketAddr,
    /// MAC the supernode answers with, once known.
    pub mac: Option<MacAddr>,
    /// Lower is preferred; updated from `PEER_INFO`/`REGISTER_SUPER_ACK` metrics.
    pub metric: u32,
}

impl SupernodeEntry {
    /// A supernode known only by configured address, metric not yet measured.
    pub fn configured(sock: SocketAddr) -> Self {
        Self { sock, mac: None, metric: u32::MAX }
    }
}

/// The ordered set of candidate supernodes plus which one is currently
/// selected.
#[derive(Default)]
pub struct SupernodeList {
    entries: Vec<SupernodeEntry>,
    current: usize,
}

impl SupernodeList {
    /// Build a list from the community's configured supernode addresses,
    /// in the order given.
    pub fn new(configured: impl IntoIterator<Item = SocketAddr>) -> Self {
        let entries = configured.into_iter().map(SupernodeEntry::configured).collect();
        Self { entries, current: 0 }
    }

    /// The supernode an edge should be registered against right now, if any
    /// are known.
    pub fn current(&self) -> Option<&SupernodeEntry> {
        self.entries.get(self.current)
    }

    /// Advance to the next candidate, wrapping around, e.g. after a
    /// `REGISTER_SUPER_NAK` or a registration timeout.
    pub fn rotate(&mut self) -> Option<&SupernodeEntry> {
        if self.entries.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.entries.len();
        self.current()
    }

    /// Record `metric` for the supernode at `sock`, re-sorting so the
    /// lowest-metric candidate is tried first on the next rotation.
    pub fn update_metric(&mut self, sock: SocketAddr, mac: MacAddr, metric: u32) {
        let current_sock = self.current().map(|e| e.sock);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.sock == sock) {
            entry.mac = Some(mac);
            entry.metric = metric;
        } else {
            self.entries.push(SupernodeEntry { sock, mac: Some(mac), metric });
        }
        self.entries.sort_by_key(|e| e.metric);
        if let Some(sock) = current_sock {
            self.current = self.entries.iter().position(|e| e.sock == sock).unwrap_or(0);
        }
    }

    /// Merge supernodes discovered via a `REGISTER_SUPER_ACK`'s peer list,
    /// appending any not already known at their configured metric.
    pub fn merge_discovered(&mut self, discovered: impl IntoIterator<Item = (SocketAddr, MacAddr, u32)>) {
        for (sock, mac, metric) in discovered {
            self.update_metric(sock, mac, metric);
        }
    }

    /// Number of known supernodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff no supernodes are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate every known supernode, e.g. for the management channel's
    /// `supernodes` command.
    pub fn iter(&self) -> impl Iterator<Item = &SupernodeEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sock(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn rotation_wraps_around() {
        let mut list = SupernodeList::new([sock(1), sock(2), sock(3)]);
        assert_eq!(list.current().unwrap().sock, sock(1));
        assert_eq!(list.rotate().unwrap().sock, sock(2));
        assert_eq!(list.rotate().unwrap().sock, sock(3));
        assert_eq!(list.rotate().unwrap().sock, sock(1));
    }

    #[test]
    fn empty_list_rotates_to_nothing() {
        let mut list = SupernodeList::new([]);
        assert!(list.current().is_none());
        assert!(list.rotate().is_none());
    }

    #[test]
    fn lower_metric_sorts_first() {
        let mut list = SupernodeList::new([sock(1), sock(2)]);
        let mac = MacAddr([1, 1, 1, 1, 1, 1]);
        list.update_metric(sock(2), mac, 1);
        list.update_metric(sock(1), mac, 50);
        assert_eq!(list.iter().next().unwrap().sock, sock(2));
    }

    #[test]
    fn discovered_supernodes_are_appended() {
        let mut list = SupernodeList::new([sock(1)]);
        let mac = MacAddr([2, 2, 2, 2, 2, 2]);
        list.merge_discovered([(sock(9), mac, 5)]);
        assert_eq!(list.len(), 2);
    }
}
