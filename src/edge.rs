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

//! Edge state (spec §3's "Edge state" entity): the single owner of every
//! peer/supernode table, the selected transform and compression, the
//! registration engine, and the TAP device, all mutated exclusively by the
//! event loop task (spec §5).

use std::net::SocketAddr;
use std::time::Instant;

use tracing::info;

use crate::compress::CompressionId;
use crate::config::ValidatedEdgeConfig;
use crate::crypto::{keyed_transform, ReplayWindow};
use crate::forwarding::Forwarder;
use crate::metrics::EdgeMetrics;
use crate::protocol::community::Community;
use crate::protocol::MacAddr;
use crate::registration::RegistrationEngine;
use crate::registry::{PeerTable, SupernodeList};
use crate::tap::{ResourceError, TapDevice};

/// Everything an edge process owns for the lifetime of one community
/// membership. Fields are crate-visible rather than behind getters so the
/// event loop can borrow disjoint fields (peers, registration, replay,
/// metrics, ...) at once without the whole struct being borrowed through a
/// single accessor method.
pub struct EdgeState {
    community: Community,
    own_mac: MacAddr,
    local_port: u16,
    mgmt_port: u16,
    compression: CompressionId,

    pub(crate) registration: RegistrationEngine,
    pub(crate) peers: PeerTable,
    pub(crate) supernodes: SupernodeList,
    pub(crate) replay: ReplayWindow,
    pub(crate) forwarder: Forwarder,
    pub(crate) metrics: EdgeMetrics,

    tap: Option<Box<dyn TapDevice + Send + Sync>>,
}

impl EdgeState {
    /// Assemble edge state from validated configuration, opening the TAP
    /// device described by `tap_cfg` (spec §3: "initialized after config
    /// validation").
    pub fn new(cfg: &ValidatedEdgeConfig, own_mac: MacAddr, tap: Box<dyn TapDevice + Send + Sync>, now: Instant) -> Result<Self, ResourceError> {
        let community = Community::new(&cfg.community);
        let ascii_key = cfg.key.as_deref().unwrap_or("").as_bytes();
        let transform = keyed_transform(cfg.cipher, community.as_bytes(), ascii_key);
        let forwarder = Forwarder::new(cfg, own_mac, transform);

        Ok(Self {
            community,
            own_mac,
            local_port: cfg.local_port,
            mgmt_port: cfg.mgmt_port,
            compression: cfg.compression,
            registration: RegistrationEngine::new(cfg, own_mac, now),
            peers: PeerTable::new(),
            supernodes: SupernodeList::new(cfg.supernodes.iter().copied()),
            replay: ReplayWindow::new(),
            forwarder,
            metrics: EdgeMetrics::new().map_err(|_| ResourceError::Configure("metrics registration failed".to_string()))?,
            tap: Some(tap),
        })
    }

    /// Community this edge belongs to.
    pub fn community(&self) -> Community {
        self.community
    }

    /// Community name as a display string, for logging.
    pub fn community_name(&self) -> String {
        self.community.name()
    }

    /// This edge's own MAC address (the TAP interface's MAC).
    pub fn own_mac(&self) -> MacAddr {
        self.own_mac
    }

    /// Fixed local UDP port, or 0 for an ephemeral one.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Management UDP port.
    pub fn mgmt_port(&self) -> u16 {
        self.mgmt_port
    }

    /// Selected compression id.
    pub fn compression(&self) -> CompressionId {
        self.compression
    }

    /// The socket the current supernode reports seeing this edge's
    /// registration traffic arrive from.
    pub fn public_socket(&self) -> Option<SocketAddr> {
        self.registration.public_socket
    }

    /// Next `REGISTER_SUPER` deadline.
    pub fn next_register_super(&self) -> Instant {
        self.registration.next_register_super
    }

    /// The currently preferred supernode's address, if any are known.
    pub fn current_supernode(&self) -> Option<SocketAddr> {
        self.supernodes.current().map(|e| e.sock)
    }

    /// This edge's granted overlay subnet, as `(network, prefix_len)`.
    pub fn overlay_subnet(&self) -> (u32, u8) {
        let addr = self.registration.dev_addr();
        (addr.net_addr, addr.net_bitlen)
    }

    /// Take ownership of the TAP device, handing it to the event loop's
    /// blocking-thread bridge. Panics if called more than once per edge.
    pub fn take_tap(&mut self) -> Box<dyn TapDevice + Send + Sync> {
        self.tap.take().expect("TAP device already taken")
    }

    /// Read-only view of the peer table, e.g. for the management channel.
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Read-only view of the supernode list.
    pub fn supernodes(&self) -> &SupernodeList {
        &self.supernodes
    }

    /// Read-only view of edge statistics.
    pub fn metrics(&self) -> &EdgeMetrics {
        &self.metrics
    }

    /// Read-only view of the registration engine, for replies that do not
    /// need to mutate it (`handle_register`, `handle_peer_info`).
    pub fn registration(&self) -> &RegistrationEngine {
        &self.registration
    }
}

/// Log a one-line startup summary (spec §3's `sn_wait` pre-TAP blocking
/// sequence is driven by the caller; this just records what was opened).
pub fn log_startup(edge: &EdgeState) {
    info!(
        community = %edge.community_name(),
        mac = %edge.own_mac(),
        local_port = edge.local_port(),
        mgmt_port = edge.mgmt_port(),
        "edge state assembled"
    );
}
