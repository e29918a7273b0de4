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

//! Registration engine (spec C5): the peer-registration and NAT
//! hole-punching state machine, plus self-registration against supernodes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::ValidatedEdgeConfig;
use crate::protocol::community::Community;
use crate::protocol::packet::{
    Auth, Cookie, DevAddr, DevDesc, PeerInfo, QueryPeer, Register, RegisterAck, RegisterSuper,
    RegisterSuperAck, RegisterSuperNak, SupernodeEntry as WireSupernodeEntry,
};
use crate::protocol::{CommonHeader, MacAddr, Message, PacketType, SockAddr};
use crate::registry::{PeerState, PeerTable, SupernodeList};
use crate::tap::IpMode;

/// Number of `REGISTER` attempts before a pending peer falls back to
/// routing via the supernode (spec §4.5, grounded in n2n's historical
/// default).
pub const N_PING: u8 = 3;

/// Registration-level failures (spec §7's `StateError`): never fatal, the
/// engine rotates supernodes and keeps retrying.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// A `REGISTER_SUPER_NAK` was received for the current attempt.
    #[error("supernode rejected registration")]
    SuperNak,
    /// Every configured supernode has been tried without success.
    #[error("no supernode reachable after exhausting rotation")]
    NoSupernodeReachable,
}

fn random_cookie() -> Cookie {
    rand::random::<[u8; 4]>()
}

/// Drives the `UNKNOWN`/`PENDING`/`DIRECT`/`VIA_SUPERNODE` peer state
/// machine and the supernode self-registration timer.
pub struct RegistrationEngine {
    own_mac: MacAddr,
    community: Community,
    ip_mode: IpMode,
    dev_addr: DevAddr,
    dev_desc: DevDesc,
    auth: Auth,
    register_interval: Duration,
    register_ttl: u8,
    /// Deadline for the next `REGISTER_SUPER`; also the ceiling imposed by
    /// an adopted `lifetime` (spec §8: "next_register_super <= now + lifetime").
    pub next_register_super: Instant,
    /// True until the first successful `REGISTER_SUPER_ACK` (spec §3).
    pub sn_wait: bool,
    supernode_cookie: Cookie,
    pending_cookies: HashMap<MacAddr, Cookie>,
    /// Public socket the current supernode reports seeing us from, learned
    /// from `REGISTER_SUPER_ACK`'s mandatory socket field.
    pub public_socket: Option<SocketAddr>,
}

impl RegistrationEngine {
    /// Build an engine for a freshly validated configuration. `now` seeds
    /// the first registration deadline (immediate); `cfg.dev_addr` seeds the
    /// address advertised in `REGISTER_SUPER` when `cfg.ip_mode` is `Static`.
    pub fn new(cfg: &ValidatedEdgeConfig, own_mac: MacAddr, now: Instant) -> Self {
        Self {
            own_mac,
            community: Community::new(&cfg.community),
            ip_mode: cfg.ip_mode,
            dev_addr: cfg.dev_addr,
            dev_desc: DevDesc::new(&cfg.device_desc),
            auth: Auth::none(),
            register_interval: Duration::from_secs(cfg.register_interval_secs as u64),
            register_ttl: cfg.register_ttl,
            next_register_super: now,
            sn_wait: true,
            supernode_cookie: [0; 4],
            pending_cookies: HashMap::new(),
            public_socket: None,
        }
    }

    /// IP TTL to set on the registration socket before sending, if any
    /// (spec §4.5: "if register_ttl>0, set IP TTL ... so the packet expires
    /// inside the NAT").
    pub fn register_ttl(&self) -> Option<u8> {
        (self.register_ttl > 0).then_some(self.register_ttl)
    }

    /// If `now` has reached [`Self::next_register_super`], build the next
    /// `REGISTER_SUPER` and push the deadline forward by the configured
    /// interval (a missed ACK is handled separately by rotation, not by
    /// this method re-firing early).
    pub fn maybe_register_super(&mut self, now: Instant) -> Option<Message> {
        if now < self.next_register_super {
            return None;
        }
        self.supernode_cookie = random_cookie();
        self.next_register_super = now + self.register_interval;

        let header = CommonHeader::new(PacketType::RegisterSuper, 32, self.community, false);
        let body = RegisterSuper {
            cookie: self.supernode_cookie,
            edge_mac: self.own_mac,
            sock: None,
            dev_addr: self.dev_addr,
            dev_desc: self.dev_desc,
            auth: self.auth.clone(),
        };
        Some(Message::RegisterSuper(header, body))
    }

    /// Handle a `REGISTER_SUPER_ACK`: adopt the granted lifetime, clear
    /// [`Self::sn_wait`], and return the supernodes it advertised so the
    /// caller can merge them into its [`SupernodeList`]. The granted
    /// `dev_addr` is only adopted when `ip_mode` is `SnAssign` (spec §4.5);
    /// a statically or DHCP-configured address is never overwritten by a
    /// supernode's opinion of it.
    pub fn handle_register_super_ack(
        &mut self,
        ack: &RegisterSuperAck,
        now: Instant,
    ) -> Option<Vec<(SocketAddr, MacAddr, u32)>> {
        if ack.cookie != self.supernode_cookie {
            return None;
        }
        if self.ip_mode == IpMode::SnAssign {
            self.dev_addr = ack.dev_addr;
        }
        self.next_register_super = now + Duration::from_secs(ack.lifetime as u64);
        self.sn_wait = false;
        self.public_socket = Some(ack.sock.into());

        Some(
            ack.supernodes
                .iter()
                .map(|e: &WireSupernodeEntry| (e.sock.into(), e.mac, e.metric))
                .collect(),
        )
    }

    /// Handle a `REGISTER_SUPER_NAK`: always a signal to rotate (spec
    /// §4.5). Returns the error so callers can log/count it.
    pub fn handle_register_super_nak(&mut self, _nak: &RegisterSuperNak) -> StateError {
        StateError::SuperNak
    }

    /// The overlay address granted by the current supernode, once adopted.
    pub fn dev_addr(&self) -> DevAddr {
        self.dev_addr
    }

    /// Begin hole-punching `target`: create a `PENDING` entry and build the
    /// `REGISTER` to send through the current supernode (spec §4.5/§4.6).
    pub fn initiate_peer_registration(
        &mut self,
        target: MacAddr,
        peers: &mut PeerTable,
        supernode_sock: SocketAddr,
        own_sock: SocketAddr,
        now: Instant,
    ) -> Message {
        let cookie = random_cookie();
        self.pending_cookies.insert(target, cookie);
        peers.find_or_insert(target, supernode_sock, now);
        peers.promote(target, PeerState::Pending);

        let header = CommonHeader::new(PacketType::Register, 32, self.community, true);
        let body = Register {
            cookie,
            src_mac: self.own_mac,
            dst_mac: target,
            sock: Some(SockAddr::from(own_sock)),
            dev_addr: self.dev_addr,
            dev_desc: self.dev_desc,
        };
        Message::Register(header, body)
    }

    /// Handle an inbound `REGISTER` addressed to us: always ack, learning
    /// the sender's socket (spec §4.6 step 5).
    pub fn handle_register(
        &self,
        reg: &Register,
        from: SocketAddr,
        peers: &mut PeerTable,
        now: Instant,
    ) -> Message {
        peers.find_or_insert(reg.src_mac, from, now);

        let header = CommonHeader::new(PacketType::RegisterAck, 32, self.community, true);
        let body = RegisterAck {
            cookie: reg.cookie,
            dst_mac: reg.src_mac,
            src_mac: self.own_mac,
            sock: Some(SockAddr::from(from)),
        };
        Message::RegisterAck(header, body)
    }

    /// Handle an inbound `REGISTER_ACK`: promote `PENDING` -> `DIRECT` iff
    /// the cookie and source MAC match the outstanding request (spec §4.5
    /// PENDING -> DIRECT transition).
    pub fn handle_register_ack(
        &mut self,
        ack: &RegisterAck,
        from: SocketAddr,
        peers: &mut PeerTable,
        now: Instant,
    ) -> bool {
        let expected = match self.pending_cookies.get(&ack.src_mac) {
            Some(c) => *c,
            None => return false,
        };
        if expected != ack.cookie {
            return false;
        }
        self.pending_cookies.remove(&ack.src_mac);
        peers.find_or_insert(ack.src_mac, from, now);
        peers.promote(ack.src_mac, PeerState::Direct);
        true
    }

    /// Run on every maintenance tick, before [`Self::demote_exhausted_pending`]:
    /// resend `REGISTER` to every still-`PENDING` peer and count the attempt,
    /// so a peer that never acks eventually reaches [`N_PING`] and falls back
    /// to the supernode (spec §4.5). Retries reuse the cookie from the
    /// original `REGISTER` so a late `REGISTER_ACK` still matches.
    pub fn retry_pending_registrations(&mut self, peers: &mut PeerTable, own_sock: SocketAddr) -> Vec<Message> {
        let pending: Vec<MacAddr> =
            peers.iter().filter(|e| e.state == PeerState::Pending).map(|e| e.mac).collect();
        let mut retries = Vec::with_capacity(pending.len());
        for target in pending {
            peers.record_register_attempt(target);
            let cookie = *self.pending_cookies.entry(target).or_insert_with(random_cookie);
            let header = CommonHeader::new(PacketType::Register, 32, self.community, true);
            let body = Register {
                cookie,
                src_mac: self.own_mac,
                dst_mac: target,
                sock: Some(SockAddr::from(own_sock)),
                dev_addr: self.dev_addr,
                dev_desc: self.dev_desc,
            };
            retries.push(Message::Register(header, body));
        }
        retries
    }

    /// Run on every maintenance tick: any `PENDING` peer that has sent
    /// [`N_PING`] `REGISTER`s without an ack falls back to routing via the
    /// supernode (spec §4.5 PENDING -> VIA_SUPERNODE transition).
    pub fn demote_exhausted_pending(&mut self, peers: &mut PeerTable) {
        let exhausted: Vec<MacAddr> = peers
            .iter()
            .filter(|e| e.state == PeerState::Pending && e.register_attempts >= N_PING)
            .map(|e| e.mac)
            .collect();
        for mac in exhausted {
            peers.promote(mac, PeerState::ViaSupernode);
            self.pending_cookies.remove(&mac);
        }
    }

    /// Build a `QUERY_PEER` asking the supernode where `target` can be
    /// found (spec §4.5 discovery flow).
    pub fn query_peer(&self, target: MacAddr) -> Message {
        let header = CommonHeader::new(PacketType::QueryPeer, 32, self.community, false);
        let body = QueryPeer { src_mac: self.own_mac, target_mac: target };
        Message::QueryPeer(header, body)
    }

    /// Handle a `PEER_INFO` reply: learn the queried peer's socket as
    /// `Unknown` so the next egress frame to it triggers hole punching.
    pub fn handle_peer_info(&self, info: &PeerInfo, peers: &mut PeerTable, now: Instant) {
        let sock: SocketAddr = info.sock.clone().into();
        peers.find_or_insert(info.mac, sock, now);
    }
}

/// Rotate `supernodes` to the next candidate, returning an error once every
/// candidate has been tried since the last success (spec §7: `StateError`
/// "no supernode reachable after N rotations").
pub fn rotate_supernode(supernodes: &mut SupernodeList, rotations_since_success: &mut u32) -> Result<(), StateError> {
    *rotations_since_success += 1;
    supernodes.rotate();
    if *rotations_since_success as usize >= supernodes.len().max(1) * 3 {
        Err(StateError::NoSupernodeReachable)
    } else {
        Ok(())
    }
}
