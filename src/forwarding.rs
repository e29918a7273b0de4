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

//! Forwarding plane (spec C6): the TAP <-> UDP datapath.

use std::net::SocketAddr;
use std::time::Instant;

use crate::compress::{self, CompressionId};
use crate::config::{FilterAction, FilterProto, FilterRule, ValidatedEdgeConfig};
use crate::crypto::{HeaderCipher, ReplayWindow, Transform};
use crate::protocol::community::Community;
use crate::protocol::mac::BROADCAST;
use crate::protocol::packet::DataPacket;
use crate::protocol::{CommonHeader, MacAddr, Message, PacketType};
use crate::registration::RegistrationEngine;
use crate::registry::{PeerState, PeerTable};

/// One outbound UDP datagram the forwarding plane produced.
pub struct Outbound {
    /// Destination to `sendto`.
    pub to: SocketAddr,
    /// Encoded bytes ready to send as-is.
    pub bytes: Vec<u8>,
}

/// What an ingress datagram resolved to.
pub enum Ingress {
    /// An Ethernet frame to write to TAP.
    Frame(Vec<u8>),
    /// A control message to hand to the registration engine.
    Control(Message),
    /// The datagram was consumed (counted, logged) with nothing further
    /// to do, e.g. a dropped broadcast or a replay rejection.
    Dropped,
}

/// Everything the forwarding plane needs that is not recomputed per packet.
pub struct Forwarder {
    own_mac: MacAddr,
    community: Community,
    header_cipher: Option<HeaderCipher>,
    transform: Transform,
    compression: CompressionId,
    allow_routing: bool,
    accept_multicast: bool,
    disable_p2p: bool,
    filter_rules: Vec<FilterRule>,
}

impl Forwarder {
    /// Build a forwarder from validated configuration and the keyed
    /// transform the community selected.
    pub fn new(cfg: &ValidatedEdgeConfig, own_mac: MacAddr, transform: Transform) -> Self {
        let community = Community::new(&cfg.community);
        let header_cipher = cfg.header_encryption.then(|| HeaderCipher::new(community.as_bytes()));
        Self {
            own_mac,
            community,
            header_cipher,
            transform,
            compression: cfg.compression,
            allow_routing: cfg.allow_routing,
            accept_multicast: cfg.accept_multicast,
            disable_p2p: cfg.disable_p2p,
            filter_rules: cfg.filter_rules.clone(),
        }
    }

    /// Egress pipeline (spec §4.6): a frame read from TAP becomes zero, one,
    /// or two outbound datagrams (a `REGISTER` hole-punch attempt plus the
    /// data frame routed via the supernode, when the destination peer is
    /// still unknown).
    #[allow(clippy::too_many_arguments)]
    pub fn egress(
        &self,
        frame: &[u8],
        dst_mac: MacAddr,
        peers: &mut PeerTable,
        registration: &mut RegistrationEngine,
        supernode_sock: SocketAddr,
        own_sock: SocketAddr,
        now: Instant,
        now_wire_ts: u64,
        own_subnet: (u32, u8),
    ) -> Vec<Outbound> {
        if dst_mac.is_multi_or_broadcast() && !self.accept_multicast {
            return Vec::new();
        }

        if self.filter_matches_drop(frame) {
            return Vec::new();
        }

        if !self.allow_routing && !self.dst_in_overlay_subnet(frame, own_subnet) {
            return Vec::new();
        }

        let mut outbound = Vec::new();
        let target = match peers.get(dst_mac).map(|p| (p.state, p.sock)) {
            Some((PeerState::Direct, sock)) => sock,
            Some((PeerState::Unknown, _)) | None if !self.disable_p2p => {
                let register = registration.initiate_peer_registration(
                    dst_mac,
                    peers,
                    supernode_sock,
                    own_sock,
                    now,
                );
                if let Some(bytes) = encode_message(&register) {
                    outbound.push(Outbound { to: supernode_sock, bytes });
                }
                supernode_sock
            }
            _ => supernode_sock,
        };

        let (compression_used, compressed) = match compress::compress_for_egress(self.compression, frame) {
            Ok(v) => v,
            Err(_) => return outbound,
        };
        let ciphertext = self.transform.encode(now_wire_ts, &compressed);

        let header = CommonHeader::new(PacketType::Packet, 32, self.community, false);
        let body = DataPacket {
            src_mac: self.own_mac,
            dst_mac,
            sock: None,
            compression: compression_used.to_wire(),
            transform: self.transform.id().to_wire(),
            payload: ciphertext,
        };
        let msg = Message::Packet(header, body);
        if let Some(mut bytes) = encode_message(&msg) {
            if let Some(cipher) = &self.header_cipher {
                cipher.encrypt_prefix(&mut bytes);
            }
            outbound.push(Outbound { to: target, bytes });
        }

        outbound
    }

    /// Ingress pipeline (spec §4.6): a received UDP datagram resolves to a
    /// TAP frame, a control message, or nothing. Step 4's filter rules apply
    /// to the decrypted frame before it is handed back for writing to TAP,
    /// same as egress.
    pub fn ingress(
        &self,
        mut buf: Vec<u8>,
        from: SocketAddr,
        peers: &mut PeerTable,
        replay: &mut ReplayWindow,
        now: Instant,
        now_micros: u64,
    ) -> Ingress {
        if let Some(cipher) = &self.header_cipher {
            match cipher.try_decrypt_prefix(&buf) {
                Some(plaintext) => buf[..plaintext.len()].copy_from_slice(&plaintext),
                None => return Ingress::Dropped,
            }
        }

        let msg = match Message::decode(&buf) {
            Ok(msg) => msg,
            Err(_) => return Ingress::Dropped,
        };

        match msg {
            Message::Packet(_, body) => {
                if body.src_mac == self.own_mac {
                    return Ingress::Dropped;
                }
                let plaintext = match CompressionId::from_wire(body.compression) {
                    Some(id) => match self.transform.decode(body.src_mac, &body.payload, replay, now_micros) {
                        Ok(decrypted) => match compress::decompress_for_ingress(id, &decrypted) {
                            Ok(frame) => frame,
                            Err(_) => return Ingress::Dropped,
                        },
                        Err(_) => return Ingress::Dropped,
                    },
                    None => return Ingress::Dropped,
                };
                if self.filter_matches_drop(&plaintext) {
                    return Ingress::Dropped;
                }
                peers.find_or_insert(body.src_mac, from, now);
                peers.promote(body.src_mac, PeerState::Direct);
                Ingress::Frame(plaintext)
            }
            other => Ingress::Control(other),
        }
    }

    fn dst_in_overlay_subnet(&self, frame: &[u8], own_subnet: (u32, u8)) -> bool {
        match parse_ipv4_dst(frame) {
            None => true,
            Some(dst) => {
                let (net, bitlen) = own_subnet;
                let mask = mask_for(bitlen);
                (u32::from_be_bytes(dst) & mask) == (net & mask)
            }
        }
    }

    fn filter_matches_drop(&self, frame: &[u8]) -> bool {
        let Some((src, dst, sport, dport, proto)) = parse_ipv4_tuple(frame) else {
            return false;
        };
        for rule in &self.filter_rules {
            if cidr_matches(&rule.src_cidr, src)
                && cidr_matches(&rule.dst_cidr, dst)
                && sport >= rule.src_port.0
                && sport <= rule.src_port.1
                && dport >= rule.dst_port.0
                && dport <= rule.dst_port.1
                && proto_matches(rule.proto, proto)
            {
                return rule.action == FilterAction::Drop;
            }
        }
        false
    }
}

fn encode_message(msg: &Message) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 2048];
    let n = msg.encode(&mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}

fn mask_for(bitlen: u8) -> u32 {
    if bitlen == 0 {
        0
    } else {
        u32::MAX << (32 - bitlen.min(32))
    }
}

fn parse_ipv4_dst(frame: &[u8]) -> Option<[u8; 4]> {
    if frame.len() < 34 || frame[12] != 0x08 || frame[13] != 0x00 {
        return None;
    }
    Some(frame[30..34].try_into().unwrap())
}

fn parse_ipv4_tuple(frame: &[u8]) -> Option<([u8; 4], [u8; 4], u16, u16, u8)> {
    if frame.len() < 34 || frame[12] != 0x08 || frame[13] != 0x00 {
        return None;
    }
    let ihl = (frame[14] & 0x0f) as usize * 4;
    let proto = frame[23];
    let src: [u8; 4] = frame[26..30].try_into().unwrap();
    let dst: [u8; 4] = frame[30..34].try_into().unwrap();
    let l4_off = 14 + ihl;
    let (sport, dport) = if (proto == 6 || proto == 17) && frame.len() >= l4_off + 4 {
        (
            u16::from_be_bytes(frame[l4_off..l4_off + 2].try_into().unwrap()),
            u16::from_be_bytes(frame[l4_off + 2..l4_off + 4].try_into().unwrap()),
        )
    } else {
        (0, 0)
    };
    Some((src, dst, sport, dport, proto))
}

fn proto_matches(filter: FilterProto, proto: u8) -> bool {
    match filter {
        FilterProto::Any => true,
        FilterProto::Tcp => proto == 6,
        FilterProto::Udp => proto == 17,
        FilterProto::Icmp => proto == 1,
    }
}

fn cidr_matches(cidr: &str, ip: [u8; 4]) -> bool {
    let Some((net_str, bits_str)) = cidr.split_once('/') else { return false };
    let Ok(bits) = bits_str.parse::<u8>() else { return false };
    let Ok(net_ip) = net_str.parse::<std::net::Ipv4Addr>() else { return false };
    let mask = mask_for(bits);
    (u32::from_be_bytes(ip) & mask) == (u32::from(net_ip) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{keyed_transform, TransformId};

    fn ipv4_frame(dst_mac: [u8; 6], dst_ip: [u8; 4]) -> Vec<u8> {
        let mut f = vec![0u8; 42];
        f[0..6].copy_from_slice(&dst_mac);
        f[6..12].copy_from_slice(&[0xaa; 6]);
        f[12] = 0x08;
        f[13] = 0x00;
        f[14] = 0x45;
        f[26..30].copy_from_slice(&[10, 0, 0, 9]);
        f[30..34].copy_from_slice(&dst_ip);
        f
    }

    fn forwarder() -> (Forwarder, ValidatedEdgeConfig) {
        let cfg = crate::config::EdgeConfig {
            community: "acme".to_string(),
            key: Some("s3cret".to_string()),
            cipher: crate::config::TransformIdConfig::Aes,
            compression: crate::config::CompressionIdConfig::Lzo,
            header_encryption: false,
            supernodes: vec!["127.0.0.1:7654".to_string()],
            register_interval_secs: 20,
            register_ttl: 0,
            local_port: 0,
            mgmt_port: 5644,
            tap_address: None,
            tap_mac: None,
            tap_mtu: 0,
            pmtu_discovery: false,
            allow_routing: false,
            accept_multicast: false,
            disable_p2p: false,
            tos: 0,
            routes: Vec::new(),
            filter_rules: Vec::new(),
            device_desc: None,
        }
        .validate()
        .unwrap();
        let transform = keyed_transform(TransformId::Aes, cfg.community.as_bytes(), b"s3cret");
        (Forwarder::new(&cfg, MacAddr([1, 1, 1, 1, 1, 1]), transform), cfg)
    }

    #[test]
    fn scenario_3_broadcast_is_dropped_when_multicast_disabled() {
        let (fwd, _cfg) = forwarder();
        let mut peers = PeerTable::new();
        let mut registration =
            RegistrationEngine::new(&_cfg, MacAddr([1, 1, 1, 1, 1, 1]), Instant::now());
        let frame = ipv4_frame([0xff; 6], [10, 0, 0, 2]);
        let out = fwd.egress(
            &frame,
            BROADCAST,
            &mut peers,
            &mut registration,
            "127.0.0.1:7654".parse().unwrap(),
            "127.0.0.1:9999".parse().unwrap(),
            Instant::now(),
            0,
            (0x0a000000, 24),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_destination_triggers_register_and_supernode_fallback() {
        let (fwd, cfg) = forwarder();
        let mut peers = PeerTable::new();
        let mut registration = RegistrationEngine::new(&cfg, MacAddr([1, 1, 1, 1, 1, 1]), Instant::now());
        let dst = MacAddr([2, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let frame = ipv4_frame(dst.0, [10, 0, 0, 2]);
        let out = fwd.egress(
            &frame,
            dst,
            &mut peers,
            &mut registration,
            "127.0.0.1:7654".parse().unwrap(),
            "127.0.0.1:9999".parse().unwrap(),
            Instant::now(),
            0,
            (0x0a000000, 24),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(peers.get(dst).unwrap().state, PeerState::Pending);
    }

    #[test]
    fn ingress_drops_frame_matching_filter_rule() {
        let (mut fwd, cfg) = forwarder();
        fwd.filter_rules.push(FilterRule {
            src_cidr: "10.0.0.0/24".to_string(),
            dst_cidr: "10.0.0.0/24".to_string(),
            src_port: (0, 65535),
            dst_port: (80, 80),
            proto: FilterProto::Tcp,
            action: FilterAction::Drop,
        });
        let mut peers = PeerTable::new();
        let mut replay = ReplayWindow::new();

        let mut frame = vec![0u8; 38];
        frame[0..6].copy_from_slice(&[0xaa; 6]);
        frame[6..12].copy_from_slice(&[2, 2, 2, 2, 2, 2]);
        frame[12] = 0x08;
        frame[13] = 0x00;
        frame[14] = 0x45;
        frame[23] = 6;
        frame[26..30].copy_from_slice(&[10, 0, 0, 9]);
        frame[30..34].copy_from_slice(&[10, 0, 0, 2]);
        frame[34..36].copy_from_slice(&1234u16.to_be_bytes());
        frame[36..38].copy_from_slice(&80u16.to_be_bytes());

        let transform = keyed_transform(TransformId::Aes, cfg.community.as_bytes(), b"s3cret");
        let compressed = compress::compress_for_egress(fwd.compression, &frame).unwrap().1;
        let ciphertext = transform.encode(0, &compressed);
        let header = CommonHeader::new(PacketType::Packet, 32, Community::new(&cfg.community), false);
        let body = DataPacket {
            src_mac: MacAddr([2, 2, 2, 2, 2, 2]),
            dst_mac: MacAddr([1, 1, 1, 1, 1, 1]),
            sock: None,
            compression: CompressionId::Lzo.to_wire(),
            transform: transform.id().to_wire(),
            payload: ciphertext,
        };
        let mut buf = vec![0u8; 256];
        let n = Message::Packet(header, body).encode(&mut buf).unwrap();
        buf.truncate(n);

        let outcome = fwd.ingress(buf, "127.0.0.1:1".parse().unwrap(), &mut peers, &mut replay, Instant::now(), 0);
        assert!(matches!(outcome, Ingress::Dropped));
        assert!(peers.get(MacAddr([2, 2, 2, 2, 2, 2])).is_none());
    }

    #[test]
    fn ingress_rejects_own_mac_as_source() {
        let (fwd, _cfg) = forwarder();
        let mut peers = PeerTable::new();
        let mut replay = ReplayWindow::new();
        let header = CommonHeader::new(PacketType::Packet, 32, Community::new("acme"), false);
        let body = DataPacket {
            src_mac: MacAddr([1, 1, 1, 1, 1, 1]),
            dst_mac: MacAddr([2, 2, 2, 2, 2, 2]),
            sock: None,
            compression: CompressionId::None.to_wire(),
            transform: 0,
            payload: Vec::new(),
        };
        let mut buf = vec![0u8; 128];
        let n = Message::Packet(header, body).encode(&mut buf).unwrap();
        buf.truncate(n);
        let outcome = fwd.ingress(buf, "127.0.0.1:1".parse().unwrap(), &mut peers, &mut replay, Instant::now(), 0);
        assert!(matches!(outcome, Ingress::Dropped));
    }
}
