//! Property tests for the universal invariants that must hold regardless of
//! which specific timestamps, durations, or peers are involved: replay
//! ordering, peer-table purge exactness, and the PENDING/DIRECT/
//! VIA_SUPERNODE registration state machine.

use std::time::{Duration, Instant};

use n2n_edge_core::config::{
    CompressionIdConfig, EdgeConfig, TransformIdConfig, ValidatedEdgeConfig,
};
use n2n_edge_core::crypto::{encode_timestamp, ReplayWindow};
use n2n_edge_core::protocol::MacAddr;
use n2n_edge_core::registration::{RegistrationEngine, N_PING};
use n2n_edge_core::registry::{PeerState, PeerTable};
use proptest::prelude::*;

fn validated_cfg() -> ValidatedEdgeConfig {
    EdgeConfig {
        community: "acme".to_string(),
        key: Some("s3cret".to_string()),
        cipher: TransformIdConfig::Aes,
        compression: CompressionIdConfig::Lzo,
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
    .unwrap()
}

fn mac(tag: u8) -> MacAddr {
    MacAddr([tag, tag, tag, tag, tag, tag])
}

proptest! {
    /// Once a timestamp has been accepted, nothing more than JITTER behind it
    /// is ever later accepted from the same sender.
    #[test]
    fn no_timestamp_accepted_once_superseded_beyond_jitter(
        base in 10_000_000_000u64..20_000_000_000u64,
        advance in 0u64..50_000_000u64,
        behind in 5_100_000u64..60_000_000u64,
    ) {
        let sender = mac(7);
        let mut window = ReplayWindow::new();
        prop_assert!(window.accept(sender, encode_timestamp(base), base));

        let accepted_at = base + advance;
        let _ = window.accept(sender, encode_timestamp(accepted_at), accepted_at);

        let too_old = accepted_at.saturating_sub(behind);
        let now = accepted_at;
        prop_assert!(!window.accept(sender, encode_timestamp(too_old), now));
    }

    /// Replay windows are independent per sender: a high-water mark set for
    /// one MAC never rejects a fresh timestamp from a different MAC.
    #[test]
    fn replay_window_is_per_sender(
        ts_a in 10_000_000_000u64..20_000_000_000u64,
        ts_b in 10_000_000_000u64..20_000_000_000u64,
    ) {
        let mut window = ReplayWindow::new();
        let a = mac(1);
        let b = mac(2);
        prop_assert!(window.accept(a, encode_timestamp(ts_a), ts_a));
        prop_assert!(window.accept(b, encode_timestamp(ts_b), ts_b));
    }

    /// `purge_stale(now, ttl)` removes exactly the entries whose last-seen
    /// time is strictly older than `ttl`, and nothing else.
    #[test]
    fn purge_removes_exactly_the_stale_entries(
        ages_secs in proptest::collection::vec(0u64..200, 1..12),
        ttl_secs in 1u64..150,
    ) {
        let mut table = PeerTable::new();
        let t0 = Instant::now();
        let now = t0 + Duration::from_secs(300);
        let ttl = Duration::from_secs(ttl_secs);

        let mut expected_purged = Vec::new();
        for (i, age) in ages_secs.iter().enumerate() {
            let m = mac(i as u8 + 1);
            let last_seen = now - Duration::from_secs(*age);
            table.find_or_insert(m, format!("127.0.0.1:{}", 10_000 + i).parse().unwrap(), last_seen);
            if now.saturating_duration_since(last_seen) > ttl {
                expected_purged.push(m);
            }
        }

        let mut purged = table.purge_stale(now, ttl);
        purged.sort();
        expected_purged.sort();
        prop_assert_eq!(purged, expected_purged);
    }

    /// A peer reaches DIRECT iff a matching-cookie REGISTER_ACK arrives
    /// before N_PING registration attempts have been recorded; otherwise the
    /// next maintenance tick demotes it to VIA_SUPERNODE.
    #[test]
    fn pending_peer_resolves_direct_or_via_supernode(
        acked in any::<bool>(),
        attempts_before_ack in 0u8..(N_PING + 2),
    ) {
        let now = Instant::now();
        let cfg = validated_cfg();
        let own = mac(1);
        let target = mac(2);
        let supernode = "127.0.0.1:7654".parse().unwrap();
        let own_sock = "127.0.0.1:9999".parse().unwrap();

        let mut engine = RegistrationEngine::new(&cfg, own, now);
        let mut peers = PeerTable::new();
        let register = engine.initiate_peer_registration(target, &mut peers, supernode, own_sock, now);
        let cookie = match register {
            n2n_edge_core::protocol::Message::Register(_, body) => body.cookie,
            _ => unreachable!(),
        };

        for _ in 0..attempts_before_ack.min(N_PING) {
            peers.record_register_attempt(target);
        }

        if acked && attempts_before_ack < N_PING {
            let ack = n2n_edge_core::protocol::packet::RegisterAck {
                cookie,
                dst_mac: own,
                src_mac: target,
                sock: None,
            };
            let promoted = engine.handle_register_ack(&ack, "10.1.1.1:5000".parse().unwrap(), &mut peers, now);
            prop_assert!(promoted);
            prop_assert_eq!(peers.get(target).unwrap().state, PeerState::Direct);
        } else {
            for _ in attempts_before_ack.min(N_PING)..N_PING {
                peers.record_register_attempt(target);
            }
            engine.demote_exhausted_pending(&mut peers);
            prop_assert_eq!(peers.get(target).unwrap().state, PeerState::ViaSupernode);
        }
    }
}
