//! End-to-end boot/registration over real loopback UDP sockets (scenarios
//! 1 and 2): an edge's `RegistrationEngine` sends a `REGISTER_SUPER` that a
//! stub supernode receives and decodes, then the stub's `REGISTER_SUPER_ACK`
//! reply is adopted by the same engine.

use std::net::SocketAddr;
use std::time::Instant;

use n2n_edge_core::config::{CompressionIdConfig, EdgeConfig, TransformIdConfig};
use n2n_edge_core::protocol::packet::{DevAddr, RegisterSuperAck, SupernodeEntry};
use n2n_edge_core::protocol::{Message, PacketType, SockAddr};
use n2n_edge_core::registration::RegistrationEngine;
use tokio::net::UdpSocket;

fn edge_config(supernode: SocketAddr) -> EdgeConfig {
    EdgeConfig {
        community: "acme".to_string(),
        key: Some("s3cret".to_string()),
        cipher: TransformIdConfig::Aes,
        compression: CompressionIdConfig::Lzo,
        header_encryption: false,
        supernodes: vec![supernode.to_string()],
        register_interval_secs: 20,
        register_ttl: 0,
        local_port: 0,
        mgmt_port: 0,
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
        device_desc: Some("edge1".to_string()),
    }
}

#[tokio::test]
async fn register_super_round_trips_over_loopback_udp() {
    let edge_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let super_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let super_addr = super_sock.local_addr().unwrap();

    let cfg = edge_config(super_addr).validate().unwrap();
    let own_mac = n2n_edge_core::protocol::MacAddr([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let now = Instant::now();
    let mut engine = RegistrationEngine::new(&cfg, own_mac, now);

    // Scenario 1: the engine's first REGISTER_SUPER, sent and received as real bytes.
    let register_super = engine.maybe_register_super(now).expect("due immediately on boot");
    let mut out = vec![0u8; 512];
    let n = register_super.encode(&mut out).unwrap();
    edge_sock.send_to(&out[..n], super_addr).await.unwrap();

    let mut in_buf = vec![0u8; 512];
    let (n, from) = super_sock.recv_from(&mut in_buf).await.unwrap();
    let decoded = Message::decode(&in_buf[..n]).unwrap();
    let cookie = match decoded {
        Message::RegisterSuper(header, body) => {
            assert_eq!(header.packet_type().unwrap(), PacketType::RegisterSuper);
            assert_eq!(header.community.name(), "acme");
            assert_eq!(body.edge_mac, own_mac);
            body.cookie
        }
        other => panic!("expected RegisterSuper, got {other:?}"),
    };

    // Scenario 2: the stub supernode acks, granting an address and lifetime.
    let ack = Message::RegisterSuperAck(
        n2n_edge_core::protocol::CommonHeader::new(
            PacketType::RegisterSuperAck,
            32,
            n2n_edge_core::protocol::Community::new("acme"),
            true,
        ),
        RegisterSuperAck {
            cookie,
            edge_mac: own_mac,
            dev_addr: DevAddr { net_addr: 0x0a000101, net_bitlen: 24 },
            lifetime: 60,
            sock: SockAddr::from(from),
            supernodes: vec![SupernodeEntry {
                sock: SockAddr::from(super_addr),
                mac: n2n_edge_core::protocol::MacAddr([0x02, 0, 0, 0, 0, 1]),
                metric: 1,
            }],
        },
    );
    let mut ack_buf = vec![0u8; 512];
    let ack_n = ack.encode(&mut ack_buf).unwrap();
    super_sock.send_to(&ack_buf[..ack_n], edge_sock.local_addr().unwrap()).await.unwrap();

    let mut recv_buf = vec![0u8; 512];
    let (n, _) = edge_sock.recv_from(&mut recv_buf).await.unwrap();
    let decoded_ack = Message::decode(&recv_buf[..n]).unwrap();
    let Message::RegisterSuperAck(_, body) = decoded_ack else {
        panic!("expected RegisterSuperAck");
    };

    let discovered = engine.handle_register_super_ack(&body, now).expect("cookie matches");
    assert!(!engine.sn_wait);
    assert_eq!(engine.dev_addr().net_bitlen, 24);
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].2, 1);
}
