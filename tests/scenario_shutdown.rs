//! Scenario 6: graceful shutdown sends a best-effort DEREGISTER to the
//! current supernode before the event loop returns. Exercises the real
//! `eventloop::run` with a `MockTap` standing in for the kernel device.

#![cfg(feature = "test-util")]

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use n2n_edge_core::config::{CompressionIdConfig, EdgeConfig, TransformIdConfig};
use n2n_edge_core::edge::EdgeState;
use n2n_edge_core::eventloop;
use n2n_edge_core::protocol::{MacAddr, Message};
use n2n_edge_core::tap::MockTap;
use tokio::net::UdpSocket;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::reload;

#[tokio::test]
async fn shutdown_deregisters_from_supernode() {
    let super_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let super_addr = super_sock.local_addr().unwrap();

    let cfg = EdgeConfig {
        community: "acme".to_string(),
        key: Some("s3cret".to_string()),
        cipher: TransformIdConfig::Aes,
        compression: CompressionIdConfig::Lzo,
        header_encryption: false,
        supernodes: vec![super_addr.to_string()],
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
    .validate()
    .unwrap();

    let own_mac = MacAddr([0x02, 0x22, 0x22, 0x22, 0x22, 0x22]);
    let tap = MockTap::new(own_mac);
    let state = EdgeState::new(&cfg, own_mac, Box::new(tap), Instant::now()).unwrap();

    let keep_on_running = eventloop::keep_on_running_flag();
    let loop_flag = keep_on_running.clone();
    let (_filter, verbosity) = reload::Layer::new(LevelFilter::INFO);

    let handle = tokio::spawn(async move { eventloop::run(state, loop_flag, verbosity).await });

    // Let the loop bind its sockets, send its first REGISTER_SUPER, and settle
    // into its wait-for-next-deadline select branch, then ask it to stop. The
    // loop only re-checks the flag once that branch completes, which is
    // bounded by SOCKET_TIMEOUT_INTERVAL, so the timeout below is generous.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut discard = vec![0u8; 512];
    let _ = super_sock.recv_from(&mut discard).await.unwrap(); // the initial REGISTER_SUPER
    keep_on_running.store(false, Ordering::Relaxed);

    let mut buf = vec![0u8; 512];
    let (n, _) = tokio::time::timeout(Duration::from_secs(15), super_sock.recv_from(&mut buf))
        .await
        .expect("deregister never arrived")
        .unwrap();
    let decoded = Message::decode(&buf[..n]).unwrap();
    match decoded {
        Message::Deregister(_, body) => assert_eq!(body.src_mac, own_mac),
        other => panic!("expected Deregister, got {other:?}"),
    }

    handle.await.unwrap().unwrap();
}
