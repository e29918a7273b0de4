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

//! The event loop (spec C7): a single cooperative task multiplexing TAP,
//! the data/control UDP socket, the management socket, and the maintenance
//! timers. Modeled as one `tokio::select!` on a current-thread task, mirroring
//! how `networking::p2p::run_swarm_loop` multiplexes a swarm and a channel in
//! one `select!` rather than spawning a task per source.
//!
//! TAP reads are a blocking syscall (opening/reading `/dev/net/tun`), so they
//! run on a dedicated blocking thread and are bridged into the loop over an
//! mpsc channel — the same bridge pattern `p2p::run_swarm_loop` uses for its
//! outbound channel.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::reload;

use crate::edge::EdgeState;
use crate::forwarding::Ingress;
use crate::management::{self, Request};
use crate::protocol::packet::{Auth, Deregister};
use crate::protocol::{CommonHeader, MacAddr, Message, PacketType};
use crate::registry::PeerState;
use crate::tap::TapDevice;

/// Handle onto the live tracing filter, so the management channel's
/// `verbosity` command can change log output without a restart.
pub type VerbosityHandle = reload::Handle<LevelFilter, tracing_subscriber::Registry>;

/// Upper bound on how long a single iteration of the wait step blocks, even
/// if no maintenance timer is sooner (spec §4.7: "bounded by
/// SOCKET_TIMEOUT_INTERVAL_SECS").
const SOCKET_TIMEOUT_INTERVAL: Duration = Duration::from_secs(10);

/// Interval between sweeps for stale peer-table entries.
const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// How long a peer may go unseen before it is purged back to `UNKNOWN`
/// (spec §4.5: "DIRECT -> UNKNOWN on REGISTRATION_TIMEOUT").
const PEER_TIMEOUT: Duration = Duration::from_secs(180);

/// A fresh flag, flipped only by an OS signal handler; the loop reads it at
/// each iteration boundary and never touches any other state from outside
/// the loop (spec §5, §9).
pub fn keep_on_running_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(true))
}

fn now_micros() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_micros() as u64).unwrap_or(0)
}

/// Run the event loop until `keep_on_running` is cleared, then perform
/// orderly shutdown (spec §8 scenario 6: DEREGISTER best-effort, close
/// sockets/TAP).
pub async fn run(mut edge: EdgeState, keep_on_running: Arc<AtomicBool>, verbosity: VerbosityHandle) -> std::io::Result<()> {
    let data_sock = UdpSocket::bind(("0.0.0.0", edge.local_port())).await?;
    let mgmt_sock = UdpSocket::bind(("127.0.0.1", edge.mgmt_port())).await?;

    let (tap_read_tx, mut tap_read_rx) = mpsc::channel::<Vec<u8>>(256);
    let (tap_write_tx, tap_write_rx) = mpsc::channel::<Vec<u8>>(256);
    spawn_tap_bridge(edge.take_tap(), tap_read_tx, tap_write_rx);

    let mut next_purge = Instant::now() + PURGE_INTERVAL;
    let mut data_buf = vec![0u8; 2048];
    let mut mgmt_buf = vec![0u8; 512];

    info!(community = %edge.community_name(), "edge event loop started");

    while keep_on_running.load(Ordering::Relaxed) {
        let loop_now = Instant::now();
        let deadline = edge.next_register_super().min(next_purge);
        let wait = deadline.saturating_duration_since(loop_now).min(SOCKET_TIMEOUT_INTERVAL);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}

            result = mgmt_sock.recv_from(&mut mgmt_buf) => {
                if let Ok((n, from)) = result {
                    handle_management(&edge, &mgmt_sock, &mgmt_buf[..n], from, &verbosity).await;
                }
            }

            result = data_sock.recv_from(&mut data_buf) => {
                if let Ok((n, from)) = result {
                    handle_datagram(&mut edge, &data_sock, &data_buf[..n], from, loop_now, &tap_write_tx).await;
                }
            }

            maybe_frame = tap_read_rx.recv() => {
                if let Some(frame) = maybe_frame {
                    handle_tap_frame(&mut edge, &data_sock, &frame, loop_now).await;
                }
            }
        }

        let now = Instant::now();
        if now >= next_purge {
            run_maintenance(&mut edge, &data_sock, now).await;
            next_purge = now + PURGE_INTERVAL;
        }

        if let Some(msg) = edge.registration.maybe_register_super(now) {
            if let Some(supernode) = edge.current_supernode() {
                send_message(&data_sock, &msg, supernode).await;
            }
        }
    }

    shutdown(&edge, &data_sock).await;
    Ok(())
}

/// Spawns the blocking TAP read/write bridge. The blocking task owns the
/// device for the lifetime of the edge; `close` runs when the task's loop
/// exits (device open failures or a broken channel).
fn spawn_tap_bridge(
    mut tap: Box<dyn TapDevice + Send + Sync>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
) {
    tokio::task::spawn_blocking(move || loop {
        match outbound_rx.try_recv() {
            Ok(frame) => {
                let _ = tap.write(&frame);
                continue;
            }
            Err(mpsc::error::TryRecvError::Disconnected) => break,
            Err(mpsc::error::TryRecvError::Empty) => {}
        }

        let mut frame = vec![0u8; 2048];
        match tap.read(&mut frame) {
            Ok(n) => {
                frame.truncate(n);
                if inbound_tx.blocking_send(frame).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => {
                warn!(err = %e, "TAP read failed, stopping bridge");
                break;
            }
        }
    });
}

async fn handle_management(edge: &EdgeState, sock: &UdpSocket, buf: &[u8], from: SocketAddr, verbosity: &VerbosityHandle) {
    let line = String::from_utf8_lossy(buf);
    let reply = match Request::parse(&line) {
        Ok(req) => {
            if let Request::Verbosity(level) = req {
                let _ = verbosity.modify(|filter| *filter = LevelFilter::from_level(level));
            }
            management::render_reply(&req, &edge.metrics, &edge.peers, &edge.supernodes)
        }
        Err(e) => format!("error: {}\n", e.0),
    };
    let _ = sock.send_to(reply.as_bytes(), from).await;
}

async fn handle_datagram(
    edge: &mut EdgeState,
    sock: &UdpSocket,
    buf: &[u8],
    from: SocketAddr,
    now: Instant,
    tap_write_tx: &mpsc::Sender<Vec<u8>>,
) {
    let outcome = edge.forwarder.ingress(buf.to_vec(), from, &mut edge.peers, &mut edge.replay, now, now_micros());
    match outcome {
        Ingress::Frame(frame) => {
            edge.metrics.rx_packets.inc();
            edge.metrics.rx_bytes.inc_by(frame.len() as u64);
            let _ = tap_write_tx.try_send(frame);
        }
        Ingress::Control(msg) => dispatch_control(edge, sock, msg, from, now).await,
        Ingress::Dropped => {
            edge.metrics.rx_errors.inc();
        }
    }
}

async fn dispatch_control(edge: &mut EdgeState, sock: &UdpSocket, msg: Message, from: SocketAddr, now: Instant) {
    match msg {
        Message::RegisterSuperAck(_, ack) => {
            if let Some(discovered) = edge.registration.handle_register_super_ack(&ack, now) {
                edge.supernodes.merge_discovered(discovered);
            }
        }
        Message::RegisterSuperNak(_, nak) => {
            let _ = edge.registration.handle_register_super_nak(&nak);
            edge.supernodes.rotate();
        }
        Message::Register(_, reg) => {
            let reply = edge.registration.handle_register(&reg, from, &mut edge.peers, now);
            send_message(sock, &reply, from).await;
        }
        Message::RegisterAck(_, ack) => {
            edge.registration.handle_register_ack(&ack, from, &mut edge.peers, now);
        }
        Message::PeerInfo(_, info) => {
            edge.registration.handle_peer_info(&info, &mut edge.peers, now);
        }
        Message::QueryPeer(_, query) => {
            debug!(target = %query.target_mac, "query_peer received, no directory to answer from");
        }
        Message::Deregister(_, dereg) => {
            edge.peers.touch(dereg.src_mac, now);
        }
        Message::Packet(_, _) => unreachable!("PACKET is handled as Ingress::Frame"),
        Message::RegisterSuper(_, _) => {
            debug!("RegisterSuper received on edge socket, no supernode role to answer from");
        }
    }
}

async fn handle_tap_frame(edge: &mut EdgeState, sock: &UdpSocket, frame: &[u8], now: Instant) {
    if edge.registration.sn_wait {
        return;
    }
    let Some(dst_mac) = parse_dst_mac(frame) else {
        return;
    };
    let Some(supernode) = edge.current_supernode() else {
        return;
    };
    let own_sock = edge.public_socket().unwrap_or(supernode);
    let now_wire_ts = crate::crypto::encode_timestamp(now_micros());
    let subnet = edge.overlay_subnet();
    let outbound = edge.forwarder.egress(
        frame,
        dst_mac,
        &mut edge.peers,
        &mut edge.registration,
        supernode,
        own_sock,
        now,
        now_wire_ts,
        subnet,
    );
    for datagram in outbound {
        if sock.send_to(&datagram.bytes, datagram.to).await.is_err() {
            edge.metrics.tx_errors.inc();
        } else {
            edge.metrics.tx_packets.inc();
            edge.metrics.tx_bytes.inc_by(datagram.bytes.len() as u64);
        }
    }
}

fn parse_dst_mac(frame: &[u8]) -> Option<MacAddr> {
    if frame.len() < 6 {
        return None;
    }
    Some(MacAddr(frame[0..6].try_into().unwrap()))
}

async fn run_maintenance(edge: &mut EdgeState, sock: &UdpSocket, now: Instant) {
    let purged = edge.peers.purge_stale(now, PEER_TIMEOUT);
    for mac in purged {
        edge.replay.forget(mac);
    }
    if let Some(supernode) = edge.current_supernode() {
        let own_sock = edge.public_socket().unwrap_or(supernode);
        let retries = edge.registration.retry_pending_registrations(&mut edge.peers, own_sock);
        for msg in &retries {
            send_message(sock, msg, supernode).await;
        }
    }
    edge.registration.demote_exhausted_pending(&mut edge.peers);
    edge.metrics.known_peers.set(edge.peers.len() as i64);
    edge.metrics.known_supernodes.set(edge.supernodes.len() as i64);
}

async fn send_message(sock: &UdpSocket, msg: &Message, to: SocketAddr) {
    let mut buf = vec![0u8; 2048];
    if let Ok(n) = msg.encode(&mut buf) {
        let _ = sock.send_to(&buf[..n], to).await;
    }
}

async fn shutdown(edge: &EdgeState, sock: &UdpSocket) {
    info!("shutting down: deregistering from supernodes and known peers");
    if let Some(supernode) = edge.current_supernode() {
        send_deregister(sock, edge, supernode).await;
    }
    for entry in edge.peers().iter() {
        if entry.state == PeerState::Direct {
            send_deregister(sock, edge, entry.sock).await;
        }
    }
    info!("edge event loop stopped");
}

async fn send_deregister(sock: &UdpSocket, edge: &EdgeState, to: SocketAddr) {
    let dereg = Message::Deregister(
        CommonHeader::new(PacketType::Deregister, 32, edge.community(), false),
        Deregister { auth: Auth::none(), src_mac: edge.own_mac() },
    );
    send_message(sock, &dereg, to).await;
}
