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
#![warn(missing_docs)]

//! Edge statistics (spec §3's "edge statistics" and §4.8's `stats` command).

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A counter/gauge failed to register, e.g. a duplicate name.
    #[error("prometheus registration failed")]
    Prom,
}

/// Edge statistics, exposed to the management channel's `stats` command and
/// collectible as Prometheus exposition text.
#[derive(Clone)]
pub struct EdgeMetrics {
    /// Registry all counters/gauges below are registered into.
    pub registry: Registry,

    /// Frames read from TAP and sent to a peer or supernode.
    pub tx_packets: IntCounter,
    /// Bytes sent, counted before compression/encryption overhead.
    pub tx_bytes: IntCounter,
    /// sendto() failures.
    pub tx_errors: IntCounter,

    /// PACKET bodies decrypted and written to TAP.
    pub rx_packets: IntCounter,
    /// Bytes written to TAP.
    pub rx_bytes: IntCounter,
    /// recvfrom() or decode failures on the data path.
    pub rx_errors: IntCounter,

    /// Frames whose replay timestamp was rejected.
    pub replay_rejected: IntCounter,
    /// Decode failures: bad version, unknown type, truncated body.
    pub protocol_errors: IntCounter,

    /// Peers currently tracked (`known_peers` + `pending_peers`).
    pub known_peers: IntGauge,
    /// Supernodes currently tracked.
    pub known_supernodes: IntGauge,
}

impl EdgeMetrics {
    /// Create and register edge metrics under an isolated registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let tx_packets = IntCounter::new("n2n_edge_tx_packets_total", "Frames sent")
            .map_err(|_| MetricsError::Prom)?;
        let tx_bytes = IntCounter::new("n2n_edge_tx_bytes_total", "Bytes sent")
            .map_err(|_| MetricsError::Prom)?;
        let tx_errors = IntCounter::new("n2n_edge_tx_errors_total", "Send failures")
            .map_err(|_| MetricsError::Prom)?;

        let rx_packets = IntCounter::new("n2n_edge_rx_packets_total", "Frames written to TAP")
            .map_err(|_| MetricsError::Prom)?;
        let rx_bytes = IntCounter::new("n2n_edge_rx_bytes_total", "Bytes written to TAP")
            .map_err(|_| MetricsError::Prom)?;
        let rx_errors = IntCounter::new("n2n_edge_rx_errors_total", "Receive/decode failures")
            .map_err(|_| MetricsError::Prom)?;

        let replay_rejected = IntCounter::new(
            "n2n_edge_replay_rejected_total",
            "Frames rejected by the replay window",
        )
        .map_err(|_| MetricsError::Prom)?;
        let protocol_errors = IntCounter::new(
            "n2n_edge_protocol_errors_total",
            "Decode failures: bad version, unknown type, underrun",
        )
        .map_err(|_| MetricsError::Prom)?;

        let known_peers = IntGauge::new("n2n_edge_known_peers", "Peers currently tracked")
            .map_err(|_| MetricsError::Prom)?;
        let known_supernodes =
            IntGauge::new("n2n_edge_known_supernodes", "Supernodes currently tracked")
                .map_err(|_| MetricsError::Prom)?;

        for metric in [&tx_packets, &tx_bytes, &tx_errors, &rx_packets, &rx_bytes, &rx_errors, &replay_rejected, &protocol_errors]
        {
            registry.register(Box::new(metric.clone())).map_err(|_| MetricsError::Prom)?;
        }
        registry.register(Box::new(known_peers.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(known_supernodes.clone())).map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            tx_packets,
            tx_bytes,
            tx_errors,
            rx_packets,
            rx_bytes,
            rx_errors,
            replay_rejected,
            protocol_errors,
            known_peers,
            known_supernodes,
        })
    }

    /// Render the counters the management channel's `stats` command
    /// reports, as plain ASCII lines (spec §4.8: "a local debug channel,
    /// not a scrape endpoint").
    pub fn render_text(&self) -> String {
        format!(
            "tx_packets={}\ntx_bytes={}\ntx_errors={}\nrx_packets={}\nrx_bytes={}\nrx_errors={}\nreplay_rejected={}\nprotocol_errors={}\nknown_peers={}\nknown_supernodes={}\n",
            self.tx_packets.get(),
            self.tx_bytes.get(),
            self.tx_errors.get(),
            self.rx_packets.get(),
            self.rx_bytes.get(),
            self.rx_errors.get(),
            self.replay_rejected.get(),
            self.protocol_errors.get(),
            self.known_peers.get(),
            self.known_supernodes.get(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = EdgeMetrics::new().unwrap();
        assert_eq!(metrics.tx_packets.get(), 0);
        metrics.tx_packets.inc();
        assert_eq!(metrics.tx_packets.get(), 1);
        assert!(metrics.render_text().contains("tx_packets=1"));
    }
}
