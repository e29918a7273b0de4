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

//! Management channel (spec C8): a local-only, line-oriented ASCII
//! request/response protocol over UDP. Never mutates long-lived edge state
//! beyond the tracing verbosity level (spec §4.6: "never mutates long-lived
//! state beyond tracing level").

use tracing::Level;

use crate::metrics::EdgeMetrics;
use crate::registry::{PeerTable, SupernodeList};

/// One parsed management request.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    /// `stats`: counters as `key=value` lines.
    Stats,
    /// `peers`: the peer table, one line per entry.
    Peers,
    /// `supernodes`: the supernode list, one line per entry.
    Supernodes,
    /// `verbosity <level>`: adjust the tracing filter.
    Verbosity(Level),
}

/// Ways a request line can fail to parse.
#[derive(Debug, PartialEq, Eq)]
pub struct ParseError(pub String);

impl Request {
    /// Parse one request line (trailing whitespace/newlines ignored).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("stats") => Ok(Request::Stats),
            Some("peers") => Ok(Request::Peers),
            Some("supernodes") => Ok(Request::Supernodes),
            Some("verbosity") => {
                let level = parts
                    .next()
                    .ok_or_else(|| ParseError("verbosity requires a level".to_string()))?;
                level
                    .parse::<Level>()
                    .map(Request::Verbosity)
                    .map_err(|_| ParseError(format!("unknown verbosity level: {level}")))
            }
            Some(other) => Err(ParseError(format!("unknown command: {other}"))),
            None => Err(ParseError("empty request".to_string())),
        }
    }
}

/// Render the reply to a request that does not itself mutate the tracing
/// filter (that side effect is applied by the caller, which owns the
/// reloadable filter handle).
pub fn render_reply(req: &Request, metrics: &EdgeMetrics, peers: &PeerTable, supernodes: &SupernodeList) -> String {
    match req {
        Request::Stats => metrics.render_text(),
        Request::Peers => {
            let mut out = String::new();
            for entry in peers.iter() {
                out.push_str(&format!("{} {} {:?}\n", entry.mac, entry.sock, entry.state));
            }
            out
        }
        Request::Supernodes => {
            let mut out = String::new();
            for entry in supernodes.iter() {
                out.push_str(&format!("{} metric={}\n", entry.sock, entry.metric));
            }
            out
        }
        Request::Verbosity(level) => format!("verbosity set to {level}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Request::parse("stats\n").unwrap(), Request::Stats);
        assert_eq!(Request::parse("peers").unwrap(), Request::Peers);
        assert_eq!(Request::parse("supernodes").unwrap(), Request::Supernodes);
        assert_eq!(Request::parse("verbosity debug").unwrap(), Request::Verbosity(Level::DEBUG));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Request::parse("shutdown").is_err());
    }

    #[test]
    fn verbosity_without_level_is_an_error() {
        assert!(Request::parse("verbosity").is_err());
    }

    #[test]
    fn stats_reply_uses_metrics_render_text() {
        let metrics = EdgeMetrics::new().unwrap();
        let peers = PeerTable::new();
        let supernodes = SupernodeList::new(Vec::new());
        let reply = render_reply(&Request::Stats, &metrics, &peers, &supernodes);
        assert!(reply.contains("tx_packets=0"));
    }
}
