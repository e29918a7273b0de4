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

//! Per-frame replay protection (spec §4.2).
//!
//! Every transform other than [`super::transform::TransformId::Null`] embeds
//! a 64-bit timestamp ahead of its ciphertext. The low 12 bits are reserved
//! (4 bits for future per-frame flags, 8 bits that must currently read zero)
//! and the remaining 52 bits hold a monotonic counter of microseconds. A
//! receiver accepts a timestamp iff the reserved bits are zero, it falls
//! within [`FRAME`] of the receiver's own clock, and it does not fall more
//! than [`JITTER`] behind the newest timestamp already seen from that
//! sender.

use std::collections::HashMap;
use std::time::Duration;

use crate::protocol::MacAddr;

/// Bits reserved for future per-frame flags; must read zero on ingress.
const RESERVED_MASK: u64 = 0xfff;

/// Maximum clock drift, in either direction, tolerated between the sender's
/// embedded timestamp and the receiver's own clock.
pub const FRAME: Duration = Duration::from_secs(60);

/// How far backwards a timestamp may slip relative to the newest one already
/// accepted from the same sender, to absorb UDP reordering.
pub const JITTER: Duration = Duration::from_secs(5);

fn micros(d: Duration) -> u64 {
    d.as_micros() as u64
}

/// Pack a microsecond counter into the wire timestamp format, zeroing the
/// reserved low bits.
pub fn encode_timestamp(now_micros: u64) -> u64 {
    now_micros << 12
}

/// Unpack a wire timestamp into its microsecond counter, if its reserved
/// bits are clean.
pub fn decode_timestamp(wire: u64) -> Option<u64> {
    if wire & RESERVED_MASK != 0 {
        return None;
    }
    Some(wire >> 12)
}

/// Per-sender high-water mark used to reject replays and accept reordered
/// frames within [`JITTER`].
#[derive(Debug, Default)]
pub struct ReplayWindow {
    last_valid: HashMap<MacAddr, u64>,
}

impl ReplayWindow {
    /// A fresh window with no senders yet observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial timestamp a sender should embed in its first frame:
    /// `now - FRAME`, so a peer whose clock lags slightly still accepts it.
    pub fn initial_timestamp(now_micros: u64) -> u64 {
        now_micros.saturating_sub(micros(FRAME))
    }

    /// Validate `wire_ts` from `sender` against `now_micros`, updating the
    /// high-water mark on acceptance.
    pub fn accept(&mut self, sender: MacAddr, wire_ts: u64, now_micros: u64) -> bool {
        let ts = match decode_timestamp(wire_ts) {
            Some(ts) => ts,
            None => return false,
        };

        let drift = ts.abs_diff(now_micros);
        if drift >= micros(FRAME) {
            return false;
        }

        if let Some(&previous) = self.last_valid.get(&sender) {
            if ts + micros(JITTER) <= previous {
                return false;
            }
        }

        let entry = self.last_valid.entry(sender).or_insert(ts);
        *entry = (*entry).max(ts);
        true
    }

    /// Drop replay state for a sender that has been purged from the peer
    /// table, so a later re-registration starts clean.
    pub fn forget(&mut self, sender: MacAddr) {
        self.last_valid.remove(&sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_bits_must_be_zero() {
        let ts = encode_timestamp(12345);
        assert_eq!(ts & RESERVED_MASK, 0);
        assert_eq!(decode_timestamp(ts), Some(12345));
        assert_eq!(decode_timestamp(ts | 1), None);
    }

    #[test]
    fn accepts_fresh_timestamp_near_now() {
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let mut w = ReplayWindow::new();
        let now = 1_000_000_000u64;
        assert!(w.accept(mac, encode_timestamp(now), now));
    }

    #[test]
    fn rejects_timestamp_outside_frame() {
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let mut w = ReplayWindow::new();
        let now = 1_000_000_000u64;
        let stale = now - micros(FRAME) - 1;
        assert!(!w.accept(mac, encode_timestamp(stale), now));
    }

    #[test]
    fn rejects_replay_of_same_or_older_timestamp() {
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let mut w = ReplayWindow::new();
        let now = 1_000_000_000u64;
        assert!(w.accept(mac, encode_timestamp(now), now));
        // Replaying the exact same timestamp falls outside (previous - JITTER, ..].
        assert!(!w.accept(mac, encode_timestamp(now - micros(JITTER)), now));
    }

    #[test]
    fn tolerates_small_backward_jitter() {
        let mac = MacAddr([1, 2, 3, 4, 5, 6]);
        let mut w = ReplayWindow::new();
        let now = 1_000_000_000u64;
        assert!(w.accept(mac, encode_timestamp(now), now));
        let slightly_earlier = now - micros(JITTER) / 2;
        assert!(w.accept(mac, encode_timestamp(slightly_earlier), now));
    }

    #[test]
    fn independent_per_sender() {
        let a = MacAddr([1, 1, 1, 1, 1, 1]);
        let b = MacAddr([2, 2, 2, 2, 2, 2]);
        let mut w = ReplayWindow::new();
        let now = 1_000_000_000u64;
        assert!(w.accept(a, encode_timestamp(now), now));
        assert!(w.accept(b, encode_timestamp(now - micros(JITTER) / 2), now));
    }
}
