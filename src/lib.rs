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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Amunchain edge core - the packet-forwarding heart of a layer-2 overlay
//! VPN edge process.
//!
//! This crate provides:
//! - A wire codec for the community's control and data packet formats
//! - Symmetric transforms (AES/ChaCha20/Twofish/Speck) with replay-protected
//!   per-frame timestamps, plus optional header encryption
//! - LZO/ZSTD payload compression
//! - Peer and supernode registries keyed by overlay MAC address
//! - A registration engine driving NAT hole punching and supernode
//!   self-registration
//! - The TAP<->UDP forwarding plane and the cooperative event loop that
//!   drives it
//! - A local management channel for stats and live verbosity control

/// Wire codec: common header, packet bodies, cursor-based encode/decode.
pub mod protocol;
/// Symmetric transforms, replay protection, optional header encryption.
pub mod crypto;
/// Payload compression (LZO mandatory, ZSTD optional).
pub mod compress;
/// Peer and supernode registries.
pub mod registry;
/// NAT hole-punching and supernode self-registration state machine.
pub mod registration;
/// TAP<->UDP forwarding plane.
pub mod forwarding;
/// TAP device abstraction and implementations.
pub mod tap;
/// The cooperative event loop multiplexing TAP, UDP, and maintenance timers.
pub mod eventloop;
/// Local, line-oriented management channel.
pub mod management;
/// Edge state: the single owner of every table and collaborator.
pub mod edge;
/// Validated edge configuration.
pub mod config;
/// Prometheus counters and gauges exposed over the management channel.
pub mod metrics;
