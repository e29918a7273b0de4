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

//! Validated edge configuration, the hand-off point from whatever
//! CLI/config-file collaborator parses `-c`, `-l`, `-k`, etc. (spec §6.3).

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compress::CompressionId;
use crate::crypto::TransformId;

/// Failures that keep an edge from starting; a `ConfigError` always exits
/// the process with status 1 before the event loop runs (spec §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `-c`/`community` was never set.
    #[error("community name is required")]
    MissingCommunity,
    /// No `-l`/`supernode` entries were given.
    #[error("at least one supernode is required")]
    MissingSupernode,
    /// A configured address string did not parse.
    #[error("invalid socket address: {0}")]
    BadAddress(String),
    /// `-A` named a cipher outside 1..=5.
    #[error("unknown cipher id: {0}")]
    UnknownCipher(u8),
    /// `-z` named a compression scheme outside 1..=2.
    #[error("unknown compression id: {0}")]
    UnknownCompression(u8),
    /// A `-R` filter rule string did not parse.
    #[error("invalid filter rule: {0}")]
    InvalidRule(String),
}

/// An overlay route applied to the host routing table on startup and
/// reversed on shutdown (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    /// Network address in dotted-quad form.
    pub network: String,
    /// Prefix length, 0..=32.
    pub prefix_len: u8,
    /// Gateway address in dotted-quad form.
    pub gateway: String,
}

/// IP protocol a filter rule matches, or any.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterProto {
    /// Matches TCP, UDP, and ICMP alike.
    Any,
    /// TCP only.
    Tcp,
    /// UDP only.
    Udp,
    /// ICMP only.
    Icmp,
}

/// What a matching filter rule does to a frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterAction {
    /// Let the frame through.
    Accept,
    /// Discard the frame.
    Drop,
}

/// One `-R` filter rule: {src-CIDR, dst-CIDR, src-port range, dst-port
/// range, proto set}; action accept or drop (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterRule {
    /// Source CIDR, e.g. `10.0.0.0/24`.
    pub src_cidr: String,
    /// Destination CIDR.
    pub dst_cidr: String,
    /// Inclusive source port range.
    pub src_port: (u16, u16),
    /// Inclusive destination port range.
    pub dst_port: (u16, u16),
    /// Protocol this rule matches.
    pub proto: FilterProto,
    /// Action taken on a match.
    pub action: FilterAction,
}

impl FilterRule {
    /// Parse the compact `-R` rule syntax:
    /// `src_cidr,dst_cidr,src_lo-src_hi,dst_lo-dst_hi,proto,action`.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = s.split(',').collect();
        if fields.len() != 6 {
            return Err(ConfigError::InvalidRule(s.to_string()));
        }
        let parse_range = |f: &str| -> Result<(u16, u16), ConfigError> {
            let (lo, hi) = f.split_once('-').unwrap_or((f, f));
            let lo: u16 = lo.parse().map_err(|_| ConfigError::InvalidRule(s.to_string()))?;
            let hi: u16 = hi.parse().map_err(|_| ConfigError::InvalidRule(s.to_string()))?;
            Ok((lo, hi))
        };
        let proto = match fields[4] {
            "any" => FilterProto::Any,
            "tcp" => FilterProto::Tcp,
            "udp" => FilterProto::Udp,
            "icmp" => FilterProto::Icmp,
            _ => return Err(ConfigError::InvalidRule(s.to_string())),
        };
        let action = match fields[5] {
            "accept" => FilterAction::Accept,
            "drop" => FilterAction::Drop,
            _ => return Err(ConfigError::InvalidRule(s.to_string())),
        };
        Ok(Self {
            src_cidr: fields[0].to_string(),
            dst_cidr: fields[1].to_string(),
            src_port: parse_range(fields[2])?,
            dst_port: parse_range(fields[3])?,
            proto,
            action,
        })
    }
}

/// The validated configuration an edge runs with, assembled by the
/// (external) CLI/config-file collaborator (spec §6.3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Community name (`-c`), required.
    pub community: String,
    /// ASCII encryption key (`-k`); absent means `TransformId::Null`
    /// unless `N2N_KEY` is set in the environment.
    #[serde(default)]
    pub key: Option<String>,
    /// Cipher selection (`-A`); `Invalid` means "pick AES iff `key` is set,
    /// else Null" per spec §4.2.
    #[serde(default = "default_cipher")]
    pub cipher: TransformIdConfig,
    /// Compression selection (`-z`); defaults to LZO.
    #[serde(default = "default_compression")]
    pub compression: CompressionIdConfig,
    /// Enable header encryption (`-H`).
    #[serde(default)]
    pub header_encryption: bool,
    /// Supernode addresses (`-l`, repeatable), required non-empty.
    #[serde(default)]
    pub supernodes: Vec<String>,
    /// Registration interval in seconds (`-i`), default 20.
    #[serde(default = "default_register_interval")]
    pub register_interval_secs: u32,
    /// IP TTL for registration datagrams (`-L`); 0 = unset.
    #[serde(default)]
    pub register_ttl: u8,
    /// Fixed local UDP port (`-p`); 0 = ephemeral.
    #[serde(default)]
    pub local_port: u16,
    /// Management UDP port (`-t`).
    #[serde(default = "default_mgmt_port")]
    pub mgmt_port: u16,
    /// Overlay interface address, `mode:addr/prefix` (`-a`).
    #[serde(default)]
    pub tap_address: Option<String>,
    /// Fixed TAP MAC (`-m`).
    #[serde(default)]
    pub tap_mac: Option<String>,
    /// TAP MTU (`-M`); 0 = device default.
    #[serde(default)]
    pub tap_mtu: u32,
    /// Enable PMTU discovery (`-D`).
    #[serde(default)]
    pub pmtu_discovery: bool,
    /// Allow IP forwarding across the overlay (`-r`).
    #[serde(default)]
    pub allow_routing: bool,
    /// Accept multicast frames instead of dropping them (`-E`).
    #[serde(default)]
    pub accept_multicast: bool,
    /// Disable P2P; always route via supernode (`-S`).
    #[serde(default)]
    pub disable_p2p: bool,
    /// IP TOS byte (`-T`).
    #[serde(default)]
    pub tos: u8,
    /// Overlay routes (`-n`, repeatable).
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Filter rules (`-R`, repeatable), stored pre-parsed.
    #[serde(default)]
    pub filter_rules: Vec<String>,
    /// Device description hint (`-I`).
    #[serde(default)]
    pub device_desc: Option<String>,
}

fn default_cipher() -> TransformIdConfig {
    TransformIdConfig::Invalid
}

fn default_compression() -> CompressionIdConfig {
    CompressionIdConfig::Lzo
}

fn default_register_interval() -> u32 {
    20
}

fn default_mgmt_port() -> u16 {
    5644
}

fn prefix_to_netmask(prefix: &str) -> String {
    let bits: u32 = prefix.parse().unwrap_or(24);
    let mask: u32 = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
    let octets = mask.to_be_bytes();
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

fn parse_ipv4(s: &str) -> Option<u32> {
    s.parse::<std::net::Ipv4Addr>().ok().map(u32::from)
}

/// Parse `-a` into the address mode and, for `static`, the numeric overlay
/// address and prefix this edge should keep across supernode rotation (spec
/// §4.5: a granted `dev_addr` is only adopted when `ip_mode` is `SnAssign`).
fn parse_address_mode(tap_address: &Option<String>) -> (crate::tap::IpMode, Option<crate::protocol::packet::DevAddr>) {
    use crate::protocol::packet::DevAddr;
    use crate::tap::IpMode;

    match tap_address.as_deref() {
        Some(spec) if spec.starts_with("dhcp") => (IpMode::Dhcp, None),
        Some(spec) => {
            let rest = spec.strip_prefix("static:").unwrap_or(spec);
            let (addr_str, bits) = match rest.split_once('/') {
                Some((addr, prefix)) => (addr, prefix.parse::<u8>().unwrap_or(24)),
                None => (rest, 24),
            };
            let dev_addr = parse_ipv4(addr_str).map(|net_addr| DevAddr { net_addr, net_bitlen: bits });
            (IpMode::Static, dev_addr)
        }
        None => (IpMode::SnAssign, None),
    }
}

fn parse_mac(s: &str) -> Option<crate::protocol::MacAddr> {
    let mut bytes = [0u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return None;
    }
    for (dst, part) in bytes.iter_mut().zip(parts) {
        *dst = u8::from_str_radix(part, 16).ok()?;
    }
    Some(crate::protocol::MacAddr(bytes))
}

/// Serde-friendly mirror of [`TransformId`] (the wire enum has no
/// `Serialize`/`Deserialize` impl since it is never itself persisted).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransformIdConfig {
    /// No cipher selected yet; resolved during validation.
    Invalid,
    /// Payload carried in the clear.
    Null,
    /// Twofish-CTR.
    Twofish,
    /// AES-256-CTR.
    Aes,
    /// ChaCha20.
    ChaCha20,
    /// Speck128/128-CTR.
    Speck,
}

impl From<TransformIdConfig> for TransformId {
    fn from(v: TransformIdConfig) -> Self {
        match v {
            TransformIdConfig::Invalid => TransformId::Invalid,
            TransformIdConfig::Null => TransformId::Null,
            TransformIdConfig::Twofish => TransformId::Twofish,
            TransformIdConfig::Aes => TransformId::Aes,
            TransformIdConfig::ChaCha20 => TransformId::ChaCha20,
            TransformIdConfig::Speck => TransformId::Speck,
        }
    }
}

/// Serde-friendly mirror of [`CompressionId`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionIdConfig {
    /// LZO1X, the mandatory baseline.
    Lzo,
    /// ZSTD, optional higher-ratio codec.
    Zstd,
}

impl From<CompressionIdConfig> for CompressionId {
    fn from(v: CompressionIdConfig) -> Self {
        match v {
            CompressionIdConfig::Lzo => CompressionId::Lzo,
            CompressionIdConfig::Zstd => CompressionId::Zstd,
        }
    }
}

impl EdgeConfig {
    /// Build the TAP device parameters this configuration implies (spec
    /// §6.2): `-a mode:addr/prefix` selects static/dhcp/supernode-assigned
    /// addressing, `-m` pins a MAC, `-M` overrides the MTU.
    pub fn tap_config(&self) -> crate::tap::TapConfig {
        use crate::tap::IpMode;

        let (ip_mode, ip_addr, netmask) = match self.tap_address.as_deref() {
            Some(spec) if spec.starts_with("dhcp") => (IpMode::Dhcp, String::new(), String::new()),
            Some(spec) => {
                let rest = spec.strip_prefix("static:").unwrap_or(spec);
                match rest.split_once('/') {
                    Some((addr, prefix)) => (IpMode::Static, addr.to_string(), prefix_to_netmask(prefix)),
                    None => (IpMode::Static, rest.to_string(), String::new()),
                }
            }
            None => (IpMode::SnAssign, String::new(), String::new()),
        };

        let mac = self.tap_mac.as_deref().and_then(parse_mac);

        crate::tap::TapConfig { name: String::new(), ip_mode, ip_addr, netmask, mac, mtu: self.tap_mtu }
    }

    /// Validate this configuration, resolving the `-A`/`-k` interaction
    /// from spec §4.2 ("AES is the default when a key is provided but no
    /// cipher selected") and parsing supernode addresses and filter rules.
    pub fn validate(&self) -> Result<ValidatedEdgeConfig, ConfigError> {
        if self.community.trim().is_empty() {
            return Err(ConfigError::MissingCommunity);
        }
        if self.supernodes.is_empty() {
            return Err(ConfigError::MissingSupernode);
        }

        let mut supernode_addrs = Vec::with_capacity(self.supernodes.len());
        for s in &self.supernodes {
            let addr: SocketAddr = s.parse().map_err(|_| ConfigError::BadAddress(s.clone()))?;
            supernode_addrs.push(addr);
        }

        let cipher = match self.cipher {
            TransformIdConfig::Invalid => {
                if self.key.is_some() {
                    TransformId::Aes
                } else {
                    TransformId::Null
                }
            }
            other => other.into(),
        };

        let mut rules = Vec::with_capacity(self.filter_rules.len());
        for r in &self.filter_rules {
            rules.push(FilterRule::parse(r)?);
        }

        let (ip_mode, static_dev_addr) = parse_address_mode(&self.tap_address);

        Ok(ValidatedEdgeConfig {
            community: self.community.clone(),
            key: self.key.clone(),
            cipher,
            compression: self.compression.into(),
            header_encryption: self.header_encryption,
            supernodes: supernode_addrs,
            register_interval_secs: self.register_interval_secs,
            register_ttl: self.register_ttl,
            local_port: self.local_port,
            mgmt_port: self.mgmt_port,
            ip_mode,
            dev_addr: static_dev_addr.unwrap_or(crate::protocol::packet::DevAddr { net_addr: 0, net_bitlen: 24 }),
            allow_routing: self.allow_routing,
            accept_multicast: self.accept_multicast,
            disable_p2p: self.disable_p2p,
            tos: self.tos,
            routes: self.routes.clone(),
            filter_rules: rules,
            device_desc: self.device_desc.clone().unwrap_or_default(),
        })
    }
}

/// An [`EdgeConfig`] that has passed [`EdgeConfig::validate`]; the only form
/// `EdgeState::new` accepts.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedEdgeConfig {
    /// Community name.
    pub community: String,
    /// ASCII encryption key, if any.
    pub key: Option<String>,
    /// Resolved cipher (never `Invalid` after validation).
    pub cipher: TransformId,
    /// Resolved compression id.
    pub compression: CompressionId,
    /// Header encryption enabled.
    pub header_encryption: bool,
    /// Parsed supernode addresses, in configured order.
    pub supernodes: Vec<SocketAddr>,
    /// Registration interval in seconds.
    pub register_interval_secs: u32,
    /// IP TTL for registration datagrams; 0 = unset.
    pub register_ttl: u8,
    /// Fixed local UDP port; 0 = ephemeral.
    pub local_port: u16,
    /// Management UDP port.
    pub mgmt_port: u16,
    /// How the overlay interface's address is assigned (`-a`).
    pub ip_mode: crate::tap::IpMode,
    /// The statically configured overlay address, when `ip_mode` is
    /// `Static`; a zeroed placeholder otherwise, since `Dhcp`/`SnAssign`
    /// addresses are only known once the interface or supernode supplies
    /// one.
    pub dev_addr: crate::protocol::packet::DevAddr,
    /// Allow IP forwarding across the overlay.
    pub allow_routing: bool,
    /// Accept multicast frames instead of dropping them.
    pub accept_multicast: bool,
    /// Disable P2P; always route via supernode.
    pub disable_p2p: bool,
    /// IP TOS byte.
    pub tos: u8,
    /// Overlay routes.
    pub routes: Vec<Route>,
    /// Parsed filter rules.
    pub filter_rules: Vec<FilterRule>,
    /// Device description hint; empty string if unset.
    pub device_desc: String,
}
