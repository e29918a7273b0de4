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

#![allow(missing_docs)]

//! TAP device (spec §6.2): an external collaborator by design. This module
//! defines the trait the event loop drives and two implementations: a Linux
//! `ioctl`-based one for completeness, and an in-memory [`MockTap`] that
//! backs every test in this crate.

use std::io;

use thiserror::Error;

use crate::protocol::MacAddr;

/// Failures opening or configuring a TAP device (spec §7's `ResourceError`).
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The OS rejected opening the device node.
    #[error("failed to open TAP device: {0}")]
    Open(String),
    /// An `ioctl` call to configure the interface failed.
    #[error("failed to configure TAP interface: {0}")]
    Configure(String),
}

/// How the overlay interface receives its IPv4 address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IpMode {
    /// Address fixed by configuration.
    Static,
    /// Address obtained from an external DHCP client.
    Dhcp,
    /// Address assigned by the supernode via `REGISTER_SUPER_ACK`.
    SnAssign,
}

/// Parameters used to open a TAP device (spec §6.2).
#[derive(Clone, Debug)]
pub struct TapConfig {
    /// OS-level interface name, e.g. `n2n0`. Empty string requests an
    /// OS-chosen name.
    pub name: String,
    /// Address assignment mode.
    pub ip_mode: IpMode,
    /// IPv4 address in dotted-quad form; ignored when `ip_mode` is
    /// `SnAssign` until a `REGISTER_SUPER_ACK` supplies one.
    pub ip_addr: String,
    /// Dotted-quad netmask.
    pub netmask: String,
    /// Fixed MAC, if the caller wants one rather than an OS-assigned MAC.
    pub mac: Option<MacAddr>,
    /// Interface MTU; 0 requests the device's default.
    pub mtu: u32,
}

/// The TAP device contract the forwarding plane and event loop depend on.
/// Production code talks to a real kernel TAP interface; tests talk to
/// [`MockTap`].
pub trait TapDevice {
    /// Open (or create) the device described by `cfg`.
    fn open(cfg: &TapConfig) -> Result<Self, ResourceError>
    where
        Self: Sized;

    /// Read one Ethernet frame into `frame`, returning its length.
    fn read(&mut self, frame: &mut [u8]) -> io::Result<usize>;

    /// Write one Ethernet frame.
    fn write(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// The interface's MAC address.
    fn mac(&self) -> MacAddr;

    /// Release the device. Best-effort; errors are logged, not propagated
    /// (spec §7: "ResourceError at shutdown -> log and continue").
    fn close(self)
    where
        Self: Sized;
}

/// An in-memory TAP device backed by two `VecDeque<Vec<u8>>` queues: frames
/// a test injects as "arriving from the kernel" (`read` drains them) and
/// frames the code under test wrote (`write` appends, tests drain with
/// [`MockTap::take_written`]). Exposed outside `#[cfg(test)]` behind the
/// `test-util` feature so integration tests in `tests/` can use it too.
#[cfg(any(test, feature = "test-util"))]
pub struct MockTap {
    mac: MacAddr,
    inbound: std::collections::VecDeque<Vec<u8>>,
    outbound: std::collections::VecDeque<Vec<u8>>,
}

#[cfg(any(test, feature = "test-util"))]
impl MockTap {
    /// A mock device with a fixed MAC and no queued frames.
    pub fn new(mac: MacAddr) -> Self {
        Self { mac, inbound: std::collections::VecDeque::new(), outbound: std::collections::VecDeque::new() }
    }

    /// Queue a frame for the next [`TapDevice::read`] call to return.
    pub fn push_inbound(&mut self, frame: Vec<u8>) {
        self.inbound.push_back(frame);
    }

    /// Drain every frame written via [`TapDevice::write`] so far.
    pub fn take_written(&mut self) -> Vec<Vec<u8>> {
        self.outbound.drain(..).collect()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl TapDevice for MockTap {
    fn open(_cfg: &TapConfig) -> Result<Self, ResourceError> {
        Ok(Self::new(MacAddr::ZERO))
    }

    fn read(&mut self, frame: &mut [u8]) -> io::Result<usize> {
        match self.inbound.pop_front() {
            Some(data) => {
                let n = data.len().min(frame.len());
                frame[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Err(io::Error::new(io::ErrorKind::WouldBlock, "no queued frame")),
        }
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        self.outbound.push_back(frame.to_vec());
        Ok(frame.len())
    }

    fn mac(&self) -> MacAddr {
        self.mac
    }

    fn close(self) {}
}

/// A thin Linux TAP implementation using `/dev/net/tun` and `TUNSETIFF`.
/// Present for completeness of the external-collaborator contract; not the
/// subject of this crate's fidelity testing (spec §1, §6.2).
pub mod linux {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::unix::io::AsRawFd;

    use super::{IpMode, ResourceError, TapConfig, TapDevice};
    use crate::protocol::MacAddr;

    const IFF_TAP: libc::c_short = 0x0002;
    const IFF_NO_PI: libc::c_short = 0x1000;
    const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

    #[repr(C)]
    struct IfReq {
        name: [libc::c_char; libc::IFNAMSIZ],
        flags: libc::c_short,
        _pad: [u8; 22],
    }

    /// A real kernel TAP device.
    pub struct LinuxTap {
        file: File,
        mac: MacAddr,
    }

    impl TapDevice for LinuxTap {
        #[allow(unsafe_code)]
        fn open(cfg: &TapConfig) -> Result<Self, ResourceError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/net/tun")
                .map_err(|e| ResourceError::Open(e.to_string()))?;

            let mut ifr = IfReq { name: [0; libc::IFNAMSIZ], flags: IFF_TAP | IFF_NO_PI, _pad: [0; 22] };
            for (dst, src) in ifr.name.iter_mut().zip(cfg.name.bytes()) {
                *dst = src as libc::c_char;
            }

            let ret = unsafe {
                libc::ioctl(file.as_raw_fd(), TUNSETIFF as _, &mut ifr as *mut IfReq)
            };
            if ret < 0 {
                return Err(ResourceError::Configure(io::Error::last_os_error().to_string()));
            }

            let _ = cfg.ip_mode == IpMode::Static;
            Ok(Self { file, mac: cfg.mac.unwrap_or(MacAddr::ZERO) })
        }

        fn read(&mut self, frame: &mut [u8]) -> io::Result<usize> {
            self.file.read(frame)
        }

        fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
            self.file.write(frame)
        }

        fn mac(&self) -> MacAddr {
            self.mac
        }

        fn close(self) {
            drop(self.file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_tap_roundtrips_inbound_and_outbound() {
        let mut tap = MockTap::new(MacAddr([1, 2, 3, 4, 5, 6]));
        tap.push_inbound(vec![1, 2, 3]);
        let mut buf = [0u8; 16];
        let n = tap.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);

        tap.write(&[9, 9]).unwrap();
        assert_eq!(tap.take_written(), vec![vec![9, 9]]);
    }

    #[test]
    fn mock_tap_read_with_empty_queue_would_block() {
        let mut tap = MockTap::new(MacAddr::ZERO);
        let mut buf = [0u8; 16];
        assert_eq!(tap.read(&mut buf).unwrap_err().kind(), io::ErrorKind::WouldBlock);
    }
}
