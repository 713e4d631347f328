// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Liveness probing.
//!
//! A [`LivenessProbe`] decides whether a device can be scheduled on right
//! now. Probes are synchronous and bounded; the runtime calls them from
//! blocking contexts only.

use crate::{DeviceDescriptor, Liveness};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Decides whether a device is reachable.
pub trait LivenessProbe: Send + Sync {
    fn probe(&self, device: &DeviceDescriptor) -> Liveness;
}

impl<F> LivenessProbe for F
where
    F: Fn(&DeviceDescriptor) -> Liveness + Send + Sync,
{
    fn probe(&self, device: &DeviceDescriptor) -> Liveness {
        self(device)
    }
}

/// Default probe: a bounded TCP connect against the device address.
///
/// The local device and devices without an address are always reachable.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl LivenessProbe for TcpProbe {
    fn probe(&self, device: &DeviceDescriptor) -> Liveness {
        let Some(address) = device.address.as_deref().filter(|_| !device.is_local) else {
            return Liveness::Reachable;
        };

        let addrs = match address.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::warn!(device = %device.id, address, error = %e, "cannot resolve device address");
                return Liveness::Unreachable;
            }
        };

        for addr in addrs {
            if TcpStream::connect_timeout(&addr, self.timeout).is_ok() {
                return Liveness::Reachable;
            }
        }
        tracing::warn!(device = %device.id, address, "device did not accept a connection");
        Liveness::Unreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceId, DeviceKind, LinkSpec};
    use memory_manager::MemoryBudget;
    use std::net::TcpListener;

    fn device(address: Option<String>, is_local: bool) -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from("d"),
            kind: DeviceKind::Remote,
            compute_class: 1.0,
            memory_budget: MemoryBudget::from_mb(1),
            link: Some(LinkSpec {
                bandwidth_mbps: 100.0,
                latency_ms: 1.0,
            }),
            address,
            is_local,
            liveness: Liveness::Unknown,
            last_seen_ms: None,
        }
    }

    #[test]
    fn test_no_address_is_reachable() {
        assert_eq!(TcpProbe::default().probe(&device(None, false)), Liveness::Reachable);
    }

    #[test]
    fn test_local_is_reachable() {
        let d = device(Some("203.0.113.1:1".into()), true);
        assert_eq!(TcpProbe::default().probe(&d), Liveness::Reachable);
    }

    #[test]
    fn test_listening_socket_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let d = device(Some(addr.to_string()), false);
        assert_eq!(TcpProbe::default().probe(&d), Liveness::Reachable);
    }

    #[test]
    fn test_closed_port_is_unreachable() {
        // Bind then drop to obtain a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let d = device(Some(addr.to_string()), false);
        let probe = TcpProbe::new(Duration::from_millis(200));
        assert_eq!(probe.probe(&d), Liveness::Unreachable);
    }

    #[test]
    fn test_unresolvable_address_is_unreachable() {
        let d = device(Some("not an address".into()), false);
        assert_eq!(TcpProbe::default().probe(&d), Liveness::Unreachable);
    }

    #[test]
    fn test_closure_probe() {
        let probe = |d: &DeviceDescriptor| {
            if d.id.as_str() == "d" {
                Liveness::Unreachable
            } else {
                Liveness::Reachable
            }
        };
        assert_eq!(probe.probe(&device(None, false)), Liveness::Unreachable);
    }
}
