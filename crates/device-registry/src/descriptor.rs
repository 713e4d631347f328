// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device descriptors and their JSON form.
//!
//! # Format
//! ```json
//! {
//!   "id": "edge-1",
//!   "kind": "remote",
//!   "compute_class": 4.0,
//!   "memory_budget": "1G",
//!   "address": "192.168.1.20:9000",
//!   "link": { "bandwidth_mbps": 100.0, "latency_ms": 5.0 }
//! }
//! ```
//!
//! `address` may also be given as separate `ip_address` and `port` fields.
//! `kind` defaults to `cpu` for the local device and to `remote` for list
//! entries.

use crate::RegistryError;
use memory_manager::MemoryBudget;
use std::fmt;

/// Identifier of a device, unique within one registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hardware class of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Npu,
    /// A peer reached over the network.
    Remote,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
            Self::Npu => "npu",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated link between a device and the host.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LinkSpec {
    /// Sustained bandwidth in megabits per second.
    pub bandwidth_mbps: f64,
    /// One-way latency in milliseconds.
    pub latency_ms: f64,
}

impl LinkSpec {
    /// Seconds needed to move `bytes` across this link.
    pub fn transfer_seconds(&self, bytes: u64) -> f64 {
        self.latency_ms / 1_000.0 + (bytes as f64 * 8.0) / (self.bandwidth_mbps * 1_000_000.0)
    }
}

/// Whether a device can currently be scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// Not probed yet.
    Unknown,
    Reachable,
    Unreachable,
}

impl Liveness {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
        })
    }
}

/// The capability record of one device.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub kind: DeviceKind,
    /// Relative compute throughput; the local reference CPU is usually `1.0`.
    pub compute_class: f64,
    pub memory_budget: MemoryBudget,
    /// Link to the host. `None` means the device shares the host's memory.
    pub link: Option<LinkSpec>,
    /// Network address (`host:port`) for devices reached over a socket.
    pub address: Option<String>,
    /// `true` for the device the host process runs on.
    pub is_local: bool,
    pub liveness: Liveness,
    /// Unix time in milliseconds of the last successful probe.
    pub last_seen_ms: Option<u64>,
}

impl DeviceDescriptor {
    /// Seconds to move `bytes` between this device and the host.
    pub fn host_transfer_seconds(&self, bytes: u64) -> f64 {
        self.link.map_or(0.0, |l| l.transfer_seconds(bytes))
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let link = match self.link {
            Some(l) => format!("{:.0} Mbps / {:.1} ms", l.bandwidth_mbps, l.latency_ms),
            None => "host memory".to_string(),
        };
        format!(
            "{}{} ({}) class {:.2}, budget {}, link {}, {}{}",
            self.id,
            if self.is_local { " [local]" } else { "" },
            self.kind,
            self.compute_class,
            self.memory_budget,
            link,
            self.liveness,
            self.address
                .as_deref()
                .map(|a| format!(" @ {a}"))
                .unwrap_or_default(),
        )
    }
}

/// Device entry as written in JSON. Required fields are optional here so
/// that a missing one is reported by name.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct RawDevice {
    id: Option<String>,
    kind: Option<DeviceKind>,
    compute_class: Option<f64>,
    memory_budget: Option<MemoryBudget>,
    link: Option<LinkSpec>,
    address: Option<String>,
    ip_address: Option<String>,
    port: Option<u16>,
}

impl RawDevice {
    /// Checks the entry and converts it into a descriptor.
    pub(crate) fn into_descriptor(self, is_local: bool) -> Result<DeviceDescriptor, RegistryError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(RegistryError::MissingField {
                    device: "<unnamed>".into(),
                    field: "id",
                })
            }
        };
        let missing = |field| RegistryError::MissingField {
            device: id.clone(),
            field,
        };
        let invalid = |field, detail: String| RegistryError::InvalidValue {
            device: id.clone(),
            field,
            detail,
        };

        let kind = self.kind.unwrap_or(if is_local {
            DeviceKind::Cpu
        } else {
            DeviceKind::Remote
        });

        let compute_class = self.compute_class.ok_or_else(|| missing("compute_class"))?;
        if !(compute_class.is_finite() && compute_class > 0.0) {
            return Err(invalid("compute_class", format!("{compute_class} is not positive")));
        }

        let memory_budget = self.memory_budget.ok_or_else(|| missing("memory_budget"))?;

        if let Some(link) = &self.link {
            if !(link.bandwidth_mbps.is_finite() && link.bandwidth_mbps > 0.0) {
                return Err(invalid("link", format!("bandwidth {} is not positive", link.bandwidth_mbps)));
            }
            if !(link.latency_ms.is_finite() && link.latency_ms >= 0.0) {
                return Err(invalid("link", format!("latency {} is negative", link.latency_ms)));
            }
        } else if kind == DeviceKind::Remote {
            return Err(missing("link"));
        }

        let address = match (self.address, self.ip_address, self.port) {
            (Some(addr), _, _) => Some(addr),
            (None, Some(ip), Some(port)) => Some(format!("{ip}:{port}")),
            (None, Some(_), None) => return Err(missing("port")),
            (None, None, _) => None,
        };

        Ok(DeviceDescriptor {
            id: DeviceId(id),
            kind,
            compute_class,
            memory_budget,
            link: self.link,
            address,
            is_local,
            liveness: Liveness::Unknown,
            last_seen_ms: None,
        })
    }
}
