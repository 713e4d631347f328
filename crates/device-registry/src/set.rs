// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Immutable device snapshots consumed by the partitioner and engine.

use crate::{DeviceDescriptor, DeviceId};
use std::hash::{Hash, Hasher};

/// A point-in-time view of the registry: descriptors plus liveness.
///
/// Devices are kept sorted by id. The fingerprint covers every field that
/// influences scheduling (capabilities and liveness) and ignores probe
/// timestamps, so re-probing an unchanged fleet keeps cached plans valid.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceSet {
    local: DeviceId,
    devices: Vec<DeviceDescriptor>,
    fingerprint: u64,
}

impl DeviceSet {
    /// Builds a snapshot. `devices` may be in any order.
    pub fn new(local: DeviceId, mut devices: Vec<DeviceDescriptor>) -> Self {
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        let fingerprint = fingerprint_of(&local, &devices);
        Self {
            local,
            devices,
            fingerprint,
        }
    }

    /// Id of the device the host runs on.
    pub fn local_id(&self) -> &DeviceId {
        &self.local
    }

    pub fn local(&self) -> Option<&DeviceDescriptor> {
        self.get(&self.local)
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceDescriptor> {
        self.devices
            .binary_search_by(|d| d.id.cmp(id))
            .ok()
            .map(|i| &self.devices[i])
    }

    /// All devices in id order, reachable or not.
    pub fn all(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Reachable devices in id order.
    pub fn reachable(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter().filter(|d| d.liveness.is_reachable())
    }

    pub fn is_reachable(&self, id: &DeviceId) -> bool {
        self.get(id).is_some_and(|d| d.liveness.is_reachable())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Estimated seconds to move `bytes` from `from` to `to`.
    ///
    /// Tensors travel through the host: each endpoint that is not on host
    /// memory contributes its own link cost. Moving within one device is
    /// free. Unknown devices cost infinity.
    pub fn transfer_seconds(&self, from: &DeviceId, to: &DeviceId, bytes: u64) -> f64 {
        if from == to {
            return 0.0;
        }
        match (self.get(from), self.get(to)) {
            (Some(a), Some(b)) => a.host_transfer_seconds(bytes) + b.host_transfer_seconds(bytes),
            _ => f64::INFINITY,
        }
    }

    /// Returns a multi-line summary for display.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} device(s), {} reachable, fingerprint {:016x}",
            self.devices.len(),
            self.reachable().count(),
            self.fingerprint
        );
        for d in &self.devices {
            out.push_str("\n  ");
            out.push_str(&d.summary());
        }
        out
    }
}

fn fingerprint_of(local: &DeviceId, devices: &[DeviceDescriptor]) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    local.hash(&mut h);
    for d in devices {
        d.id.hash(&mut h);
        d.kind.hash(&mut h);
        d.compute_class.to_bits().hash(&mut h);
        d.memory_budget.hash(&mut h);
        if let Some(link) = d.link {
            link.bandwidth_mbps.to_bits().hash(&mut h);
            link.latency_ms.to_bits().hash(&mut h);
        }
        d.address.hash(&mut h);
        d.is_local.hash(&mut h);
        d.liveness.hash(&mut h);
    }
    h.finish()
}
