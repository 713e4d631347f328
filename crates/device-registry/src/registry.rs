// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device registry: parsed descriptors plus liveness.

use crate::descriptor::RawDevice;
use crate::{DeviceDescriptor, DeviceId, DeviceSet, Liveness, LivenessProbe, RegistryError, TcpProbe};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Every device known to the core, keyed by id.
///
/// The registry is rebuilt wholesale on each initialization and is read-only
/// while a session runs. Unreachable devices stay listed for diagnostics but
/// are never scheduled.
#[derive(Clone)]
pub struct DeviceRegistry {
    local: DeviceId,
    devices: BTreeMap<DeviceId, DeviceDescriptor>,
    probe: Arc<dyn LivenessProbe>,
}

impl DeviceRegistry {
    /// Parses the local device info and the device list, then probes every
    /// device with the default [`TcpProbe`].
    ///
    /// # Example
    /// ```
    /// use device_registry::DeviceRegistry;
    ///
    /// let info = r#"{"id": "phone", "compute_class": 1.0, "memory_budget": "256M"}"#;
    /// let registry = DeviceRegistry::load(info, "{}").unwrap();
    /// assert_eq!(registry.len(), 1);
    /// assert!(registry.snapshot().is_reachable(&"phone".into()));
    /// ```
    pub fn load(device_info: &str, device_list: &str) -> Result<Self, RegistryError> {
        Self::load_with_probe(device_info, device_list, Arc::new(TcpProbe::default()))
    }

    /// Like [`DeviceRegistry::load`] with a caller-supplied probe.
    ///
    /// # Errors
    /// Any malformed entry fails the whole load; no partial registry is
    /// returned.
    pub fn load_with_probe(
        device_info: &str,
        device_list: &str,
        probe: Arc<dyn LivenessProbe>,
    ) -> Result<Self, RegistryError> {
        let raw_local: RawDevice = serde_json::from_str(device_info).map_err(|source| {
            RegistryError::ParseError {
                what: "device info",
                source,
            }
        })?;
        let local = raw_local.into_descriptor(true)?;
        let local_id = local.id.clone();

        let mut devices = BTreeMap::new();
        devices.insert(local_id.clone(), local);

        for raw in parse_list(device_list)? {
            let descriptor = raw.into_descriptor(false)?;
            if descriptor.id == local_id {
                tracing::warn!(device = %descriptor.id, "device list entry repeats the local device; ignored");
                continue;
            }
            if devices.contains_key(&descriptor.id) {
                return Err(RegistryError::DuplicateDevice(descriptor.id));
            }
            devices.insert(descriptor.id.clone(), descriptor);
        }

        let mut registry = Self {
            local: local_id,
            devices,
            probe,
        };
        registry.probe_all();

        tracing::info!(
            local = %registry.local,
            devices = registry.devices.len(),
            reachable = registry.devices.values().filter(|d| d.liveness.is_reachable()).count(),
            "device registry loaded"
        );
        Ok(registry)
    }

    /// Probes one device with the registry's probe. Does not update state.
    pub fn probe_liveness(&self, device: &DeviceDescriptor) -> Liveness {
        self.probe.probe(device)
    }

    /// Re-probes every device and records the results.
    pub fn probe_all(&mut self) {
        let now = now_ms();
        for device in self.devices.values_mut() {
            let liveness = self.probe.probe(device);
            if liveness != device.liveness {
                tracing::debug!(device = %device.id, %liveness, "liveness changed");
            }
            device.liveness = liveness;
            if liveness.is_reachable() {
                device.last_seen_ms = Some(now);
            }
        }
    }

    /// Re-probes the given devices. Returns `true` if all are reachable.
    pub fn reprobe(&mut self, ids: &[DeviceId]) -> bool {
        let now = now_ms();
        let mut all_reachable = true;
        for id in ids {
            let Some(device) = self.devices.get_mut(id) else {
                all_reachable = false;
                continue;
            };
            device.liveness = self.probe.probe(device);
            if device.liveness.is_reachable() {
                device.last_seen_ms = Some(now);
            } else {
                tracing::warn!(device = %id, "device unreachable on re-probe");
                all_reachable = false;
            }
        }
        all_reachable
    }

    pub fn local_id(&self) -> &DeviceId {
        &self.local
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceDescriptor> {
        self.devices.get(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Immutable snapshot for planning and execution.
    pub fn snapshot(&self) -> DeviceSet {
        DeviceSet::new(self.local.clone(), self.devices.values().cloned().collect())
    }

    /// Shared handle to the probe, for re-probing off the registry.
    pub fn probe(&self) -> Arc<dyn LivenessProbe> {
        Arc::clone(&self.probe)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("local", &self.local)
            .field("devices", &self.devices.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Accepts `[...]`, `{"devices": [...]}` or `{}`.
fn parse_list(text: &str) -> Result<Vec<RawDevice>, RegistryError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| RegistryError::ParseError {
            what: "device list",
            source,
        })?;

    let entries = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove("devices") {
            Some(list @ serde_json::Value::Array(_)) => list,
            None if map.is_empty() => return Ok(Vec::new()),
            _ => return Err(RegistryError::InvalidListShape),
        },
        _ => return Err(RegistryError::InvalidListShape),
    };

    serde_json::from_value(entries).map_err(|source| RegistryError::ParseError {
        what: "device list",
        source,
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: &str = r#"{"id": "phone", "compute_class": 1.0, "memory_budget": "256M"}"#;

    fn all_reachable() -> Arc<dyn LivenessProbe> {
        Arc::new(|_: &DeviceDescriptor| Liveness::Reachable)
    }

    fn remote(id: &str) -> String {
        format!(
            r#"{{"id": "{id}", "compute_class": 4, "memory_budget": "1G",
                "link": {{"bandwidth_mbps": 100, "latency_ms": 5}}}}"#
        )
    }

    #[test]
    fn test_empty_object_list() {
        let r = DeviceRegistry::load_with_probe(LOCAL, "{}", all_reachable()).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.local_id().as_str(), "phone");
        assert!(r.get(&"phone".into()).unwrap().last_seen_ms.is_some());
    }

    #[test]
    fn test_array_and_wrapped_lists() {
        let list = format!("[{}, {}]", remote("b"), remote("a"));
        let r = DeviceRegistry::load_with_probe(LOCAL, &list, all_reachable()).unwrap();
        assert_eq!(r.len(), 3);

        let wrapped = format!(r#"{{"devices": [{}]}}"#, remote("a"));
        let r = DeviceRegistry::load_with_probe(LOCAL, &wrapped, all_reachable()).unwrap();
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_local_repeated_in_list_is_ignored() {
        let list = format!("[{}]", remote("phone"));
        let r = DeviceRegistry::load_with_probe(LOCAL, &list, all_reachable()).unwrap();
        assert_eq!(r.len(), 1);
        assert!(r.get(&"phone".into()).unwrap().is_local);
    }

    #[test]
    fn test_duplicate_rejected() {
        let list = format!("[{}, {}]", remote("a"), remote("a"));
        let err = DeviceRegistry::load_with_probe(LOCAL, &list, all_reachable()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateDevice(_)));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            DeviceRegistry::load_with_probe("not json", "{}", all_reachable()),
            Err(RegistryError::ParseError { what: "device info", .. })
        ));
        assert!(matches!(
            DeviceRegistry::load_with_probe(LOCAL, "42", all_reachable()),
            Err(RegistryError::InvalidListShape)
        ));
        assert!(matches!(
            DeviceRegistry::load_with_probe(LOCAL, r#"{"other": 1}"#, all_reachable()),
            Err(RegistryError::InvalidListShape)
        ));
    }

    #[test]
    fn test_unreachable_devices_stay_listed() {
        let list = format!("[{}]", remote("edge"));
        let probe: Arc<dyn LivenessProbe> = Arc::new(|d: &DeviceDescriptor| {
            if d.is_local {
                Liveness::Reachable
            } else {
                Liveness::Unreachable
            }
        });
        let r = DeviceRegistry::load_with_probe(LOCAL, &list, probe).unwrap();
        let set = r.snapshot();
        assert_eq!(set.len(), 2);
        assert_eq!(set.reachable().count(), 1);
        assert!(r.get(&"edge".into()).unwrap().last_seen_ms.is_none());
    }

    #[test]
    fn test_reprobe() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let up = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&up);
        let probe: Arc<dyn LivenessProbe> = Arc::new(move |_: &DeviceDescriptor| {
            if flag.load(Ordering::SeqCst) {
                Liveness::Reachable
            } else {
                Liveness::Unreachable
            }
        });
        let list = format!("[{}]", remote("edge"));
        let mut r = DeviceRegistry::load_with_probe(LOCAL, &list, probe).unwrap();
        let before = r.snapshot().fingerprint();

        up.store(false, Ordering::SeqCst);
        assert!(!r.reprobe(&[DeviceId::from("edge")]));
        assert!(!r.reprobe(&[DeviceId::from("nope")]));
        assert_ne!(r.snapshot().fingerprint(), before);

        up.store(true, Ordering::SeqCst);
        assert!(r.reprobe(&[DeviceId::from("edge"), DeviceId::from("phone")]));
        assert_eq!(r.snapshot().fingerprint(), before);
    }
}
