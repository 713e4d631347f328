// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-registry
//!
//! Capability records for the devices an EdgeFlow deployment can schedule
//! on, and their liveness.
//!
//! - [`DeviceDescriptor`]: id, kind, compute class, memory budget, link to
//!   the host, optional network address, liveness and last-seen time.
//! - [`DeviceRegistry`]: parses the local device info and the device list
//!   (JSON), rejecting malformed or duplicate entries, and probes liveness.
//! - [`LivenessProbe`]: pluggable reachability check; [`TcpProbe`] is the
//!   default (bounded TCP connect for devices with an address).
//! - [`DeviceSet`]: an immutable, fingerprinted snapshot handed to the
//!   partitioner and the engine.
//!
//! # Example
//! ```no_run
//! use device_registry::DeviceRegistry;
//!
//! let info = std::fs::read_to_string("demos/device_info.json").unwrap();
//! let list = std::fs::read_to_string("demos/device_list.json").unwrap();
//! let registry = DeviceRegistry::load(&info, &list).unwrap();
//! println!("{}", registry.snapshot().summary());
//! ```

mod descriptor;
mod error;
mod probe;
mod registry;
mod set;

pub use descriptor::{DeviceDescriptor, DeviceId, DeviceKind, LinkSpec, Liveness};
pub use error::RegistryError;
pub use probe::{LivenessProbe, TcpProbe};
pub use registry::DeviceRegistry;
pub use set::DeviceSet;
