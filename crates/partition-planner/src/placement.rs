// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Incremental placement with a simulated memory ledger per device.
//!
//! Strategies place nodes one at a time in topological order. Each placement
//! is checked against the target device's [`MemoryLedger`]:
//!
//! ```text
//! required = working memory
//!          + bytes of every input arriving from another device
//!          + output tensor
//! ```
//!
//! Working memory and incoming copies are released as soon as the node is
//! placed. The output stays reserved until the last consumer of the node has
//! been placed; graph outputs stay reserved until the end. The ledgers'
//! peak statistics become the plan's per-device peaks.

use crate::plan::crossing_edges;
use crate::{ExecutionPlan, PlannerError};
use device_registry::{DeviceDescriptor, DeviceId, DeviceSet};
use memory_manager::{MemoryLedger, Reservation};
use model_ir::{graph::Validated, GraphNode, ModelGraph, NodeId};
use std::collections::{BTreeMap, HashMap};

/// Compute throughput of a device with `compute_class == 1.0`, in flops/s.
pub const REFERENCE_FLOPS_PER_SECOND: f64 = 1.0e9;

pub(crate) struct Placement<'a> {
    graph: &'a ModelGraph<Validated>,
    devices: &'a DeviceSet,
    ledgers: BTreeMap<DeviceId, MemoryLedger>,
    /// Output reservations of placed nodes that still have unplaced consumers
    /// (or are graph outputs).
    live: HashMap<NodeId, Reservation>,
    remaining_consumers: HashMap<NodeId, usize>,
    assignments: BTreeMap<NodeId, DeviceId>,
    cost_seconds: f64,
}

impl<'a> Placement<'a> {
    /// Starts a placement over the reachable devices of `devices`.
    pub fn new(graph: &'a ModelGraph<Validated>, devices: &'a DeviceSet) -> Result<Self, PlannerError> {
        let ledgers: BTreeMap<DeviceId, MemoryLedger> = devices
            .reachable()
            .map(|d| (d.id.clone(), MemoryLedger::new(d.memory_budget)))
            .collect();
        if ledgers.is_empty() {
            return Err(PlannerError::NoCandidates("no reachable device".into()));
        }

        let remaining_consumers = graph
            .iter_nodes()
            .map(|n| (n.id.clone(), graph.consumers(&n.id).len()))
            .collect();

        Ok(Self {
            graph,
            devices,
            ledgers,
            live: HashMap::new(),
            remaining_consumers,
            assignments: BTreeMap::new(),
            cost_seconds: 0.0,
        })
    }

    /// Reachable devices in id order.
    pub fn candidates(&self) -> impl Iterator<Item = &'a DeviceDescriptor> {
        self.devices.reachable()
    }

    /// The local device, which receives the request payload.
    pub fn local(&self) -> Result<&'a DeviceDescriptor, PlannerError> {
        let local = self.devices.local_id();
        match self.devices.local() {
            Some(d) if d.liveness.is_reachable() => Ok(d),
            _ => Err(PlannerError::NoCandidates(format!(
                "local device '{local}' is unreachable; graph inputs cannot be placed"
            ))),
        }
    }

    /// Bytes `node` needs on `device` at the moment it runs.
    pub fn required_bytes(&self, node: &GraphNode, device: &DeviceId) -> usize {
        let incoming: u64 = node
            .inputs
            .iter()
            .filter(|i| self.assignments.get(*i) != Some(device))
            .filter_map(|i| self.graph.node(i))
            .map(GraphNode::output_bytes)
            .fold(0, u64::saturating_add);
        to_usize(node.cost.memory_bytes)
            .saturating_add(to_usize(incoming))
            .saturating_add(to_usize(node.output_bytes()))
    }

    pub fn fits(&self, node: &GraphNode, device: &DeviceId) -> bool {
        self.ledgers
            .get(device)
            .is_some_and(|l| l.can_fit(self.required_bytes(node, device)))
    }

    /// How many of the node's input edges are produced on `device`.
    pub fn inputs_held(&self, node: &GraphNode, device: &DeviceId) -> usize {
        node.inputs
            .iter()
            .filter(|i| self.assignments.get(*i) == Some(device))
            .count()
    }

    /// Estimated seconds to run `node` on `device`, including moving its
    /// inputs there and, for graph outputs, moving the result to the host.
    pub fn node_cost(&self, node: &GraphNode, device: &DeviceDescriptor) -> f64 {
        let compute = node.cost.flops as f64 / (device.compute_class * REFERENCE_FLOPS_PER_SECOND);
        let inbound: f64 = node
            .inputs
            .iter()
            .filter_map(|i| Some((self.assignments.get(i)?, self.graph.node(i)?)))
            .map(|(from, producer)| {
                self.devices
                    .transfer_seconds(from, &device.id, producer.output_bytes())
            })
            .sum();
        let outbound = if self.graph.is_output(&node.id) {
            self.devices
                .transfer_seconds(&device.id, self.devices.local_id(), node.output_bytes())
        } else {
            0.0
        };
        compute + inbound + outbound
    }

    /// Commits `node` to `device`, updating the simulated ledgers.
    pub fn place(&mut self, node: &GraphNode, device: &DeviceDescriptor) -> Result<(), PlannerError> {
        let Some(ledger) = self.ledgers.get(&device.id) else {
            return Err(PlannerError::UnknownDevice(device.id.clone()));
        };
        let output_bytes = to_usize(node.output_bytes());
        let working_bytes = self.required_bytes(node, &device.id).saturating_sub(output_bytes);

        let infeasible = |_| self.infeasible(node);
        let working = ledger.reserve(working_bytes).map_err(infeasible)?;
        let output = ledger.reserve(output_bytes).map_err(infeasible)?;
        drop(working);

        let cost = self.node_cost(node, device);
        self.cost_seconds += cost;
        self.assignments.insert(node.id.clone(), device.id.clone());
        self.live.insert(node.id.clone(), output);

        for input in &node.inputs {
            let Some(remaining) = self.remaining_consumers.get_mut(input) else {
                continue;
            };
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 && !self.graph.is_output(input) {
                self.live.remove(input);
            }
        }

        tracing::debug!(
            node = %node.id,
            device = %device.id,
            cost_ms = cost * 1_000.0,
            reserved = self.ledgers.get(&device.id).map_or(0, MemoryLedger::reserved_bytes),
            "placed node"
        );
        Ok(())
    }

    /// The error reported when no candidate can hold `node`.
    pub fn infeasible(&self, node: &GraphNode) -> PlannerError {
        let required_bytes = self
            .ledgers
            .keys()
            .map(|id| self.required_bytes(node, id))
            .min()
            .unwrap_or_else(|| to_usize(node.output_bytes()));
        let largest_available_bytes = self
            .ledgers
            .values()
            .map(MemoryLedger::available_bytes)
            .max()
            .unwrap_or(0);
        PlannerError::NoFeasibleAssignment {
            node: node.id.clone(),
            required_bytes,
            largest_available_bytes,
        }
    }

    /// Freezes the placement into a plan.
    pub fn finish(self, strategy_name: &str) -> ExecutionPlan {
        let order = self.graph.topological_order().to_vec();
        let transfers = crossing_edges(self.graph, &order, &self.assignments);

        let mut peak_bytes = BTreeMap::new();
        for device in self.assignments.values() {
            if let Some(ledger) = self.ledgers.get(device) {
                peak_bytes
                    .entry(device.clone())
                    .or_insert_with(|| ledger.stats().peak_reserved_bytes);
            }
        }

        ExecutionPlan {
            strategy_name: strategy_name.to_string(),
            graph_fingerprint: self.graph.fingerprint(),
            device_fingerprint: self.devices.fingerprint(),
            order,
            assignments: self.assignments,
            transfers,
            estimated_cost_seconds: self.cost_seconds,
            peak_bytes,
        }
    }
}

fn to_usize(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}
