// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution plan: the output of the partition planner.
//!
//! A plan assigns every graph node to one device, fixes the order nodes are
//! dispatched in, and lists every edge whose tensor has to move between
//! devices. The plan is the contract between the planner and the runtime
//! and is immutable once built.

use crate::PlannerError;
use device_registry::{DeviceId, DeviceSet};
use model_ir::{graph::Validated, ModelGraph, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One graph edge whose producer and consumer sit on different devices.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Transfer {
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub from_device: DeviceId,
    pub to_device: DeviceId,
    /// Size of the producer's output tensor.
    pub bytes: u64,
}

/// The complete execution plan produced by a [`crate::PartitionStrategy`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExecutionPlan {
    /// Strategy name that produced this plan.
    pub strategy_name: String,
    /// Fingerprint of the graph the plan was built for.
    pub graph_fingerprint: u64,
    /// Fingerprint of the device set the plan was built for.
    pub device_fingerprint: u64,
    /// Dispatch order; a topological order of the graph.
    pub order: Vec<NodeId>,
    /// Device assigned to each node.
    pub assignments: BTreeMap<NodeId, DeviceId>,
    /// Cross-device edges, in dispatch order of the consumer.
    pub transfers: Vec<Transfer>,
    /// Estimated end-to-end time in seconds under the planner's cost model.
    pub estimated_cost_seconds: f64,
    /// Simulated peak of concurrently live bytes per used device.
    pub peak_bytes: BTreeMap<DeviceId, usize>,
}

impl ExecutionPlan {
    pub fn num_nodes(&self) -> usize {
        self.order.len()
    }

    /// Device a node is assigned to.
    pub fn device_of(&self, node: &NodeId) -> Option<&DeviceId> {
        self.assignments.get(node)
    }

    /// Devices hosting at least one node, in id order.
    pub fn devices_used(&self) -> Vec<&DeviceId> {
        self.assignments
            .values()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Nodes assigned to `device`, in dispatch order.
    pub fn nodes_on<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.order
            .iter()
            .filter(move |n| self.assignments.get(*n) == Some(device))
    }

    /// Total bytes moved between devices per request.
    pub fn transfer_bytes(&self) -> u64 {
        self.transfers.iter().map(|t| t.bytes).sum()
    }

    /// Returns `true` if the plan was built for exactly this graph and
    /// device snapshot.
    pub fn is_for(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet) -> bool {
        self.graph_fingerprint == graph.fingerprint() && self.device_fingerprint == devices.fingerprint()
    }

    /// Validates the plan against the graph and devices it claims to cover.
    ///
    /// Checks:
    /// - Fingerprints match the graph and device set.
    /// - `order` lists every node once and respects every edge.
    /// - Every node has exactly one assignment to a reachable device.
    /// - `transfers` lists exactly the edges that cross devices.
    pub fn validate(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet) -> Result<(), PlannerError> {
        let fail = |detail: String| PlannerError::InvalidPlan {
            strategy: self.strategy_name.clone(),
            detail,
        };

        if !self.is_for(graph, devices) {
            return Err(fail("plan was built for a different graph or device set".into()));
        }

        if self.order.len() != graph.num_nodes() {
            return Err(fail(format!(
                "order lists {} nodes, graph has {}",
                self.order.len(),
                graph.num_nodes()
            )));
        }
        let mut position: HashMap<&NodeId, usize> = HashMap::with_capacity(self.order.len());
        for (i, id) in self.order.iter().enumerate() {
            let Some(node) = graph.node(id) else {
                return Err(fail(format!("order names unknown node '{id}'")));
            };
            if position.insert(id, i).is_some() {
                return Err(fail(format!("node '{id}' appears twice in the order")));
            }
            for input in &node.inputs {
                if !position.contains_key(input) {
                    return Err(fail(format!("node '{id}' is ordered before its input '{input}'")));
                }
            }
        }

        if self.assignments.len() != graph.num_nodes() {
            return Err(fail(format!(
                "{} assignments for {} nodes",
                self.assignments.len(),
                graph.num_nodes()
            )));
        }
        for id in &self.order {
            let Some(device) = self.assignments.get(id) else {
                return Err(fail(format!("node '{id}' has no assignment")));
            };
            if devices.get(device).is_none() {
                return Err(PlannerError::UnknownDevice(device.clone()));
            }
            if !devices.is_reachable(device) {
                return Err(fail(format!("node '{id}' is assigned to unreachable device '{device}'")));
            }
        }

        let expected = crossing_edges(graph, &self.order, &self.assignments);
        if expected != self.transfers {
            return Err(fail(format!(
                "plan lists {} transfers, assignments imply {}",
                self.transfers.len(),
                expected.len()
            )));
        }

        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let per_device: Vec<String> = self
            .devices_used()
            .into_iter()
            .map(|d| {
                let peak_kb = self.peak_bytes.get(d).copied().unwrap_or(0) as f64 / 1024.0;
                format!("{d}: {} node(s), peak {peak_kb:.1} KB", self.nodes_on(d).count())
            })
            .collect();
        format!(
            "Plan '{}': {} nodes on {} device(s), {} transfer(s) ({} B), est. {:.3} ms [{}]",
            self.strategy_name,
            self.num_nodes(),
            per_device.len(),
            self.transfers.len(),
            self.transfer_bytes(),
            self.estimated_cost_seconds * 1_000.0,
            per_device.join("; "),
        )
    }
}

/// Lists the edges that cross devices under `assignments`, consumers in
/// `order`, inputs in operand order.
pub(crate) fn crossing_edges(
    graph: &ModelGraph<Validated>,
    order: &[NodeId],
    assignments: &BTreeMap<NodeId, DeviceId>,
) -> Vec<Transfer> {
    let mut transfers = Vec::new();
    for id in order {
        let (Some(node), Some(to_device)) = (graph.node(id), assignments.get(id)) else {
            continue;
        };
        for input in &node.inputs {
            let (Some(producer), Some(from_device)) = (graph.node(input), assignments.get(input)) else {
                continue;
            };
            if from_device != to_device {
                transfers.push(Transfer {
                    from_node: input.clone(),
                    to_node: id.clone(),
                    from_device: from_device.clone(),
                    to_device: to_device.clone(),
                    bytes: producer.output_bytes(),
                });
            }
        }
    }
    transfers
}
