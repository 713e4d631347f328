// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cost-aware partitioning strategy.
//!
//! Walks the graph in topological order and greedily places each node on
//! the reachable device with the lowest estimated cost:
//!
//! ```text
//! cost(node, d) = flops / (compute_class(d) * REFERENCE_FLOPS_PER_SECOND)
//!               + sum of transfer(producer device -> d) over input edges
//!               + transfer(d -> local), if the node is a graph output
//! transfer(a -> b, bytes) = 0 if a == b, otherwise the link cost of each
//!                           endpoint to the host (latency + bytes / bandwidth)
//! ```
//!
//! Only devices whose simulated ledger can hold the node are candidates.
//! Ties go to the device already holding most of the node's inputs, then to
//! the lowest device id. Graph inputs are pinned to the local device, where
//! the request payload arrives.
//!
//! # When to use
//! - Default strategy. Offloads heavy nodes when a faster device is worth
//!   the link cost and keeps cheap nodes next to their data.

use crate::placement::Placement;
use crate::strategy::PartitionStrategy;
use crate::{ExecutionPlan, PlannerError};
use device_registry::{DeviceDescriptor, DeviceSet};
use model_ir::{graph::Validated, GraphNode, ModelGraph, OperatorKind};

/// Greedy minimum-cost placement in topological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostAware;

impl CostAware {
    /// Picks the best feasible device for `node`, or `None`.
    fn choose<'a>(
        placement: &Placement<'a>,
        node: &GraphNode,
        candidates: impl Iterator<Item = &'a DeviceDescriptor>,
    ) -> Option<&'a DeviceDescriptor> {
        candidates
            .filter(|d| placement.fits(node, &d.id))
            .map(|d| (d, placement.node_cost(node, d), placement.inputs_held(node, &d.id)))
            .min_by(|(a, a_cost, a_held), (b, b_cost, b_held)| {
                a_cost
                    .total_cmp(b_cost)
                    .then_with(|| b_held.cmp(a_held))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|(d, _, _)| d)
    }
}

impl PartitionStrategy for CostAware {
    fn name(&self) -> &str {
        "cost-aware"
    }

    fn plan(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet) -> Result<ExecutionPlan, PlannerError> {
        let mut placement = Placement::new(graph, devices)?;

        for node in graph.iter_nodes() {
            let chosen = if node.op == OperatorKind::Input {
                let local = placement.local()?;
                Self::choose(&placement, node, std::iter::once(local))
            } else {
                Self::choose(&placement, node, placement.candidates())
            };
            let Some(device) = chosen else {
                let err = placement.infeasible(node);
                tracing::warn!(node = %node.id, error = %err, "no device can hold node");
                return Err(err);
            };
            placement.place(node, device)?;
        }

        let plan = placement.finish(self.name());
        tracing::info!(
            graph_fingerprint = %format!("{:016x}", plan.graph_fingerprint),
            devices = plan.devices_used().len(),
            transfers = plan.transfers.len(),
            est_ms = plan.estimated_cost_seconds * 1_000.0,
            "cost-aware plan built"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{devices, heavy_graph, local_device, remote, xor_graph};
    use device_registry::{DeviceId, Liveness};

    #[test]
    fn test_tiny_graph_stays_local() {
        let graph = xor_graph();
        let set = devices(vec![remote("edge", 100.0)]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        assert!(plan.assignments.values().all(|d| d.as_str() == "local"));
        assert!(plan.transfers.is_empty());
        plan.validate(&graph, &set).unwrap();
    }

    #[test]
    fn test_heavy_node_offloaded() {
        let graph = heavy_graph(50_000_000_000);
        let set = devices(vec![remote("edge", 10.0)]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        assert_eq!(plan.device_of(&"x".into()).unwrap().as_str(), "local");
        assert_eq!(plan.device_of(&"heavy".into()).unwrap().as_str(), "edge");
        assert_eq!(plan.transfers[0].from_node.as_str(), "x");
        assert!(plan.estimated_cost_seconds < 50.0);
        plan.validate(&graph, &set).unwrap();
    }

    #[test]
    fn test_light_node_not_worth_the_link() {
        let graph = heavy_graph(1_000);
        let set = devices(vec![remote("edge", 10.0)]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        assert!(plan.transfers.is_empty());
    }

    #[test]
    fn test_tie_broken_by_lowest_id() {
        let graph = heavy_graph(50_000_000_000);
        let set = devices(vec![remote("zeta", 10.0), remote("alpha", 10.0)]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        assert_eq!(plan.device_of(&"heavy".into()).unwrap().as_str(), "alpha");
        // The output consumer follows its input.
        assert_eq!(plan.device_of(&"out".into()).unwrap().as_str(), "alpha");
    }

    #[test]
    fn test_unreachable_device_excluded() {
        let graph = heavy_graph(50_000_000_000);
        let mut edge = remote("edge", 10.0);
        edge.liveness = Liveness::Unreachable;
        let set = devices(vec![edge]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        assert!(plan.assignments.values().all(|d| d.as_str() == "local"));
    }

    #[test]
    fn test_memory_pressure_forces_offload() {
        let graph = heavy_graph(1_000);
        let mut local = local_device();
        local.memory_budget = memory_manager::MemoryBudget::from_bytes(100);
        let set = DeviceSet::new(DeviceId::from("local"), vec![local, remote("edge", 1.0)]);
        let plan = CostAware.plan(&graph, &set).unwrap();
        // `heavy` needs 4 KiB of working memory, more than the local budget.
        assert_eq!(plan.device_of(&"heavy".into()).unwrap().as_str(), "edge");
        assert!(plan.peak_bytes[&DeviceId::from("local")] <= 100);
    }

    #[test]
    fn test_no_feasible_assignment() {
        let graph = heavy_graph(1_000);
        let mut local = local_device();
        local.memory_budget = memory_manager::MemoryBudget::from_bytes(100);
        let mut edge = remote("edge", 1.0);
        edge.memory_budget = memory_manager::MemoryBudget::from_bytes(100);
        let set = DeviceSet::new(DeviceId::from("local"), vec![local, edge]);
        match CostAware.plan(&graph, &set) {
            Err(PlannerError::NoFeasibleAssignment { node, .. }) => assert_eq!(node.as_str(), "heavy"),
            other => panic!("expected NoFeasibleAssignment, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_local_device() {
        let graph = xor_graph();
        let mut local = local_device();
        local.liveness = Liveness::Unreachable;
        let set = DeviceSet::new(DeviceId::from("local"), vec![local, remote("edge", 1.0)]);
        assert!(matches!(
            CostAware.plan(&graph, &set),
            Err(PlannerError::NoCandidates(_))
        ));
    }
}
