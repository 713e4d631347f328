// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Local-only strategy.
//!
//! Every node runs on the local device. No transfers, no offloading; the
//! baseline other strategies are measured against. Still subject to the
//! local device's memory budget.

use crate::placement::Placement;
use crate::strategy::PartitionStrategy;
use crate::{ExecutionPlan, PlannerError};
use device_registry::DeviceSet;
use model_ir::{graph::Validated, ModelGraph};

/// Everything on the local device.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

impl PartitionStrategy for LocalOnly {
    fn name(&self) -> &str {
        "local-only"
    }

    fn plan(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet) -> Result<ExecutionPlan, PlannerError> {
        let mut placement = Placement::new(graph, devices)?;
        let local = placement.local()?;

        for node in graph.iter_nodes() {
            if !placement.fits(node, &local.id) {
                return Err(placement.infeasible(node));
            }
            placement.place(node, local)?;
        }

        Ok(placement.finish(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chain_graph, device_with_budget, devices, local_device, remote, xor_graph};
    use device_registry::DeviceId;

    #[test]
    fn test_all_nodes_local() {
        let graph = xor_graph();
        let set = devices(vec![remote("edge", 100.0)]);
        let plan = LocalOnly.plan(&graph, &set).unwrap();
        assert!(plan.assignments.values().all(|d| d.as_str() == "local"));
        assert!(plan.transfers.is_empty());
        plan.validate(&graph, &set).unwrap();
    }

    #[test]
    fn test_intermediates_released_after_last_consumer() {
        // x -> n1 -> n2 -> n3, every tensor 32 bytes. Only a producer and
        // its consumer are ever live together.
        let graph = chain_graph(3, 8);
        let set = DeviceSet::new(
            DeviceId::from("local"),
            vec![device_with_budget(local_device(), 64)],
        );
        let plan = LocalOnly.plan(&graph, &set).unwrap();
        assert_eq!(plan.peak_bytes[&DeviceId::from("local")], 64);
    }

    #[test]
    fn test_budget_exceeded() {
        let graph = chain_graph(3, 8);
        let set = DeviceSet::new(
            DeviceId::from("local"),
            vec![device_with_budget(local_device(), 63)],
        );
        let err = LocalOnly.plan(&graph, &set).unwrap_err();
        assert!(matches!(err, PlannerError::NoFeasibleAssignment { .. }));
    }
}
