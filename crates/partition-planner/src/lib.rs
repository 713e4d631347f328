// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # partition-planner
//!
//! Assigns every node of a validated `ModelGraph` to a device of a
//! `DeviceSet`, producing an [`ExecutionPlan`] the runtime can execute.
//!
//! # Strategies
//!
//! | Strategy | Placement | Transfers | Typical use |
//! |---|---|---|---|
//! | [`CostAware`] | Cheapest feasible device per node | When worth it | Default |
//! | [`LocalOnly`] | Local device only | None | Baseline |
//!
//! Both strategies simulate per-device memory with a
//! [`memory_manager::MemoryLedger`]: a node needs room for its working
//! memory, any inputs copied in from other devices and its output; outputs
//! stay live until their last consumer is placed.
//!
//! # Trait-Based Extensibility
//!
//! All strategies implement [`PartitionStrategy`]:
//!
//! ```ignore
//! struct MyCustomStrategy;
//! impl PartitionStrategy for MyCustomStrategy {
//!     fn name(&self) -> &str { "custom" }
//!     fn plan(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet)
//!         -> Result<ExecutionPlan, PlannerError> { /* ... */ }
//! }
//! ```
//!
//! # Example
//! ```no_run
//! use device_registry::DeviceRegistry;
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load_file(Path::new("demos/xor.json")).unwrap();
//! let registry = DeviceRegistry::load(
//!     r#"{"id": "phone", "compute_class": 1.0, "memory_budget": "256M"}"#,
//!     "{}",
//! ).unwrap();
//! let plan = partition_planner::build_plan(&graph, &registry.snapshot()).unwrap();
//! println!("{}", plan.summary());
//! ```

mod cache;
mod error;
mod placement;
mod plan;
pub mod strategy;

pub use cache::{CacheStats, PlanCache, PlanKey};
pub use error::PlannerError;
pub use placement::REFERENCE_FLOPS_PER_SECOND;
pub use plan::{ExecutionPlan, Transfer};
pub use strategy::cost_aware::CostAware;
pub use strategy::local_only::LocalOnly;
pub use strategy::{strategy_by_name, PartitionStrategy};

use device_registry::DeviceSet;
use model_ir::{graph::Validated, ModelGraph};

/// Builds and validates a plan with the default [`CostAware`] strategy.
pub fn build_plan(graph: &ModelGraph<Validated>, devices: &DeviceSet) -> Result<ExecutionPlan, PlannerError> {
    let plan = CostAware.plan(graph, devices)?;
    plan.validate(graph, devices)?;
    Ok(plan)
}

#[cfg(test)]
pub(crate) mod testutil {
    use device_registry::{DeviceDescriptor, DeviceId, DeviceKind, DeviceSet, LinkSpec, Liveness};
    use memory_manager::MemoryBudget;
    use model_ir::{graph::Validated, GraphNode, ModelGraph, ModelLoader, NodeCost, NodeId, OperatorKind};
    use tensor_core::Shape;

    pub const XOR: &str = r#"{
        "name": "xor",
        "inputs": ["x"],
        "outputs": ["relu1"],
        "nodes": [
            { "id": "x", "op": "input", "shape": [2] },
            { "id": "layer0", "op": "linear", "inputs": ["x"],
              "in_features": 2, "out_features": 2, "weight": [1, 1, 1, 1], "bias": [0, -1] },
            { "id": "relu0", "op": "activation", "function": "relu", "inputs": ["layer0"] },
            { "id": "layer1", "op": "linear", "inputs": ["relu0"],
              "in_features": 2, "out_features": 1, "weight": [1, -2], "bias": [0] },
            { "id": "relu1", "op": "activation", "function": "relu", "inputs": ["layer1"] }
        ]
    }"#;

    pub fn xor_graph() -> ModelGraph<Validated> {
        ModelLoader::from_json(XOR).unwrap()
    }

    fn node(id: &str, op: OperatorKind, inputs: &[&str], len: usize, cost: NodeCost) -> GraphNode {
        GraphNode {
            id: NodeId::from(id),
            op,
            inputs: inputs.iter().map(|&i| NodeId::from(i)).collect(),
            shape: Shape::vector(len),
            cost,
        }
    }

    /// `x -> heavy -> out`, all vectors of 8 floats. `heavy` carries the
    /// given flops and 4 KiB of working memory.
    pub fn heavy_graph(flops: u64) -> ModelGraph<Validated> {
        let light = NodeCost { flops: 1, memory_bytes: 0 };
        let nodes = vec![
            node("x", OperatorKind::Input, &[], 8, NodeCost::default()),
            node("heavy", OperatorKind::Identity, &["x"], 8, NodeCost { flops, memory_bytes: 4096 }),
            node("out", OperatorKind::Identity, &["heavy"], 8, light),
        ];
        ModelGraph::new("heavy".into(), nodes, vec!["x".into()], vec!["out".into()])
            .validate()
            .unwrap()
    }

    /// `x -> n1 -> ... -> n{len}` of identity nodes without working memory.
    pub fn chain_graph(len: usize, width: usize) -> ModelGraph<Validated> {
        let cost = NodeCost { flops: 1, memory_bytes: 0 };
        let mut nodes = vec![node("x", OperatorKind::Input, &[], width, NodeCost::default())];
        for i in 1..=len {
            let prev = if i == 1 { "x".to_string() } else { format!("n{}", i - 1) };
            nodes.push(node(&format!("n{i}"), OperatorKind::Identity, &[prev.as_str()], width, cost));
        }
        ModelGraph::new("chain".into(), nodes, vec!["x".into()], vec![format!("n{len}").into()])
            .validate()
            .unwrap()
    }

    pub fn local_device() -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from("local"),
            kind: DeviceKind::Cpu,
            compute_class: 1.0,
            memory_budget: MemoryBudget::from_mb(64),
            link: None,
            address: None,
            is_local: true,
            liveness: Liveness::Reachable,
            last_seen_ms: Some(0),
        }
    }

    pub fn remote(id: &str, compute_class: f64) -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from(id),
            kind: DeviceKind::Remote,
            compute_class,
            memory_budget: MemoryBudget::from_gb(1),
            link: Some(LinkSpec {
                bandwidth_mbps: 100.0,
                latency_ms: 5.0,
            }),
            address: None,
            is_local: false,
            liveness: Liveness::Reachable,
            last_seen_ms: Some(0),
        }
    }

    pub fn device_with_budget(mut device: DeviceDescriptor, bytes: usize) -> DeviceDescriptor {
        device.memory_budget = MemoryBudget::from_bytes(bytes);
        device
    }

    /// The local device plus `others`.
    pub fn devices(others: Vec<DeviceDescriptor>) -> DeviceSet {
        let mut all = vec![local_device()];
        all.extend(others);
        DeviceSet::new(DeviceId::from("local"), all)
    }
}
