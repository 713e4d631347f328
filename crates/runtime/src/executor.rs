// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator executors.
//!
//! The engine treats operators as opaque: each device resolves an
//! [`OperatorExecutor`] through the [`ExecutorRegistry`] (device id
//! override first, then device kind, then the default) and hands it the
//! node plus its input tensors. [`CpuExecutor`] runs the reference kernels
//! from `tensor-core`.

use device_registry::{DeviceDescriptor, DeviceId, DeviceKind};
use model_ir::{GraphNode, OperatorKind};
use std::collections::HashMap;
use std::sync::Arc;
use tensor_core::{Tensor, TensorError, Window2d};

/// Errors an executor can report for one node.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("executor '{executor}' does not support operator '{op}'")]
    Unsupported { executor: String, op: &'static str },

    #[error("{0}")]
    Failed(String),
}

/// Runs single graph nodes. Called from blocking worker threads.
pub trait OperatorExecutor: Send + Sync {
    fn name(&self) -> &str;

    /// Computes `node` from `inputs`, given in the node's operand order.
    fn execute(&self, node: &GraphNode, inputs: &[Arc<Tensor>]) -> Result<Tensor, ExecutorError>;
}

/// Reference executor backed by the `tensor-core` kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuExecutor;

impl OperatorExecutor for CpuExecutor {
    fn name(&self) -> &str {
        "cpu"
    }

    fn execute(&self, node: &GraphNode, inputs: &[Arc<Tensor>]) -> Result<Tensor, ExecutorError> {
        let refs: Vec<&Tensor> = inputs.iter().map(Arc::as_ref).collect();
        let first = refs.first().copied().ok_or_else(|| {
            ExecutorError::Failed(format!("node '{}' received no inputs", node.id))
        })?;

        let output = match &node.op {
            OperatorKind::Input => {
                return Err(ExecutorError::Unsupported {
                    executor: self.name().to_string(),
                    op: node.op.tag(),
                })
            }
            OperatorKind::Identity => first.clone(),
            OperatorKind::Linear {
                in_features,
                out_features,
                weight,
                bias,
            } => tensor_core::linear(first, weight, bias.as_deref(), *in_features, *out_features)?,
            OperatorKind::Activation { function } => tensor_core::activate(first, *function),
            OperatorKind::BatchNorm {
                mean,
                variance,
                gamma,
                beta,
                epsilon,
            } => tensor_core::batch_norm(first, mean, variance, gamma, beta, *epsilon)?,
            OperatorKind::Concat { axis } => tensor_core::concat(&refs, *axis)?,
            OperatorKind::Add => tensor_core::add(&refs)?,
            OperatorKind::Flatten | OperatorKind::Reshape { .. } => first.clone().reshape(node.shape.clone())?,
            OperatorKind::Conv2d {
                out_channels,
                weight,
                bias,
                ..
            } => tensor_core::conv2d(first, weight, bias.as_deref(), *out_channels, window_of(node)?)?,
            OperatorKind::Pool { mode, .. } => tensor_core::pool2d(first, *mode, window_of(node)?)?,
        };

        output.ensure_finite(node.op.tag())?;
        Ok(output)
    }
}

fn window_of(node: &GraphNode) -> Result<Window2d, ExecutorError> {
    node.op
        .window()
        .ok_or_else(|| ExecutorError::Failed(format!("node '{}' has no window", node.id)))
}

/// Chooses the executor for each device.
#[derive(Clone)]
pub struct ExecutorRegistry {
    default: Arc<dyn OperatorExecutor>,
    by_kind: HashMap<DeviceKind, Arc<dyn OperatorExecutor>>,
    by_device: HashMap<DeviceId, Arc<dyn OperatorExecutor>>,
}

impl ExecutorRegistry {
    /// A registry that runs everything on [`CpuExecutor`].
    pub fn new() -> Self {
        Self::with_default(Arc::new(CpuExecutor))
    }

    pub fn with_default(default: Arc<dyn OperatorExecutor>) -> Self {
        Self {
            default,
            by_kind: HashMap::new(),
            by_device: HashMap::new(),
        }
    }

    /// Replaces the fallback executor; overrides are kept.
    pub fn set_default(&mut self, executor: Arc<dyn OperatorExecutor>) {
        self.default = executor;
    }

    /// Uses `executor` for every device of `kind` without a device override.
    pub fn register_kind(&mut self, kind: DeviceKind, executor: Arc<dyn OperatorExecutor>) {
        self.by_kind.insert(kind, executor);
    }

    /// Uses `executor` for one specific device.
    pub fn register_device(&mut self, device: DeviceId, executor: Arc<dyn OperatorExecutor>) {
        self.by_device.insert(device, executor);
    }

    pub fn resolve(&self, device: &DeviceDescriptor) -> Arc<dyn OperatorExecutor> {
        self.by_device
            .get(&device.id)
            .or_else(|| self.by_kind.get(&device.kind))
            .unwrap_or(&self.default)
            .clone()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("default", &self.default.name())
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .field("devices", &self.by_device.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_registry::Liveness;
    use memory_manager::MemoryBudget;
    use model_ir::{NodeCost, NodeId};
    use tensor_core::{ActivationKind, PoolMode, Shape};

    fn node(op: OperatorKind, inputs: usize, shape: Shape) -> GraphNode {
        GraphNode {
            id: NodeId::from("n"),
            op,
            inputs: (0..inputs).map(|i| NodeId::new(format!("i{i}"))).collect(),
            shape,
            cost: NodeCost::default(),
        }
    }

    fn tensor(values: &[f32]) -> Arc<Tensor> {
        Arc::new(Tensor::new(Shape::vector(values.len()), values.to_vec()).unwrap())
    }

    fn device(id: &str, kind: DeviceKind) -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from(id),
            kind,
            compute_class: 1.0,
            memory_budget: MemoryBudget::from_mb(1),
            link: None,
            address: None,
            is_local: false,
            liveness: Liveness::Reachable,
            last_seen_ms: None,
        }
    }

    #[test]
    fn test_linear_and_relu() {
        let linear = node(
            OperatorKind::Linear {
                in_features: 2,
                out_features: 2,
                weight: vec![1.0, 1.0, 1.0, 1.0],
                bias: Some(vec![0.0, -1.0]),
            },
            1,
            Shape::vector(2),
        );
        let out = CpuExecutor.execute(&linear, &[tensor(&[1.0, 1.0])]).unwrap();
        assert_eq!(out.values(), &[2.0, 1.0]);

        let relu = node(
            OperatorKind::Activation {
                function: ActivationKind::Relu,
            },
            1,
            Shape::vector(2),
        );
        let out = CpuExecutor.execute(&relu, &[tensor(&[-3.0, 4.0])]).unwrap();
        assert_eq!(out.values(), &[0.0, 4.0]);
    }

    #[test]
    fn test_add_and_reshape() {
        let add = node(OperatorKind::Add, 2, Shape::vector(2));
        let out = CpuExecutor
            .execute(&add, &[tensor(&[1.0, 2.0]), tensor(&[10.0, 20.0])])
            .unwrap();
        assert_eq!(out.values(), &[11.0, 22.0]);

        let reshape = node(
            OperatorKind::Reshape {
                shape: Shape::matrix(2, 2),
            },
            1,
            Shape::matrix(2, 2),
        );
        let out = CpuExecutor
            .execute(&reshape, &[tensor(&[1.0, 2.0, 3.0, 4.0])])
            .unwrap();
        assert_eq!(out.shape(), &Shape::matrix(2, 2));
    }

    #[test]
    fn test_conv_then_pool() {
        let image = Arc::new(Tensor::new(Shape::new(vec![1, 3, 3]), (1..=9).map(|v| v as f32).collect()).unwrap());
        let conv = node(
            OperatorKind::Conv2d {
                in_channels: 1,
                out_channels: 1,
                kernel: [2, 2],
                stride: [1, 1],
                padding: [0, 0],
                weight: vec![1.0, 0.0, 0.0, -1.0],
                bias: Some(vec![10.0]),
            },
            1,
            Shape::new(vec![1, 2, 2]),
        );
        let edges = Arc::new(CpuExecutor.execute(&conv, &[image]).unwrap());
        assert_eq!(edges.values(), &[6.0, 6.0, 6.0, 6.0]);

        let pool = node(
            OperatorKind::Pool {
                mode: PoolMode::Max,
                kernel: [2, 2],
                stride: None,
                padding: [0, 0],
            },
            1,
            Shape::new(vec![1, 1, 1]),
        );
        let out = CpuExecutor.execute(&pool, &[edges]).unwrap();
        assert_eq!(out.shape(), &Shape::new(vec![1, 1, 1]));
        assert_eq!(out.values(), &[6.0]);
    }

    #[test]
    fn test_input_not_executable() {
        let input = node(OperatorKind::Input, 1, Shape::vector(1));
        assert!(matches!(
            CpuExecutor.execute(&input, &[tensor(&[1.0])]),
            Err(ExecutorError::Unsupported { op: "input", .. })
        ));
    }

    #[test]
    fn test_kernel_error_propagates() {
        let add = node(OperatorKind::Add, 2, Shape::vector(2));
        let err = CpuExecutor
            .execute(&add, &[tensor(&[1.0, 2.0]), tensor(&[1.0])])
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Tensor(_)));
    }

    struct Named(&'static str);

    impl OperatorExecutor for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&self, _: &GraphNode, _: &[Arc<Tensor>]) -> Result<Tensor, ExecutorError> {
            Err(ExecutorError::Failed(self.0.into()))
        }
    }

    #[test]
    fn test_registry_resolution_order() {
        let mut registry = ExecutorRegistry::new();
        registry.register_kind(DeviceKind::Gpu, Arc::new(Named("gpu")));
        registry.register_device(DeviceId::from("special"), Arc::new(Named("special")));

        assert_eq!(registry.resolve(&device("plain", DeviceKind::Cpu)).name(), "cpu");
        assert_eq!(registry.resolve(&device("card", DeviceKind::Gpu)).name(), "gpu");
        assert_eq!(registry.resolve(&device("special", DeviceKind::Gpu)).name(), "special");
    }
}
