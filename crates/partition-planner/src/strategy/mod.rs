// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`PartitionStrategy`] trait and strategy implementations.

pub mod cost_aware;
pub mod local_only;

use crate::{CostAware, ExecutionPlan, LocalOnly, PlannerError};
use device_registry::DeviceSet;
use model_ir::{graph::Validated, ModelGraph};

/// Trait for partition strategies.
///
/// Each strategy takes a validated model graph and a device snapshot and
/// produces an [`ExecutionPlan`] that assigns every node to a reachable
/// device without exceeding any device's memory budget.
///
/// Strategies are purely algorithmic: no I/O, no probing, no clocks. The
/// same graph and device set must always yield the same plan.
pub trait PartitionStrategy: Send + Sync {
    /// Name used in configuration files and the plan cache key.
    fn name(&self) -> &str;

    /// Produces an execution plan for the given graph and devices.
    fn plan(&self, graph: &ModelGraph<Validated>, devices: &DeviceSet) -> Result<ExecutionPlan, PlannerError>;
}

/// Looks a strategy up by its configuration name.
pub fn strategy_by_name(name: &str) -> Result<Box<dyn PartitionStrategy>, PlannerError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "cost-aware" | "cost_aware" => Ok(Box::new(CostAware::default())),
        "local-only" | "local_only" => Ok(Box::new(LocalOnly)),
        _ => Err(PlannerError::UnknownStrategy(name.to_string())),
    }
}
