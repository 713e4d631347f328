// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the partition planner.

use device_registry::DeviceId;
use model_ir::NodeId;

/// Errors that can occur during partition planning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlannerError {
    /// No reachable device has room for the node.
    #[error(
        "no feasible assignment for node '{node}': needs {required_bytes} bytes, \
         largest free budget among reachable devices is {largest_available_bytes} bytes"
    )]
    NoFeasibleAssignment {
        node: NodeId,
        required_bytes: usize,
        largest_available_bytes: usize,
    },

    /// The device set has no reachable device at all, or the local device
    /// needed for graph inputs is missing or unreachable.
    #[error("no candidate device: {0}")]
    NoCandidates(String),

    /// A plan does not satisfy its invariants for the given graph and devices.
    #[error("invalid plan from strategy '{strategy}': {detail}")]
    InvalidPlan { strategy: String, detail: String },

    /// A strategy name did not match any known strategy.
    #[error("unknown partition strategy '{0}' (expected one of: cost-aware, local-only)")]
    UnknownStrategy(String),

    /// A device referenced by the plan is not part of the device set.
    #[error("device '{0}' is not part of the device set")]
    UnknownDevice(DeviceId),
}
