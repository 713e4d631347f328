// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the EdgeFlow runtime.
//!
//! [`RuntimeError`] carries full context inside the crate. Everything that
//! crosses the host boundary is reduced to an [`ErrorKind`] and, for
//! completion notifications, a [`FailureDescriptor`].

use device_registry::{DeviceId, RegistryError};
use model_ir::{ModelError, NodeId};
use partition_planner::PlannerError;
use std::fmt;

/// Host-visible error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedGraph,
    MalformedDeviceInfo,
    NoFeasibleAssignment,
    TransferFailure,
    NodeExecutionFailure,
    Cancelled,
    NotInitialized,
    AlreadyRunning,
    /// The request payload does not match the graph inputs.
    InvalidInput,
    /// The runtime configuration is unusable.
    InvalidConfig,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedGraph => "malformed_graph",
            Self::MalformedDeviceInfo => "malformed_device_info",
            Self::NoFeasibleAssignment => "no_feasible_assignment",
            Self::TransferFailure => "transfer_failure",
            Self::NodeExecutionFailure => "node_execution_failure",
            Self::Cancelled => "cancelled",
            Self::NotInitialized => "not_initialized",
            Self::AlreadyRunning => "already_running",
            Self::InvalidInput => "invalid_input",
            Self::InvalidConfig => "invalid_config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the completion handler receives when a session fails.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FailureDescriptor {
    pub kind: ErrorKind,
    /// The node the failure is attributed to, if any.
    pub node: Option<NodeId>,
    pub message: String,
}

impl fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{} at node '{node}': {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Errors that can occur while initializing or running EdgeFlow.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The model graph could not be loaded or validated.
    #[error("malformed graph: {0}")]
    Model(#[from] ModelError),

    /// The device info or device list could not be parsed.
    #[error("malformed device info: {0}")]
    Registry(#[from] RegistryError),

    /// The partition planner returned an error.
    #[error("planning failed: {0}")]
    Planner(#[from] PlannerError),

    /// A tensor could not be moved: an input of `node` onto its device, or
    /// the output `node` back to the local device.
    #[error("transfer for '{node}' from '{from}' to '{to}' failed after {attempts} attempt(s): {detail}")]
    TransferFailure {
        node: NodeId,
        from: DeviceId,
        to: DeviceId,
        attempts: u32,
        detail: String,
    },

    /// An operator failed, produced a bad result or could not get memory.
    #[error("node '{node}' failed on device '{device}': {detail}")]
    NodeExecution {
        node: NodeId,
        device: DeviceId,
        detail: String,
    },

    /// The request payload does not decode into the graph's input shapes.
    #[error("invalid input payload: {0}")]
    InvalidPayload(#[source] tensor_core::TensorError),

    #[error("session cancelled")]
    Cancelled,

    #[error("no execution plan loaded; call initialize first")]
    NotInitialized,

    #[error("an inference session is already running")]
    AlreadyRunning,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl RuntimeError {
    /// Maps the error onto the host taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Model(_) => ErrorKind::MalformedGraph,
            Self::Registry(_) => ErrorKind::MalformedDeviceInfo,
            Self::Planner(_) => ErrorKind::NoFeasibleAssignment,
            Self::TransferFailure { .. } => ErrorKind::TransferFailure,
            Self::NodeExecution { .. } => ErrorKind::NodeExecutionFailure,
            Self::InvalidPayload(_) => ErrorKind::InvalidInput,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::AlreadyRunning => ErrorKind::AlreadyRunning,
            Self::ConfigError(_) => ErrorKind::InvalidConfig,
        }
    }

    /// The node the error is attributed to, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::TransferFailure { node, .. } | Self::NodeExecution { node, .. } => Some(node),
            Self::Planner(PlannerError::NoFeasibleAssignment { node, .. }) => Some(node),
            _ => None,
        }
    }

    /// Whether the failure may mean a device went away, so liveness should
    /// be re-checked before the plan is trusted again.
    pub fn is_device_related(&self) -> bool {
        matches!(self, Self::TransferFailure { .. })
    }

    pub fn to_failure(&self) -> FailureDescriptor {
        FailureDescriptor {
            kind: self.kind(),
            node: self.node().cloned(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(RuntimeError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(RuntimeError::AlreadyRunning.kind(), ErrorKind::AlreadyRunning);
        let err = RuntimeError::from(PlannerError::NoCandidates("none".into()));
        assert_eq!(err.kind(), ErrorKind::NoFeasibleAssignment);
        assert!(err.node().is_none());
    }

    #[test]
    fn test_failure_descriptor() {
        let err = RuntimeError::NodeExecution {
            node: "relu0".into(),
            device: "phone".into(),
            detail: "boom".into(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.kind, ErrorKind::NodeExecutionFailure);
        assert_eq!(failure.node.as_ref().map(NodeId::as_str), Some("relu0"));
        assert!(failure.message.contains("boom"));
        assert_eq!(
            failure.to_string(),
            "node_execution_failure at node 'relu0': node 'relu0' failed on device 'phone': boom"
        );
        assert!(!err.is_device_related());
    }

    #[test]
    fn test_transfer_failure_is_device_related() {
        let err = RuntimeError::TransferFailure {
            node: "x".into(),
            from: "phone".into(),
            to: "edge".into(),
            attempts: 4,
            detail: "unreachable".into(),
        };
        assert!(err.is_device_related());
        assert_eq!(err.kind().to_string(), "transfer_failure");
    }
}
