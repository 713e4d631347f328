// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph loading and validation.
//!
//! Every variant describes a malformed graph; the runtime classifies the
//! whole enum as one failure kind.

use crate::NodeId;
use std::path::PathBuf;

/// Errors that can occur while loading or validating a model graph.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The manifest file could not be read.
    #[error("failed to read manifest '{path}': {source}")]
    ManifestReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// The graph declares no nodes, inputs or outputs.
    #[error("graph is empty: {0}")]
    EmptyGraph(&'static str),

    #[error("duplicate node id '{0}'")]
    DuplicateNode(NodeId),

    #[error("node '{node}' has unknown operator '{op}'")]
    UnknownOperator { node: NodeId, op: String },

    /// Operator parameters or arity are inconsistent.
    #[error("invalid operator on node '{node}': {detail}")]
    InvalidOperator { node: NodeId, detail: String },

    /// An edge refers to a node that does not exist.
    #[error("node '{node}' consumes undefined node '{input}'")]
    DanglingEdge { node: NodeId, input: NodeId },

    /// A declared input or output is missing or of the wrong kind.
    #[error("invalid graph {role} '{node}': {detail}")]
    InvalidEndpoint {
        role: &'static str,
        node: NodeId,
        detail: String,
    },

    /// The edges form at least one cycle through the listed nodes.
    #[error("graph contains a cycle through {0:?}")]
    Cycle(Vec<NodeId>),

    /// A node is not connected to both a declared input and a declared output.
    #[error("node '{node}' is {detail}")]
    Unreachable { node: NodeId, detail: &'static str },

    #[error("shape mismatch on node '{node}': {detail}")]
    ShapeMismatch { node: NodeId, detail: String },
}
