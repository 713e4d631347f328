// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes and their identifiers.
//!
//! A [`GraphNode`] describes one computation in the model DAG: what it
//! computes ([`OperatorKind`]), which nodes feed it, the shape of the tensor
//! it produces, and an estimated cost the partitioner schedules against.
//! Nodes are immutable once the graph is loaded.

use crate::OperatorKind;
use std::fmt;
use tensor_core::Shape;

/// Identifier of a node, unique within one graph.
///
/// Ordering is lexicographic on the string form; every deterministic
/// tie-break in the workspace relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Estimated cost of executing a node, used only for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeCost {
    /// Abstract compute units (roughly floating-point operations).
    pub flops: u64,
    /// Working memory the node holds while it runs, excluding its output.
    pub memory_bytes: u64,
}

/// A single computation in the model graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub op: OperatorKind,
    /// Producers of this node's inputs, in operand order.
    pub inputs: Vec<NodeId>,
    /// Shape of the tensor this node produces.
    pub shape: Shape,
    pub cost: NodeCost,
}

impl GraphNode {
    /// Bytes of the tensor this node produces.
    pub fn output_bytes(&self) -> u64 {
        self.shape.size_bytes() as u64
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let inputs = if self.inputs.is_empty() {
            String::from("-")
        } else {
            self.inputs
                .iter()
                .map(NodeId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} ({}) <- [{}] -> {} | {} flops, {} B working",
            self.id,
            self.op.tag(),
            inputs,
            self.shape,
            self.cost.flops,
            self.cost.memory_bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering() {
        let mut ids: Vec<NodeId> = vec!["b".into(), "a".into(), "c".into()];
        ids.sort();
        assert_eq!(ids, vec![NodeId::from("a"), "b".into(), "c".into()]);
    }

    #[test]
    fn test_node_id_serde_is_plain_string() {
        let id: NodeId = serde_json::from_str("\"layer0\"").unwrap();
        assert_eq!(id.as_str(), "layer0");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"layer0\"");
    }

    #[test]
    fn test_summary() {
        let node = GraphNode {
            id: "relu0".into(),
            op: OperatorKind::Identity,
            inputs: vec!["x".into()],
            shape: Shape::vector(2),
            cost: NodeCost {
                flops: 2,
                memory_bytes: 0,
            },
        };
        let s = node.summary();
        assert!(s.contains("relu0"));
        assert!(s.contains("identity"));
        assert!(s.contains("[x]"));
        assert_eq!(node.output_bytes(), 8);
    }
}
