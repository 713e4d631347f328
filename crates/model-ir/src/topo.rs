// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Deterministic topological ordering.
//!
//! Kahn's algorithm with a min-heap over ready nodes: whenever several nodes
//! are ready at once, the smallest [`NodeId`] goes first. The result depends
//! only on the node set and its edges, never on manifest order.

use crate::{GraphNode, ModelError, NodeId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Orders `nodes` so that every producer precedes its consumers.
///
/// Edges to ids absent from `nodes` are ignored; callers check for dangling
/// edges first.
///
/// # Errors
/// Returns [`ModelError::Cycle`] listing every node that could not be
/// ordered.
///
/// # Examples
/// ```
/// use model_ir::{topological_order, GraphNode, NodeCost, NodeId, OperatorKind};
/// use tensor_core::Shape;
///
/// let node = |id: &str, inputs: &[&str]| GraphNode {
///     id: id.into(),
///     op: OperatorKind::Identity,
///     inputs: inputs.iter().map(|s| NodeId::from(*s)).collect(),
///     shape: Shape::vector(1),
///     cost: NodeCost::default(),
/// };
/// let nodes = vec![node("c", &["a", "b"]), node("b", &[]), node("a", &[])];
/// let order = topological_order(&nodes).unwrap();
/// assert_eq!(order, vec![NodeId::from("a"), "b".into(), "c".into()]);
/// ```
pub fn topological_order(nodes: &[GraphNode]) -> Result<Vec<NodeId>, ModelError> {
    let mut in_degree: HashMap<&NodeId, usize> = nodes.iter().map(|n| (&n.id, 0)).collect();
    let mut consumers: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();

    for node in nodes {
        for input in &node.inputs {
            if in_degree.contains_key(input) {
                consumers.entry(input).or_default().push(&node.id);
                if let Some(d) = in_degree.get_mut(&node.id) {
                    *d += 1;
                }
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<&NodeId>> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| Reverse(*id))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id.clone());
        for consumer in consumers.get(id).into_iter().flatten() {
            if let Some(d) = in_degree.get_mut(consumer) {
                *d -= 1;
                if *d == 0 {
                    ready.push(Reverse(*consumer));
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let mut stuck: Vec<NodeId> = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(id, _)| id.clone())
            .collect();
        stuck.sort();
        return Err(ModelError::Cycle(stuck));
    }
    Ok(order)
}
