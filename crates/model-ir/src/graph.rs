// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph: the whole model as a DAG of nodes.
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! ModelGraph<Loaded>     nodes parsed, not yet checked
//!       │  .validate()
//!       ▼
//! ModelGraph<Validated>  acyclic, connected, shapes verified, fingerprinted
//! ```
//!
//! Only a validated graph reaches the partitioner or the engine. The
//! transition consumes the old state; the markers are zero-sized.

use crate::{topological_order, GraphNode, ModelError, NodeId, OperatorKind};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use tensor_core::Shape;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for partitioning.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── ModelGraph ─────────────────────────────────────────────────────

/// The model DAG. The generic parameter `S` encodes the validation state.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    /// Human-readable model name.
    pub name: String,
    nodes: Vec<GraphNode>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    /// Position of each node in `nodes`.
    index: HashMap<NodeId, usize>,
    /// Consumers of each node, one entry per consuming edge.
    consumers: HashMap<NodeId, Vec<NodeId>>,
    order: Vec<NodeId>,
    fingerprint: u64,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(name: String, nodes: Vec<GraphNode>, inputs: Vec<NodeId>, outputs: Vec<NodeId>) -> Self {
        Self {
            name,
            nodes,
            inputs,
            outputs,
            index: HashMap::new(),
            consumers: HashMap::new(),
            order: Vec::new(),
            fingerprint: 0,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - At least one node, one declared input and one declared output.
    /// - Node ids are unique and every edge names a defined node.
    /// - Declared inputs are exactly the `input` nodes; declared outputs exist.
    /// - The edges are acyclic.
    /// - Every node is reachable from a declared input and reaches a
    ///   declared output.
    /// - Operator arity and shapes agree along every edge.
    ///
    /// The first violation found is returned.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::EmptyGraph("no nodes"));
        }
        if self.inputs.is_empty() {
            return Err(ModelError::EmptyGraph("no declared inputs"));
        }
        if self.outputs.is_empty() {
            return Err(ModelError::EmptyGraph("no declared outputs"));
        }

        let mut index = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(ModelError::DuplicateNode(node.id.clone()));
            }
        }

        for node in &self.nodes {
            if let Some(missing) = node.inputs.iter().find(|i| !index.contains_key(*i)) {
                return Err(ModelError::DanglingEdge {
                    node: node.id.clone(),
                    input: missing.clone(),
                });
            }
        }

        self.check_endpoints(&index)?;

        let order = topological_order(&self.nodes)?;

        let mut consumers: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &self.nodes {
            for input in &node.inputs {
                consumers.entry(input.clone()).or_default().push(node.id.clone());
            }
        }

        self.check_reachability(&consumers)?;
        self.check_shapes(&index, &order)?;

        let fingerprint = fingerprint_of(&self.nodes, &self.inputs, &self.outputs)?;

        tracing::debug!(
            graph = %self.name,
            nodes = self.nodes.len(),
            fingerprint = %format!("{fingerprint:016x}"),
            "graph validated"
        );

        Ok(ModelGraph {
            name: self.name,
            nodes: self.nodes,
            inputs: self.inputs,
            outputs: self.outputs,
            index,
            consumers,
            order,
            fingerprint,
            _state: std::marker::PhantomData,
        })
    }

    fn check_endpoints(&self, index: &HashMap<NodeId, usize>) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for id in &self.inputs {
            let node = index.get(id).map(|&i| &self.nodes[i]).ok_or_else(|| {
                ModelError::InvalidEndpoint {
                    role: "input",
                    node: id.clone(),
                    detail: "no such node".into(),
                }
            })?;
            if node.op != OperatorKind::Input {
                return Err(ModelError::InvalidEndpoint {
                    role: "input",
                    node: id.clone(),
                    detail: format!("declared input has operator '{}'", node.op.tag()),
                });
            }
            if !seen.insert(id) {
                return Err(ModelError::InvalidEndpoint {
                    role: "input",
                    node: id.clone(),
                    detail: "declared twice".into(),
                });
            }
        }

        if let Some(undeclared) = self
            .nodes
            .iter()
            .find(|n| n.op == OperatorKind::Input && !seen.contains(&n.id))
        {
            return Err(ModelError::InvalidEndpoint {
                role: "input",
                node: undeclared.id.clone(),
                detail: "input node is not declared in 'inputs'".into(),
            });
        }

        let mut seen = HashSet::new();
        for id in &self.outputs {
            if !index.contains_key(id) {
                return Err(ModelError::InvalidEndpoint {
                    role: "output",
                    node: id.clone(),
                    detail: "no such node".into(),
                });
            }
            if !seen.insert(id) {
                return Err(ModelError::InvalidEndpoint {
                    role: "output",
                    node: id.clone(),
                    detail: "declared twice".into(),
                });
            }
        }
        Ok(())
    }

    fn check_reachability(&self, consumers: &HashMap<NodeId, Vec<NodeId>>) -> Result<(), ModelError> {
        let forward = bfs(&self.inputs, |id| consumers.get(id).map(Vec::as_slice).unwrap_or(&[]));
        let producers: HashMap<&NodeId, &[NodeId]> = self
            .nodes
            .iter()
            .map(|n| (&n.id, n.inputs.as_slice()))
            .collect();
        let backward = bfs(&self.outputs, |id| producers.get(id).copied().unwrap_or(&[]));

        for node in &self.nodes {
            if !forward.contains(&node.id) {
                return Err(ModelError::Unreachable {
                    node: node.id.clone(),
                    detail: "not reachable from any declared input",
                });
            }
            if !backward.contains(&node.id) {
                return Err(ModelError::Unreachable {
                    node: node.id.clone(),
                    detail: "not an ancestor of any declared output",
                });
            }
        }
        Ok(())
    }

    /// Infers each node's shape in topological order and compares it with
    /// the declared one.
    fn check_shapes(&self, index: &HashMap<NodeId, usize>, order: &[NodeId]) -> Result<(), ModelError> {
        for id in order {
            let node = &self.nodes[index[id]];
            let input_shapes: Vec<&Shape> = node
                .inputs
                .iter()
                .map(|i| &self.nodes[index[i]].shape)
                .collect();

            let inferred = node
                .op
                .infer_shape(&input_shapes)
                .map_err(|detail| ModelError::InvalidOperator {
                    node: node.id.clone(),
                    detail,
                })?;

            if let Some(inferred) = inferred {
                if inferred != node.shape {
                    return Err(ModelError::ShapeMismatch {
                        node: node.id.clone(),
                        detail: format!("declared {} but operator produces {inferred}", node.shape),
                    });
                }
            }
            check_extent(&node.id, &node.shape)?;
        }
        Ok(())
    }
}

/// Rejects empty shapes and shapes whose byte size does not fit in `usize`.
pub(crate) fn check_extent(node: &NodeId, shape: &Shape) -> Result<(), ModelError> {
    match shape.checked_size_bytes() {
        None => Err(ModelError::ShapeMismatch {
            node: node.clone(),
            detail: format!("output {shape} is too large to address"),
        }),
        Some(0) => Err(ModelError::ShapeMismatch {
            node: node.clone(),
            detail: "output has zero elements".into(),
        }),
        Some(_) => Ok(()),
    }
}

fn bfs<'a, F>(start: &'a [NodeId], next: F) -> HashSet<&'a NodeId>
where
    F: Fn(&NodeId) -> &'a [NodeId],
{
    let mut seen: HashSet<&NodeId> = start.iter().collect();
    let mut queue: VecDeque<&NodeId> = start.iter().collect();
    while let Some(id) = queue.pop_front() {
        for n in next(id) {
            if seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    seen
}

/// Hashes the canonical JSON form of the graph content.
fn fingerprint_of(nodes: &[GraphNode], inputs: &[NodeId], outputs: &[NodeId]) -> Result<u64, ModelError> {
    let mut sorted: Vec<&GraphNode> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    let canonical = serde_json::to_vec(&(sorted, inputs, outputs))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    canonical.hash(&mut hasher);
    Ok(hasher.finish())
}

// ── Validated state ────────────────────────────────────────────────

impl ModelGraph<Validated> {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Declared input nodes, in payload order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Declared output nodes, in result order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Shapes of the declared inputs, in payload order.
    pub fn input_shapes(&self) -> Vec<Shape> {
        self.inputs
            .iter()
            .filter_map(|id| self.node(id).map(|n| n.shape.clone()))
            .collect()
    }

    /// Nodes consuming `id`'s output, one entry per consuming edge.
    pub fn consumers(&self, id: &NodeId) -> &[NodeId] {
        self.consumers.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_output(&self, id: &NodeId) -> bool {
        self.outputs.contains(id)
    }

    /// The deterministic topological order (ties broken by id).
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Iterates nodes in topological order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().map(move |id| &self.nodes[self.index[id]])
    }

    /// Content fingerprint; identical graphs fingerprint identically.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn total_flops(&self) -> u64 {
        self.nodes.iter().fold(0u64, |acc, n| acc.saturating_add(n.cost.flops))
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        let edges: usize = self.nodes.iter().map(|n| n.inputs.len()).sum();
        format!(
            "Graph '{}': {} nodes, {} edges, {} input(s), {} output(s), {} flops, fingerprint {:016x}",
            self.name,
            self.num_nodes(),
            edges,
            self.inputs.len(),
            self.outputs.len(),
            self.total_flops(),
            self.fingerprint,
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ModelGraph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeCost;
    use tensor_core::ActivationKind;

    fn node(id: &str, op: OperatorKind, inputs: &[&str], shape: Shape) -> GraphNode {
        GraphNode {
            id: id.into(),
            op,
            inputs: inputs.iter().map(|s| NodeId::from(*s)).collect(),
            shape,
            cost: NodeCost::default(),
        }
    }

    fn relu() -> OperatorKind {
        OperatorKind::Activation {
            function: ActivationKind::Relu,
        }
    }

    fn ids(v: &[&str]) -> Vec<NodeId> {
        v.iter().map(|s| NodeId::from(*s)).collect()
    }

    /// x -> a -> out, x -> b -> out
    fn diamond() -> ModelGraph<Loaded> {
        ModelGraph::new(
            "diamond".into(),
            vec![
                node("x", OperatorKind::Input, &[], Shape::vector(2)),
                node("a", relu(), &["x"], Shape::vector(2)),
                node("b", OperatorKind::Identity, &["x"], Shape::vector(2)),
                node("out", OperatorKind::Add, &["a", "b"], Shape::vector(2)),
            ],
            ids(&["x"]),
            ids(&["out"]),
        )
    }

    #[test]
    fn test_validate_ok() {
        let g = diamond().validate().unwrap();
        assert_eq!(g.num_nodes(), 4);
        let order: Vec<_> = g.topological_order().iter().map(NodeId::as_str).collect();
        assert_eq!(order, ["x", "a", "b", "out"]);
        assert_eq!(g.consumers(&"x".into()).len(), 2);
        assert!(g.is_output(&"out".into()));
        assert_eq!(g.input_shapes(), vec![Shape::vector(2)]);
    }

    #[test]
    fn test_validate_empty() {
        let g = ModelGraph::new("empty".into(), vec![], vec![], vec![]);
        assert!(matches!(g.validate(), Err(ModelError::EmptyGraph(_))));
    }

    #[test]
    fn test_duplicate_node() {
        let mut g = diamond();
        g.nodes.push(node("a", relu(), &["x"], Shape::vector(2)));
        assert!(matches!(g.validate(), Err(ModelError::DuplicateNode(id)) if id.as_str() == "a"));
    }

    #[test]
    fn test_dangling_edge() {
        let mut g = diamond();
        g.nodes[1].inputs = ids(&["ghost"]);
        assert!(matches!(g.validate(), Err(ModelError::DanglingEdge { .. })));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut g = diamond();
        // a <-> b, both still fed by x.
        g.nodes[1] = node("a", OperatorKind::Add, &["x", "b"], Shape::vector(2));
        g.nodes[2] = node("b", OperatorKind::Add, &["x", "a"], Shape::vector(2));
        assert!(matches!(g.validate(), Err(ModelError::Cycle(_))));
    }

    #[test]
    fn test_undeclared_input_node() {
        let mut g = diamond();
        g.inputs.clear();
        g.inputs.push("a".into());
        assert!(matches!(
            g.validate(),
            Err(ModelError::InvalidEndpoint { role: "input", .. })
        ));
    }

    #[test]
    fn test_missing_output() {
        let mut g = diamond();
        g.outputs = ids(&["nope"]);
        assert!(matches!(
            g.validate(),
            Err(ModelError::InvalidEndpoint { role: "output", .. })
        ));
    }

    #[test]
    fn test_dead_end_node_unreachable() {
        let mut g = diamond();
        g.nodes.push(node("dead", relu(), &["a"], Shape::vector(2)));
        assert!(matches!(g.validate(), Err(ModelError::Unreachable { .. })));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut g = diamond();
        g.nodes[1].shape = Shape::vector(3);
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_fingerprint_ignores_node_order() {
        let a = diamond().validate().unwrap();
        let mut reordered = diamond();
        reordered.nodes.reverse();
        let b = reordered.validate().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut changed = diamond();
        changed.nodes[2].op = relu();
        assert_ne!(a.fingerprint(), changed.validate().unwrap().fingerprint());
    }

    #[test]
    fn test_summary_and_display() {
        let g = diamond().validate().unwrap();
        let s = g.summary();
        assert!(s.contains("diamond"));
        assert!(s.contains("4 nodes"));
        assert!(s.contains("4 edges"));
        assert!(format!("{g}").contains("out (add)"));
    }
}
