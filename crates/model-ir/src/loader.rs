// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from a JSON manifest.
//!
//! The host hands the core either a file path or the manifest text itself.
//! [`GraphSource::from_host`] tells them apart: text starting with `{` is
//! inline JSON, anything else is a path.

use crate::graph::{check_extent, Validated};
use crate::{GraphManifest, GraphNode, ModelError, ModelGraph, NodeCost, OperatorKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tensor_core::Shape;

/// Where a serialized graph comes from.
#[derive(Debug, Clone)]
pub enum GraphSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl GraphSource {
    /// Interprets a host-supplied string as inline JSON or a file path.
    pub fn from_host(text: &str) -> Self {
        if text.trim_start().starts_with('{') {
            Self::Bytes(text.as_bytes().to_vec())
        } else {
            Self::Path(PathBuf::from(text.trim()))
        }
    }
}

/// Loads a model graph into a validated [`ModelGraph`].
///
/// # Example
/// ```
/// use model_ir::{GraphSource, ModelLoader};
///
/// let json = r#"{
///     "name": "passthrough",
///     "inputs": ["x"],
///     "outputs": ["y"],
///     "nodes": [
///         { "id": "x", "op": "input", "shape": [2] },
///         { "id": "y", "op": "identity", "inputs": ["x"] }
///     ]
/// }"#;
/// let graph = ModelLoader::load(GraphSource::from_host(json)).unwrap();
/// assert_eq!(graph.num_nodes(), 2);
/// ```
pub struct ModelLoader;

impl ModelLoader {
    /// Loads and validates a graph from `source`.
    ///
    /// Steps:
    /// 1. Parse the JSON manifest.
    /// 2. Resolve every node's operator and parameters.
    /// 3. Infer omitted shapes and estimate omitted costs.
    /// 4. Construct and validate the [`ModelGraph`].
    pub fn load(source: GraphSource) -> Result<ModelGraph<Validated>, ModelError> {
        let manifest = match &source {
            GraphSource::Path(path) => GraphManifest::from_file(path)?,
            GraphSource::Bytes(bytes) => {
                let manifest: GraphManifest = serde_json::from_slice(bytes)?;
                manifest
            }
        };
        Self::from_manifest(manifest)
    }

    /// Convenience wrapper for a path on disk.
    pub fn load_file(path: &Path) -> Result<ModelGraph<Validated>, ModelError> {
        Self::load(GraphSource::Path(path.to_path_buf()))
    }

    /// Convenience wrapper for inline JSON.
    pub fn from_json(json: &str) -> Result<ModelGraph<Validated>, ModelError> {
        Self::load(GraphSource::Bytes(json.as_bytes().to_vec()))
    }

    /// Builds and validates a graph from an already parsed manifest.
    pub fn from_manifest(manifest: GraphManifest) -> Result<ModelGraph<Validated>, ModelError> {
        let nodes = Self::build_nodes(&manifest)?;
        let graph = ModelGraph::new(manifest.name, nodes, manifest.inputs, manifest.outputs);
        graph.validate()
    }

    /// Converts manifest entries into graph nodes.
    ///
    /// Shapes are resolved in dependency order so an omitted shape can be
    /// inferred from the producers. Declared shapes are kept as written and
    /// checked later by validation. Nodes whose producers never resolve
    /// (cycles, dangling edges) keep a placeholder shape; validation reports
    /// the structural error.
    fn build_nodes(manifest: &GraphManifest) -> Result<Vec<GraphNode>, ModelError> {
        let ops = manifest
            .nodes
            .iter()
            .map(|n| n.operator())
            .collect::<Result<Vec<_>, _>>()?;
        for node in &manifest.nodes {
            if let Some(declared) = &node.shape {
                check_extent(&node.id, declared)?;
            }
        }

        let mut shapes: HashMap<&str, Shape> = HashMap::new();
        let mut pending: Vec<usize> = (0..manifest.nodes.len()).collect();
        loop {
            let before = pending.len();
            pending.retain(|&i| {
                let node = &manifest.nodes[i];
                let resolved = {
                    let Some(inputs) = node
                        .inputs
                        .iter()
                        .map(|id| shapes.get(id.as_str()))
                        .collect::<Option<Vec<&Shape>>>()
                    else {
                        return true;
                    };
                    match &node.shape {
                        Some(declared) => Some(declared.clone()),
                        None => ops[i].infer_shape(&inputs).ok().flatten(),
                    }
                };
                match resolved {
                    Some(shape) => {
                        shapes.insert(node.id.as_str(), shape);
                        false
                    }
                    None => true,
                }
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        let mut nodes = Vec::with_capacity(manifest.nodes.len());
        for (node, op) in manifest.nodes.iter().zip(ops) {
            let shape = match shapes.get(node.id.as_str()) {
                Some(shape) => shape.clone(),
                None if op == OperatorKind::Input => {
                    return Err(ModelError::ShapeMismatch {
                        node: node.id.clone(),
                        detail: "input nodes must declare a shape".into(),
                    });
                }
                // Inference failed or producers are unresolved: validation
                // reports the real error.
                None => node
                    .inputs
                    .first()
                    .and_then(|i| shapes.get(i.as_str()))
                    .cloned()
                    .unwrap_or_else(|| Shape::vector(1)),
            };

            let cost = node.cost.unwrap_or_else(|| {
                let inputs: Vec<&Shape> = node
                    .inputs
                    .iter()
                    .filter_map(|i| shapes.get(i.as_str()))
                    .collect();
                let (flops, memory_bytes) = op.estimate_cost(&inputs, &shape);
                NodeCost {
                    flops,
                    memory_bytes,
                }
            });

            nodes.push(GraphNode {
                id: node.id.clone(),
                op,
                inputs: node.inputs.clone(),
                shape,
                cost,
            });
        }

        tracing::info!(
            graph = %manifest.name,
            nodes = nodes.len(),
            "loaded graph manifest"
        );
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    const XOR: &str = r#"{
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

    #[test]
    fn test_load_xor() {
        let g = ModelLoader::from_json(XOR).unwrap();
        assert_eq!(g.name, "xor");
        assert_eq!(g.num_nodes(), 5);
        let order: Vec<_> = g.topological_order().iter().map(NodeId::as_str).collect();
        assert_eq!(order, ["x", "layer0", "relu0", "layer1", "relu1"]);
        assert_eq!(g.node(&"relu1".into()).unwrap().shape, Shape::vector(1));
    }

    #[test]
    fn test_costs_estimated_when_omitted() {
        let g = ModelLoader::from_json(XOR).unwrap();
        let layer0 = g.node(&"layer0".into()).unwrap();
        assert_eq!(layer0.cost.flops, 8);
        assert_eq!(layer0.cost.memory_bytes, 24);
    }

    #[test]
    fn test_overflowing_shapes_rejected() {
        let declared = r#"{
            "name": "huge", "inputs": ["x"], "outputs": ["y"],
            "nodes": [
                { "id": "x", "op": "input", "shape": [4294967296, 4294967296, 4294967296] },
                { "id": "y", "op": "flatten", "inputs": ["x"] }
            ]
        }"#;
        assert!(matches!(
            ModelLoader::from_json(declared),
            Err(ModelError::ShapeMismatch { node, .. }) if node.as_str() == "x"
        ));

        // Each operand fits, the concatenation does not.
        let inferred = format!(
            r#"{{
                "name": "wide", "inputs": ["a"], "outputs": ["y"],
                "nodes": [
                    {{ "id": "a", "op": "input", "shape": [{half}] }},
                    {{ "id": "y", "op": "concat", "axis": 0, "inputs": ["a", "a", "a"] }}
                ]
            }}"#,
            half = usize::MAX / 8
        );
        assert!(ModelLoader::from_json(&inferred).is_err());
    }

    #[test]
    fn test_conv_pool_graph() {
        let json = r#"{
            "name": "tiny-cnn", "inputs": ["img"], "outputs": ["pooled"],
            "nodes": [
                { "id": "img", "op": "input", "shape": [1, 4, 4] },
                { "id": "conv", "op": "conv2d", "inputs": ["img"], "in_channels": 1, "out_channels": 2,
                  "kernel": [3, 3], "padding": [1, 1], "weight": [0,0,0,0,1,0,0,0,0, 0,0,0,0,2,0,0,0,0] },
                { "id": "pooled", "op": "pool", "mode": "max", "inputs": ["conv"], "kernel": [2, 2] }
            ]
        }"#;
        let g = ModelLoader::from_json(json).unwrap();
        assert_eq!(g.node(&"conv".into()).unwrap().shape, Shape::new(vec![2, 4, 4]));
        assert_eq!(g.node(&"pooled".into()).unwrap().shape, Shape::new(vec![2, 2, 2]));
        assert_eq!(g.node(&"conv".into()).unwrap().cost.flops, 2 * 32 * 9);
    }

    #[test]
    fn test_explicit_cost_kept() {
        let json = XOR.replace(
            r#""function": "relu", "inputs": ["layer0"]"#,
            r#""function": "relu", "inputs": ["layer0"], "cost": {"flops": 99, "memory_bytes": 7}"#,
        );
        let g = ModelLoader::from_json(&json).unwrap();
        let relu0 = g.node(&"relu0".into()).unwrap();
        assert_eq!(relu0.cost, NodeCost { flops: 99, memory_bytes: 7 });
    }

    #[test]
    fn test_from_host_detects_inline_json() {
        assert!(matches!(GraphSource::from_host("  {\"a\":1}"), GraphSource::Bytes(_)));
        assert!(matches!(GraphSource::from_host("models/xor.json"), GraphSource::Path(_)));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let json = XOR.replace(r#""op": "activation""#, r#""op": "mystery""#);
        assert!(matches!(
            ModelLoader::from_json(&json),
            Err(ModelError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let json = XOR.replace(r#""inputs": ["relu0"]"#, r#""inputs": ["relu1"]"#);
        // layer1 <- relu1 <- layer1; relu0 becomes a dead end as well, but the
        // cycle is reported first.
        assert!(matches!(
            ModelLoader::from_json(&json),
            Err(ModelError::Cycle(_))
        ));
    }

    #[test]
    fn test_input_without_shape_rejected() {
        let json = XOR.replace(r#""op": "input", "shape": [2]"#, r#""op": "input""#);
        assert!(ModelLoader::from_json(&json).is_err());
    }

    #[test]
    fn test_declared_shape_mismatch() {
        let json = XOR.replace(
            r#""function": "relu", "inputs": ["layer1"]"#,
            r#""function": "relu", "inputs": ["layer1"], "shape": [3]"#,
        );
        assert!(matches!(
            ModelLoader::from_json(&json),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            ModelLoader::load(GraphSource::from_host("{ not json")),
            Err(ModelError::ManifestParseError(_))
        ));
    }
}
