// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph manifest parsing.
//!
//! The manifest describes the DAG: declared inputs and outputs plus one
//! entry per node. Operator parameters sit next to the `op` tag.
//!
//! # Format
//! ```json
//! {
//!   "name": "xor",
//!   "inputs": ["x"],
//!   "outputs": ["out"],
//!   "nodes": [
//!     { "id": "x", "op": "input", "shape": [2] },
//!     { "id": "layer0", "op": "linear", "inputs": ["x"],
//!       "in_features": 2, "out_features": 2,
//!       "weight": [1, 1, 1, 1], "bias": [0, -1] },
//!     { "id": "out", "op": "activation", "function": "relu", "inputs": ["layer0"] }
//!   ]
//! }
//! ```
//!
//! `shape` is required on `input` nodes and optional elsewhere: when present
//! it must agree with the inferred shape. `cost` is optional; omitted costs
//! are estimated from the operator.

use crate::{ModelError, NodeCost, NodeId, OperatorKind};
use std::path::Path;
use tensor_core::Shape;

/// Top-level graph manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphManifest {
    #[serde(default = "default_name")]
    pub name: String,
    pub inputs: Vec<NodeId>,
    pub outputs: Vec<NodeId>,
    pub nodes: Vec<ManifestNode>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

/// A single node entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestNode {
    pub id: NodeId,
    /// Operator tag, e.g. `"linear"`.
    pub op: String,
    #[serde(default)]
    pub inputs: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<NodeCost>,
    /// Operator parameters (everything not listed above).
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ManifestNode {
    /// Resolves the operator tag and parameters into an [`OperatorKind`].
    pub fn operator(&self) -> Result<OperatorKind, ModelError> {
        if !OperatorKind::TAGS.contains(&self.op.as_str()) {
            return Err(ModelError::UnknownOperator {
                node: self.id.clone(),
                op: self.op.clone(),
            });
        }

        let mut tagged = self.params.clone();
        tagged.insert("op".into(), serde_json::Value::String(self.op.clone()));
        let op: OperatorKind = serde_json::from_value(serde_json::Value::Object(tagged))
            .map_err(|e| ModelError::InvalidOperator {
                node: self.id.clone(),
                detail: e.to_string(),
            })?;

        op.check_params()
            .map_err(|detail| ModelError::InvalidOperator {
                node: self.id.clone(),
                detail,
            })?;
        Ok(op)
    }
}

impl GraphManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ModelError::ManifestReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }
}
