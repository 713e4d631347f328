// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The in-memory representation of an EdgeFlow model: a directed acyclic
//! graph of operator nodes.
//!
//! - [`OperatorKind`]: what a node computes, with its parameters inline.
//! - [`GraphNode`]: one node with its inputs, output shape and cost estimate.
//! - [`ModelGraph`]: the DAG with a **type-state pattern**
//!   (`Loaded` → `Validated`); validated graphs carry a deterministic
//!   topological order and a content fingerprint.
//! - [`ModelLoader`]: loads a graph from a JSON manifest on disk or inline.
//! - [`topological_order`]: Kahn's algorithm with ties broken by node id.
//!
//! # Example
//! ```no_run
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load_file(Path::new("demos/xor.json")).unwrap();
//! println!("{}", graph.summary());
//! for node in graph.iter_nodes() {
//!     println!("  {}", node.summary());
//! }
//! ```

mod error;
pub mod graph;
mod loader;
pub mod manifest;
mod node;
mod operator;
mod topo;

pub use error::ModelError;
pub use graph::ModelGraph;
pub use loader::{GraphSource, ModelLoader};
pub use manifest::GraphManifest;
pub use node::{GraphNode, NodeCost, NodeId};
pub use operator::{OperatorKind, DEFAULT_BN_EPSILON};
pub use topo::topological_order;
