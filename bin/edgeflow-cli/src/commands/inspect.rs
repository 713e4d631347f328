// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow inspect` command: display graph structure and device status.

use super::{read_text, truncate};
use device_registry::{DeviceRegistry, TcpProbe};
use edgeflow_runtime::RuntimeConfig;
use model_ir::ModelLoader;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn execute(
    config: RuntimeConfig,
    model: PathBuf,
    device_info: Option<PathBuf>,
    devices: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              edgeflow · Graph Inspector              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let graph = ModelLoader::load_file(&model)
        .map_err(|e| anyhow::anyhow!("failed to load graph from '{}': {e}", model.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  Graph:   {}", graph.name);
    println!("  Nodes:   {}", graph.num_nodes());
    println!("  Inputs:  {}", join(graph.inputs()));
    println!("  Outputs: {}", join(graph.outputs()));
    println!("  Flops:   {}", graph.total_flops());
    println!("  Fingerprint: {:016x}", graph.fingerprint());
    println!();

    // ── Per-Node Detail ────────────────────────────────────────
    println!(
        "  {:<20} {:<12} {:<14} {:>12} {:>10}  {}",
        "Node", "Op", "Shape", "Flops", "Memory", "Inputs",
    );
    println!("  {}", "-".repeat(88));
    for id in graph.topological_order() {
        let Some(node) = graph.node(id) else { continue };
        println!(
            "  {:<20} {:<12} {:<14} {:>12} {:>8} B  {}",
            truncate(id.as_str(), 20),
            node.op.tag(),
            node.shape.to_string(),
            node.cost.flops,
            node.cost.memory_bytes,
            join(&node.inputs),
        );
    }
    println!();

    // ── Devices ────────────────────────────────────────────────
    if let Some(info) = device_info {
        let list = match devices {
            Some(path) => read_text(&path, "device list")?,
            None => "[]".to_string(),
        };
        let registry = DeviceRegistry::load_with_probe(
            &read_text(&info, "device info")?,
            &list,
            Arc::new(TcpProbe::new(config.probe_timeout())),
        )?;
        let snapshot = registry.snapshot();
        println!("  Devices:");
        for device in snapshot.all() {
            println!("   {}", device.summary());
        }
        println!();
    }

    Ok(())
}

fn join<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
