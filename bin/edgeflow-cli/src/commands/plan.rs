// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow plan` command: show where every node would run.

use super::{truncate, Inputs};
use device_registry::{DeviceRegistry, TcpProbe};
use edgeflow_runtime::RuntimeConfig;
use model_ir::ModelLoader;
use partition_planner::strategy_by_name;
use std::sync::Arc;

const BUILT_IN: [&str; 2] = ["local-only", "cost-aware"];

pub async fn execute(config: RuntimeConfig, files: Inputs, compare: bool, json: bool) -> anyhow::Result<()> {
    let graph = ModelLoader::from_json(&files.model).map_err(|e| anyhow::anyhow!("failed to load graph: {e}"))?;
    let registry = DeviceRegistry::load_with_probe(
        &files.device_info,
        &files.device_list,
        Arc::new(TcpProbe::new(config.probe_timeout())),
    )?;
    let devices = registry.snapshot();
    let strategy = config.create_strategy()?;
    let plan = strategy.plan(&graph, &devices)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║               edgeflow · Plan Builder                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  {}", graph.summary());
    println!("  {}", devices.summary());
    println!("  {}", plan.summary());
    println!();

    // ── Assignments ────────────────────────────────────────────
    println!("  {:<4} {:<24} {:<12} {:<16} {:>12}", "Seq", "Node", "Op", "Device", "Output");
    println!("  {}", "-".repeat(72));
    for (seq, id) in plan.order.iter().enumerate() {
        let Some(node) = graph.node(id) else { continue };
        let device = plan.device_of(id).map(|d| d.to_string()).unwrap_or_default();
        println!(
            "  {:<4} {:<24} {:<12} {:<16} {:>10} B",
            seq,
            truncate(id.as_str(), 24),
            node.op.tag(),
            truncate(&device, 16),
            node.output_bytes(),
        );
    }
    println!();

    // ── Transfers ──────────────────────────────────────────────
    if plan.transfers.is_empty() {
        println!("  No cross-device transfers.");
    } else {
        println!("  Transfers:");
        for t in &plan.transfers {
            println!(
                "   {} ({}) -> {} ({}): {} B",
                t.from_node, t.from_device, t.to_node, t.to_device, t.bytes
            );
        }
    }
    println!();

    // ── Strategy Comparison ────────────────────────────────────
    if compare {
        println!("  {:<16} {:>8} {:>10} {:>14}", "Strategy", "Devices", "Transfers", "Est. ms");
        println!("  {}", "-".repeat(52));
        for name in BUILT_IN {
            let strategy = strategy_by_name(name)?;
            match strategy.plan(&graph, &devices) {
                Ok(p) => println!(
                    "  {:<16} {:>8} {:>10} {:>14.3}",
                    name,
                    p.devices_used().len(),
                    p.transfers.len(),
                    p.estimated_cost_seconds * 1_000.0,
                ),
                Err(e) => println!("  {name:<16} FAIL: {e}"),
            }
        }
        println!();
    }

    Ok(())
}
