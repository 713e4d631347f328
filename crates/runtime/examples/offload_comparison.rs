// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: Compare local-only execution against cost-aware offloading.
//!
//! Builds the same two-branch graph under both strategies, prints the plans,
//! and runs a session with each one over simulated links so the transfer
//! cost of offloading shows up in the measured times.
//!
//! ```bash
//! RUST_LOG=info cargo run -p edgeflow-runtime --example offload_comparison
//! ```

use device_registry::{DeviceDescriptor, Liveness};
use edgeflow_runtime::{CompletionEvent, EdgeFlow, InProcessTransport, RuntimeConfig};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const GRAPH: &str = r#"{
    "name": "two-branch",
    "inputs": ["x"],
    "outputs": ["join"],
    "nodes": [
        { "id": "x", "op": "input", "shape": [64] },
        { "id": "light", "op": "activation", "function": "sigmoid", "inputs": ["x"],
          "cost": { "flops": 20000000, "memory_bytes": 256 } },
        { "id": "heavy", "op": "activation", "function": "gelu", "inputs": ["x"],
          "cost": { "flops": 2000000000, "memory_bytes": 4096 } },
        { "id": "join", "op": "add", "inputs": ["light", "heavy"] }
    ]
}"#;

const LOCAL: &str = r#"{"id": "host", "compute_class": 1.0, "memory_budget": "32M"}"#;
const FLEET: &str = r#"[
    {"id": "jetson", "kind": "gpu", "compute_class": 20, "memory_budget": "512M",
     "link": {"bandwidth_mbps": 100, "latency_ms": 5}},
    {"id": "phone", "compute_class": 3, "memory_budget": "64M",
     "link": {"bandwidth_mbps": 20, "latency_ms": 15}}
]"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let payload = (0..64)
        .map(|i| format!("{:.2}", (i as f32 - 32.0) / 16.0))
        .collect::<Vec<_>>()
        .join(", ");

    for strategy in ["local-only", "cost-aware"] {
        let config = RuntimeConfig {
            strategy: strategy.into(),
            ..RuntimeConfig::default()
        };
        let core = EdgeFlow::builder(config)
            .probe(|_: &DeviceDescriptor| Liveness::Reachable)
            .transport(InProcessTransport { simulate_links: true })
            .build()?;

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        core.register_completion_handler(move |event: CompletionEvent| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send(event);
            }
        });

        core.try_initialize(GRAPH, LOCAL, FLEET)?;
        let plan = core.plan().ok_or("no plan after initialization")?;
        println!("--- {strategy} ---");
        println!("Plan: {}", plan.summary());
        for node in &plan.order {
            if let Some(device) = plan.device_of(node) {
                println!("  {node:<8} -> {device}");
            }
        }

        core.try_start(&payload)?;
        let event = rx.recv_timeout(Duration::from_secs(30))?;
        match (&event.outcome, &event.metrics) {
            (Ok(_), Some(metrics)) => println!("Metrics: {}\n", metrics.summary()),
            (Ok(_), None) => println!("Completed without metrics\n"),
            (Err(failure), _) => println!("Failed: {failure}\n"),
        }
    }

    Ok(())
}
