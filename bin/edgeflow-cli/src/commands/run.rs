// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `edgeflow run` command: one session through the host bridge.
//!
//! Plays the part of the host application:
//! ```text
//! initialize → register handler → start_inference → await completion
//! ```

use super::Inputs;
use edgeflow_runtime::{CompletionEvent, EdgeFlow, RuntimeConfig};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

pub async fn execute(
    config: RuntimeConfig,
    files: Inputs,
    payload: String,
    timeout_secs: u64,
    json: bool,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              edgeflow · Session Runner               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let core = EdgeFlow::new(config)?;

    let (tx, mut rx) = oneshot::channel::<CompletionEvent>();
    let tx = Mutex::new(Some(tx));
    core.register_completion_handler(move |event: CompletionEvent| {
        if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(event);
        }
    });

    // ── Initialize ─────────────────────────────────────────────
    println!("  [1/2] Initializing ({})...", core.strategy_name());
    core.try_initialize(&files.model, &files.device_info, &files.device_list)?;
    if let Some(graph) = core.graph() {
        println!("        {}", graph.summary());
    }
    if let Some(plan) = core.plan() {
        println!("        {}", plan.summary());
    }
    println!();

    // ── Run ────────────────────────────────────────────────────
    println!("  [2/2] Running session...");
    let session = core.try_start(payload.trim())?;
    tracing::info!(session, "session started");

    let event = match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut rx).await {
        Ok(event) => event?,
        Err(_) => {
            tracing::warn!(session, timeout_secs, "session timed out; cancelling");
            core.cancel();
            rx.await?
        }
    };
    println!();

    match event.outcome {
        Ok(output) => {
            println!("  Output: {output}");
            if let Some(metrics) = &event.metrics {
                println!("  {}", metrics.summary());
                if json {
                    println!("{}", serde_json::to_string_pretty(metrics)?);
                }
            }
            println!();
            Ok(())
        }
        Err(failure) => anyhow::bail!("session {} failed: {failure}", event.session_id),
    }
}
