// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # edgeflow
//!
//! Command-line host for the EdgeFlow execution core.
//!
//! ## Usage
//! ```bash
//! # Run one session and print the output payload
//! edgeflow run --model demos/xor.json --device-info demos/device_info.json --input "1, 0"
//!
//! # Show how a graph would be split across devices
//! edgeflow plan --model demos/xor.json --device-info demos/device_info.json \
//!     --devices demos/device_list.json --compare
//!
//! # Inspect a graph
//! edgeflow inspect --model demos/xor.json
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "edgeflow",
    about = "Run computation graphs across a local device and its edge peers",
    version,
    author
)]
struct Cli {
    /// Path to a TOML runtime configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize from files and run one inference session.
    Run {
        /// Graph description (JSON).
        #[arg(short, long)]
        model: PathBuf,

        /// Descriptor of the local device (JSON).
        #[arg(short = 'i', long)]
        device_info: PathBuf,

        /// Remote devices (JSON array). Defaults to none.
        #[arg(short, long)]
        devices: Option<PathBuf>,

        /// Input payload, e.g. "1, 0" or "1, 2; 3" for several inputs.
        #[arg(long, required_unless_present = "input_file")]
        input: Option<String>,

        /// Read the input payload from a file.
        #[arg(long, conflicts_with = "input")]
        input_file: Option<PathBuf>,

        /// Partition strategy: cost-aware, local-only.
        #[arg(short, long)]
        strategy: Option<String>,

        /// Cancel the session after this many seconds.
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// Print the session metrics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Build and print an execution plan without running it.
    Plan {
        /// Graph description (JSON).
        #[arg(short, long)]
        model: PathBuf,

        /// Descriptor of the local device (JSON).
        #[arg(short = 'i', long)]
        device_info: PathBuf,

        /// Remote devices (JSON array). Defaults to none.
        #[arg(short, long)]
        devices: Option<PathBuf>,

        /// Partition strategy: cost-aware, local-only.
        #[arg(short, long)]
        strategy: Option<String>,

        /// Summarize every built-in strategy side by side.
        #[arg(long)]
        compare: bool,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect a graph: nodes, shapes, costs and execution order.
    Inspect {
        /// Graph description (JSON).
        #[arg(short, long)]
        model: PathBuf,

        /// Also list the devices described by this file.
        #[arg(short = 'i', long)]
        device_info: Option<PathBuf>,

        /// Remote devices (JSON array), listed with `--device-info`.
        #[arg(short, long, requires = "device_info")]
        devices: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            model,
            device_info,
            devices,
            input,
            input_file,
            strategy,
            timeout,
            json,
        } => {
            let payload = match (input, input_file) {
                (Some(payload), _) => payload,
                (None, Some(path)) => commands::read_text(&path, "input payload")?,
                (None, None) => anyhow::bail!("either --input or --input-file is required"),
            };
            let files = commands::Inputs::read(&model, &device_info, devices.as_deref())?;
            let config = commands::with_strategy(config, strategy);
            commands::run::execute(config, files, payload, timeout, json).await
        }
        Commands::Plan {
            model,
            device_info,
            devices,
            strategy,
            compare,
            json,
        } => {
            let files = commands::Inputs::read(&model, &device_info, devices.as_deref())?;
            let config = commands::with_strategy(config, strategy);
            commands::plan::execute(config, files, compare, json).await
        }
        Commands::Inspect {
            model,
            device_info,
            devices,
        } => commands::inspect::execute(config, model, device_info, devices).await,
    }
}
