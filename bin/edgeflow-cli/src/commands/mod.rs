// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod inspect;
pub mod plan;
pub mod run;

use edgeflow_runtime::RuntimeConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the log subscriber.
///
/// With no `-v` flag `RUST_LOG` is honoured and defaults to `warn`;
/// `-v`, `-vv` and `-vvv` select `info`, `debug` and `trace`.
pub fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the runtime configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load config '{}': {e}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// A `--strategy` flag takes precedence over the configuration file.
pub fn with_strategy(mut config: RuntimeConfig, strategy: Option<String>) -> RuntimeConfig {
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    config
}

pub fn read_text(path: &Path, what: &str) -> anyhow::Result<String> {
    std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("failed to read {what} '{}': {e}", path.display()))
}

/// The three host documents, read from disk.
pub struct Inputs {
    pub model: String,
    pub device_info: String,
    pub device_list: String,
}

impl Inputs {
    pub fn read(model: &Path, device_info: &Path, devices: Option<&Path>) -> anyhow::Result<Self> {
        Ok(Self {
            model: read_text(model, "graph")?,
            device_info: read_text(device_info, "device info")?,
            device_list: match devices {
                Some(path) => read_text(path, "device list")?,
                None => "[]".to_string(),
            },
        })
    }
}

/// Truncates a string to `max_len` characters with an ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
