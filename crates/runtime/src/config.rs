// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! strategy = "cost-aware"
//! worker_threads = 4
//! transfer_retries = 3
//! retry_backoff_ms = 20
//! probe_timeout_ms = 500
//! plan_cache_capacity = 8
//! enable_profiling = true
//! ```
//!
//! Every key is optional; missing keys take the defaults above (with
//! `worker_threads` defaulting to the number of online cores).

use crate::transport::RetryPolicy;
use crate::RuntimeError;
use partition_planner::PartitionStrategy;
use std::path::Path;
use std::time::Duration;

/// Configuration for the EdgeFlow runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Partition strategy name: `"cost-aware"` or `"local-only"`.
    pub strategy: String,
    /// Number of async worker threads (defaults to number of online CPU cores).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    /// Retries after a transient transfer failure before giving up.
    pub transfer_retries: u32,
    /// Fixed delay between transfer attempts.
    pub retry_backoff_ms: u64,
    /// Timeout of the default TCP liveness probe.
    pub probe_timeout_ms: u64,
    /// Plans kept in the plan cache; `0` disables caching.
    pub plan_cache_capacity: usize,
    /// Whether to collect per-node timing metrics.
    pub enable_profiling: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str).map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.worker_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    /// Creates the partition strategy specified by this config.
    pub fn create_strategy(&self) -> Result<Box<dyn PartitionStrategy>, RuntimeError> {
        partition_planner::strategy_by_name(&self.strategy).map_err(|e| RuntimeError::ConfigError(e.to_string()))
    }

    /// Transfer retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.transfer_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strategy: "cost-aware".to_string(),
            worker_threads: None,
            transfer_retries: 3,
            retry_backoff_ms: 20,
            probe_timeout_ms: 500,
            plan_cache_capacity: 8,
            enable_profiling: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.strategy, "cost-aware");
        assert_eq!(c.transfer_retries, 3);
        assert!(c.enable_profiling);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
strategy = "local-only"
worker_threads = 2
transfer_retries = 5
retry_backoff_ms = 1
enable_profiling = false
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.strategy, "local-only");
        assert_eq!(c.worker_threads, Some(2));
        assert_eq!(c.retry_policy().max_retries, 5);
        assert_eq!(c.retry_policy().backoff, Duration::from_millis(1));
        assert!(!c.enable_profiling);
        // Unspecified keys keep their defaults.
        assert_eq!(c.plan_cache_capacity, 8);
        assert_eq!(c.probe_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(RuntimeConfig::from_toml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            RuntimeConfig::from_toml("transfer_retries = \"many\""),
            Err(RuntimeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            worker_threads: Some(3),
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        assert_eq!(RuntimeConfig::from_toml(&toml).unwrap(), c);
    }

    #[test]
    fn test_create_strategy() {
        let c = RuntimeConfig::default();
        assert_eq!(c.create_strategy().unwrap().name(), "cost-aware");

        let c = RuntimeConfig {
            strategy: "local-only".into(),
            ..Default::default()
        };
        assert_eq!(c.create_strategy().unwrap().name(), "local-only");

        let c = RuntimeConfig {
            strategy: "bogus".into(),
            ..Default::default()
        };
        assert!(c.create_strategy().is_err());
    }

    #[test]
    fn test_resolve_threads() {
        let c = RuntimeConfig {
            worker_threads: Some(8),
            ..Default::default()
        };
        assert_eq!(c.resolve_threads(), 8);
        assert!(RuntimeConfig::default().resolve_threads() >= 1);
    }
}
