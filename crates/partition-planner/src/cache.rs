// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded cache of execution plans.
//!
//! Plans are keyed by what they depend on: the graph fingerprint, the
//! device-set fingerprint and the strategy name. When full, the oldest
//! entry is evicted. Failed plans are never cached.

use crate::{ExecutionPlan, PartitionStrategy, PlannerError};
use device_registry::DeviceSet;
use model_ir::{graph::Validated, ModelGraph};
use std::collections::VecDeque;
use std::sync::Arc;

/// Everything a plan depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub graph_fingerprint: u64,
    pub device_fingerprint: u64,
    pub strategy: String,
}

impl PlanKey {
    pub fn new(graph: &ModelGraph<Validated>, devices: &DeviceSet, strategy: &str) -> Self {
        Self {
            graph_fingerprint: graph.fingerprint(),
            device_fingerprint: devices.fingerprint(),
            strategy: strategy.to_string(),
        }
    }
}

/// Hit/miss counters for a [`PlanCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// FIFO-bounded plan cache. A capacity of zero disables caching.
#[derive(Debug)]
pub struct PlanCache {
    capacity: usize,
    entries: VecDeque<(PlanKey, Arc<ExecutionPlan>)>,
    stats: CacheStats,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(64)),
            stats: CacheStats::default(),
        }
    }

    /// Looks up a plan, counting the hit or miss.
    pub fn get(&mut self, key: &PlanKey) -> Option<Arc<ExecutionPlan>> {
        match self.entries.iter().find(|(k, _)| k == key) {
            Some((_, plan)) => {
                self.stats.hits += 1;
                Some(Arc::clone(plan))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Inserts a plan, evicting the oldest entries if the cache is full.
    /// Replaces any existing entry under the same key.
    pub fn insert(&mut self, key: PlanKey, plan: ExecutionPlan) -> Arc<ExecutionPlan> {
        let plan = Arc::new(plan);
        if self.capacity == 0 {
            return plan;
        }
        self.entries.retain(|(k, _)| *k != key);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                self.stats.evictions += 1;
                tracing::debug!(strategy = %evicted.strategy, "evicted cached plan");
            }
        }
        self.entries.push_back((key, Arc::clone(&plan)));
        plan
    }

    /// Returns the cached plan for this graph, device set and strategy, or
    /// builds, validates and caches a new one.
    pub fn get_or_build(
        &mut self,
        graph: &ModelGraph<Validated>,
        devices: &DeviceSet,
        strategy: &dyn PartitionStrategy,
    ) -> Result<Arc<ExecutionPlan>, PlannerError> {
        let key = PlanKey::new(graph, devices, strategy.name());
        if let Some(plan) = self.get(&key) {
            tracing::debug!(strategy = strategy.name(), "plan cache hit");
            return Ok(plan);
        }

        let plan = strategy.plan(graph, devices)?;
        plan.validate(graph, devices)?;
        Ok(self.insert(key, plan))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{devices, remote, xor_graph};
    use crate::{CostAware, LocalOnly};
    use device_registry::Liveness;

    #[test]
    fn test_hit_after_build() {
        let graph = xor_graph();
        let set = devices(vec![remote("edge", 4.0)]);
        let mut cache = PlanCache::new(4);

        let first = cache.get_or_build(&graph, &set, &CostAware).unwrap();
        let second = cache.get_or_build(&graph, &set, &CostAware).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, evictions: 0 });
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_key_includes_strategy_and_devices() {
        let graph = xor_graph();
        let set = devices(vec![remote("edge", 4.0)]);
        let mut cache = PlanCache::new(4);
        cache.get_or_build(&graph, &set, &CostAware).unwrap();
        cache.get_or_build(&graph, &set, &LocalOnly).unwrap();

        let mut down = remote("edge", 4.0);
        down.liveness = Liveness::Unreachable;
        let degraded = devices(vec![down]);
        cache.get_or_build(&graph, &degraded, &CostAware).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_oldest_evicted() {
        let graph = xor_graph();
        let mut cache = PlanCache::new(2);
        let sets: Vec<_> = [1.0, 2.0, 3.0]
            .iter()
            .map(|&class| devices(vec![remote("edge", class)]))
            .collect();
        for set in &sets {
            cache.get_or_build(&graph, set, &CostAware).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get(&PlanKey::new(&graph, &sets[0], "cost-aware")).is_none());
        assert!(cache.get(&PlanKey::new(&graph, &sets[2], "cost-aware")).is_some());
    }

    #[test]
    fn test_failures_not_cached() {
        let graph = xor_graph();
        let mut local = crate::testutil::local_device();
        local.memory_budget = memory_manager::MemoryBudget::from_bytes(4);
        let set = device_registry::DeviceSet::new("local".into(), vec![local]);
        let mut cache = PlanCache::new(4);
        assert!(cache.get_or_build(&graph, &set, &CostAware).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let graph = xor_graph();
        let set = devices(vec![]);
        let mut cache = PlanCache::new(0);
        cache.get_or_build(&graph, &set, &CostAware).unwrap();
        assert!(cache.is_empty());
        cache.clear();
        assert_eq!(cache.capacity(), 0);
    }
}
