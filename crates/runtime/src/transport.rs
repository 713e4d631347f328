// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cross-device tensor transfer.
//!
//! A [`Transport`] moves an immutable tensor from the device that produced
//! it to the device that consumes it. Failures are either transient (the
//! peer is briefly unreachable; retried under a [`RetryPolicy`]) or fatal.

use device_registry::{DeviceDescriptor, DeviceId};
use std::sync::Arc;
use std::time::Duration;
use tensor_core::Tensor;

/// Why a transfer did not complete.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The peer did not answer; the transfer may succeed if retried.
    #[error("device '{0}' is temporarily unreachable")]
    Unreachable(DeviceId),

    /// The transfer cannot succeed.
    #[error("transfer rejected: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Moves tensors between devices. Called from blocking worker threads.
pub trait Transport: Send + Sync {
    fn transfer(
        &self,
        tensor: &Arc<Tensor>,
        from: &DeviceDescriptor,
        to: &DeviceDescriptor,
    ) -> Result<Arc<Tensor>, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&Arc<Tensor>, &DeviceDescriptor, &DeviceDescriptor) -> Result<Arc<Tensor>, TransportError> + Send + Sync,
{
    fn transfer(
        &self,
        tensor: &Arc<Tensor>,
        from: &DeviceDescriptor,
        to: &DeviceDescriptor,
    ) -> Result<Arc<Tensor>, TransportError> {
        self(tensor, from, to)
    }
}

/// Transport for devices sharing the host process: the tensor is shared,
/// not copied.
///
/// With `simulate_links` set, each transfer sleeps for the estimated link
/// time of both endpoints, which makes offloading trade-offs visible in
/// local experiments.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessTransport {
    pub simulate_links: bool,
}

impl Transport for InProcessTransport {
    fn transfer(
        &self,
        tensor: &Arc<Tensor>,
        from: &DeviceDescriptor,
        to: &DeviceDescriptor,
    ) -> Result<Arc<Tensor>, TransportError> {
        if self.simulate_links {
            let bytes = tensor.size_bytes() as u64;
            let seconds = from.host_transfer_seconds(bytes) + to.host_transfer_seconds(bytes);
            if seconds.is_finite() && seconds > 0.0 {
                std::thread::sleep(Duration::from_secs_f64(seconds));
            }
        }
        Ok(Arc::clone(tensor))
    }
}

/// Bounded retries with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_registry::{DeviceKind, LinkSpec, Liveness};
    use memory_manager::MemoryBudget;
    use tensor_core::Shape;

    fn device(id: &str, link: Option<LinkSpec>) -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from(id),
            kind: DeviceKind::Remote,
            compute_class: 1.0,
            memory_budget: MemoryBudget::from_mb(1),
            link,
            address: None,
            is_local: false,
            liveness: Liveness::Reachable,
            last_seen_ms: None,
        }
    }

    #[test]
    fn test_in_process_shares_tensor() {
        let t = Arc::new(Tensor::zeros(Shape::vector(4)));
        let moved = InProcessTransport::default()
            .transfer(&t, &device("a", None), &device("b", None))
            .unwrap();
        assert!(Arc::ptr_eq(&t, &moved));
    }

    #[test]
    fn test_simulated_link_delay() {
        let link = Some(LinkSpec {
            bandwidth_mbps: 1_000.0,
            latency_ms: 15.0,
        });
        let t = Arc::new(Tensor::zeros(Shape::vector(4)));
        let start = std::time::Instant::now();
        InProcessTransport { simulate_links: true }
            .transfer(&t, &device("a", link), &device("b", None))
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_closure_transport_and_transience() {
        let flaky = |_: &Arc<Tensor>, _: &DeviceDescriptor, to: &DeviceDescriptor| {
            Err(TransportError::Unreachable(to.id.clone()))
        };
        let t = Arc::new(Tensor::zeros(Shape::vector(1)));
        let err = flaky.transfer(&t, &device("a", None), &device("b", None)).unwrap_err();
        assert!(err.is_transient());
        assert!(!TransportError::Fatal("x".into()).is_transient());
    }

    #[test]
    fn test_retry_policy() {
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
        assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
    }
}
