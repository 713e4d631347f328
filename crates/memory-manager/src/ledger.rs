// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget-enforced memory accounting.
//!
//! A [`MemoryLedger`] tracks how many bytes are reserved against one
//! device's budget. It never allocates: tensors own their storage, and the
//! ledger only answers whether they fit. Reservations are RAII
//! [`Reservation`] values that return their bytes on drop.
//!
//! # Thread Safety
//! `MemoryLedger` is cheap to clone (an `Arc` handle) and `Send + Sync`;
//! device workers running on different threads reserve concurrently.
//! The check-and-add is a single compare-and-swap, so two concurrent
//! reservations can never overshoot the budget together.

use crate::{LedgerStats, MemoryBudget, MemoryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Internal ledger state, shared between the ledger and its reservations.
#[derive(Debug)]
pub(crate) struct LedgerInner {
    budget: MemoryBudget,
    reserved_bytes: AtomicUsize,
    stats: Mutex<LedgerStats>,
}

impl LedgerInner {
    /// Called by `Reservation::drop`.
    pub(crate) fn release(&self, size_bytes: usize) {
        self.reserved_bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_release();
        }
    }
}

/// Memory accounting for one device.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryLedger};
///
/// let ledger = MemoryLedger::new(MemoryBudget::from_bytes(1000));
/// let a = ledger.reserve(600).unwrap();
/// assert!(ledger.reserve(600).is_err());
///
/// drop(a);
/// assert_eq!(ledger.reserved_bytes(), 0);
/// assert_eq!(ledger.stats().peak_reserved_bytes, 600);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl MemoryLedger {
    /// Creates an empty ledger with the given budget.
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                budget,
                reserved_bytes: AtomicUsize::new(0),
                stats: Mutex::new(LedgerStats::default()),
            }),
        }
    }

    /// Reserves `size_bytes` against the budget.
    ///
    /// A zero-byte reservation always succeeds and is not counted.
    ///
    /// # Errors
    /// Returns [`MemoryError::OutOfMemory`] if the reservation would exceed
    /// the budget. Nothing is reserved in that case.
    pub fn reserve(&self, size_bytes: usize) -> Result<Reservation, MemoryError> {
        if size_bytes == 0 {
            return Ok(Reservation::new(Arc::clone(&self.inner), 0));
        }

        let budget = self.inner.budget.as_bytes();
        let granted = self
            .inner
            .reserved_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(size_bytes)
                    .filter(|&total| total <= budget)
            });

        match granted {
            Ok(previous) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_grant(size_bytes, previous + size_bytes);
                }
                Ok(Reservation::new(Arc::clone(&self.inner), size_bytes))
            }
            Err(current) => {
                if let Ok(mut stats) = self.inner.stats.lock() {
                    stats.record_rejection();
                }
                tracing::debug!(
                    requested = size_bytes,
                    reserved = current,
                    budget,
                    "memory reservation refused"
                );
                Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes: budget.saturating_sub(current),
                    budget_bytes: budget,
                })
            }
        }
    }

    /// Returns `true` if `size_bytes` would currently fit.
    pub fn can_fit(&self, size_bytes: usize) -> bool {
        size_bytes <= self.available_bytes()
    }

    /// Bytes currently reserved.
    pub fn reserved_bytes(&self) -> usize {
        self.inner.reserved_bytes.load(Ordering::Acquire)
    }

    /// Bytes remaining before hitting the budget.
    pub fn available_bytes(&self) -> usize {
        self.inner
            .budget
            .as_bytes()
            .saturating_sub(self.reserved_bytes())
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    /// Returns a snapshot of the ledger statistics.
    pub fn stats(&self) -> LedgerStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

/// An RAII claim on part of a ledger's budget.
///
/// Dropping the reservation returns its bytes to the ledger. Reservations
/// are `Send`, so a tensor's claim can travel with it between workers.
#[derive(Debug)]
pub struct Reservation {
    ledger: Arc<LedgerInner>,
    size_bytes: usize,
}

impl Reservation {
    fn new(ledger: Arc<LedgerInner>, size_bytes: usize) -> Self {
        Self { ledger, size_bytes }
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.size_bytes > 0 {
            self.ledger.release(self.size_bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_drop() {
        let ledger = MemoryLedger::new(MemoryBudget::from_mb(1));
        let r = ledger.reserve(1024).unwrap();
        assert_eq!(ledger.reserved_bytes(), 1024);
        assert_eq!(r.size_bytes(), 1024);
        drop(r);
        assert_eq!(ledger.reserved_bytes(), 0);
    }

    #[test]
    fn test_out_of_memory_reserves_nothing() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(1024));
        let _a = ledger.reserve(512).unwrap();
        let _b = ledger.reserve(512).unwrap();
        let err = ledger.reserve(1).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfMemory {
                requested_bytes: 1,
                available_bytes: 0,
                budget_bytes: 1024,
            }
        );
        assert_eq!(ledger.reserved_bytes(), 1024);
    }

    #[test]
    fn test_zero_reservation_is_free() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(8));
        let _full = ledger.reserve(8).unwrap();
        let zero = ledger.reserve(0).unwrap();
        assert_eq!(zero.size_bytes(), 0);
        drop(zero);
        assert_eq!(ledger.reserved_bytes(), 8);
        assert_eq!(ledger.stats().total_releases, 0);
    }

    #[test]
    fn test_can_fit_and_available() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(10_000));
        assert_eq!(ledger.available_bytes(), 10_000);
        let _r = ledger.reserve(3000).unwrap();
        assert_eq!(ledger.available_bytes(), 7000);
        assert!(ledger.can_fit(7000));
        assert!(!ledger.can_fit(7001));
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(100));
        let other = ledger.clone();
        let _r = other.reserve(60).unwrap();
        assert_eq!(ledger.reserved_bytes(), 60);
        assert!(ledger.reserve(60).is_err());
    }

    #[test]
    fn test_stats() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(100));
        let a = ledger.reserve(30).unwrap();
        let b = ledger.reserve(50).unwrap();
        drop(a);
        let _ = ledger.reserve(90);
        drop(b);
        let s = ledger.stats();
        assert_eq!(s.peak_reserved_bytes, 80);
        assert_eq!(s.total_reservations, 2);
        assert_eq!(s.rejected_reservations, 1);
        assert_eq!(s.total_releases, 2);
    }

    #[test]
    fn test_concurrent_reservations_respect_budget() {
        let ledger = MemoryLedger::new(MemoryBudget::from_bytes(1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = ledger.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter_map(|_| l.reserve(10).ok())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let held: Vec<Reservation> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(held.len(), 100);
        assert_eq!(ledger.reserved_bytes(), 1000);
        drop(held);
        assert_eq!(ledger.reserved_bytes(), 0);
    }
}
