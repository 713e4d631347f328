// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reservation statistics for profiling and plan reports.
//!
//! [`LedgerStats`] tracks cumulative metrics of one [`crate::MemoryLedger`]:
//! how many reservations were granted or refused and the high-water mark of
//! reserved bytes. The planner reports the high-water mark as a device's
//! peak live bytes.

/// Cumulative statistics about ledger usage.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LedgerStats {
    /// Granted reservations.
    pub total_reservations: u64,
    /// Reservations refused because the budget was exhausted.
    pub rejected_reservations: u64,
    /// Peak reserved bytes.
    pub peak_reserved_bytes: usize,
    /// Total bytes ever reserved (including released ones).
    pub cumulative_reserved_bytes: u64,
    /// Reservations released (dropped).
    pub total_releases: u64,
}

impl LedgerStats {
    pub(crate) fn record_grant(&mut self, size: usize, reserved_now: usize) {
        self.total_reservations += 1;
        self.cumulative_reserved_bytes += size as u64;
        if reserved_now > self.peak_reserved_bytes {
            self.peak_reserved_bytes = reserved_now;
        }
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejected_reservations += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.total_releases += 1;
    }

    /// Fraction of requests that were refused, in `[0.0, 1.0]`.
    pub fn rejection_ratio(&self) -> f64 {
        let total = self.total_reservations + self.rejected_reservations;
        if total == 0 {
            return 0.0;
        }
        self.rejected_reservations as f64 / total as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_reserved_bytes as f64 / 1024.0;
        format!(
            "Reservations: {} granted, {} rejected, {} released, peak {:.2} KB",
            self.total_reservations, self.rejected_reservations, self.total_releases, peak_kb,
        )
    }
}
