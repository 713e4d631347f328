// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Budget-enforced memory accounting for the devices of an EdgeFlow
//! deployment.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: a hard memory ceiling with human-readable parsing
//!   (`"512M"`, `"1G"`, etc.).
//! - [`MemoryLedger`]: per-device accounting. The partitioner simulates
//!   tensor lifetimes against it; the engine reserves every produced
//!   tensor's bytes on the device that holds it.
//! - [`Reservation`]: an RAII claim. Dropping it returns the bytes.
//! - [`LedgerStats`]: cumulative metrics (peak reserved bytes, refusals).
//!
//! # Ownership Model
//!
//! ```text
//! MemoryLedger::reserve(size)
//!       │
//!       ▼
//!   Reservation  ◄─── holds Arc<LedgerInner>
//!       │
//!       │  drop()
//!       ▼
//!   LedgerInner::release()
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{MemoryBudget, MemoryLedger};
//!
//! let ledger = MemoryLedger::new(MemoryBudget::from_mb(64));
//!
//! let a = ledger.reserve(1024 * 1024).unwrap();
//! let b = ledger.reserve(512 * 1024).unwrap();
//! assert_eq!(ledger.reserved_bytes(), 1024 * 1024 + 512 * 1024);
//!
//! drop(a);
//! assert_eq!(ledger.reserved_bytes(), 512 * 1024);
//! # drop(b);
//! ```

mod budget;
mod error;
mod ledger;
mod stats;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use ledger::{MemoryLedger, Reservation};
pub use stats::LedgerStats;
