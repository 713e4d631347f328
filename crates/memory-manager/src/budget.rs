// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-device memory budgets.
//!
//! Every device descriptor carries a `memory_budget`: the most bytes of live
//! tensors the planner may place on that device and the engine may hold
//! there at once. The planner checks each assignment against it and the
//! session's [`crate::MemoryLedger`] for the device enforces it while nodes
//! run.
//!
//! Descriptors give the budget as a byte count (`"memory_budget": 9000`) or
//! as a binary-unit string (`"memory_budget": "256M"`).

use crate::MemoryError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = KIB * 1024;
const GIB: usize = MIB * 1024;

/// Accepted unit suffixes, longest first so `"MB"` is not read as `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// The memory ceiling of one device, in bytes. Never zero when parsed.
///
/// ```
/// use memory_manager::MemoryBudget;
///
/// let phone = MemoryBudget::parse("256M").unwrap();
/// assert_eq!(phone.as_mb(), 256);
///
/// let jetson: MemoryBudget = serde_json::from_str("\"2G\"").unwrap();
/// assert_eq!(jetson, MemoryBudget::from_gb(2));
/// ```
///
/// Always serializes as a byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Saturates at `usize::MAX` bytes.
    pub fn from_mb(mb: usize) -> Self {
        Self::from_bytes(mb.saturating_mul(MIB))
    }

    /// Saturates at `usize::MAX` bytes.
    pub fn from_gb(gb: usize) -> Self {
        Self::from_bytes(gb.saturating_mul(GIB))
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Whole mebibytes, truncated.
    pub fn as_mb(&self) -> usize {
        self.bytes / MIB
    }

    /// Parses a device budget such as `"512M"`, `"2GB"`, `"64k"` or
    /// `"1048576"`. Units are binary and case-insensitive.
    ///
    /// # Errors
    /// [`MemoryError::InvalidBudget`] for empty, non-numeric, zero or
    /// overflowing budgets.
    pub fn parse(text: &str) -> Result<Self, MemoryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MemoryError::InvalidBudget("empty budget string".into()));
        }

        let upper = text.to_ascii_uppercase();
        let (digits, unit) = SUFFIXES
            .iter()
            .find(|(suffix, _)| upper.ends_with(suffix))
            .map_or((text, 1), |(suffix, unit)| (&text[..text.len() - suffix.len()], *unit));

        let count: usize = digits.trim().parse().map_err(|_| {
            MemoryError::InvalidBudget(format!("'{text}': expected a byte count with an optional K, M or G unit"))
        })?;
        match count.checked_mul(unit) {
            None => Err(MemoryError::InvalidBudget(format!("'{text}' does not fit in memory"))),
            Some(0) => Err(MemoryError::InvalidBudget(format!("'{text}' is zero"))),
            Some(bytes) => Ok(Self { bytes }),
        }
    }
}

impl<'de> serde::Deserialize<'de> for MemoryBudget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)
            .map_err(|_| D::Error::custom("memory budget must be a positive integer or a string like \"512M\""))?
        {
            Raw::Bytes(0) => Err(D::Error::custom("memory budget must be positive")),
            Raw::Bytes(b) => usize::try_from(b)
                .map(Self::from_bytes)
                .map_err(|_| D::Error::custom("memory budget does not fit in memory")),
            Raw::Text(s) => Self::parse(&s).map_err(D::Error::custom),
        }
    }
}

impl fmt::Display for MemoryBudget {
    /// Uses the largest unit that divides the budget exactly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = [(GIB, "GB"), (MIB, "MB"), (KIB, "KB")]
            .into_iter()
            .find(|(size, _)| self.bytes >= *size && self.bytes % size == 0);
        match unit {
            Some((size, label)) => write!(f, "{} {label}", self.bytes / size),
            None => write!(f, "{} B", self.bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(MemoryBudget::from_mb(512).as_bytes(), 512 * MIB);
        assert_eq!(MemoryBudget::from_gb(2).as_mb(), 2048);
        assert_eq!(MemoryBudget::from_gb(usize::MAX).as_bytes(), usize::MAX);
    }

    #[test]
    fn test_parse_units() {
        for text in ["512M", "512MB", "512m", "512mb", " 512M "] {
            assert_eq!(MemoryBudget::parse(text).unwrap().as_mb(), 512, "{text}");
        }
        assert_eq!(MemoryBudget::parse("1G").unwrap().as_mb(), 1024);
        assert_eq!(MemoryBudget::parse("2gb").unwrap().as_mb(), 2048);
        assert_eq!(MemoryBudget::parse("64K").unwrap().as_bytes(), 64 * KIB);
        assert_eq!(MemoryBudget::parse("9000B").unwrap().as_bytes(), 9000);
        assert_eq!(MemoryBudget::parse("1048576").unwrap().as_mb(), 1);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(MemoryBudget::parse("").is_err());
        assert!(MemoryBudget::parse("abc").is_err());
        assert!(MemoryBudget::parse("0M").is_err());
        assert!(MemoryBudget::parse("M").is_err());
        assert!(MemoryBudget::parse(&format!("{}G", usize::MAX)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_gb(1).to_string(), "1 GB");
        assert_eq!(MemoryBudget::from_mb(512).to_string(), "512 MB");
        assert_eq!(MemoryBudget::from_bytes(2048).to_string(), "2 KB");
        assert_eq!(MemoryBudget::from_bytes(100).to_string(), "100 B");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let b: MemoryBudget = serde_json::from_str("1048576").unwrap();
        assert_eq!(b.as_mb(), 1);
        let b: MemoryBudget = serde_json::from_str("\"256M\"").unwrap();
        assert_eq!(b.as_mb(), 256);
        assert_eq!(serde_json::to_string(&b).unwrap(), (256 * MIB).to_string());
    }

    #[test]
    fn test_deserialize_rejects_non_positive() {
        assert!(serde_json::from_str::<MemoryBudget>("0").is_err());
        assert!(serde_json::from_str::<MemoryBudget>("-5").is_err());
        assert!(serde_json::from_str::<MemoryBudget>("\"lots\"").is_err());
        assert!(serde_json::from_str::<MemoryBudget>("1.5").is_err());
    }
}
