// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session profiling metrics.
//!
//! [`InferenceMetrics`] collects per-node and aggregate timing, transfer and
//! memory data for one session. Nodes carry dispatch and completion event
//! numbers so the order the engine actually ran them in can be checked after
//! the fact.

use device_registry::DeviceId;
use model_ir::NodeId;
use std::collections::BTreeMap;
use std::time::Duration;

/// Metrics for a single node's execution.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeMetrics {
    pub node: NodeId,
    /// Device the node ran on.
    pub device: DeviceId,
    /// Session event number at dispatch. Dispatches and completions share
    /// one counter, so `a.finish_seq < b.start_seq` means `b` started after
    /// `a` finished.
    pub start_seq: u64,
    /// Session event number at completion.
    pub finish_seq: u64,
    /// Time spent moving inputs onto the device, retries included.
    pub transfer_duration: Duration,
    pub compute_duration: Duration,
    /// Bytes moved onto the device for this node.
    pub bytes_transferred: u64,
    /// Transfer attempts made, successful or not.
    pub transfer_attempts: u32,
}

/// Aggregate metrics for a complete session.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct InferenceMetrics {
    /// Wall-clock time from dispatch of the first node to the last result.
    pub total_duration: Duration,
    pub total_transfer_duration: Duration,
    pub total_compute_duration: Duration,
    pub bytes_transferred: u64,
    /// Successful cross-device transfers.
    pub transfers: usize,
    /// Transfer attempts beyond the first, summed over all transfers.
    pub retries: u32,
    /// Graph outputs moved back to the local device after the last node.
    pub returned_outputs: usize,
    /// Highest bytes held by live tensors, per device.
    pub peak_live_bytes: BTreeMap<DeviceId, usize>,
    /// Per-node metrics in completion order.
    pub node_metrics: Vec<NodeMetrics>,
}

impl InferenceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished node.
    pub fn record_node(&mut self, metrics: NodeMetrics, transfers: usize) {
        self.total_transfer_duration += metrics.transfer_duration;
        self.total_compute_duration += metrics.compute_duration;
        self.bytes_transferred += metrics.bytes_transferred;
        self.transfers += transfers;
        self.retries += metrics.transfer_attempts.saturating_sub(transfers as u32);
        self.node_metrics.push(metrics);
    }

    /// Records the move of one graph output back to the local device.
    pub fn record_return(&mut self, bytes: u64, attempts: u32, duration: Duration) {
        self.total_transfer_duration += duration;
        self.bytes_transferred += bytes;
        self.transfers += 1;
        self.returned_outputs += 1;
        self.retries += attempts.saturating_sub(1);
    }

    /// Raises the recorded peak for `device` to `bytes` if higher.
    pub fn record_peak(&mut self, device: &DeviceId, bytes: usize) {
        let peak = self.peak_live_bytes.entry(device.clone()).or_insert(0);
        *peak = (*peak).max(bytes);
    }

    /// Finalises metrics with the total wall-clock time.
    pub fn finalise(&mut self, total: Duration) {
        self.total_duration = total;
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeMetrics> {
        self.node_metrics.iter().find(|m| &m.node == id)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let transfer_pct = if self.total_duration.as_secs_f64() > 0.0 {
            (self.total_transfer_duration.as_secs_f64() / self.total_duration.as_secs_f64()) * 100.0
        } else {
            0.0
        };
        let peaks = self
            .peak_live_bytes
            .iter()
            .map(|(d, b)| format!("{d}={:.1} KB", *b as f64 / 1024.0))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Session: {:.2}ms total, {} nodes, {:.2}ms compute, \
             {:.2}ms transfer ({:.0}%), {} transfer(s) / {} bytes, {} retr{}, peak [{}]",
            self.total_duration.as_secs_f64() * 1000.0,
            self.node_metrics.len(),
            self.total_compute_duration.as_secs_f64() * 1000.0,
            self.total_transfer_duration.as_secs_f64() * 1000.0,
            transfer_pct,
            self.transfers,
            self.bytes_transferred,
            self.retries,
            if self.retries == 1 { "y" } else { "ies" },
            peaks,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, device: &str, attempts: u32, bytes: u64) -> NodeMetrics {
        NodeMetrics {
            node: NodeId::from(id),
            device: DeviceId::from(device),
            start_seq: 0,
            finish_seq: 0,
            transfer_duration: Duration::from_millis(2),
            compute_duration: Duration::from_millis(5),
            bytes_transferred: bytes,
            transfer_attempts: attempts,
        }
    }

    #[test]
    fn test_empty_metrics() {
        let m = InferenceMetrics::new();
        assert!(m.node_metrics.is_empty());
        assert_eq!(m.retries, 0);
        assert!(m.summary().contains("0 nodes"));
    }

    #[test]
    fn test_record_and_finalise() {
        let mut m = InferenceMetrics::new();
        m.record_node(node("a", "local", 0, 0), 0);
        // Two transfers, one of which needed a retry.
        m.record_node(node("b", "edge", 3, 64), 2);
        m.finalise(Duration::from_millis(30));

        assert_eq!(m.node_metrics.len(), 2);
        assert_eq!(m.transfers, 2);
        assert_eq!(m.retries, 1);
        assert_eq!(m.bytes_transferred, 64);
        assert_eq!(m.total_compute_duration, Duration::from_millis(10));
        assert_eq!(m.total_transfer_duration, Duration::from_millis(4));
        assert_eq!(m.node(&"b".into()).unwrap().device.as_str(), "edge");
        assert!(m.node(&"c".into()).is_none());
    }

    #[test]
    fn test_return_transfers_count_as_transfers() {
        let mut m = InferenceMetrics::new();
        m.record_node(node("a", "edge", 1, 16), 1);
        m.record_return(16, 2, Duration::from_millis(3));

        assert_eq!(m.transfers, 2);
        assert_eq!(m.returned_outputs, 1);
        assert_eq!(m.retries, 1);
        assert_eq!(m.bytes_transferred, 32);
        assert_eq!(m.total_transfer_duration, Duration::from_millis(5));
        assert_eq!(m.node_metrics.len(), 1);
    }

    #[test]
    fn test_peak_only_rises() {
        let mut m = InferenceMetrics::new();
        let d = DeviceId::from("local");
        m.record_peak(&d, 100);
        m.record_peak(&d, 40);
        m.record_peak(&d, 120);
        assert_eq!(m.peak_live_bytes[&d], 120);
    }

    #[test]
    fn test_summary_format() {
        let mut m = InferenceMetrics::new();
        m.record_node(node("a", "local", 2, 8), 1);
        m.record_peak(&"local".into(), 2048);
        m.finalise(Duration::from_millis(10));

        let s = m.summary();
        assert!(s.contains("Session:"));
        assert!(s.contains("1 nodes"));
        assert!(s.contains("1 retry"));
        assert!(s.contains("local=2.0 KB"));
    }
}
