// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Live tensors of a running session.
//!
//! Each produced tensor sits in the arena together with the ledger
//! reservation that accounts for it on its device. A tensor is released as
//! soon as its last consumer finishes; graph outputs are pinned until the
//! session collects them.

use device_registry::DeviceId;
use memory_manager::Reservation;
use model_ir::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use tensor_core::Tensor;

struct Slot {
    tensor: Arc<Tensor>,
    device: DeviceId,
    /// Consumer edges that have not finished yet.
    remaining: usize,
    pinned: bool,
    _reservation: Reservation,
}

#[derive(Default)]
pub(crate) struct TensorArena {
    slots: HashMap<NodeId, Slot>,
}

impl TensorArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the output of `node`, produced on `device`.
    ///
    /// `consumers` counts consumer edges. A tensor with no consumers that is
    /// not pinned is released immediately.
    pub fn insert(
        &mut self,
        node: NodeId,
        device: DeviceId,
        tensor: Arc<Tensor>,
        reservation: Reservation,
        consumers: usize,
        pinned: bool,
    ) {
        if consumers == 0 && !pinned {
            tracing::debug!(node = %node, "output has no consumers; released");
            return;
        }
        self.slots.insert(
            node,
            Slot {
                tensor,
                device,
                remaining: consumers,
                pinned,
                _reservation: reservation,
            },
        );
    }

    /// The tensor produced by `node` and the device holding it.
    pub fn get(&self, node: &NodeId) -> Option<(&Arc<Tensor>, &DeviceId)> {
        self.slots.get(node).map(|s| (&s.tensor, &s.device))
    }

    /// Marks one consumer edge of `node` as finished. Returns `true` if the
    /// tensor was released.
    pub fn consume(&mut self, node: &NodeId) -> bool {
        let Some(slot) = self.slots.get_mut(node) else {
            return false;
        };
        slot.remaining = slot.remaining.saturating_sub(1);
        if slot.remaining == 0 && !slot.pinned {
            self.slots.remove(node);
            tracing::trace!(node = %node, "intermediate released");
            return true;
        }
        false
    }

    #[cfg(test)]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.slots.contains_key(node)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Collects the tensors of `outputs` in the given order, each with the
    /// device holding it, or the first output that is missing.
    pub fn collect(&self, outputs: &[NodeId]) -> Result<Vec<(Arc<Tensor>, DeviceId)>, NodeId> {
        outputs
            .iter()
            .map(|id| {
                self.slots
                    .get(id)
                    .map(|s| (Arc::clone(&s.tensor), s.device.clone()))
                    .ok_or_else(|| id.clone())
            })
            .collect()
    }
}
